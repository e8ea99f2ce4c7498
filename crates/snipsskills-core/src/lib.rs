//! Snips Skills 安装器核心库（与操作系统无关）。
//!
//! 功能：
//! - 定义 Snipsfile 配置模型与解析
//! - 定义本地状态目录布局（`.snips` 缓存、意图生成目录、状态文件）
//! - 凭据校验与网关认证下载（下载原语 + 认证装饰）
//! - 助手包（assistant.zip）校验与意图类生成
//! - 安装状态与登录会话的落盘模型
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

pub mod auth;
pub mod bundle;
pub mod download;
pub mod intents;
pub mod paths;
pub mod snipsfile;
pub mod state;
