//! Linux/树莓派平台能力封装（命令执行、平台检测、SDK、包管理、systemd、麦克风、蓝牙）。
//!
//! 目标：
//! - 将外部命令与系统文件操作集中封装，上层编排只面对函数调用契约
//! - 统一错误处理风格（以 `anyhow::Result` 形式向上返回，附带命令输出便于排障）
//!
//! 权限要求：
//! - 写 `/etc`、安装系统包、操作 systemd 通常需要 root；非 root 时通过 `sudo` 执行
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

pub mod bluetooth;
pub mod microphone;
pub mod pip;
pub mod platform;
pub mod process;
pub mod sdk;
pub mod systemd;
