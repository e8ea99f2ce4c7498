//! 统一路径与目录约定（本地状态目录 `.snips`）。
//!
//! 目标：
//! - 将落盘路径集中在 [`InstallLayout`] 中，由调用方显式传入编排流程
//! - 测试时可把布局指向临时目录，与真实工作目录隔离
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::io;
use std::path::{Path, PathBuf};

/// 本地状态目录名（相对工作目录）。
pub const STATE_DIR: &str = ".snips";

/// 助手包文件名（工作目录中的用户包与 `.snips` 中的缓存包同名）。
pub const ASSISTANT_ZIP_FILENAME: &str = "assistant.zip";

/// 远程下载得到的临时助手包文件名（位于工作目录）。
pub const ASSISTANT_DOWNLOAD_FILENAME: &str = "assistant-download.zip";

/// 意图类生成目录名（位于 `.snips` 下）。
pub const INTENTS_DIR: &str = "intents";

/// 安装状态文件名（位于 `.snips` 下）。
pub const STATE_FILENAME: &str = "install-state.json";

/// 登录会话文件名（位于 `.snips` 下）。
pub const SESSION_FILENAME: &str = "session.json";

/// 一次运行使用的文件系统布局。
///
/// 字段说明：
/// - `work_dir`：工作目录（用户提供的 `assistant.zip` 与临时下载包所在目录）
/// - `state_dir`：本地状态目录（缓存包、生成的意图、状态文件）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallLayout {
    pub work_dir: PathBuf,
    pub state_dir: PathBuf,
}

impl InstallLayout {
    /// 以 `work_dir` 为根创建默认布局（`state_dir = work_dir/.snips`）。
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        let work_dir = work_dir.into();
        let state_dir = work_dir.join(STATE_DIR);
        Self {
            work_dir,
            state_dir,
        }
    }

    /// 以进程当前工作目录创建默认布局。
    ///
    /// 异常处理：
    /// - 当前目录不可读（已被删除/权限不足）时返回错误。
    pub fn from_current_dir() -> io::Result<Self> {
        Ok(Self::new(std::env::current_dir()?))
    }

    /// 工作目录中的用户助手包：`<work>/assistant.zip`。
    pub fn local_bundle(&self) -> PathBuf {
        self.work_dir.join(ASSISTANT_ZIP_FILENAME)
    }

    /// 缓存助手包：`<work>/.snips/assistant.zip`。
    pub fn cached_bundle(&self) -> PathBuf {
        self.state_dir.join(ASSISTANT_ZIP_FILENAME)
    }

    /// 临时下载包：`<work>/assistant-download.zip`。
    pub fn download_bundle(&self) -> PathBuf {
        self.work_dir.join(ASSISTANT_DOWNLOAD_FILENAME)
    }

    /// 意图类生成目录：`<work>/.snips/intents`。
    pub fn intents_dir(&self) -> PathBuf {
        self.state_dir.join(INTENTS_DIR)
    }

    /// 安装状态文件：`<work>/.snips/install-state.json`。
    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join(STATE_FILENAME)
    }

    /// 登录会话文件：`<work>/.snips/session.json`。
    pub fn session_file(&self) -> PathBuf {
        self.state_dir.join(SESSION_FILENAME)
    }
}

/// 将命令行/配置中的路径字段解析为实际路径。
///
/// 返回值：
/// - `raw` 为绝对路径：直接返回
/// - `raw` 为相对路径：返回 `base.join(raw)`
///
/// 异常处理：
/// - `raw` 为空字符串时返回 `InvalidInput`，避免误把基准目录本身当作目标。
pub fn resolve_path(base: &Path, raw: &str) -> io::Result<PathBuf> {
    if raw.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "空路径"));
    }
    let p = PathBuf::from(raw);
    if p.is_absolute() {
        Ok(p)
    } else {
        Ok(base.join(p))
    }
}
