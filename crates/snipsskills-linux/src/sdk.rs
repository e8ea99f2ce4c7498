//! Snips SDK（语音平台运行时）检测、安装与助手包加载。
//!
//! 说明：
//! - SDK 只支持树莓派；其他平台安装时返回 [`SdkError::UnsupportedPlatform`]
//! - 安装方式：注册 Snips apt 源后通过 apt 安装 `snips-platform-voice`
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::path::Path;
use std::process::Command;

use anyhow::Result;
use thiserror::Error;
use tracing::{info, warn};

use crate::platform;
use crate::process::{command_exists, privileged, run, write_file_privileged};

/// SDK 的 apt 包名。
pub const SDK_PACKAGE: &str = "snips-platform-voice";

/// apt 源文件路径。
pub const APT_SOURCE_LIST: &str = "/etc/apt/sources.list.d/snips.list";

/// Snips apt 仓库签名公钥 ID。
pub const APT_KEY: &str = "D4F50CDCA10A2849";

/// 将助手包安装进运行时的命令。
pub const INSTALL_ASSISTANT_COMMAND: &str = "snips-install-assistant";

/// 判定 SDK 已安装的命令（任一存在即可）。
const SDK_COMMANDS: [&str; 2] = ["snips", "snips-audio-server"];

/// SDK 安装错误。
#[derive(Debug, Error)]
pub enum SdkError {
    #[error("Snips SDK 目前只能在树莓派上运行")]
    UnsupportedPlatform,
    #[error("安装 Snips SDK 失败: {0:#}")]
    InstallationFailure(anyhow::Error),
}

/// SDK 是否已安装。
pub fn is_installed() -> bool {
    SDK_COMMANDS.iter().any(|c| command_exists(c))
}

/// apt 源文件内容。
pub fn apt_source_line(codename: &str) -> String {
    format!("deb https://raspbian.snips.ai/{codename} stable main\n")
}

/// 安装 SDK。
///
/// 异常处理：
/// - 非树莓派：`UnsupportedPlatform`
/// - 任一 apt 步骤失败：`InstallationFailure`（附带命令输出）
pub fn install() -> Result<(), SdkError> {
    if !platform::is_raspi_os() {
        return Err(SdkError::UnsupportedPlatform);
    }
    install_from_apt().map_err(SdkError::InstallationFailure)
}

fn install_from_apt() -> Result<()> {
    let codename = run(Command::new("lsb_release").arg("-cs"))
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "stretch".to_string());

    info!("注册 Snips apt 源 ({})", codename);
    run(privileged("apt-get").args(["install", "-y", "dirmngr"]))?;
    write_file_privileged(Path::new(APT_SOURCE_LIST), &apt_source_line(&codename))?;
    run(privileged("apt-key").args(["adv", "--keyserver", "pgp.mit.edu", "--recv-keys", APT_KEY]))?;

    info!("安装 {}", SDK_PACKAGE);
    run(privileged("apt-get").arg("update"))?;
    run(privileged("apt-get").args(["install", "-y", SDK_PACKAGE]))?;
    Ok(())
}

/// 将助手包加载进 SDK 运行时。
///
/// 返回值：
/// - `Ok(true)`：已加载
/// - `Ok(false)`：系统中没有加载工具（通常是 SDK 未安装），已跳过
///
/// 异常处理：
/// - 加载命令执行失败返回错误
pub fn load_assistant(bundle: &Path) -> Result<bool> {
    if !command_exists(INSTALL_ASSISTANT_COMMAND) {
        warn!("未找到 {}，跳过将助手包加载进运行时", INSTALL_ASSISTANT_COMMAND);
        return Ok(false);
    }
    run(privileged(INSTALL_ASSISTANT_COMMAND).arg(bundle))?;
    Ok(true)
}
