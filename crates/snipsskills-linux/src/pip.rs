//! 技能包安装（通过 pip）。
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use anyhow::{anyhow, Result};
use tracing::info;

use crate::process::{command_exists, privileged, run};

/// 选择可用的 pip 命令（优先 `pip3`）。
pub fn pip_command() -> Option<&'static str> {
    ["pip3", "pip"].into_iter().find(|c| command_exists(c))
}

/// 安装（或升级）一个技能包。
///
/// 参数：
/// - `requirement`：包名或 `name==version`
///
/// 异常处理：
/// - 系统中没有 pip：返回错误
/// - pip 退出码非 0：返回错误（附带 pip 输出）
pub fn install(requirement: &str) -> Result<()> {
    let pip = pip_command().ok_or_else(|| anyhow!("未找到 pip，请先安装 python3-pip"))?;
    info!("{} install --upgrade {}", pip, requirement);
    run(privileged(pip).args(["install", "--upgrade", requirement]))?;
    Ok(())
}
