//! 外部命令执行与提权辅助。
//!
//! 实现策略：
//! - 命令按退出码判断成败，失败时错误中附带 stdout/stderr
//! - 当前用户不是 root 且系统存在 `sudo` 时，需要特权的命令自动加 `sudo` 前缀
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::ffi::OsStr;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context, Result};
use tracing::debug;

/// 在 `path_var`（`PATH` 格式）中查找可执行文件。
pub fn find_in_path(name: &str, path_var: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| candidate.is_file())
}

/// 判断命令是否存在于 `PATH` 中。
pub fn command_exists(name: &str) -> bool {
    std::env::var_os("PATH")
        .map(|p| find_in_path(name, &p).is_some())
        .unwrap_or(false)
}

/// 当前进程是否以 root 运行（通过 `id -u` 判断，检测失败视为非 root）。
pub fn is_root() -> bool {
    Command::new("id")
        .arg("-u")
        .output()
        .map(|out| String::from_utf8_lossy(&out.stdout).trim() == "0")
        .unwrap_or(false)
}

/// 构造需要特权的命令（非 root 且有 `sudo` 时加前缀）。
pub fn privileged(program: &str) -> Command {
    if !is_root() && command_exists("sudo") {
        let mut cmd = Command::new("sudo");
        cmd.arg(program);
        cmd
    } else {
        Command::new(program)
    }
}

/// 命令的可读描述（程序 + 参数），用于日志与错误信息。
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|a| a.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// 执行命令并检查退出码。
///
/// 返回值：
/// - 成功：命令的 stdout 文本
///
/// 异常处理：
/// - 进程启动失败返回错误
/// - 退出码非 0 返回错误，并附带 stdout/stderr 便于排障
pub fn run(cmd: &mut Command) -> Result<String> {
    let desc = describe(cmd);
    debug!("执行命令: {}", desc);
    let out = cmd
        .stdin(Stdio::null())
        .output()
        .with_context(|| format!("启动命令失败: {desc}"))?;
    let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
    if out.status.success() {
        return Ok(stdout);
    }
    let code = out.status.code().unwrap_or(-1);
    let stderr = String::from_utf8_lossy(&out.stderr);
    Err(anyhow!(
        "命令退出码异常: {} ({})\n{}\n{}",
        desc,
        code,
        stdout,
        stderr
    ))
}

/// 写入系统文件；无权限时改用 `sudo tee`。
///
/// 异常处理：
/// - 非权限类写入错误直接返回
/// - `sudo tee` 启动失败或退出码非 0 返回错误
pub fn write_file_privileged(path: &Path, content: &str) -> Result<()> {
    match std::fs::write(path, content) {
        Ok(()) => return Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            debug!("无权限写入 {}，改用 sudo tee", path.display());
        }
        Err(e) => return Err(e).with_context(|| format!("写入文件失败: {}", path.display())),
    }

    let mut cmd = privileged("tee");
    cmd.arg(path).stdin(Stdio::piped()).stdout(Stdio::null());
    let desc = describe(&cmd);
    let mut child = cmd.spawn().with_context(|| format!("启动命令失败: {desc}"))?;
    child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("无法获取 {desc} 的标准输入"))?
        .write_all(content.as_bytes())
        .with_context(|| format!("写入 {desc} 失败"))?;
    let status = child.wait().with_context(|| format!("等待命令失败: {desc}"))?;
    if !status.success() {
        return Err(anyhow!("命令退出码异常: {} ({})", desc, status.code().unwrap_or(-1)));
    }
    Ok(())
}
