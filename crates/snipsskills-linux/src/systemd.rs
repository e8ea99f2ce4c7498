//! systemd 单元生成与安装。
//!
//! 用途：
//! - 技能服务器、Snips 平台、蓝牙桥接作为后台服务随系统启动
//! - 重复安装会覆盖同名单元文件并重新 enable（幂等）
//!
//! 权限要求：
//! - 写 `/etc/systemd/system` 与执行 `systemctl` 需要 root（非 root 时走 sudo）
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::info;

use crate::process::{privileged, run, write_file_privileged};

/// 系统级单元目录。
pub const UNIT_DIR: &str = "/etc/systemd/system";

/// 技能服务器命令。
pub const SKILLS_SERVER_COMMAND: &str = "snipsskills-server";

/// 技能服务器单元名。
pub const SKILLS_UNIT: &str = "snipsskills.service";

/// Snips 平台单元名。
pub const SNIPS_UNIT: &str = "snips.service";

/// 单元描述。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    /// 单元文件名（含 `.service` 后缀）。
    pub name: String,
    pub description: String,
    pub exec_start: String,
    pub working_directory: Option<PathBuf>,
    /// `After=` 依赖（`network.target` 总是包含）。
    pub after: Vec<String>,
}

impl UnitSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>, exec_start: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            exec_start: exec_start.into(),
            working_directory: None,
            after: Vec::new(),
        }
    }
}

/// 渲染单元文件内容。
pub fn render_unit(spec: &UnitSpec) -> String {
    let mut after = vec!["network.target".to_string()];
    after.extend(spec.after.iter().cloned());

    let mut out = String::new();
    out.push_str("[Unit]\n");
    let _ = writeln!(out, "Description={}", spec.description);
    let _ = writeln!(out, "After={}", after.join(" "));
    out.push_str("\n[Service]\n");
    out.push_str("Type=simple\n");
    if let Some(dir) = &spec.working_directory {
        let _ = writeln!(out, "WorkingDirectory={}", dir.display().to_string().replace('%', "%%"));
    }
    let _ = writeln!(out, "ExecStart={}", spec.exec_start);
    out.push_str("Restart=on-failure\n");
    out.push_str("RestartSec=5\n");
    out.push_str("\n[Install]\n");
    out.push_str("WantedBy=multi-user.target\n");
    out
}

/// 技能服务器单元（工作目录为安装目录，读取其中的 Snipsfile）。
///
/// 异常处理：
/// - 路径含控制字符（换行等）时返回错误，不生成单元
pub fn skills_server_unit(work_dir: &Path) -> Result<UnitSpec> {
    let snipsfile = work_dir.join(snipsskills_core::snipsfile::SNIPSFILE);
    let snipsfile = snipsfile.to_string_lossy();
    reject_control_chars("工作目录", &snipsfile)?;
    let mut spec = UnitSpec::new(
        SKILLS_UNIT,
        "Snips Skills Server",
        format!("/usr/bin/env {} --snipsfile {}", SKILLS_SERVER_COMMAND, quote_arg(&snipsfile)),
    );
    spec.working_directory = Some(work_dir.to_path_buf());
    spec.after.push(SNIPS_UNIT.to_string());
    Ok(spec)
}

/// `ExecStart=` 的单个参数：双引号包裹，转义 `\` 与 `"`，`%`、`$` 加倍。
pub fn quote_arg(arg: &str) -> String {
    let mut out = String::with_capacity(arg.len() + 2);
    out.push('"');
    for c in arg.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '%' => out.push_str("%%"),
            '$' => out.push_str("$$"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// 单元文件按行解析，值中不能出现换行等控制字符。
fn reject_control_chars(what: &str, value: &str) -> Result<()> {
    if value.chars().any(char::is_control) {
        bail!("{what}包含控制字符，无法写入 systemd 单元: {value:?}");
    }
    Ok(())
}

/// Snips 平台单元。
pub fn snips_unit() -> UnitSpec {
    UnitSpec::new(SNIPS_UNIT, "Snips Voice Platform", "/usr/bin/env snips")
}

/// 将单元文件写入 `dir`，返回文件路径。
pub fn write_unit(dir: &Path, spec: &UnitSpec) -> Result<PathBuf> {
    let path = dir.join(&spec.name);
    write_file_privileged(&path, &render_unit(spec))
        .with_context(|| format!("写入 systemd 单元失败: {}", path.display()))?;
    Ok(path)
}

/// 安装并启用单元（写文件 → daemon-reload → enable）。
///
/// 异常处理：
/// - 写文件或 systemctl 失败返回错误
pub fn install_unit(spec: &UnitSpec) -> Result<PathBuf> {
    let path = write_unit(Path::new(UNIT_DIR), spec)?;
    run(privileged("systemctl").arg("daemon-reload"))?;
    run(privileged("systemctl").args(["enable", spec.name.as_str()]))?;
    info!("已安装并启用 systemd 单元: {}", spec.name);
    Ok(path)
}
