//! 蓝牙桥接安装（手机 App 通过蓝牙配置设备，桥接到 MQTT）。
//!
//! 步骤：
//! - 通过 npm 全局安装桥接程序（已安装则跳过）
//! - 写入并启用 systemd 单元，单元参数携带 MQTT 地址
//!
//! 重复执行是安全的：单元文件会被覆盖为最新的 MQTT 地址。
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use anyhow::{anyhow, bail, Result};
use tracing::info;

use crate::process::{command_exists, privileged, run};
use crate::systemd::{self, UnitSpec};

/// 桥接程序的 npm 包名。
pub const BLUETOOTH_PACKAGE: &str = "snips-skill-bluetooth";

/// 桥接程序命令名。
pub const BLUETOOTH_COMMAND: &str = "snips-bluetooth";

/// 桥接服务单元名。
pub const BLUETOOTH_UNIT: &str = "snipsbluetooth.service";

/// 桥接服务单元。
///
/// 异常处理：
/// - 主机名为空或含空白、控制字符等非主机名字符时返回错误
pub fn bluetooth_unit(mqtt_hostname: &str, mqtt_port: u16) -> Result<UnitSpec> {
    validate_hostname(mqtt_hostname)?;
    let mut spec = UnitSpec::new(
        BLUETOOTH_UNIT,
        "Snips Bluetooth Bridge",
        format!("/usr/bin/env {BLUETOOTH_COMMAND} --mqtt {mqtt_hostname}:{mqtt_port}"),
    );
    spec.after.push("bluetooth.target".to_string());
    Ok(spec)
}

/// 主机名、IPv4 或带方括号的 IPv6 地址。
fn validate_hostname(hostname: &str) -> Result<()> {
    let valid = !hostname.is_empty()
        && hostname
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | '[' | ']'));
    if !valid {
        bail!("无效的 MQTT 主机名: {hostname:?}");
    }
    Ok(())
}

/// 安装蓝牙桥接并启用服务。
///
/// 异常处理：
/// - MQTT 主机名无效：在安装任何东西之前返回错误
/// - 系统中没有 npm 且桥接程序未安装：返回错误
/// - npm 安装或 systemd 操作失败：返回错误
pub fn setup(mqtt_hostname: &str, mqtt_port: u16) -> Result<()> {
    let unit = bluetooth_unit(mqtt_hostname, mqtt_port)?;
    if command_exists(BLUETOOTH_COMMAND) {
        info!("{} 已安装", BLUETOOTH_COMMAND);
    } else {
        if !command_exists("npm") {
            return Err(anyhow!("未找到 npm，无法安装蓝牙桥接 {}", BLUETOOTH_PACKAGE));
        }
        info!("安装蓝牙桥接 {}", BLUETOOTH_PACKAGE);
        run(privileged("npm").args(["install", "-g", "--unsafe-perm", BLUETOOTH_PACKAGE]))?;
    }
    systemd::install_unit(&unit)?;
    info!("蓝牙桥接已配置: mqtt={}:{}", mqtt_hostname, mqtt_port);
    Ok(())
}
