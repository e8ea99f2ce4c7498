//! 目标嵌入式平台（树莓派）检测。
//!
//! 检测依据（任一命中即视为树莓派）：
//! - `/proc/device-tree/model` 含 `Raspberry Pi`
//! - `/etc/os-release` 的 `ID`/`ID_LIKE` 为 `raspbian`
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::path::Path;

const DEVICE_TREE_MODEL: &str = "/proc/device-tree/model";
const OS_RELEASE: &str = "/etc/os-release";

/// 设备树型号字符串是否为树莓派。
pub fn is_raspi_model(model: &str) -> bool {
    model.trim_end_matches('\0').contains("Raspberry Pi")
}

/// `os-release` 内容是否表明为 Raspbian / Raspberry Pi OS。
pub fn os_release_is_raspbian(content: &str) -> bool {
    content.lines().any(|line| {
        let Some((key, value)) = line.split_once('=') else {
            return false;
        };
        let value = value.trim().trim_matches('"');
        matches!(key.trim(), "ID" | "ID_LIKE")
            && value.split_whitespace().any(|v| v == "raspbian")
    })
}

fn read_lossy(path: &Path) -> Option<String> {
    std::fs::read(path)
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

/// 当前系统是否为树莓派。
pub fn is_raspi_os() -> bool {
    if read_lossy(Path::new(DEVICE_TREE_MODEL)).is_some_and(|m| is_raspi_model(&m)) {
        return true;
    }
    read_lossy(Path::new(OS_RELEASE)).is_some_and(|c| os_release_is_raspbian(&c))
}
