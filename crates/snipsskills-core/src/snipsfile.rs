//! Snipsfile 配置模型与解析。
//!
//! Snipsfile 是用户编写的 TOML 文档，驱动整个安装流程：
//! - 助手包来源（远程 URL 或网关上的助手 ID）
//! - 麦克风配置
//! - MQTT 地址（蓝牙桥接使用）
//! - 按声明顺序安装的技能包列表
//!
//! 约定：
//! - 可选块均通过 `#[serde(default)]` 提供默认值，便于配置向前兼容
//! - 解析完成后配置不可变；每次运行解析一次
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 默认 Snipsfile 文件名（相对当前工作目录）。
pub const SNIPSFILE: &str = "Snipsfile";

/// MQTT 默认主机名。
pub const DEFAULT_MQTT_HOSTNAME: &str = "localhost";

/// MQTT 默认端口。
pub const DEFAULT_MQTT_PORT: u16 = 9898;

/// Snipsfile 读取/解析错误。
///
/// 说明：
/// - 文件不存在与内容格式错误是两类不同的失败，调用方据此给出不同提示。
#[derive(Debug, Error)]
pub enum SnipsfileError {
    #[error("未找到 Snipsfile: {0}")]
    NotFound(PathBuf),
    #[error("读取 Snipsfile 失败: {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析 Snipsfile 失败: {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Snipsfile 根对象。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snipsfile {
    #[serde(default)]
    /// 助手包远程下载地址（无认证）。
    pub assistant_url: Option<String>,
    #[serde(default)]
    /// 网关上的助手 ID（需要登录凭据；仅在未配置 `assistant_url` 时使用）。
    pub assistant_id: Option<String>,
    #[serde(default)]
    /// 麦克风配置。
    pub microphone: Option<MicrophoneConfig>,
    #[serde(default)]
    /// MQTT 配置（蓝牙桥接）。
    pub mqtt: MqttConfig,
    #[serde(default)]
    /// 技能包列表（按声明顺序安装）。
    pub skills: Vec<SkillDefinition>,
}

/// 麦克风配置块。
///
/// 示例：
/// ```toml
/// [microphone]
/// identifier = "respeaker"
/// params = { card = "1", device = "0" }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MicrophoneConfig {
    /// 麦克风型号标识（`default` / `usb` / `respeaker` / `jabra` 等）。
    pub identifier: String,
    #[serde(default)]
    /// 型号相关参数（例如 ALSA 声卡号/设备号）。
    pub params: BTreeMap<String, String>,
}

/// MQTT 连接信息。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_hostname")]
    pub hostname: String,
    #[serde(default = "default_mqtt_port")]
    pub port: u16,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            hostname: default_mqtt_hostname(),
            port: default_mqtt_port(),
        }
    }
}

fn default_mqtt_hostname() -> String {
    DEFAULT_MQTT_HOSTNAME.to_string()
}

fn default_mqtt_port() -> u16 {
    DEFAULT_MQTT_PORT
}

/// 单个技能包定义。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkillDefinition {
    /// 包管理器中的包名。
    pub package_name: String,
    #[serde(default)]
    /// 固定版本（可选）。
    pub version: Option<String>,
}

impl SkillDefinition {
    /// 返回包管理器可识别的安装规格（`name` 或 `name==version`）。
    pub fn requirement(&self) -> String {
        match &self.version {
            Some(v) if !v.is_empty() => format!("{}=={}", self.package_name, v),
            _ => self.package_name.clone(),
        }
    }
}

impl Snipsfile {
    /// 从文件加载 Snipsfile。
    ///
    /// 参数：
    /// - `path`：Snipsfile 路径
    ///
    /// 异常处理：
    /// - 文件不存在：[`SnipsfileError::NotFound`]
    /// - 其他 IO 错误：[`SnipsfileError::Read`]
    /// - TOML 格式错误：[`SnipsfileError::Parse`]
    pub fn load(path: &Path) -> Result<Self, SnipsfileError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SnipsfileError::NotFound(path.to_path_buf()))
            }
            Err(source) => {
                return Err(SnipsfileError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::parse(&text).map_err(|source| SnipsfileError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 从文本解析 Snipsfile。
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// 是否声明了技能包。
    pub fn has_skills(&self) -> bool {
        !self.skills.is_empty()
    }
}
