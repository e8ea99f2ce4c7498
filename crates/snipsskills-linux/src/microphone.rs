//! 麦克风配置（ALSA `.asoundrc` / `/etc/asound.conf` 生成）。
//!
//! 支持的型号标识：
//! - `default`：不修改 ALSA 配置
//! - `usb` / `jabra` / `konftel`：USB 麦克风，默认采集设备 `hw:1,0`
//! - `respeaker`：ReSpeaker 2-Mics 扩展板，采集与播放均走 `seeed2micvoicec` 声卡
//!
//! 参数 `card` / `device` 可覆盖默认的采集声卡号与设备号。
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use snipsskills_core::download::save;
use snipsskills_core::snipsfile::MicrophoneConfig;
use tracing::info;

use crate::process::write_file_privileged;

/// 系统级 ALSA 配置文件。
pub const ASOUND_CONF: &str = "/etc/asound.conf";

/// 麦克风型号。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MicrophoneKind {
    Default,
    Usb,
    Respeaker,
}

impl MicrophoneKind {
    /// 从型号标识解析（不区分大小写）。
    pub fn parse(identifier: &str) -> Option<Self> {
        match identifier.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Some(Self::Default),
            "usb" | "jabra" | "konftel" => Some(Self::Usb),
            "respeaker" => Some(Self::Respeaker),
            _ => None,
        }
    }

    fn default_capture(self) -> (&'static str, &'static str) {
        match self {
            Self::Default => ("0", "0"),
            Self::Usb => ("1", "0"),
            Self::Respeaker => ("seeed2micvoicec", "0"),
        }
    }
}

/// 命令行附加选项。
#[derive(Debug, Clone, Default)]
pub struct MicrophoneOptions {
    /// 不写用户级 `.asoundrc`。
    pub skip_asoundrc: bool,
    /// 同时写系统级 `/etc/asound.conf`。
    pub update_asoundconf: bool,
    /// 用户主目录（`.asoundrc` 所在目录）。
    pub home: PathBuf,
}

/// 渲染 ALSA 配置；`default` 型号返回 `None`。
///
/// 异常处理：
/// - 未知型号返回错误
pub fn render_asoundrc(config: &MicrophoneConfig) -> Result<Option<String>> {
    let kind = MicrophoneKind::parse(&config.identifier)
        .ok_or_else(|| anyhow!("不支持的麦克风型号: {}", config.identifier))?;
    if kind == MicrophoneKind::Default {
        return Ok(None);
    }
    let (default_card, default_device) = kind.default_capture();
    let card = config.params.get("card").map(String::as_str).unwrap_or(default_card);
    let device = config.params.get("device").map(String::as_str).unwrap_or(default_device);
    let playback = match kind {
        MicrophoneKind::Respeaker => format!("hw:{card},{device}"),
        _ => "hw:0,0".to_string(),
    };
    let capture = format!("hw:{card},{device}");
    Ok(Some(format!(
        "pcm.!default {{\n    type asym\n    playback.pcm {{\n        type plug\n        slave.pcm \"{playback}\"\n    }}\n    capture.pcm {{\n        type plug\n        slave.pcm \"{capture}\"\n    }}\n}}\n"
    )))
}

/// 按配置设置麦克风。
///
/// 参数：
/// - `config`：Snipsfile 中的麦克风块；`None` 等价于 `default`
/// - `options`：写入位置控制
///
/// 异常处理：
/// - 未知型号或写文件失败返回错误
pub fn setup(config: Option<&MicrophoneConfig>, options: &MicrophoneOptions) -> Result<()> {
    let default = MicrophoneConfig::default();
    let config = config.unwrap_or(&default);
    let Some(content) = render_asoundrc(config)? else {
        info!("使用默认麦克风配置，不修改 ALSA 配置");
        return Ok(());
    };

    if !options.skip_asoundrc {
        let path = write_asoundrc(&options.home, &content)?;
        info!("已写入 {}", path.display());
    }
    if options.update_asoundconf {
        write_file_privileged(Path::new(ASOUND_CONF), &content)?;
        info!("已写入 {}", ASOUND_CONF);
    }
    Ok(())
}

fn write_asoundrc(home: &Path, content: &str) -> Result<PathBuf> {
    save(content.as_bytes(), home, ".asoundrc")
        .with_context(|| format!("写入 .asoundrc 失败: {}", home.display()))
}
