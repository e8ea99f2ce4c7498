//! 编排流程与操作系统之间的接缝。
//!
//! 真实实现 [`LinuxSystem`] 直接调用 `snipsskills-linux`；测试中替换为记录调用的假实现，
//! 用于验证“失败即停止、后续步骤不执行”等编排约束。
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::path::Path;

use anyhow::Result;
use snipsskills_core::snipsfile::MicrophoneConfig;
use snipsskills_linux::microphone::{self, MicrophoneOptions};
use snipsskills_linux::sdk::{self, SdkError};
use snipsskills_linux::systemd::{self, UnitSpec};
use snipsskills_linux::{bluetooth, pip, platform};

/// 编排流程依赖的系统操作。
pub trait SystemOps {
    /// 是否运行在目标嵌入式平台（树莓派）上。
    fn is_target_platform(&self) -> bool;
    fn sdk_installed(&self) -> bool;
    fn install_sdk(&self) -> Result<(), SdkError>;
    /// 将已校验的助手包加载进 SDK 运行时。
    fn load_assistant(&self, bundle: &Path) -> Result<()>;
    fn setup_microphone(&self, config: Option<&MicrophoneConfig>, options: &MicrophoneOptions) -> Result<()>;
    fn install_skill(&self, requirement: &str) -> Result<()>;
    fn install_unit(&self, unit: &UnitSpec) -> Result<()>;
    fn setup_bluetooth(&self, mqtt_hostname: &str, mqtt_port: u16) -> Result<()>;
}

/// 基于真实系统命令的实现。
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxSystem;

impl SystemOps for LinuxSystem {
    fn is_target_platform(&self) -> bool {
        platform::is_raspi_os()
    }

    fn sdk_installed(&self) -> bool {
        sdk::is_installed()
    }

    fn install_sdk(&self) -> Result<(), SdkError> {
        sdk::install()
    }

    fn load_assistant(&self, bundle: &Path) -> Result<()> {
        sdk::load_assistant(bundle)?;
        Ok(())
    }

    fn setup_microphone(&self, config: Option<&MicrophoneConfig>, options: &MicrophoneOptions) -> Result<()> {
        microphone::setup(config, options)
    }

    fn install_skill(&self, requirement: &str) -> Result<()> {
        pip::install(requirement)
    }

    fn install_unit(&self, unit: &UnitSpec) -> Result<()> {
        systemd::install_unit(unit)?;
        Ok(())
    }

    fn setup_bluetooth(&self, mqtt_hostname: &str, mqtt_port: u16) -> Result<()> {
        bluetooth::setup(mqtt_hostname, mqtt_port)
    }
}
