//! Snips Skills 安装程序（`snipsskills`）。
//!
//! 职责：
//! - 读取工作目录中的 Snipsfile，编排 SDK、助手包、意图类、麦克风、技能包、systemd、蓝牙的安装
//! - 提供单步子命令（只下载助手包、只配置麦克风、只装某个 systemd 服务等）
//! - 网关登录/登出
//!
//! 退出码：
//! - 0：成功，或用户中断（Ctrl-C）
//! - 1：任一步骤失败（错误信息输出到 stderr）
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

mod orchestrator;
mod resolve;
mod session;
mod system;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use snipsskills_core::auth::{GatewayConfig, DEFAULT_GATEWAY};
use snipsskills_core::paths::{InstallLayout, ASSISTANT_ZIP_FILENAME};
use snipsskills_core::snipsfile::MicrophoneConfig;
use tokio::signal::unix::{signal, SignalKind};
use tracing::error;
use tracing::level_filters::LevelFilter;

use crate::orchestrator::{AssistantRequest, InstallError, InstallOptions, InstallSettings, Installer, SystemdTarget};
use crate::session::TerminalPrompt;
use crate::system::LinuxSystem;

/// 命令行参数。
///
/// 说明：
/// - `snipsfile` 缺省为工作目录下的 `Snipsfile`
/// - `timeout` 为单次网络请求的超时秒数
#[derive(Debug, Parser)]
#[command(name = "snipsskills", version)]
struct Cli {
    #[arg(long, global = true)]
    snipsfile: Option<PathBuf>,

    #[arg(long, global = true, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: u64,

    #[arg(long, global = true, default_value = DEFAULT_GATEWAY, hide = true)]
    gateway: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// 按 Snipsfile 完整安装（可用子命令只执行其中一步）。
    Install(InstallArgs),
    /// 下载资源。
    Fetch {
        #[command(subcommand)]
        target: FetchTarget,
    },
    /// 将资源加载进 Snips 运行时。
    Load {
        #[command(subcommand)]
        target: LoadTarget,
    },
    /// 配置设备与服务。
    Setup {
        #[command(subcommand)]
        target: SetupTarget,
    },
    /// 登录 Snips 网关。
    Login,
    /// 清除登录记录。
    Logout,
}

#[derive(Debug, Args)]
struct InstallArgs {
    #[command(subcommand)]
    target: Option<InstallTarget>,

    #[arg(long, default_value_t = false)]
    skip_bluetooth: bool,

    #[arg(long, default_value_t = false)]
    skip_systemd: bool,
}

#[derive(Debug, Subcommand)]
enum InstallTarget {
    /// 只配置蓝牙桥接。
    Bluetooth,
    /// 安装单个技能包。
    Skill { package: String },
    /// 安装 Snipsfile 中声明的全部技能包。
    Skills,
}

#[derive(Debug, Subcommand)]
enum FetchTarget {
    /// 下载助手包到 `.snips/`。
    Assistant {
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, default_value = ASSISTANT_ZIP_FILENAME)]
        file: String,
    },
}

#[derive(Debug, Subcommand)]
enum LoadTarget {
    /// 加载助手包并重新生成意图类。
    Assistant {
        #[arg(long)]
        file: Option<String>,
        #[arg(long, default_value_t = false)]
        platform_only: bool,
    },
}

#[derive(Debug, Subcommand)]
enum SetupTarget {
    /// 配置麦克风（缺省读取 Snipsfile）。
    Microphone {
        id: Option<String>,
        /// 型号参数，形如 `card=1`。
        params: Vec<String>,
        #[arg(long, default_value_t = false)]
        skip_asoundrc: bool,
        #[arg(long, default_value_t = false)]
        update_asoundconf: bool,
    },
    /// 安装 systemd 服务。
    Systemd {
        #[command(subcommand)]
        target: SystemdCommand,
    },
}

#[derive(Debug, Subcommand)]
enum SystemdCommand {
    Bluetooth {
        #[arg(long)]
        mqtt_host: Option<String>,
        #[arg(long)]
        mqtt_port: Option<u16>,
    },
    Snips,
    Skills,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("初始化运行时失败: {e}");
            return ExitCode::FAILURE;
        }
    };
    runtime.block_on(run_until_interrupted(cli))
}

/// 在阻塞线程中执行命令，同时监听 SIGINT。
///
/// 中断时不等待阻塞中的网络请求或子进程，直接以 0 退出。
async fn run_until_interrupted(cli: Cli) -> ExitCode {
    let mut interrupt = match signal(SignalKind::interrupt()) {
        Ok(interrupt) => interrupt,
        Err(e) => {
            error!("注册中断信号失败: {e}");
            return ExitCode::FAILURE;
        }
    };

    let work = tokio::task::spawn_blocking(move || dispatch(&cli));
    tokio::select! {
        joined = work => match joined {
            Ok(Ok(())) => ExitCode::SUCCESS,
            Ok(Err(err)) => report(err),
            Err(join) if join.is_panic() => std::panic::resume_unwind(join.into_panic()),
            Err(join) => {
                error!("{join}");
                ExitCode::FAILURE
            }
        },
        _ = interrupt.recv() => interrupted(),
    }
}

fn report(err: anyhow::Error) -> ExitCode {
    if matches!(err.downcast_ref::<InstallError>(), Some(InstallError::Cancelled)) {
        interrupted();
    }
    error!("{err:#}");
    ExitCode::FAILURE
}

fn interrupted() -> ! {
    eprintln!();
    eprintln!("已中断 snipsskills");
    std::process::exit(0)
}

/// 仅用于集成测试：跳过 SDK 检查（测试机上没有 Snips SDK）。
fn skip_sdk_for_tests() -> bool {
    matches!(std::env::var("SNIPSSKILLS_TEST_SKIP_SDK").as_deref(), Ok("1"))
}

fn settings(cli: &Cli) -> Result<InstallSettings> {
    let layout = InstallLayout::from_current_dir().context("读取当前工作目录失败")?;
    let mut settings = InstallSettings::new(layout);
    if let Some(snipsfile) = &cli.snipsfile {
        settings.snipsfile = settings.layout.work_dir.join(snipsfile);
    }
    if let Some(home) = std::env::var_os("HOME") {
        settings.home = PathBuf::from(home);
    }
    settings.gateway = GatewayConfig::new(cli.gateway.as_str());
    settings.timeout = Duration::from_secs(cli.timeout);
    settings.skip_sdk_check = skip_sdk_for_tests();
    Ok(settings)
}

fn dispatch(cli: &Cli) -> Result<()> {
    let settings = settings(cli)?;
    let system = LinuxSystem;
    let prompt = TerminalPrompt;
    let installer = Installer::new(&settings, &system, &prompt);

    match &cli.command {
        Commands::Install(args) => match &args.target {
            None => {
                installer.install(InstallOptions {
                    skip_bluetooth: args.skip_bluetooth,
                    skip_systemd: args.skip_systemd,
                })?;
            }
            Some(InstallTarget::Bluetooth) => installer.install_bluetooth()?,
            Some(InstallTarget::Skill { package }) => installer.install_skill(package)?,
            Some(InstallTarget::Skills) => {
                installer.install_skills()?;
            }
        },
        Commands::Fetch {
            target: FetchTarget::Assistant { id, url, email, file },
        } => {
            let request = match (url, id) {
                (Some(url), _) => AssistantRequest::Url(url.clone()),
                (None, Some(id)) => AssistantRequest::Gateway {
                    id: id.clone(),
                    email: email.clone(),
                },
                (None, None) => AssistantRequest::FromSnipsfile,
            };
            installer.fetch_assistant(request, file)?;
        }
        Commands::Load {
            target: LoadTarget::Assistant { file, platform_only },
        } => installer.load_assistant(file.as_deref(), *platform_only)?,
        Commands::Setup {
            target:
                SetupTarget::Microphone {
                    id,
                    params,
                    skip_asoundrc,
                    update_asoundconf,
                },
        } => {
            let config = match id {
                Some(id) => Some(microphone_config(id, params)?),
                None => None,
            };
            installer.setup_microphone(config, *skip_asoundrc, *update_asoundconf)?;
        }
        Commands::Setup {
            target: SetupTarget::Systemd { target },
        } => {
            let target = match target {
                SystemdCommand::Bluetooth { mqtt_host, mqtt_port } => SystemdTarget::Bluetooth {
                    hostname: mqtt_host.clone(),
                    port: *mqtt_port,
                },
                SystemdCommand::Snips => SystemdTarget::Snips,
                SystemdCommand::Skills => SystemdTarget::Skills,
            };
            installer.setup_systemd(target)?;
        }
        Commands::Login => {
            session::login(&settings, &prompt)?;
        }
        Commands::Logout => {
            session::logout(&settings)?;
        }
    }
    Ok(())
}

/// 由命令行型号与 `key=value` 参数构造麦克风配置。
fn microphone_config(id: &str, params: &[String]) -> Result<MicrophoneConfig, InstallError> {
    let mut parsed = BTreeMap::new();
    for param in params {
        let (key, value) = param
            .split_once('=')
            .filter(|(k, _)| !k.trim().is_empty())
            .ok_or_else(|| InstallError::MicrophoneParam(param.clone()))?;
        parsed.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(MicrophoneConfig {
        identifier: id.to_string(),
        params: parsed,
    })
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn install_flags_and_nested_targets_parse() {
        let cli = Cli::try_parse_from(["snipsskills", "install", "--skip-bluetooth"]).unwrap();
        match cli.command {
            Commands::Install(args) => {
                assert!(args.skip_bluetooth);
                assert!(!args.skip_systemd);
                assert!(args.target.is_none());
            }
            other => panic!("unexpected: {other:?}"),
        }

        let cli = Cli::try_parse_from(["snipsskills", "install", "skill", "snips-skill-hue"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Install(InstallArgs {
                target: Some(InstallTarget::Skill { .. }),
                ..
            })
        ));
    }

    #[test]
    fn microphone_params_are_key_value_pairs() {
        let cli = Cli::try_parse_from(["snipsskills", "setup", "microphone", "usb", "card=2", "device=1"]).unwrap();
        let Commands::Setup {
            target: SetupTarget::Microphone { id, params, .. },
        } = cli.command
        else {
            panic!("unexpected command");
        };
        let config = microphone_config(id.as_deref().unwrap(), &params).unwrap();
        assert_eq!(config.identifier, "usb");
        assert_eq!(config.params.get("card").map(String::as_str), Some("2"));

        let err = microphone_config("usb", &["card".to_string()]).unwrap_err();
        assert!(matches!(err, InstallError::MicrophoneParam(p) if p == "card"));
    }

    #[test]
    fn global_options_accept_any_position() {
        let cli = Cli::try_parse_from(["snipsskills", "logout", "--timeout", "5", "--snipsfile", "other/Snipsfile"])
            .unwrap();
        assert_eq!(cli.timeout, 5);
        assert_eq!(cli.snipsfile, Some(PathBuf::from("other/Snipsfile")));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Cli::try_parse_from(["snipsskills", "--timeout", "0", "logout"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(Cli::try_parse_from(["snipsskills", "--timeout", "1", "logout"]).is_ok());
    }
}
