//! 安装编排：按固定顺序执行各安装步骤，任一步骤失败立即停止。
//!
//! 完整安装顺序：
//! 1. 读取 Snipsfile
//! 2. 检查/安装 Snips SDK（仅树莓派）
//! 3. 取得助手包：远程地址 → 网关助手 → 工作目录 `assistant.zip` → `.snips/assistant.zip`
//! 4. 缓存助手包并加载进运行时
//! 5. 重新生成意图类
//! 6. 配置麦克风（仅树莓派）
//! 7. 按声明顺序安装技能包
//! 8. 安装技能服务器 systemd 单元（仅树莓派，可跳过）
//! 9. 配置蓝牙桥接（仅树莓派，可跳过；`install bluetooth` 只执行这一步）
//! 10. 清理临时下载文件并写入安装记录
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use snipsskills_core::auth::{AssistantId, Credentials, CredentialsError, GatewayConfig};
use snipsskills_core::bundle::{AssistantBundle, BundleError};
use snipsskills_core::download::{save, AuthDownloader, DownloadError, Downloader, DEFAULT_TIMEOUT};
use snipsskills_core::intents;
use snipsskills_core::paths::{resolve_path, InstallLayout, ASSISTANT_ZIP_FILENAME};
use snipsskills_core::snipsfile::{MicrophoneConfig, MqttConfig, Snipsfile, SnipsfileError, SNIPSFILE};
use snipsskills_core::state::{write_json, InstallState};
use snipsskills_linux::bluetooth::BLUETOOTH_UNIT;
use snipsskills_linux::microphone::MicrophoneOptions;
use snipsskills_linux::sdk::SdkError;
use snipsskills_linux::systemd::{self, UnitSpec};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::resolve::{
    resolve_bundle, BundleOrigin, BundleStrategy, GatewayAssistant, LocalFile, RemoteUrl, ResolveError,
    ResolvedBundle,
};
use crate::session::{self, CredentialPrompt};
use crate::system::SystemOps;

/// 安装失败原因；每一类都对应一条面向用户的提示。
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("未找到 Snipsfile，请先在当前目录创建: {0}")]
    SnipsfileMissing(PathBuf),
    #[error(transparent)]
    Snipsfile(SnipsfileError),
    #[error("Snips SDK 目前只能在树莓派上运行，请在树莓派上执行安装")]
    UnsupportedPlatform,
    #[error("安装 Snips SDK 失败: {0:#}")]
    SdkInstall(anyhow::Error),
    #[error("下载助手包失败，请检查助手地址是否正确以及网络连接是否正常")]
    Download(#[source] DownloadError),
    #[error("网关拒绝了登录请求，请检查邮箱与密码")]
    AuthRejected(#[source] DownloadError),
    #[error("登录失败")]
    Login(#[source] DownloadError),
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
    #[error("未指定助手来源：请传入 --url 或 --id，或在 Snipsfile 中配置 assistant_url / assistant_id")]
    NoAssistantSource,
    #[error("Snipsfile 中没有 assistant_url，且在 {0} 与 .snips 缓存中都没有找到有效的 assistant.zip")]
    NoLocalBundle(PathBuf),
    #[error("助手包无效")]
    Bundle(#[source] BundleError),
    #[error("将助手包加载进 Snips 运行时失败: {0:#}")]
    LoadAssistant(anyhow::Error),
    #[error("生成意图类失败: {path}")]
    Intents {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("配置麦克风失败: {0:#}")]
    Microphone(anyhow::Error),
    #[error("无效的麦克风参数 `{0}`，格式应为 key=value")]
    MicrophoneParam(String),
    #[error("安装技能包 {package} 失败: {cause:#}")]
    Skill { package: String, cause: anyhow::Error },
    #[error("安装 systemd 服务 {unit} 失败: {cause:#}")]
    Systemd { unit: String, cause: anyhow::Error },
    #[error("配置蓝牙桥接失败: {0:#}")]
    Bluetooth(anyhow::Error),
    #[error("文件操作失败: {path}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("读取输入失败: {0}")]
    Prompt(String),
    #[error("操作已取消")]
    Cancelled,
}

impl From<SnipsfileError> for InstallError {
    fn from(e: SnipsfileError) -> Self {
        match e {
            SnipsfileError::NotFound(path) => Self::SnipsfileMissing(path),
            other => Self::Snipsfile(other),
        }
    }
}

/// 下载错误按类别映射：认证类与其他失败给出不同提示。
pub(crate) fn download_failure(e: DownloadError) -> InstallError {
    if e.is_auth() {
        InstallError::AuthRejected(e)
    } else {
        InstallError::Download(e)
    }
}

/// 运行参数。
#[derive(Debug, Clone)]
pub struct InstallSettings {
    pub layout: InstallLayout,
    pub snipsfile: PathBuf,
    pub gateway: GatewayConfig,
    pub timeout: Duration,
    /// `.asoundrc` 所在的用户主目录。
    pub home: PathBuf,
    /// 跳过 SDK 检查（仅用于集成测试）。
    pub skip_sdk_check: bool,
}

impl InstallSettings {
    pub fn new(layout: InstallLayout) -> Self {
        Self {
            snipsfile: layout.work_dir.join(SNIPSFILE),
            home: layout.work_dir.clone(),
            gateway: GatewayConfig::default(),
            timeout: DEFAULT_TIMEOUT,
            skip_sdk_check: false,
            layout,
        }
    }
}

/// 完整安装的可选项。
#[derive(Debug, Clone, Copy, Default)]
pub struct InstallOptions {
    pub skip_bluetooth: bool,
    pub skip_systemd: bool,
}

/// `fetch assistant` 的来源。
#[derive(Debug, Clone)]
pub enum AssistantRequest {
    /// 使用 Snipsfile 中的 `assistant_url` / `assistant_id`。
    FromSnipsfile,
    Url(String),
    Gateway { id: String, email: Option<String> },
}

/// `setup systemd` 的目标。
#[derive(Debug, Clone)]
pub enum SystemdTarget {
    Bluetooth { hostname: Option<String>, port: Option<u16> },
    Snips,
    Skills,
}

/// 安装编排器。
pub struct Installer<'a> {
    settings: &'a InstallSettings,
    system: &'a dyn SystemOps,
    prompt: &'a dyn CredentialPrompt,
}

impl<'a> Installer<'a> {
    pub fn new(settings: &'a InstallSettings, system: &'a dyn SystemOps, prompt: &'a dyn CredentialPrompt) -> Self {
        Self {
            settings,
            system,
            prompt,
        }
    }

    fn layout(&self) -> &InstallLayout {
        &self.settings.layout
    }

    /// 完整安装。
    ///
    /// 返回值：
    /// - 成功：已写入 `.snips/install-state.json` 的安装记录
    ///
    /// 异常处理：
    /// - 任一步骤失败立即返回，后续步骤不执行，也不写安装记录
    pub fn install(&self, options: InstallOptions) -> Result<InstallState, InstallError> {
        let snipsfile = self.load_snipsfile()?;
        self.ensure_sdk()?;

        let downloader = self.downloader()?;
        let resolved = self.resolve(&snipsfile, &downloader)?;
        info!("使用助手包: {} ({})", resolved.bundle.path().display(), resolved.origin);
        let mut state = InstallState::new(resolved.origin.to_string());

        self.cache_bundle(&resolved)?;
        self.load_into_runtime(&resolved.bundle)?;
        self.regenerate_intents(&resolved.bundle)?;

        let target = self.system.is_target_platform();
        if target {
            self.system
                .setup_microphone(snipsfile.microphone.as_ref(), &self.microphone_options(false, false))
                .map_err(InstallError::Microphone)?;
        } else {
            info!("当前系统不是树莓派，跳过麦克风配置");
        }

        for skill in &snipsfile.skills {
            let requirement = skill.requirement();
            self.install_requirement(&requirement)?;
            state.skills.push(requirement);
        }

        if options.skip_systemd {
            info!("跳过 systemd 服务安装");
        } else if target {
            let unit = self.skills_unit()?;
            self.install_unit(&unit)?;
            state.systemd_units.push(unit.name);
        } else {
            info!("当前系统不是树莓派，跳过 systemd 服务安装");
        }

        if options.skip_bluetooth {
            info!("跳过蓝牙桥接配置");
        } else if self.setup_bluetooth(&snipsfile.mqtt)? {
            state.systemd_units.push(BLUETOOTH_UNIT.to_string());
        }

        self.remove_transient_download();
        let state_file = self.layout().state_file();
        write_json(&state_file, &state).map_err(|source| InstallError::Filesystem {
            path: state_file.clone(),
            source,
        })?;

        info!("Snips Skills 安装完成，运行 `snipsskills-server` 启动技能服务");
        Ok(state)
    }

    /// 只配置蓝牙桥接（`install bluetooth`）。
    ///
    /// 与完整安装一样先读取 Snipsfile；文件缺失时报错终止。
    pub fn install_bluetooth(&self) -> Result<(), InstallError> {
        let snipsfile = self.load_snipsfile()?;
        self.setup_bluetooth(&snipsfile.mqtt)?;
        Ok(())
    }

    /// 安装单个技能包（`install skill <package>`）。
    pub fn install_skill(&self, requirement: &str) -> Result<(), InstallError> {
        self.install_requirement(requirement)
    }

    /// 按 Snipsfile 声明顺序安装全部技能包（`install skills`）。
    pub fn install_skills(&self) -> Result<Vec<String>, InstallError> {
        let snipsfile = self.load_snipsfile()?;
        if !snipsfile.has_skills() {
            info!("Snipsfile 中没有声明技能包");
            return Ok(Vec::new());
        }
        let mut installed = Vec::with_capacity(snipsfile.skills.len());
        for skill in &snipsfile.skills {
            let requirement = skill.requirement();
            self.install_requirement(&requirement)?;
            installed.push(requirement);
        }
        Ok(installed)
    }

    /// 下载助手包到 `.snips/<filename>`（`fetch assistant`）。
    pub fn fetch_assistant(&self, request: AssistantRequest, filename: &str) -> Result<PathBuf, InstallError> {
        let request = match request {
            AssistantRequest::FromSnipsfile => {
                let snipsfile = self.load_snipsfile()?;
                match (non_empty(&snipsfile.assistant_url), non_empty(&snipsfile.assistant_id)) {
                    (Some(url), _) => AssistantRequest::Url(url.to_string()),
                    (None, Some(id)) => AssistantRequest::Gateway {
                        id: id.to_string(),
                        email: None,
                    },
                    (None, None) => return Err(InstallError::NoAssistantSource),
                }
            }
            explicit => explicit,
        };

        let downloader = self.downloader()?;
        let strategy: Box<dyn BundleStrategy + '_> = match request {
            AssistantRequest::Url(url) => Box::new(RemoteUrl {
                downloader: &downloader,
                url,
            }),
            AssistantRequest::Gateway { id, email } => {
                Box::new(self.gateway_strategy(&downloader, &id, email.as_deref())?)
            }
            AssistantRequest::FromSnipsfile => return Err(InstallError::NoAssistantSource),
        };

        // 先落到临时文件并校验，通过后才覆盖 `.snips` 中的旧包。
        let resolved = self.resolve_remote(strategy.as_ref())?;
        let stored = self.store_bundle(&resolved, filename);
        self.remove_transient_download();
        let path = stored?;
        info!(
            "助手包已保存到 {}（{} 个意图）",
            path.display(),
            resolved.bundle.definition().intents.len()
        );
        Ok(path)
    }

    /// 将本地助手包加载进运行时并重新生成意图类（`load assistant`）。
    ///
    /// 参数：
    /// - `file`：助手包路径（相对工作目录）；缺省为 `.snips/assistant.zip`
    /// - `platform_only`：只加载进运行时，不生成意图类
    pub fn load_assistant(&self, file: Option<&str>, platform_only: bool) -> Result<(), InstallError> {
        let path = match file {
            Some(raw) => resolve_path(&self.layout().work_dir, raw).map_err(|source| InstallError::Filesystem {
                path: PathBuf::from(raw),
                source,
            })?,
            None => self.layout().cached_bundle(),
        };
        let bundle = AssistantBundle::open(&path).map_err(InstallError::Bundle)?;
        self.load_into_runtime(&bundle)?;
        if !platform_only {
            self.regenerate_intents(&bundle)?;
        }
        Ok(())
    }

    /// 配置麦克风（`setup microphone`）；未显式给出型号时读取 Snipsfile。
    pub fn setup_microphone(
        &self,
        config: Option<MicrophoneConfig>,
        skip_asoundrc: bool,
        update_asoundconf: bool,
    ) -> Result<(), InstallError> {
        let config = match config {
            Some(config) => Some(config),
            None => self.load_snipsfile()?.microphone,
        };
        self.system
            .setup_microphone(config.as_ref(), &self.microphone_options(skip_asoundrc, update_asoundconf))
            .map_err(InstallError::Microphone)
    }

    /// 安装单个 systemd 服务（`setup systemd ...`）。
    pub fn setup_systemd(&self, target: SystemdTarget) -> Result<(), InstallError> {
        match target {
            SystemdTarget::Bluetooth { hostname, port } => {
                let mut mqtt = self.mqtt_config()?;
                if let Some(hostname) = hostname {
                    mqtt.hostname = hostname;
                }
                if let Some(port) = port {
                    mqtt.port = port;
                }
                self.setup_bluetooth(&mqtt)?;
                Ok(())
            }
            SystemdTarget::Snips => self.install_unit(&systemd::snips_unit()),
            SystemdTarget::Skills => self.install_unit(&self.skills_unit()?),
        }
    }

    fn load_snipsfile(&self) -> Result<Snipsfile, InstallError> {
        let snipsfile = Snipsfile::load(&self.settings.snipsfile)?;
        debug!("已读取 {}", self.settings.snipsfile.display());
        Ok(snipsfile)
    }

    /// Snipsfile 中的 MQTT 配置；没有 Snipsfile 时使用默认值（`setup systemd bluetooth` 可用参数覆盖）。
    fn mqtt_config(&self) -> Result<MqttConfig, InstallError> {
        match self.load_snipsfile() {
            Ok(snipsfile) => Ok(snipsfile.mqtt),
            Err(InstallError::SnipsfileMissing(_)) => Ok(MqttConfig::default()),
            Err(e) => Err(e),
        }
    }

    fn ensure_sdk(&self) -> Result<(), InstallError> {
        if self.settings.skip_sdk_check {
            warn!("跳过 Snips SDK 检查");
            return Ok(());
        }
        if self.system.sdk_installed() {
            info!("Snips SDK 已安装");
            return Ok(());
        }
        if !self.system.is_target_platform() {
            return Err(InstallError::UnsupportedPlatform);
        }
        info!("安装 Snips SDK");
        self.system.install_sdk().map_err(|e| match e {
            SdkError::UnsupportedPlatform => InstallError::UnsupportedPlatform,
            SdkError::InstallationFailure(cause) => InstallError::SdkInstall(cause),
        })
    }

    fn downloader(&self) -> Result<Downloader, InstallError> {
        Downloader::new(self.settings.timeout).map_err(InstallError::Download)
    }

    fn resolve(&self, snipsfile: &Snipsfile, downloader: &Downloader) -> Result<ResolvedBundle, InstallError> {
        if let Some(url) = non_empty(&snipsfile.assistant_url) {
            return self.resolve_remote(&RemoteUrl {
                downloader,
                url: url.to_string(),
            });
        }
        if let Some(id) = non_empty(&snipsfile.assistant_id) {
            return self.resolve_remote(&self.gateway_strategy(downloader, id, None)?);
        }

        let layout = self.layout();
        let strategies: Vec<Box<dyn BundleStrategy>> =
            vec![Box::new(LocalFile::working_dir(layout)), Box::new(LocalFile::cache(layout))];
        match resolve_bundle(&strategies, layout) {
            Some(Ok(resolved)) => Ok(resolved),
            _ => Err(InstallError::NoLocalBundle(layout.work_dir.clone())),
        }
    }

    /// 远程来源失败直接终止，不回退到本地包。
    fn resolve_remote(&self, strategy: &dyn BundleStrategy) -> Result<ResolvedBundle, InstallError> {
        info!("下载助手包: {}", strategy.describe());
        strategy.resolve(self.layout()).map_err(|e| {
            self.remove_transient_download();
            match e {
                ResolveError::Download(e) => download_failure(e),
                ResolveError::Bundle(e) => InstallError::Bundle(e),
            }
        })
    }

    /// 校验助手 ID 后再索取凭据，避免无效 ID 时仍提示输入密码。
    fn gateway_strategy<'d>(
        &self,
        downloader: &'d Downloader,
        id: &str,
        email: Option<&str>,
    ) -> Result<GatewayAssistant<'d>, InstallError> {
        let assistant_id = AssistantId::new(id)?;
        let hint = match email {
            Some(email) => Some(email.to_string()),
            None => session::current_session(self.settings).map(|s| s.email),
        };
        let (email, password) = self.prompt.credentials(hint.as_deref())?;
        let credentials = Credentials::new(email, password)?;
        Ok(GatewayAssistant {
            downloader: AuthDownloader::from_parts(downloader, self.settings.gateway.clone(), credentials, assistant_id),
        })
    }

    /// 非缓存来源的助手包复制到 `.snips/assistant.zip`，供下次离线安装使用。
    fn cache_bundle(&self, resolved: &ResolvedBundle) -> Result<(), InstallError> {
        if resolved.origin == BundleOrigin::Cache {
            return Ok(());
        }
        let cached = self.store_bundle(resolved, ASSISTANT_ZIP_FILENAME)?;
        info!("已缓存助手包: {}", cached.display());
        Ok(())
    }

    /// 将已校验的助手包原子写入 `.snips/<filename>`。
    fn store_bundle(&self, resolved: &ResolvedBundle, filename: &str) -> Result<PathBuf, InstallError> {
        let source = resolved.bundle.path();
        let content = std::fs::read(source).map_err(|e| InstallError::Filesystem {
            path: source.to_path_buf(),
            source: e,
        })?;
        let state_dir = &self.layout().state_dir;
        save(&content, state_dir, filename).map_err(|source| InstallError::Filesystem {
            path: state_dir.join(filename),
            source,
        })
    }

    fn load_into_runtime(&self, bundle: &AssistantBundle) -> Result<(), InstallError> {
        self.system
            .load_assistant(bundle.path())
            .map_err(InstallError::LoadAssistant)
    }

    fn regenerate_intents(&self, bundle: &AssistantBundle) -> Result<(), InstallError> {
        let dir = self.layout().intents_dir();
        intents::clear(&dir);
        intents::generate(bundle, &dir).map_err(|source| InstallError::Intents {
            path: dir.clone(),
            source,
        })?;
        info!(
            "已生成 {} 个意图类: {}",
            bundle.definition().intents.len(),
            dir.display()
        );
        Ok(())
    }

    fn install_requirement(&self, requirement: &str) -> Result<(), InstallError> {
        info!("安装技能包 {}", requirement);
        self.system
            .install_skill(requirement)
            .map_err(|cause| InstallError::Skill {
                package: requirement.to_string(),
                cause,
            })
    }

    fn skills_unit(&self) -> Result<UnitSpec, InstallError> {
        systemd::skills_server_unit(&self.layout().work_dir).map_err(|cause| InstallError::Systemd {
            unit: systemd::SKILLS_UNIT.to_string(),
            cause,
        })
    }

    fn install_unit(&self, unit: &UnitSpec) -> Result<(), InstallError> {
        info!("安装 systemd 服务 {}", unit.name);
        self.system.install_unit(unit).map_err(|cause| InstallError::Systemd {
            unit: unit.name.clone(),
            cause,
        })
    }

    /// 配置蓝牙桥接；非树莓派平台跳过并返回 `false`。
    fn setup_bluetooth(&self, mqtt: &MqttConfig) -> Result<bool, InstallError> {
        if !self.system.is_target_platform() {
            info!("当前系统不是树莓派，跳过蓝牙桥接配置");
            return Ok(false);
        }
        info!("配置蓝牙桥接: mqtt={}:{}", mqtt.hostname, mqtt.port);
        self.system
            .setup_bluetooth(&mqtt.hostname, mqtt.port)
            .map_err(InstallError::Bluetooth)?;
        Ok(true)
    }

    fn microphone_options(&self, skip_asoundrc: bool, update_asoundconf: bool) -> MicrophoneOptions {
        MicrophoneOptions {
            skip_asoundrc,
            update_asoundconf,
            home: self.settings.home.clone(),
        }
    }

    /// 删除临时下载文件（尽力而为）。
    fn remove_transient_download(&self) {
        let path = self.layout().download_bundle();
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("已删除临时文件 {}", path.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("删除临时文件失败 {}: {}", path.display(), e),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}
