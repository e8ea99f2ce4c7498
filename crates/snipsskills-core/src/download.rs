//! 助手包下载：拉取原语、认证装饰与原子落盘。
//!
//! 结构：
//! - [`Downloader`]：对任意 [`FetchRequest`] 执行 GET 并返回完整响应体（整体缓冲，不做流式）
//! - [`AuthDownloader`]：先向网关认证取得令牌，再构造带令牌的请求交给 [`Downloader`]
//! - [`save`]：先写同目录临时文件再原子重命名，不会留下半截文件
//!
//! 错误：
//! - 下载层只产生 [`DownloadError`]，但按传输失败/认证被拒/服务端错误等打标签，调用方可区分处理
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::cell::Cell;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use reqwest::blocking::Client;
use reqwest::header::{HeaderName, ACCEPT, AUTHORIZATION};
use reqwest::{StatusCode, Url};
use thiserror::Error;
use tracing::debug;

use crate::auth::{AssistantId, AuthToken, Credentials, CredentialsError, GatewayConfig};

/// [`save`] 写出文件的权限位。
#[cfg(unix)]
const SAVED_FILE_MODE: u32 = 0o644;

/// 默认请求超时。
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// 下载错误（下载层唯一的错误类型，带失败类别标签）。
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("下载地址无效: {0}")]
    InvalidUrl(String),
    #[error("网络请求失败")]
    Transport(#[source] reqwest::Error),
    #[error("认证被拒绝 (HTTP {status})")]
    AuthRejected { status: u16 },
    #[error("认证响应缺少 Authorization 头")]
    MissingToken,
    #[error("服务器返回错误 (HTTP {status})")]
    Server { status: u16 },
    #[error("保存文件失败: {path}")]
    Save {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl DownloadError {
    /// 是否属于认证类失败（凭据错误/令牌缺失）。
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthRejected { .. } | Self::MissingToken)
    }
}

/// 将非 2xx 状态码归类。
///
/// - 401/403：认证被拒
/// - 认证接口上的其他 4xx：同样视为认证被拒（凭据被服务端拒绝）
/// - 其余：服务端错误
fn classify_status(status: StatusCode, auth_endpoint: bool) -> DownloadError {
    let code = status.as_u16();
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || (auth_endpoint && status.is_client_error())
    {
        DownloadError::AuthRejected { status: code }
    } else {
        DownloadError::Server { status: code }
    }
}

/// 一次 GET 请求的描述（地址 + 附加请求头）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(HeaderName, String)>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: HeaderName, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// 无认证下载器（拉取原语）。
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// 创建下载器。
    ///
    /// 参数：
    /// - `timeout`：单次请求的总超时
    ///
    /// 异常处理：
    /// - HTTP 客户端初始化失败（TLS 后端不可用等）返回 `Transport`
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(DownloadError::Transport)?;
        Ok(Self { client })
    }

    /// 执行请求并返回完整响应体。
    ///
    /// 异常处理：
    /// - 地址无法解析或不是 http/https：`InvalidUrl`
    /// - 连接/超时等传输错误：`Transport`
    /// - 非 2xx：`AuthRejected` 或 `Server`
    pub fn fetch(&self, request: &FetchRequest) -> Result<Bytes, DownloadError> {
        let url = Url::parse(&request.url)
            .ok()
            .filter(|u| matches!(u.scheme(), "http" | "https"))
            .ok_or_else(|| DownloadError::InvalidUrl(request.url.clone()))?;

        debug!("GET {}", url);
        let mut builder = self.client.get(url);
        for (name, value) in &request.headers {
            builder = builder.header(name.clone(), value.as_str());
        }
        let response = builder.send().map_err(DownloadError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, false));
        }
        response.bytes().map_err(DownloadError::Transport)
    }

    /// 下载 `url` 并保存为 `output_dir/filename`。
    ///
    /// 返回值：
    /// - 成功：保存后的文件路径
    pub fn download(&self, url: &str, output_dir: &Path, filename: &str) -> Result<PathBuf, DownloadError> {
        let body = self.fetch(&FetchRequest::get(url))?;
        save_downloaded(&body, output_dir, filename)
    }

    /// 向网关认证并取得令牌。
    ///
    /// 异常处理：
    /// - 传输失败：`Transport`
    /// - 凭据被拒：`AuthRejected`
    /// - 成功响应但没有 `Authorization` 头：`MissingToken`
    pub fn authenticate(&self, gateway: &GatewayConfig, credentials: &Credentials) -> Result<AuthToken, DownloadError> {
        let auth_url = gateway.auth_url();
        debug!("POST {}", auth_url);
        let response = self
            .client
            .post(auth_url)
            .json(credentials)
            .send()
            .map_err(DownloadError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, true));
        }
        response
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .map(AuthToken::new)
            .ok_or(DownloadError::MissingToken)
    }
}

/// 保存内容到 `output_dir/filename`（目录不存在则递归创建，已存在文件被覆盖）。
///
/// 写入方式：
/// - 在 `output_dir` 中创建临时文件，写入并 `sync_all` 后原子重命名到目标路径
/// - 失败时目标路径保持原样（旧内容或不存在），不会出现截断文件
///
/// 权限：Unix 上为 0644（临时文件默认 0600，重命名后会保留）。
///
/// 幂等：相同参数重复调用结果一致。
pub fn save(content: &[u8], output_dir: &Path, filename: &str) -> io::Result<PathBuf> {
    if filename.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "文件名为空"));
    }
    std::fs::create_dir_all(output_dir)?;
    let target = output_dir.join(filename);
    let mut tmp = tempfile::NamedTempFile::new_in(output_dir)?;
    tmp.write_all(content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file().set_permissions(std::fs::Permissions::from_mode(SAVED_FILE_MODE))?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(&target).map_err(|e| e.error)?;
    Ok(target)
}

fn save_downloaded(content: &[u8], output_dir: &Path, filename: &str) -> Result<PathBuf, DownloadError> {
    save(content, output_dir, filename).map_err(|source| DownloadError::Save {
        path: output_dir.join(filename),
        source,
    })
}

/// 认证下载的阶段。
///
/// `Start → Authenticating → Authenticated → Downloading → Saved`，任一阶段失败进入 `Failed`。
/// 不做重试；重试需从 `Start` 重新开始整个流程。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStage {
    Start,
    Authenticating,
    Authenticated,
    Downloading,
    Saved,
    Failed,
}

/// 认证下载器：认证装饰 + [`Downloader`] 拉取原语。
#[derive(Debug)]
pub struct AuthDownloader<'a> {
    downloader: &'a Downloader,
    gateway: GatewayConfig,
    credentials: Credentials,
    assistant_id: AssistantId,
    stage: Cell<AuthStage>,
}

impl<'a> AuthDownloader<'a> {
    /// 创建认证下载器（同步校验输入，不发起网络请求）。
    ///
    /// 异常处理：
    /// - 邮箱格式错误或密码为空：`InvalidCredentials`
    /// - 助手 ID 少于 14 个字符：`InvalidAssistantId`
    pub fn new(
        downloader: &'a Downloader,
        gateway: GatewayConfig,
        email: &str,
        password: &str,
        assistant_id: &str,
    ) -> Result<Self, CredentialsError> {
        let credentials = Credentials::new(email, password)?;
        let assistant_id = AssistantId::new(assistant_id)?;
        Ok(Self::from_parts(downloader, gateway, credentials, assistant_id))
    }

    /// 由已校验的凭据与助手 ID 创建。
    pub fn from_parts(
        downloader: &'a Downloader,
        gateway: GatewayConfig,
        credentials: Credentials,
        assistant_id: AssistantId,
    ) -> Self {
        Self {
            downloader,
            gateway,
            credentials,
            assistant_id,
            stage: Cell::new(AuthStage::Start),
        }
    }

    /// 当前（或最近一次下载结束时）所处阶段。
    pub fn stage(&self) -> AuthStage {
        self.stage.get()
    }

    pub fn assistant_id(&self) -> &AssistantId {
        &self.assistant_id
    }

    /// 向网关认证并返回令牌。
    pub fn retrieve_auth_token(&self) -> Result<AuthToken, DownloadError> {
        self.downloader.authenticate(&self.gateway, &self.credentials)
    }

    /// 为下载接口构造带令牌的请求。
    pub fn authorize(&self, token: &AuthToken) -> FetchRequest {
        FetchRequest::get(self.gateway.assistant_download_url(&self.assistant_id))
            .header(AUTHORIZATION, token.as_str())
            .header(ACCEPT, "application/json")
    }

    /// 认证后下载助手包并保存为 `output_dir/filename`。
    pub fn download(&self, output_dir: &Path, filename: &str) -> Result<PathBuf, DownloadError> {
        self.stage.set(AuthStage::Start);
        let result = self.run(output_dir, filename);
        self.stage.set(match result {
            Ok(_) => AuthStage::Saved,
            Err(_) => AuthStage::Failed,
        });
        result
    }

    fn run(&self, output_dir: &Path, filename: &str) -> Result<PathBuf, DownloadError> {
        self.stage.set(AuthStage::Authenticating);
        let token = self.retrieve_auth_token()?;
        self.stage.set(AuthStage::Authenticated);

        self.stage.set(AuthStage::Downloading);
        let body = self.downloader.fetch(&self.authorize(&token))?;
        save_downloaded(&body, output_dir, filename)
    }
}
