//! 助手包来源解析：按顺序尝试一组策略，第一个成功者胜出。
//!
//! 策略：
//! - [`RemoteUrl`]：无认证下载到工作目录的临时文件
//! - [`GatewayAssistant`]：登录网关后下载指定助手
//! - [`LocalFile`]：读取本地已有的包（工作目录或 `.snips` 缓存）
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::fmt;
use std::path::{Path, PathBuf};

use snipsskills_core::bundle::{AssistantBundle, BundleError};
use snipsskills_core::download::{AuthDownloader, DownloadError, Downloader};
use snipsskills_core::paths::InstallLayout;
use thiserror::Error;
use tracing::{info, warn};

/// 助手包的来源。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleOrigin {
    Remote(String),
    Gateway(String),
    WorkingDir,
    Cache,
}

impl fmt::Display for BundleOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "remote:{url}"),
            Self::Gateway(id) => write!(f, "gateway:{id}"),
            Self::WorkingDir => f.write_str("working-dir"),
            Self::Cache => f.write_str("cache"),
        }
    }
}

/// 已解析的助手包。
#[derive(Debug)]
pub struct ResolvedBundle {
    pub bundle: AssistantBundle,
    pub origin: BundleOrigin,
}

/// 单个策略的失败原因。
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Download(#[from] DownloadError),
    #[error(transparent)]
    Bundle(#[from] BundleError),
}

/// 助手包解析策略。
pub trait BundleStrategy {
    /// 日志中展示的策略描述。
    fn describe(&self) -> String;
    fn resolve(&self, layout: &InstallLayout) -> Result<ResolvedBundle, ResolveError>;
}

/// 依次尝试策略，返回第一个成功结果；全部失败时返回最后一个错误。
///
/// 策略列表为空时返回 `None`。
pub fn resolve_bundle(
    strategies: &[Box<dyn BundleStrategy + '_>],
    layout: &InstallLayout,
) -> Option<Result<ResolvedBundle, ResolveError>> {
    let mut last = None;
    for strategy in strategies {
        info!("查找助手包: {}", strategy.describe());
        match strategy.resolve(layout) {
            Ok(resolved) => return Some(Ok(resolved)),
            Err(e) => {
                warn!("{}: {}", strategy.describe(), e);
                last = Some(Err(e));
            }
        }
    }
    last
}

/// 无认证远程下载。
pub struct RemoteUrl<'a> {
    pub downloader: &'a Downloader,
    pub url: String,
}

impl BundleStrategy for RemoteUrl<'_> {
    fn describe(&self) -> String {
        format!("远程地址 {}", self.url)
    }

    fn resolve(&self, layout: &InstallLayout) -> Result<ResolvedBundle, ResolveError> {
        let path = self
            .downloader
            .download(&self.url, &layout.work_dir, file_name(&layout.download_bundle()))?;
        Ok(ResolvedBundle {
            bundle: AssistantBundle::open(&path)?,
            origin: BundleOrigin::Remote(self.url.clone()),
        })
    }
}

/// 网关认证下载。
pub struct GatewayAssistant<'a> {
    pub downloader: AuthDownloader<'a>,
}

impl BundleStrategy for GatewayAssistant<'_> {
    fn describe(&self) -> String {
        format!("网关助手 {}", self.downloader.assistant_id())
    }

    fn resolve(&self, layout: &InstallLayout) -> Result<ResolvedBundle, ResolveError> {
        let path = self
            .downloader
            .download(&layout.work_dir, file_name(&layout.download_bundle()))?;
        Ok(ResolvedBundle {
            bundle: AssistantBundle::open(&path)?,
            origin: BundleOrigin::Gateway(self.downloader.assistant_id().to_string()),
        })
    }
}

/// 本地已有的助手包。
pub struct LocalFile {
    pub path: PathBuf,
    pub origin: BundleOrigin,
}

impl LocalFile {
    pub fn working_dir(layout: &InstallLayout) -> Self {
        Self {
            path: layout.local_bundle(),
            origin: BundleOrigin::WorkingDir,
        }
    }

    pub fn cache(layout: &InstallLayout) -> Self {
        Self {
            path: layout.cached_bundle(),
            origin: BundleOrigin::Cache,
        }
    }
}

impl BundleStrategy for LocalFile {
    fn describe(&self) -> String {
        format!("本地文件 {}", self.path.display())
    }

    fn resolve(&self, _layout: &InstallLayout) -> Result<ResolvedBundle, ResolveError> {
        Ok(ResolvedBundle {
            bundle: AssistantBundle::open(&self.path)?,
            origin: self.origin.clone(),
        })
    }
}

fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or_default()
}
