//! 助手包（assistant.zip）读取与校验。
//!
//! 有效助手包的判定：
//! - 文件存在且能作为 zip 打开
//! - 包内存在 `assistant.json`（根目录或任意子目录）且可解析
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zip::ZipArchive;

/// 包内助手定义文件名。
pub const ASSISTANT_DEFINITION: &str = "assistant.json";

/// 助手包读取错误。
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("助手包不存在: {0}")]
    Missing(PathBuf),
    #[error("读取助手包失败: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("助手包不是有效的 zip 文件: {path}")]
    NotZip {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("助手包中缺少 {ASSISTANT_DEFINITION}: {0}")]
    MissingDefinition(PathBuf),
    #[error("解析 {ASSISTANT_DEFINITION} 失败: {path}")]
    Definition {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// `assistant.json` 中与安装相关的部分。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssistantDefinition {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub intents: Vec<IntentDefinition>,
}

/// 单个意图定义。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntentDefinition {
    pub name: String,
    #[serde(default)]
    pub slots: Vec<SlotDefinition>,
}

/// 意图槽位定义。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlotDefinition {
    pub name: String,
    #[serde(default, alias = "entityId")]
    pub entity: Option<String>,
}

/// 已校验的助手包。
#[derive(Debug, Clone)]
pub struct AssistantBundle {
    path: PathBuf,
    definition: AssistantDefinition,
}

impl AssistantBundle {
    /// 打开并校验助手包。
    ///
    /// 异常处理：
    /// - 文件不存在：`Missing`
    /// - 不是 zip：`NotZip`
    /// - 缺少或无法解析 `assistant.json`：`MissingDefinition` / `Definition`
    pub fn open(path: &Path) -> Result<Self, BundleError> {
        if !path.is_file() {
            return Err(BundleError::Missing(path.to_path_buf()));
        }
        let file = File::open(path).map_err(|source| BundleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut archive = ZipArchive::new(file).map_err(|source| BundleError::NotZip {
            path: path.to_path_buf(),
            source,
        })?;

        let entry_name = archive
            .file_names()
            .find(|n| *n == ASSISTANT_DEFINITION || n.ends_with(&format!("/{ASSISTANT_DEFINITION}")))
            .map(str::to_string)
            .ok_or_else(|| BundleError::MissingDefinition(path.to_path_buf()))?;
        let entry = archive
            .by_name(&entry_name)
            .map_err(|source| BundleError::NotZip {
                path: path.to_path_buf(),
                source,
            })?;
        let definition = serde_json::from_reader(entry).map_err(|source| BundleError::Definition {
            path: path.to_path_buf(),
            source,
        })?;

        Ok(Self {
            path: path.to_path_buf(),
            definition,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn definition(&self) -> &AssistantDefinition {
        &self.definition
    }
}
