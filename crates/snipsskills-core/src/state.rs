//! 落盘记录：安装状态（install-state.json）与登录会话（session.json）。
//!
//! 目的：
//! - 记录最近一次成功安装使用的助手包来源、已安装技能与 systemd 单元，便于排障
//! - 登录会话只保存邮箱，令牌与密码从不落盘
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::io;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::download::save;

/// 安装状态。
///
/// 字段说明：
/// - `state_id`：本次安装记录 ID
/// - `installed_at`：安装完成时间（UTC）
/// - `bundle_source`：助手包来源描述（远程地址/本地路径）
/// - `skills`：已安装技能包（按安装顺序）
/// - `systemd_units`：本次写入的 systemd 单元名
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallState {
    pub state_id: Uuid,
    pub installed_at: OffsetDateTime,
    pub bundle_source: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub systemd_units: Vec<String>,
}

impl InstallState {
    pub fn new(bundle_source: impl Into<String>) -> Self {
        Self {
            state_id: Uuid::new_v4(),
            installed_at: OffsetDateTime::now_utc(),
            bundle_source: bundle_source.into(),
            skills: Vec::new(),
            systemd_units: Vec::new(),
        }
    }
}

/// 登录会话（仅邮箱）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub email: String,
    pub logged_in_at: OffsetDateTime,
}

impl Session {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            logged_in_at: OffsetDateTime::now_utc(),
        }
    }
}

/// 将记录序列化为 JSON 并原子写入 `path`。
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> io::Result<()> {
    let bytes = serde_json::to_vec_pretty(value).map_err(io::Error::other)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "无效的文件名"))?;
    save(&bytes, dir, name)?;
    Ok(())
}

/// 读取 JSON 记录；文件不存在时返回 `Ok(None)`。
pub fn read_json<T: DeserializeOwned>(path: &Path) -> io::Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    let value = serde_json::from_slice(&bytes).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(Some(value))
}
