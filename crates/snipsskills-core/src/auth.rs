//! 网关认证：凭据校验、网关地址与令牌。
//!
//! 认证流程：
//! - `POST {gateway}/v1/user/auth`，JSON 请求体 `{email, password}`
//! - 成功后从响应头 `Authorization` 取出令牌
//! - 令牌只用于紧接着的一次下载请求，不落盘
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;

/// 默认网关地址。
pub const DEFAULT_GATEWAY: &str = "https://private-gateway.snips.ai";

/// 助手 ID 的最小长度。
pub const MIN_ASSISTANT_ID_LEN: usize = 14;

/// 凭据校验错误（在任何网络请求之前产生）。
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("凭据无效: {0}")]
    InvalidCredentials(&'static str),
    #[error("助手 ID 无效: 长度至少为 {MIN_ASSISTANT_ID_LEN} 个字符")]
    InvalidAssistantId,
}

/// 判断邮箱是否符合 `local@domain.tld` 的基本形态。
pub fn email_is_valid(email: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"))
        .is_match(email)
}

/// 登录凭据（邮箱 + 密码）。
///
/// 安全注意：
/// - `Debug` 输出不包含密码明文。
#[derive(Clone, Serialize)]
pub struct Credentials {
    email: String,
    password: String,
}

impl Credentials {
    /// 创建并校验凭据。
    ///
    /// 异常处理：
    /// - 邮箱格式不正确：`InvalidCredentials`
    /// - 密码为空：`InvalidCredentials`
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Result<Self, CredentialsError> {
        let email = email.into();
        let password = password.into();
        if !email_is_valid(&email) {
            return Err(CredentialsError::InvalidCredentials("邮箱格式不正确"));
        }
        if password.is_empty() {
            return Err(CredentialsError::InvalidCredentials("密码不能为空"));
        }
        Ok(Self { email, password })
    }

    pub fn email(&self) -> &str {
        &self.email
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// 网关上的助手标识。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantId(String);

impl AssistantId {
    /// 创建并校验助手 ID（字符数不少于 [`MIN_ASSISTANT_ID_LEN`]）。
    pub fn new(id: impl Into<String>) -> Result<Self, CredentialsError> {
        let id = id.into();
        if id.chars().count() < MIN_ASSISTANT_ID_LEN {
            return Err(CredentialsError::InvalidAssistantId);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssistantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 认证成功后得到的令牌（不透明字符串）。
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

/// 网关地址配置。
///
/// 说明：
/// - 默认指向 [`DEFAULT_GATEWAY`]；测试时替换为本地 mock 服务器地址。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY)
    }
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { base_url }
    }

    /// 认证接口地址。
    pub fn auth_url(&self) -> String {
        format!("{}/v1/user/auth", self.base_url)
    }

    /// 指定助手的下载接口地址。
    pub fn assistant_download_url(&self, id: &AssistantId) -> String {
        format!("{}/v1/assistant/{}/download", self.base_url, id)
    }
}
