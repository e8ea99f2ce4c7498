//! 网关登录/登出与凭据获取。
//!
//! 说明：
//! - 凭据优先取环境变量 `SNIPS_EMAIL` / `SNIPS_PASSWORD`，否则在终端交互式输入
//! - 登录成功后只在 `.snips/session.json` 中记录邮箱；密码与令牌不落盘
//!
//! 作者：Snips Skills 项目组
//! 创建时间：2026-10-18
//! 修改时间：2026-10-18

use std::io;

use inquire::{InquireError, Password, PasswordDisplayMode, Text};
use snipsskills_core::auth::Credentials;
use snipsskills_core::download::Downloader;
use snipsskills_core::state::{read_json, write_json, Session};
use tracing::{info, warn};

use crate::orchestrator::{InstallError, InstallSettings};

/// 账号邮箱环境变量。
pub const EMAIL_ENV: &str = "SNIPS_EMAIL";

/// 账号密码环境变量。
pub const PASSWORD_ENV: &str = "SNIPS_PASSWORD";

/// 凭据来源。
pub trait CredentialPrompt {
    /// 返回 `(email, password)`；`email_hint` 为上次登录的邮箱。
    fn credentials(&self, email_hint: Option<&str>) -> Result<(String, String), InstallError>;
}

/// 环境变量优先、终端输入兜底。
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

impl CredentialPrompt for TerminalPrompt {
    fn credentials(&self, email_hint: Option<&str>) -> Result<(String, String), InstallError> {
        let email = match std::env::var(EMAIL_ENV) {
            Ok(email) if !email.trim().is_empty() => email,
            _ => {
                let mut text = Text::new("Snips 账号邮箱:");
                if let Some(hint) = email_hint {
                    text = text.with_default(hint);
                }
                text.prompt().map_err(prompt_error)?
            }
        };
        let password = match std::env::var(PASSWORD_ENV) {
            Ok(password) if !password.is_empty() => password,
            _ => Password::new("密码:")
                .without_confirmation()
                .with_display_mode(PasswordDisplayMode::Masked)
                .prompt()
                .map_err(prompt_error)?,
        };
        Ok((email.trim().to_string(), password))
    }
}

fn prompt_error(e: InquireError) -> InstallError {
    match e {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => InstallError::Cancelled,
        other => InstallError::Prompt(other.to_string()),
    }
}

/// 上次登录记录；文件缺失或损坏时返回 `None`。
pub fn current_session(settings: &InstallSettings) -> Option<Session> {
    let path = settings.layout.session_file();
    match read_json::<Session>(&path) {
        Ok(session) => session,
        Err(e) => {
            warn!("忽略无法读取的登录记录 {}: {}", path.display(), e);
            None
        }
    }
}

/// 向网关认证并记录登录邮箱。
///
/// 异常处理：
/// - 凭据格式错误：在发起请求前返回 `Credentials`
/// - 网关拒绝：`AuthRejected`
/// - 其他网络失败：`Login`
pub fn login(settings: &InstallSettings, prompt: &dyn CredentialPrompt) -> Result<Session, InstallError> {
    let hint = current_session(settings).map(|s| s.email);
    let (email, password) = prompt.credentials(hint.as_deref())?;
    let credentials = Credentials::new(email, password)?;

    let downloader = Downloader::new(settings.timeout).map_err(InstallError::Login)?;
    downloader
        .authenticate(&settings.gateway, &credentials)
        .map_err(|e| {
            if e.is_auth() {
                InstallError::AuthRejected(e)
            } else {
                InstallError::Login(e)
            }
        })?;

    let session = Session::new(credentials.email());
    let path = settings.layout.session_file();
    write_json(&path, &session).map_err(|source| InstallError::Filesystem { path, source })?;
    info!("已登录: {}", session.email);
    Ok(session)
}

/// 删除登录记录；返回是否存在过登录记录。
pub fn logout(settings: &InstallSettings) -> Result<bool, InstallError> {
    let path = settings.layout.session_file();
    match std::fs::remove_file(&path) {
        Ok(()) => {
            info!("已登出");
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("当前未登录");
            Ok(false)
        }
        Err(source) => Err(InstallError::Filesystem { path, source }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::cell::RefCell;
    use std::time::Duration;

    use httpmock::prelude::*;
    use snipsskills_core::auth::GatewayConfig;
    use snipsskills_core::paths::InstallLayout;

    use super::*;

    /// 固定凭据；`None` 表示用户取消输入。
    pub struct FixedPrompt {
        answer: Option<(String, String)>,
        pub hints: RefCell<Vec<Option<String>>>,
    }

    impl FixedPrompt {
        pub fn new(email: &str, password: &str) -> Self {
            Self {
                answer: Some((email.to_string(), password.to_string())),
                hints: RefCell::new(Vec::new()),
            }
        }

        pub fn refusing() -> Self {
            Self {
                answer: None,
                hints: RefCell::new(Vec::new()),
            }
        }
    }

    impl CredentialPrompt for FixedPrompt {
        fn credentials(&self, email_hint: Option<&str>) -> Result<(String, String), InstallError> {
            self.hints.borrow_mut().push(email_hint.map(str::to_string));
            self.answer.clone().ok_or(InstallError::Cancelled)
        }
    }

    fn settings(dir: &std::path::Path, gateway: &str) -> InstallSettings {
        let mut settings = InstallSettings::new(InstallLayout::new(dir));
        settings.gateway = GatewayConfig::new(gateway);
        settings.timeout = Duration::from_secs(5);
        settings
    }

    #[test]
    fn login_records_email_only() {
        let server = MockServer::start();
        let auth = server.mock(|when, then| {
            when.method(POST).path("/v1/user/auth");
            then.status(200).header("Authorization", "JWT abc");
        });
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), &server.base_url());

        let session = login(&settings, &FixedPrompt::new("pi@example.com", "hunter2")).unwrap();
        auth.assert();
        assert_eq!(session.email, "pi@example.com");

        let stored = std::fs::read_to_string(settings.layout.session_file()).unwrap();
        assert!(stored.contains("pi@example.com"));
        assert!(!stored.contains("hunter2"));
        assert!(!stored.contains("JWT abc"));
    }

    #[test]
    fn second_login_offers_previous_email() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/user/auth");
            then.status(200).header("Authorization", "JWT abc");
        });
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), &server.base_url());

        login(&settings, &FixedPrompt::new("pi@example.com", "pw")).unwrap();
        let prompt = FixedPrompt::new("pi@example.com", "pw");
        login(&settings, &prompt).unwrap();
        assert_eq!(*prompt.hints.borrow(), vec![Some("pi@example.com".to_string())]);
    }

    #[test]
    fn rejected_login_writes_nothing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1/user/auth");
            then.status(401);
        });
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), &server.base_url());

        let err = login(&settings, &FixedPrompt::new("pi@example.com", "wrong")).unwrap_err();
        assert!(matches!(err, InstallError::AuthRejected(_)), "{err:?}");
        assert!(!settings.layout.session_file().exists());
    }

    #[test]
    fn invalid_email_fails_without_request() {
        let server = MockServer::start();
        let auth = server.mock(|when, then| {
            when.method(POST).path("/v1/user/auth");
            then.status(200).header("Authorization", "JWT abc");
        });
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), &server.base_url());

        let err = login(&settings, &FixedPrompt::new("not-an-email", "pw")).unwrap_err();
        assert!(matches!(err, InstallError::Credentials(_)), "{err:?}");
        auth.assert_hits(0);
    }

    #[test]
    fn logout_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path(), "http://127.0.0.1:9");
        write_json(&settings.layout.session_file(), &Session::new("pi@example.com")).unwrap();

        assert!(logout(&settings).unwrap());
        assert!(!logout(&settings).unwrap());
        assert!(current_session(&settings).is_none());
    }
}
