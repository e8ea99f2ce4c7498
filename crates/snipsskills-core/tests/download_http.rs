use std::net::TcpListener;
use std::time::Duration;

use httpmock::prelude::*;
use serde_json::json;

use snipsskills_core::auth::{CredentialsError, GatewayConfig};
use snipsskills_core::download::{AuthDownloader, AuthStage, DownloadError, Downloader};

const ASSISTANT_ID: &str = "proj_0123456789";

fn downloader() -> Downloader {
    Downloader::new(Duration::from_secs(5)).expect("build downloader")
}

/// 绑定一个临时端口后立即释放，得到一个大概率无人监听的地址。
fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{addr}/assistant.zip")
}

#[test]
fn plain_download_writes_body() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/assistant.zip");
        then.status(200).body("bundle-bytes");
    });
    let out = tempfile::tempdir().unwrap();

    let path = downloader()
        .download(&server.url("/assistant.zip"), &out.path().join("nested"), "assistant.zip")
        .expect("download");

    mock.assert();
    assert_eq!(std::fs::read(path).unwrap(), b"bundle-bytes");
}

#[test]
fn plain_download_error_status_is_download_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/missing.zip");
        then.status(404);
    });
    let out = tempfile::tempdir().unwrap();

    let err = downloader()
        .download(&server.url("/missing.zip"), out.path(), "assistant.zip")
        .unwrap_err();
    assert!(matches!(err, DownloadError::Server { status: 404 }), "{err:?}");
    assert!(!out.path().join("assistant.zip").exists());
}

#[test]
fn unreachable_host_is_transport_error() {
    let out = tempfile::tempdir().unwrap();
    let err = downloader()
        .download(&closed_port_url(), out.path(), "assistant.zip")
        .unwrap_err();
    assert!(matches!(err, DownloadError::Transport(_)), "{err:?}");
}

#[test]
fn malformed_url_is_invalid_url() {
    let out = tempfile::tempdir().unwrap();
    for url in ["not a url", "ftp://example.invalid/a.zip", ""] {
        let err = downloader().download(url, out.path(), "assistant.zip").unwrap_err();
        assert!(matches!(err, DownloadError::InvalidUrl(_)), "{url}: {err:?}");
    }
}

#[test]
fn auth_download_sends_token_and_accept_header() {
    let server = MockServer::start();
    let auth = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/user/auth")
            .json_body(json!({ "email": "dev@snips.ai", "password": "secret" }));
        then.status(200).header("Authorization", "JWT abc.def");
    });
    let download = server.mock(|when, then| {
        when.method(GET)
            .path(format!("/v1/assistant/{ASSISTANT_ID}/download"))
            .header("Authorization", "JWT abc.def")
            .header("Accept", "application/json");
        then.status(200).body("zip-content");
    });
    let out = tempfile::tempdir().unwrap();
    let dl = downloader();
    let auth_dl = AuthDownloader::new(
        &dl,
        GatewayConfig::new(server.base_url()),
        "dev@snips.ai",
        "secret",
        ASSISTANT_ID,
    )
    .unwrap();

    let path = auth_dl.download(out.path(), "assistant.zip").expect("auth download");

    auth.assert();
    download.assert();
    assert_eq!(auth_dl.stage(), AuthStage::Saved);
    assert_eq!(std::fs::read(path).unwrap(), b"zip-content");
}

#[test]
fn rejected_login_never_reaches_download() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/user/auth");
        then.status(401);
    });
    let download = server.mock(|when, then| {
        when.method(GET).path(format!("/v1/assistant/{ASSISTANT_ID}/download"));
        then.status(200).body("zip-content");
    });
    let out = tempfile::tempdir().unwrap();
    let dl = downloader();
    let auth_dl = AuthDownloader::new(
        &dl,
        GatewayConfig::new(server.base_url()),
        "dev@snips.ai",
        "wrong",
        ASSISTANT_ID,
    )
    .unwrap();

    let err = auth_dl.download(out.path(), "assistant.zip").unwrap_err();
    assert!(matches!(err, DownloadError::AuthRejected { status: 401 }), "{err:?}");
    assert!(err.is_auth());
    assert_eq!(auth_dl.stage(), AuthStage::Failed);
    download.assert_hits(0);
}

#[test]
fn missing_authorization_header_is_reported() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/user/auth");
        then.status(200);
    });
    let dl = downloader();
    let auth_dl = AuthDownloader::new(
        &dl,
        GatewayConfig::new(server.base_url()),
        "dev@snips.ai",
        "secret",
        ASSISTANT_ID,
    )
    .unwrap();

    let err = auth_dl.retrieve_auth_token().unwrap_err();
    assert!(matches!(err, DownloadError::MissingToken), "{err:?}");
}

#[test]
fn download_endpoint_failure_is_server_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1/user/auth");
        then.status(200).header("Authorization", "tok");
    });
    server.mock(|when, then| {
        when.method(GET).path(format!("/v1/assistant/{ASSISTANT_ID}/download"));
        then.status(503);
    });
    let out = tempfile::tempdir().unwrap();
    let dl = downloader();
    let auth_dl = AuthDownloader::new(
        &dl,
        GatewayConfig::new(server.base_url()),
        "dev@snips.ai",
        "secret",
        ASSISTANT_ID,
    )
    .unwrap();

    let err = auth_dl.download(out.path(), "assistant.zip").unwrap_err();
    assert!(matches!(err, DownloadError::Server { status: 503 }), "{err:?}");
    assert_eq!(auth_dl.stage(), AuthStage::Failed);
}

#[test]
fn unreachable_gateway_is_transport_error() {
    let dl = downloader();
    let gateway_url = closed_port_url().trim_end_matches("/assistant.zip").to_string();
    let auth_dl = AuthDownloader::new(
        &dl,
        GatewayConfig::new(gateway_url),
        "dev@snips.ai",
        "secret",
        ASSISTANT_ID,
    )
    .unwrap();
    let out = tempfile::tempdir().unwrap();
    let err = auth_dl.download(out.path(), "assistant.zip").unwrap_err();
    assert!(matches!(err, DownloadError::Transport(_)), "{err:?}");
}

#[test]
fn construction_validates_before_network() {
    let dl = downloader();
    let gw = GatewayConfig::new("http://127.0.0.1:1");
    assert!(AuthDownloader::new(&dl, gw.clone(), "dev@snips.ai", "secret", ASSISTANT_ID).is_ok());
    assert_eq!(
        AuthDownloader::new(&dl, gw.clone(), "dev@snips.ai", "secret", "short_id").unwrap_err(),
        CredentialsError::InvalidAssistantId
    );
    assert!(matches!(
        AuthDownloader::new(&dl, gw.clone(), "dev@snips.ai", "", ASSISTANT_ID).unwrap_err(),
        CredentialsError::InvalidCredentials(_)
    ));
    assert!(matches!(
        AuthDownloader::new(&dl, gw, "dev.snips.ai", "secret", ASSISTANT_ID).unwrap_err(),
        CredentialsError::InvalidCredentials(_)
    ));
}
