#![cfg(target_os = "linux")]

use std::fs::File;
use std::io::Write;
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use httpmock::prelude::*;
use uuid::Uuid;
use zip::write::FileOptions;
use zip::ZipWriter;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("{prefix}-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn write_file(path: &Path, content: &str) {
    std::fs::write(path, content).unwrap_or_else(|e| panic!("write {} failed: {e}", path.display()));
}

fn write_bundle(path: &Path) {
    let mut zip = ZipWriter::new(File::create(path).expect("create bundle"));
    zip.start_file("assistant.json", FileOptions::default())
        .expect("start entry");
    zip.write_all(br#"{"name":"lights","intents":[{"name":"turnOnLight","slots":[{"name":"room","entity":"room"}]}]}"#)
        .expect("write entry");
    zip.finish().expect("finish bundle");
}

fn snipsskills(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_snipsskills"));
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env("SNIPSSKILLS_TEST_SKIP_SDK", "1")
        .env_remove("SNIPS_EMAIL")
        .env_remove("SNIPS_PASSWORD");
    cmd
}

fn describe(out: &Output) -> String {
    format!(
        "status={:?}, stdout={}, stderr={}",
        out.status.code(),
        String::from_utf8_lossy(&out.stdout),
        String::from_utf8_lossy(&out.stderr)
    )
}

#[test]
fn e2e_missing_snipsfile_fails() {
    let dir = unique_temp_dir("snipsskills-no-snipsfile");
    let _cleanup = CleanupDir(dir.clone());

    let out = snipsskills(&dir).arg("install").output().expect("run snipsskills install");

    assert_eq!(out.status.code(), Some(1), "{}", describe(&out));
    assert!(String::from_utf8_lossy(&out.stderr).contains("Snipsfile"), "{}", describe(&out));
}

#[test]
fn e2e_no_bundle_anywhere_fails_without_side_effects() {
    let dir = unique_temp_dir("snipsskills-no-bundle");
    let _cleanup = CleanupDir(dir.clone());
    write_file(&dir.join("Snipsfile"), "[[skills]]\npackage_name = \"snips-skill-hue\"\n");

    let out = snipsskills(&dir).arg("install").output().expect("run snipsskills install");

    assert_eq!(out.status.code(), Some(1), "{}", describe(&out));
    assert!(!dir.join(".snips").join("intents").exists());
    assert!(!dir.join(".snips").join("install-state.json").exists());
}

#[test]
fn e2e_working_dir_bundle_is_cached_and_intents_generated() {
    let dir = unique_temp_dir("snipsskills-local-bundle");
    let _cleanup = CleanupDir(dir.clone());
    write_file(&dir.join("Snipsfile"), "");
    write_bundle(&dir.join("assistant.zip"));

    let out = snipsskills(&dir)
        .args(["install", "--skip-bluetooth", "--skip-systemd"])
        .output()
        .expect("run snipsskills install");

    assert!(out.status.success(), "install failed: {}", describe(&out));
    assert!(dir.join(".snips").join("assistant.zip").is_file());
    let intent = std::fs::read_to_string(dir.join(".snips").join("intents").join("turn_on_light_intent.py"))
        .expect("read generated intent");
    assert!(intent.contains("class TurnOnLightIntent"), "{intent}");
    let state = std::fs::read_to_string(dir.join(".snips").join("install-state.json")).expect("read state");
    assert!(state.contains("working-dir"), "{state}");
}

#[test]
fn e2e_remote_bundle_is_downloaded_and_transient_file_removed() {
    let bundle_dir = unique_temp_dir("snipsskills-remote-src");
    let _bundle_cleanup = CleanupDir(bundle_dir.clone());
    write_bundle(&bundle_dir.join("assistant.zip"));
    let body = std::fs::read(bundle_dir.join("assistant.zip")).expect("read bundle");

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/assistant.zip");
        then.status(200).body(body.clone());
    });

    let dir = unique_temp_dir("snipsskills-remote");
    let _cleanup = CleanupDir(dir.clone());
    write_file(
        &dir.join("Snipsfile"),
        &format!("assistant_url = \"{}\"\n", server.url("/assistant.zip")),
    );

    let out = snipsskills(&dir)
        .args(["install", "--skip-bluetooth", "--skip-systemd"])
        .output()
        .expect("run snipsskills install");

    assert!(out.status.success(), "install failed: {}", describe(&out));
    mock.assert();
    assert_eq!(std::fs::read(dir.join(".snips").join("assistant.zip")).unwrap(), body);
    assert!(!dir.join("assistant-download.zip").exists());
}

#[test]
fn e2e_interrupt_during_download_exits_cleanly() {
    let dir = unique_temp_dir("snipsskills-interrupt");
    let _cleanup = CleanupDir(dir.clone());

    // 接受连接但从不响应，让下载一直阻塞。
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    write_file(&dir.join("Snipsfile"), &format!("assistant_url = \"http://{addr}/assistant.zip\"\n"));

    let mut child = snipsskills(&dir)
        .args(["install", "--timeout", "30"])
        .spawn()
        .expect("spawn snipsskills install");
    let (_conn, _) = listener.accept().expect("accept download request");
    std::thread::sleep(Duration::from_millis(200));

    let killed = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .expect("send SIGINT");
    assert!(killed.success());

    let status = child.wait().expect("wait snipsskills");
    assert_eq!(status.code(), Some(0), "status={status:?}");
    assert!(!dir.join(".snips").join("install-state.json").exists());
}

#[test]
fn e2e_logout_without_session_succeeds() {
    let dir = unique_temp_dir("snipsskills-logout");
    let _cleanup = CleanupDir(dir.clone());

    let out = snipsskills(&dir).arg("logout").output().expect("run snipsskills logout");
    assert!(out.status.success(), "logout failed: {}", describe(&out));
}

struct CleanupDir(PathBuf);

impl Drop for CleanupDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}
