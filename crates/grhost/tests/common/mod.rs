#![allow(dead_code)]

use grhost::{HostEvent, LaunchSpec};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::broadcast;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_target(false)
        .with_line_number(true)
        .try_init();
}

/// Write an executable shell script standing in for the runtime host
pub fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

pub fn spec(runtime_host: &Path) -> LaunchSpec {
    LaunchSpec::builder()
        .runtime_host(runtime_host)
        .fps(60u32)
        .build()
        .unwrap()
}

pub async fn next_event(events: &mut broadcast::Receiver<HostEvent>) -> HostEvent {
    tokio::time::timeout(Duration::from_secs(10), events.recv())
        .await
        .expect("timed out waiting for host event")
        .unwrap()
}

/// Assert nothing else arrives within a short grace period
pub async fn assert_quiet(events: &mut broadcast::Receiver<HostEvent>) {
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(events.try_recv().is_err(), "unexpected host event");
}

/// Kill `pid` from outside, like a crash would
pub fn crash(pid: u32) {
    let status = std::process::Command::new("kill")
        .args(["-9", &pid.to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}
