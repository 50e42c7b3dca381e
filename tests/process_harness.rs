#![allow(unused)]
//! Binary end-to-end harness.
//!
//! # What this covers
//!
//! - `fwdlog send <port> -f from=userA -f to=userB` delivers the concrete
//!   scenario to an in-process receiver and exits 0.
//! - `fwdlog send` to a port with no listener exits non-zero.
//! - `fwdlog listen` prints each received record as one JSON line.
//!
//! Each run points `XDG_CONFIG_HOME` at a temp dir so the user's own config
//! is never read or created.
//!
//! # Running
//!
//! ```sh
//! cargo test --test process_harness
//! ```

mod common;
use common::*;

use std::process::Stdio;
use std::time::Duration;

use fwdlog::{find_free_port, Client};
use pretty_assertions::assert_eq;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

fn fwdlog_cmd(config_home: &tempfile::TempDir) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_fwdlog"));
    cmd.env("XDG_CONFIG_HOME", config_home.path())
        .env_remove("RUST_LOG")
        .kill_on_drop(true);
    cmd
}

#[tokio::test]
async fn send_subcommand_delivers_scenario_event() {
    let rx = start_receiver().await;
    let home = tempfile::tempdir().unwrap();

    let status = fwdlog_cmd(&home)
        .args(["send", &rx.port().to_string(), "-f", "from=userA", "-f", "to=userB"])
        .status()
        .await
        .unwrap();
    assert!(status.success(), "{status}");

    let received = rx.wait_for(1, WAIT).await.unwrap();
    assert_eq!(received.len(), 1);
    assert_tag!(received[0], "fluent.test");
    assert!(received[0].timestamp > 0);
    assert_field!(received[0], "from", "userA");
    assert_field!(received[0], "to", "userB");
    assert!(home.path().join("fwdlog/config.toml").exists());
}

#[tokio::test]
async fn send_without_listener_fails() {
    let home = tempfile::tempdir().unwrap();
    let port = find_free_port("127.0.0.1", 50000..60000).unwrap();

    let output = fwdlog_cmd(&home)
        .args(["send", &port.to_string(), "--host", "127.0.0.1"])
        .output()
        .await
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("could not connect"), "{stderr}");
}

#[tokio::test]
async fn listen_subcommand_prints_json_lines() {
    let home = tempfile::tempdir().unwrap();
    let port = find_free_port("127.0.0.1", 20000..30000).unwrap();

    let mut child = fwdlog_cmd(&home)
        .args(["listen", "--port", &port.to_string()])
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    let stdout = child.stdout.take().unwrap();
    let mut lines = BufReader::new(stdout).lines();

    // The listener needs a moment to bind.
    let event = scenario_event();
    let deadline = tokio::time::Instant::now() + WAIT;
    while Client::default()
        .send_record("127.0.0.1", port, &event)
        .await
        .is_err()
    {
        assert!(tokio::time::Instant::now() < deadline, "listener never came up");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    let line = tokio::time::timeout(WAIT, lines.next_line())
        .await
        .unwrap()
        .unwrap()
        .expect("listener printed nothing");
    let json: serde_json::Value = serde_json::from_str(&line).unwrap();
    assert_eq!(json["tag"], "fluent.test");
    assert_eq!(json["timestamp"], event.timestamp);
    assert_eq!(json["payload"]["from"], "userA");

    child.kill().await.unwrap();
}
