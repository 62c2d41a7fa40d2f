#![cfg(feature = "cli")]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

fn unique_temp_file(tag: &str, contents: &[u8]) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "pairlink-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::write(&path, contents).expect("temp file should be writable");
    path
}

fn pairlink() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pairlink"));
    cmd.arg("--log-level").arg("error");
    cmd
}

fn json_lines(stdout: &[u8]) -> Vec<serde_json::Value> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line should be JSON"))
        .collect()
}

#[test]
fn decode_file_prints_valid_packets() {
    let capture = unique_temp_file(
        "decode",
        b"{\"id\":1,\"type\":\"ping\"}\ngarbage\n\
          {\"id\":2,\"type\":\"battery\",\"body\":{\"charge\":90}}\n{\"type\":",
    );

    let output = pairlink()
        .args(["--format", "json", "decode"])
        .arg(&capture)
        .output()
        .expect("decode should run");

    assert!(output.status.success());
    let packets = json_lines(&output.stdout);
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0]["type"], "ping");
    assert_eq!(packets[1]["body"]["charge"], 90);

    let _ = std::fs::remove_file(&capture);
}

#[test]
fn decode_reads_stdin() {
    let mut child = pairlink()
        .args(["--format", "pretty", "decode"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("decode should start");

    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(b"{\"id\":5,\"type\":\"ping\"}\n")
        .expect("stdin should accept input");

    let output = child.wait_with_output().expect("decode should finish");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "type=ping id=5 body={} payload=-"
    );
}

#[test]
fn decode_missing_file_fails() {
    let output = pairlink()
        .args(["decode", "/nonexistent/pairlink/capture.log"])
        .output()
        .expect("decode should run");

    assert_eq!(output.status.code(), Some(51));
}

#[test]
fn loopback_streams_file_payload() {
    let data: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
    let payload = unique_temp_file("payload", &data);

    let output = pairlink()
        .args([
            "--format",
            "json",
            "loopback",
            "--type",
            "share.request",
            "--body",
            r#"{"filename":"blob.bin"}"#,
            "--buffer-size",
            "700",
            "--file",
        ])
        .arg(&payload)
        .output()
        .expect("loopback should run");

    assert!(output.status.success());
    let packets = json_lines(&output.stdout);
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0]["type"], "share.request");
    assert_eq!(packets[0]["body"]["filename"], "blob.bin");
    assert_eq!(packets[0]["payload_size"], 5000);
    assert_eq!(packets[0]["payload_received"], 5000);
    assert!(packets[0]["payload_channel"].is_string());

    let _ = std::fs::remove_file(&payload);
}

#[test]
fn loopback_without_payload() {
    let output = pairlink()
        .args(["--format", "json", "loopback", "--type", "ping"])
        .output()
        .expect("loopback should run");

    assert!(output.status.success());
    let packets = json_lines(&output.stdout);
    assert_eq!(packets[0]["type"], "ping");
    assert!(packets[0].get("payload_size").is_none());
}

#[test]
fn loopback_rejects_non_object_body() {
    let output = pairlink()
        .args(["loopback", "--type", "ping", "--body", "[1,2]"])
        .output()
        .expect("loopback should run");

    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("--body must be a JSON object"));
}

#[test]
fn version_prints_package_version() {
    let output = pairlink()
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("pairlink {}", env!("CARGO_PKG_VERSION"))
    );
}
