#![cfg(feature = "cli")]

use std::io::{BufRead, BufReader};
use std::path::Path;
use std::process::{Child, Command, Output, Stdio};

const SECRET: &str = "cli-test-secret";

/// Kills the server when the test ends, pass or fail.
struct ServerProcess {
    child: Child,
    records: Vec<serde_json::Value>,
}

impl ServerProcess {
    fn start(args: &[&str], expected_records: usize) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_netfile"))
            .args(["--log-level", "error", "--format", "json", "serve", "127.0.0.1:0"])
            .args(args)
            .env_remove("NETFILE_SHARED_SECRET")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("serve command should start");

        let stdout = child.stdout.take().expect("stdout should be piped");
        let mut lines = BufReader::new(stdout).lines();
        let mut records = Vec::with_capacity(expected_records);
        for _ in 0..expected_records {
            let line = lines
                .next()
                .expect("server should print an exposure record")
                .expect("stdout should be readable");
            records.push(serde_json::from_str(&line).expect("record should be json"));
        }
        Self { child, records }
    }

    fn record(&self, kind: &str) -> &serde_json::Value {
        self.records
            .iter()
            .find(|record| record["kind"] == kind)
            .expect("record of that kind should exist")
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn netfile(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_netfile"))
        .args(["--log-level", "error", "--format", "json"])
        .args(args)
        .env_remove("NETFILE_SHARED_SECRET")
        .output()
        .expect("command should run")
}

fn text(value: &serde_json::Value) -> &str {
    value.as_str().expect("field should be a string")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp path should be utf-8")
}

fn sample_data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn get_stat_close_against_served_reader() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let source = dir.path().join("source.bin");
    let data = sample_data(5_000);
    std::fs::write(&source, &data).expect("source should be written");

    let server = ServerProcess::start(&["--read", path_arg(&source), "--secret", SECRET], 1);
    let record = server.record("reader");
    let base = text(&record["base_url"]);
    let id = text(&record["id"]);
    assert_eq!(id, "source.bin");
    assert!(text(&record["direct_url"]).contains("shared-secret="));

    let target = dir.path().join("copy.bin");
    let output = netfile(&[
        "get",
        base,
        id,
        "-o",
        path_arg(&target),
        "--secret",
        SECRET,
        "--buffer",
        "13",
    ]);
    assert!(output.status.success(), "get should succeed: {output:?}");
    assert_eq!(std::fs::read(&target).expect("copy should exist"), data);
    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("summary should be json");
    assert_eq!(summary["bytes"], 5_000);

    let output = netfile(&["stat", base, id, "--secret", SECRET]);
    assert!(output.status.success(), "stat should succeed: {output:?}");
    let info: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stat should be json");
    assert_eq!(info["name"], "source.bin");
    assert_eq!(info["size"], 5_000);

    let output = netfile(&["close", base, id, "--secret", SECRET]);
    assert!(output.status.success(), "close should succeed: {output:?}");

    let output = netfile(&["close", base, id, "--secret", SECRET]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn get_to_stdout_writes_raw_content() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let source = dir.path().join("stream.bin");
    let data = sample_data(777);
    std::fs::write(&source, &data).expect("source should be written");

    let server = ServerProcess::start(&["--read", path_arg(&source), "--secret", SECRET], 1);
    let record = server.record("reader");

    let output = netfile(&[
        "get",
        text(&record["base_url"]),
        text(&record["id"]),
        "--secret",
        SECRET,
    ]);
    assert!(output.status.success(), "get should succeed: {output:?}");
    assert_eq!(output.stdout, data);
}

#[test]
fn put_ranged_and_full_into_served_writer() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let ranged_target = dir.path().join("ranged.bin");
    let full_target = dir.path().join("full.bin");
    let upload = dir.path().join("upload.bin");
    let data = sample_data(1_234);
    std::fs::write(&upload, &data).expect("upload should be written");

    let server = ServerProcess::start(
        &[
            "--write",
            path_arg(&ranged_target),
            "--write",
            path_arg(&full_target),
            "--secret",
            SECRET,
        ],
        2,
    );
    let base = text(&server.record("writer")["base_url"]).to_string();

    let output = netfile(&[
        "put",
        &base,
        "ranged.bin",
        path_arg(&upload),
        "--secret",
        SECRET,
        "--buffer",
        "17",
    ]);
    assert!(output.status.success(), "ranged put should succeed: {output:?}");
    assert_eq!(std::fs::read(&ranged_target).expect("target should exist"), data);

    let output = netfile(&[
        "put",
        &base,
        "full.bin",
        path_arg(&upload),
        "--secret",
        SECRET,
        "--full",
    ]);
    assert!(output.status.success(), "full put should succeed: {output:?}");
    assert_eq!(std::fs::read(&full_target).expect("target should exist"), data);
}

#[test]
fn wrong_secret_exits_with_permission_denied() {
    let dir = tempfile::tempdir().expect("tempdir should be created");
    let source = dir.path().join("guarded.bin");
    std::fs::write(&source, sample_data(10)).expect("source should be written");

    let server = ServerProcess::start(&["--read", path_arg(&source), "--secret", SECRET], 1);
    let record = server.record("reader");

    let output = netfile(&[
        "stat",
        text(&record["base_url"]),
        text(&record["id"]),
        "--secret",
        "wrong",
    ]);
    assert_eq!(output.status.code(), Some(50));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unauthorized"));
}

#[test]
fn missing_secret_is_a_usage_error() {
    let output = netfile(&["stat", "http://127.0.0.1:9", "f"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn serve_without_files_is_a_usage_error() {
    let output = netfile(&["serve", "127.0.0.1:0"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn secret_prints_requested_entropy() {
    let output = Command::new(env!("CARGO_BIN_EXE_netfile"))
        .args(["--format", "raw", "secret", "--bytes", "8"])
        .output()
        .expect("command should run");
    assert!(output.status.success());
    let secret = String::from_utf8(output.stdout).expect("secret should be utf-8");
    // 8 bytes of unpadded base64.
    assert_eq!(secret.trim().len(), 11);

    let output = netfile(&["secret", "--id"]);
    assert!(output.status.success());
    let record: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("record should be json");
    assert_eq!(record["kind"], "file-id");
}

#[test]
fn version_prints_package_version() {
    let output = netfile(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("version should be utf-8");
    assert_eq!(stdout.trim(), format!("netfile {}", env!("CARGO_PKG_VERSION")));
}
