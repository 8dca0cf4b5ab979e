use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

const B1_LINE: &str = r#"2024-01-15 10:30:00 {"timestamp":"2024-01-15T08:00:00+0000","bidAttributes":{"bidId":"B1","adId":"A1"},"deviceAttributes":{"pfm":"P1","deviceLocalTime":"UTC-5"}}"#;

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}

struct Workspace {
    home_dir: PathBuf,
    cwd: PathBuf,
}

impl Workspace {
    fn new(prefix: &str) -> Self {
        let temp = unique_temp_dir(prefix);
        let home_dir = temp.join("home");
        let cwd = temp.join("cwd");
        std::fs::create_dir_all(&home_dir).expect("home dir should be creatable");
        std::fs::create_dir_all(&cwd).expect("cwd dir should be creatable");
        Self { home_dir, cwd }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(env!("CARGO_BIN_EXE_jsonit"));
        command
            .arg("--home-dir")
            .arg(&self.home_dir)
            .arg("--cwd")
            .arg(&self.cwd);
        command
    }
}

fn parse_stdout(stdout: &[u8]) -> Value {
    serde_json::from_slice(stdout).expect("stdout should hold one JSON document")
}

#[test]
fn extract_writes_envelope_to_stdout_and_progress_to_stderr() {
    let workspace = Workspace::new("jsonit-cli-extract");
    std::fs::write(workspace.cwd.join("fos.log"), format!("{B1_LINE}\n")).expect("input should be writable");

    let output = workspace
        .command()
        .args(["extract", "fos.log", "--set", "test_case=TC-1", "--set", "colour=red"])
        .output()
        .expect("extract should execute");

    assert!(output.status.success());
    let envelope = parse_stdout(&output.stdout);
    assert_eq!(envelope["execution_timeout"], 90);
    assert_eq!(envelope["data"][0]["bid_id"], "B1");
    assert_eq!(envelope["data"][0]["test_case"], "TC-1");

    let stderr = String::from_utf8(output.stderr).expect("stderr should be utf-8");
    assert!(stderr.contains("jsonit: starting `extract`"), "stderr: {stderr}");
    assert!(stderr.contains("extract: start mode=fos"), "stderr: {stderr}");
    assert!(stderr.contains("extract: warning ignored_override key=colour"), "stderr: {stderr}");
    assert!(stderr.contains("extract: complete records=1"), "stderr: {stderr}");
}

#[test]
fn extract_reads_stdin_and_honours_mode() {
    let workspace = Workspace::new("jsonit-cli-stdin");
    let mut child = workspace
        .command()
        .args(["extract", "-", "--mode", "VEGA", "--compact"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("extract should spawn");
    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(b"2024-05-01T12:00:00 bidId=V1 adId=VA1\n")
        .expect("stdin should accept input");
    let output = child.wait_with_output().expect("extract should finish");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf-8");
    assert!(stdout.starts_with(r#"{"data":[{"ad_id":"VA1","bid_id":"V1""#), "stdout: {stdout}");
    assert_eq!(stdout.lines().count(), 1);
}

#[test]
fn extract_writes_out_file_with_overrides_file() {
    let workspace = Workspace::new("jsonit-cli-out");
    std::fs::write(workspace.cwd.join("fos.log"), format!("{B1_LINE}\n")).expect("input should be writable");
    std::fs::write(
        workspace.home_dir.join("overrides.json"),
        r#"{"start_time":"1700000000000","pfm":"AFTKA"}"#,
    )
    .expect("overrides should be writable");

    let output = workspace
        .command()
        .args([
            "extract",
            "fos.log",
            "--overrides",
            "~/overrides.json",
            "--set",
            "pfm=AFTMM",
            "--out",
            "reports/out.json",
            "--report",
        ])
        .output()
        .expect("extract should execute");

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let written = std::fs::read(workspace.cwd.join("reports/out.json")).expect("out file should exist");
    let envelope = parse_stdout(&written);
    assert_eq!(envelope["data"][0]["start_time"], "2023-11-14T22:13:20");
    assert_eq!(envelope["data"][0]["end_time"], "2023-11-14T22:23:20");
    assert_eq!(envelope["data"][0]["pfm"], "AFTMM");

    let stderr = String::from_utf8(output.stderr).expect("stderr should be utf-8");
    assert!(stderr.contains("\"records_emitted\": 1"), "stderr: {stderr}");
}

#[test]
fn search_prints_numbered_highlighted_lines() {
    let workspace = Workspace::new("jsonit-cli-search");
    std::fs::write(
        workspace.cwd.join("device.log"),
        "I/AdTag: bidId=B1 slot=top\n\nW/Player: stalled\nI/AdTag: BIDID=B2\n",
    )
    .expect("input should be writable");

    let output = workspace
        .command()
        .args(["search", "device.log", "--keywords", "bidid, adtag"])
        .output()
        .expect("search should execute");

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf-8");
    assert_eq!(
        stdout.lines().collect::<Vec<_>>(),
        [
            "1: I/<<AdTag>>: <<bidId>>=B1 slot=top",
            "4: I/<<AdTag>>: <<BIDID>>=B2",
        ]
    );
}

#[test]
fn search_json_reports_counts() {
    let workspace = Workspace::new("jsonit-cli-search-json");
    std::fs::write(workspace.cwd.join("device.log"), "a\nb\na b\n").expect("input should be writable");

    let output = workspace
        .command()
        .args(["search", "device.log", "--keywords", "a", "--limit", "1", "--json"])
        .output()
        .expect("search should execute");

    assert!(output.status.success());
    let result = parse_stdout(&output.stdout);
    assert_eq!(result["matching_lines"], 2);
    assert_eq!(result["truncated"], true);
    assert_eq!(result["hits"][0]["line_number"], 1);
}

#[test]
fn schema_prints_envelope_schema() {
    let output = Command::new(env!("CARGO_BIN_EXE_jsonit"))
        .arg("schema")
        .output()
        .expect("schema should execute");

    assert!(output.status.success());
    let schema = parse_stdout(&output.stdout);
    assert_eq!(schema["title"], "OutputEnvelope");
}
