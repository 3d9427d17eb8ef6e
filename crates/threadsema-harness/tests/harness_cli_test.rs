//! Integration test: harness CLI end to end.
//!
//! Validates:
//! 1. single scenarios run on the thread backend and exit zero.
//! 2. `--report` writes a markdown report and a parseable JSON sibling.
//! 3. the futex backend (Linux) runs through the same path.
//!
//! Run:
//!   cargo test -p threadsema-harness --test harness_cli_test

use std::path::PathBuf;
use std::process::Command;

fn harness() -> Command {
    Command::new(env!("CARGO_BIN_EXE_threadsema-harness"))
}

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("threadsema-harness-{tag}-{}", std::process::id()));
    std::fs::create_dir_all(&dir).expect("scratch dir should be creatable");
    dir
}

#[test]
fn timeout_probe_on_thread_backend_succeeds() {
    let output = harness()
        .args(["timeout", "--backend", "thread", "--timeout-us", "500", "--samples", "3"])
        .output()
        .expect("harness should launch");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr:\n{stderr}");
    assert!(stderr.contains("[PASS] timeout on thread"), "stderr:\n{stderr}");
}

#[test]
fn report_flag_writes_markdown_and_json() {
    let dir = scratch_dir("report");
    let md_path = dir.join("pingpong.md");

    let output = harness()
        .args(["--diag", "quiet", "--report"])
        .arg(&md_path)
        .args(["pingpong", "--backend", "thread", "--rounds", "100"])
        .output()
        .expect("harness should launch");
    assert!(
        output.status.success(),
        "stderr:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let md = std::fs::read_to_string(&md_path).expect("markdown report should exist");
    assert!(md.starts_with("# threadsema harness report"));
    assert!(md.contains("| pingpong | thread | 100 |"));
    assert!(md.contains("- Diag mode: quiet"));

    let json = std::fs::read_to_string(md_path.with_extension("json")).expect("json report should exist");
    let value: serde_json::Value = serde_json::from_str(&json).expect("json should parse");
    assert_eq!(value["scenarios"][0]["scenario"], "pingpong");
    assert_eq!(value["scenarios"][0]["passed"], true);
    assert_eq!(value["scenarios"][0]["latency"]["samples"], 100);
    assert_eq!(value["diag"]["reported"], 0);

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unknown_backend_is_rejected() {
    let output = harness()
        .args(["pingpong", "--backend", "spin"])
        .output()
        .expect("harness should launch");
    assert!(!output.status.success());
}

#[cfg(target_os = "linux")]
#[test]
fn stress_on_futex_backend_succeeds() {
    let output = harness()
        .args(["stress", "--threads", "4", "--rounds", "5"])
        .output()
        .expect("harness should launch");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(output.status.success(), "stderr:\n{stderr}");
    assert!(stderr.contains("[PASS] stress on futex"), "stderr:\n{stderr}");
}
