use std::fs;
use std::process::Command;
use std::thread;
use std::time::Duration;

use tempfile::TempDir;

fn run_tsh(dir: &TempDir, command: &str) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_tsh"))
        .current_dir(dir.path())
        .args(["-c", command])
        .output()
        .expect("failed to execute tsh")
}

#[test]
fn stdout_pipe_counts_lines() {
    let dir = TempDir::new().unwrap();
    let output = run_tsh(&dir, r"printf X\nY\n | wc -l");
    assert!(output.status.success(), "command failed: {:?}", output);
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "2");
}

#[test]
fn stderr_pipe_carries_errors() {
    let dir = TempDir::new().unwrap();
    let output = run_tsh(&dir, "ls /nonexistent-tsh-dir |& wc -l");
    assert!(output.status.success(), "command failed: {:?}", output);
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1");
    assert!(output.stderr.is_empty(), "stderr leaked: {:?}", output);
}

#[test]
fn builtin_feeds_a_pipeline() {
    let dir = TempDir::new().unwrap();
    let output = run_tsh(&dir, "showpid | wc -l");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "1");
}

#[test]
fn pipeline_output_can_be_redirected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("count.txt");
    let output = run_tsh(&dir, &format!(r"printf X\nY\nZ\n | wc -l > {}", path.display()));
    assert!(output.status.success(), "command failed: {:?}", output);
    assert_eq!(fs::read_to_string(&path).unwrap().trim(), "3");
}

#[test]
fn background_pipeline_runs_under_a_supervisor() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("count.txt");
    let output = run_tsh(&dir, &format!(r"printf X\n | wc -l > {} &", path.display()));
    assert!(output.status.success(), "command failed: {:?}", output);

    for _ in 0..50 {
        if fs::read_to_string(&path).is_ok_and(|s| s.trim() == "1") {
            return;
        }
        thread::sleep(Duration::from_millis(50));
    }
    panic!("background pipeline never wrote {}", path.display());
}
