use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

/// Feed `script` to tsh on stdin and collect everything it prints.
fn run_tsh_script(script: &str) -> Output {
    let workdir = TempDir::new().expect("create temp dir");
    run_tsh_script_in(workdir.path(), script)
}

fn run_tsh_script_in(workdir: &Path, script: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tsh"))
        .current_dir(workdir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to execute tsh");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(script.as_bytes())
        .unwrap();
    child.wait_with_output().expect("failed to wait for tsh")
}

#[test]
fn background_job_is_listed_killed_and_swept() {
    let output = run_tsh_script("sleep 100 &\njobs\nkill -9 1\nsleep 0.3\njobs\nquit\n");
    assert!(output.status.success(), "tsh failed: {:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.matches("[1] sleep 100").count(),
        1,
        "unexpected listing: {stdout}"
    );
    assert!(
        stdout.contains("signal number 9 was sent to pid"),
        "missing kill report: {stdout}"
    );
}

#[test]
fn job_ids_grow_from_the_highest_live_id() {
    let output = run_tsh_script("sleep 100 &\nsleep 100 &\njobs\nquit kill\n");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[1] sleep 100"), "{stdout}");
    assert!(stdout.contains("[2] sleep 100"), "{stdout}");
}

#[test]
fn quit_kill_reports_and_kills_every_job() {
    let output = run_tsh_script("sleep 100 &\nsleep 200 &\nquit kill\n");
    assert!(output.status.success(), "tsh failed: {:?}", output);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("tsh: sending SIGKILL signal to 2 jobs:"),
        "{stdout}"
    );
    assert!(stdout.contains(": sleep 100"), "{stdout}");
    assert!(stdout.contains(": sleep 200"), "{stdout}");
}

/// Gone, or a zombie waiting for whoever inherited it.
fn has_exited(pid: &str) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .is_some_and(|(_, rest)| rest.trim_start().starts_with('Z')),
        Err(_) => true,
    }
}

#[test]
fn killing_a_background_pipeline_kills_its_stages() {
    let workdir = TempDir::new().expect("create temp dir");
    fs::write(
        workdir.path().join("stage.sh"),
        "echo $$ >> pids\nexec sleep 60\n",
    )
    .unwrap();

    let output = run_tsh_script_in(
        workdir.path(),
        "sh stage.sh | sh stage.sh &\nsleep 0.5\nkill -9 1\nsleep 0.3\njobs\nquit kill\n",
    );
    assert!(output.status.success(), "tsh failed: {:?}", output);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("signal number 9 was sent to pid"),
        "{stdout}"
    );
    assert!(!stdout.contains("[1] sh stage.sh"), "{stdout}");

    let pids = fs::read_to_string(workdir.path().join("pids")).unwrap();
    let pids: Vec<&str> = pids.lines().collect();
    assert_eq!(pids.len(), 2, "{pids:?}");

    let deadline = Instant::now() + Duration::from_secs(3);
    while !pids.iter().all(|pid| has_exited(pid)) {
        assert!(Instant::now() < deadline, "stages survived: {pids:?}");
        thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn quit_kill_takes_background_pipelines_down() {
    let workdir = TempDir::new().expect("create temp dir");
    fs::write(
        workdir.path().join("stage.sh"),
        "echo $$ >> pids\nexec sleep 60\n",
    )
    .unwrap();

    let output = run_tsh_script_in(
        workdir.path(),
        "sh stage.sh | sh stage.sh &\nsleep 0.5\nquit kill\n",
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("tsh: sending SIGKILL signal to 1 jobs:"),
        "{stdout}"
    );

    let pids = fs::read_to_string(workdir.path().join("pids")).unwrap();
    let pids: Vec<&str> = pids.lines().collect();
    let deadline = Instant::now() + Duration::from_secs(3);
    while !pids.iter().all(|pid| has_exited(pid)) {
        assert!(Instant::now() < deadline, "stages survived: {pids:?}");
        thread::sleep(Duration::from_millis(50));
    }
}

#[test]
fn job_control_builtins_are_refused_in_a_pipeline() {
    let output = run_tsh_script("sleep 30 &\nfg 1 | cat\nkill -9 1 | cat\njobs\nquit kill\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("tsh error: fg: not available in a pipeline or background command"),
        "{stderr}"
    );
    assert!(
        stderr.contains("tsh error: kill: not available in a pipeline or background command"),
        "{stderr}"
    );
    // the job is untouched and still listed
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[1] sleep 30"), "{stdout}");
    assert!(
        stdout.contains("tsh: sending SIGKILL signal to 1 jobs:"),
        "{stdout}"
    );
}

#[test]
fn fg_reports_errors_in_order() {
    let output = run_tsh_script("fg\nfg abc\nfg 3\nkill -9 3\nquit\n");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("tsh error: fg: jobs list is empty"),
        "{stderr}"
    );
    assert!(stderr.contains("tsh error: fg: invalid arguments"), "{stderr}");
    assert!(
        stderr.contains("tsh error: fg: job-id 3 does not exist"),
        "{stderr}"
    );
    assert!(
        stderr.contains("tsh error: kill: job-id 3 does not exist"),
        "{stderr}"
    );
}

#[test]
fn fg_waits_for_the_job_and_drops_it() {
    let output = run_tsh_script("sleep 0.2 &\nfg 1\njobs\nquit\n");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sleep 0.2 "), "{stdout}");
    assert!(!stdout.contains("[1] sleep 0.2"), "{stdout}");
}

#[test]
fn builtins_ignore_the_background_marker() {
    let output = run_tsh_script("showpid &\njobs\nquit\n");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tsh pid is "), "{stdout}");
    assert!(!stdout.contains("[1]"), "{stdout}");
}

#[test]
fn ctrl_c_interrupts_the_foreground_process() {
    let workdir = TempDir::new().expect("create temp dir");
    let mut child = Command::new(env!("CARGO_BIN_EXE_tsh"))
        .current_dir(workdir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to execute tsh");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"sleep 5\nquit\n")
        .unwrap();

    let started = Instant::now();
    thread::sleep(Duration::from_millis(500));
    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(child.id() as i32),
        nix::sys::signal::Signal::SIGINT,
    )
    .unwrap();

    let output = child.wait_with_output().unwrap();
    assert!(started.elapsed() < Duration::from_secs(4));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tsh: got ctrl-C"), "{stdout}");
    assert!(stdout.contains("was killed"), "{stdout}");
}
