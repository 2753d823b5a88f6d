#![cfg(all(unix, feature = "cli"))]

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

const BIN: &str = env!("CARGO_BIN_EXE_v3ctl");

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/v3con-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn run_console(dir: &PathBuf, script: &str, extra: &[&str]) -> String {
    let mut child = Command::new(BIN)
        .args(["--log-level", "error", "--format", "json", "console"])
        .arg("--install-dir")
        .arg(dir)
        .arg("--ipc-dir")
        .arg(dir)
        .args(["--core-arg", "stub-core", "--core-arg", "-v"])
        .args(["--startup-grace", "3s"])
        .args(extra)
        .env_remove("V3_IPC_DIR")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("console should start");

    child
        .stdin
        .take()
        .expect("stdin should be piped")
        .write_all(script.as_bytes())
        .expect("script should be written");

    let output = child.wait_with_output().expect("console should finish");
    assert!(output.status.success());
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Install this binary as `core/v3_core`; it runs as the stub core.
fn install_stub(dir: &PathBuf) {
    std::fs::create_dir_all(dir.join("core")).expect("core dir should be creatable");
    std::os::unix::fs::symlink(BIN, dir.join("core").join("v3_core"))
        .expect("symlink should be creatable");
}

#[test]
fn console_starts_drives_and_stops_core_gracefully() {
    let dir = unique_temp_dir("e2e");
    install_stub(&dir);

    let stdout = run_console(
        &dir,
        "start\nstart\nconnect\nstate\nping\nversion\nstop\nquit\n",
        &[],
    );

    assert!(stdout.contains("core started (pid"), "{stdout}");
    assert!(stdout.contains("core is already running"), "{stdout}");
    assert!(stdout.contains("connect command accepted"), "{stdout}");
    assert!(stdout.contains("state: connected"), "{stdout}");
    assert!(stdout.contains("PONG received"), "{stdout}");
    assert!(stdout.contains("core version: v3ctl-stub"), "{stdout}");
    assert!(stdout.contains("core stopped (graceful"), "{stdout}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn console_stops_core_on_eof() {
    let dir = unique_temp_dir("eof");
    install_stub(&dir);

    let stdout = run_console(&dir, "start\nping\n", &[]);
    assert!(stdout.contains("core started (pid"), "{stdout}");
    assert!(stdout.contains("core stopped (graceful"), "{stdout}");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn console_reports_missing_core() {
    let dir = unique_temp_dir("nocore");

    let stdout = run_console(&dir, "start\nping\nstop\nbogus\nquit\n", &[]);
    assert!(stdout.contains("start failed: core executable not found"), "{stdout}");
    assert!(stdout.contains("ping failed: core is not running"), "{stdout}");
    assert!(stdout.contains("core is not running"), "{stdout}");
    assert!(stdout.contains("unknown command: bogus"), "{stdout}");

    let _ = std::fs::remove_dir_all(&dir);
}
