#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const BIN: &str = env!("CARGO_BIN_EXE_v3ctl");

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from(format!(
        "/tmp/v3cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn wait_for_socket(path: &Path, timeout: Duration) {
    let start = Instant::now();
    while !path.exists() {
        if start.elapsed() >= timeout {
            panic!("endpoint {} never appeared", path.display());
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn wait_for_exit(child: &mut Child, timeout: Duration) -> std::process::ExitStatus {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().expect("child status should be queryable") {
            return status;
        }
        if start.elapsed() >= timeout {
            let _ = child.kill();
            panic!("child did not exit within {timeout:?}");
        }
        thread::sleep(Duration::from_millis(25));
    }
}

fn spawn_stub_core(dir: &Path) -> Child {
    let child = Command::new(BIN)
        .arg("--log-level")
        .arg("error")
        .arg("stub-core")
        .arg("--ipc-dir")
        .arg(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .expect("stub core should start");
    wait_for_socket(
        &dir.join(format!("v3_core_ipc_{}", child.id())),
        Duration::from_secs(3),
    );
    child
}

fn one_shot(command: &str, pid: u32, dir: &Path) -> Output {
    Command::new(BIN)
        .args(["--log-level", "error", "--format", "json", command, "--pid"])
        .arg(pid.to_string())
        .arg("--ipc-dir")
        .arg(dir)
        .output()
        .expect("command should run")
}

fn json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout should be json")
}

#[test]
fn one_shot_commands_against_stub_core() {
    let dir = unique_temp_dir("oneshot");
    let mut core = spawn_stub_core(&dir);
    let pid = core.id();

    let ping = json(&one_shot("ping", pid, &dir));
    assert_eq!(ping["response"], "PONG");
    assert_eq!(ping["pid"], pid);

    let state = json(&one_shot("state", pid, &dir));
    assert_eq!(state["state"], "disconnected");

    let connect = json(&one_shot("connect", pid, &dir));
    assert_eq!(connect["accepted"], true);

    let state = json(&one_shot("state", pid, &dir));
    assert_eq!(state["state"], "connected");
    assert_eq!(state["raw"], 2);

    let stats = json(&one_shot("stats", pid, &dir));
    assert!(stats["packets_recv"].as_u64().unwrap_or(0) >= 4);
    assert_eq!(stats["reconnect_count"], 0);

    let version = json(&one_shot("core-version", pid, &dir));
    assert!(version["version"]
        .as_str()
        .unwrap_or_default()
        .starts_with("v3ctl-stub"));

    let shutdown = json(&one_shot("shutdown", pid, &dir));
    assert_eq!(shutdown["command"], "SHUTDOWN");
    assert!(wait_for_exit(&mut core, Duration::from_secs(5)).success());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_core_times_out_with_124() {
    let dir = unique_temp_dir("missing");
    let output = Command::new(BIN)
        .args(["ping", "--pid", "999999", "--connect-timeout", "300ms", "--ipc-dir"])
        .arg(&dir)
        .output()
        .expect("ping should run");

    assert_eq!(output.status.code(), Some(124));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ping failed"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn bad_duration_is_usage_error() {
    let output = Command::new(BIN)
        .args(["state", "--pid", "1", "--connect-timeout", "soon"])
        .output()
        .expect("state should run");
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_reports_package_version() {
    let output = Command::new(BIN)
        .arg("version")
        .output()
        .expect("version should run");
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        format!("v3ctl {}", env!("CARGO_PKG_VERSION"))
    );

    let extended = Command::new(BIN)
        .args(["version", "--extended"])
        .output()
        .expect("version --extended should run");
    let stdout = String::from_utf8_lossy(&extended.stdout);
    assert!(stdout.contains("protocol_version: 1"));
    assert!(stdout.contains("max_frame_size: 65536"));
}
