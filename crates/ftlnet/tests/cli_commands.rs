#![cfg(feature = "cli")]

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};

struct ServeGuard(Child);

impl Drop for ServeGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn spawn_serve() -> (ServeGuard, String) {
    let mut child = Command::new(env!("CARGO_BIN_EXE_ftlnet"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("serve")
        .arg("127.0.0.1:0")
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("serve command should start");

    let stdout = child.stdout.take().expect("stdout should be piped");
    let guard = ServeGuard(child);

    let mut line = String::new();
    BufReader::new(stdout)
        .read_line(&mut line)
        .expect("serve should print its address");
    let event: serde_json::Value = serde_json::from_str(&line).expect("listening line is json");
    assert_eq!(event["event"], "listening");
    let addr = event["addr"].as_str().expect("addr is a string").to_string();
    (guard, addr)
}

#[test]
fn call_echo_against_serve() {
    let (_serve, addr) = spawn_serve();

    let output = Command::new(env!("CARGO_BIN_EXE_ftlnet"))
        .arg("--log-level")
        .arg("error")
        .arg("--format")
        .arg("json")
        .arg("call")
        .arg(&addr)
        .arg("echo")
        .arg("--json")
        .arg(r#"[1, "two"]"#)
        .output()
        .expect("call should run");

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let result: serde_json::Value = serde_json::from_str(stdout.trim()).expect("call prints json");
    assert_eq!(result["procedure"], "echo");
    assert_eq!(result["result"], serde_json::json!([1, "two"]));
    assert_eq!(result["peer_id"].as_str().map(str::len), Some(32));
}

#[test]
fn unknown_procedure_times_out_with_124() {
    let (_serve, addr) = spawn_serve();

    let output = Command::new(env!("CARGO_BIN_EXE_ftlnet"))
        .arg("--log-level")
        .arg("error")
        .arg("call")
        .arg(&addr)
        .arg("missing")
        .arg("--timeout")
        .arg("300ms")
        .output()
        .expect("call should run");

    assert_eq!(output.status.code(), Some(124));
}

#[test]
fn call_refused_connection_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_ftlnet"))
        .arg("--log-level")
        .arg("error")
        .arg("call")
        .arg("127.0.0.1:1")
        .arg("echo")
        .output()
        .expect("call should run");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("connect failed"));
}

#[test]
fn version_prints_package_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_ftlnet"))
        .arg("version")
        .output()
        .expect("version should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("ftlnet {}", env!("CARGO_PKG_VERSION")));
}
