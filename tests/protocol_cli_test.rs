//! End-to-end test of the binary's JSON-lines protocol
//!
//! Drives the real `termpilot` binary over piped stdio: commands go in as
//! JSON lines, events come back as JSON lines.

use serde_json::Value;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{channel, Receiver};
use std::time::{Duration, Instant};

const LONG_WAIT: Duration = Duration::from_secs(10);

struct EngineProcess {
    child: Child,
    stdin: std::process::ChildStdin,
    events: Receiver<Value>,
}

impl EngineProcess {
    fn spawn(args: &[&str]) -> Self {
        let mut child = Command::new(env!("CARGO_BIN_EXE_termpilot"))
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .expect("failed to spawn engine");

        let stdin = child.stdin.take().unwrap();
        let stdout = child.stdout.take().unwrap();
        let (tx, events) = channel();
        std::thread::spawn(move || {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                if line.trim().is_empty() {
                    continue;
                }
                let Ok(value) = serde_json::from_str::<Value>(&line) else {
                    continue;
                };
                if tx.send(value).is_err() {
                    break;
                }
            }
        });

        Self {
            child,
            stdin,
            events,
        }
    }

    fn send(&mut self, command: &str) {
        writeln!(self.stdin, "{command}").unwrap();
        self.stdin.flush().unwrap();
    }

    /// Wait for the next event of the given type, skipping others
    fn wait_for(&self, event_type: &str) -> Value {
        let deadline = Instant::now() + LONG_WAIT;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .expect("timed out waiting for event");
            let event = self
                .events
                .recv_timeout(remaining)
                .unwrap_or_else(|_| panic!("no '{event_type}' event within {LONG_WAIT:?}"));
            if event["type"] == event_type {
                return event;
            }
        }
    }

    fn wait_exit_status(&mut self) -> std::process::ExitStatus {
        let deadline = Instant::now() + LONG_WAIT;
        loop {
            if let Some(status) = self.child.try_wait().unwrap() {
                return status;
            }
            assert!(Instant::now() < deadline, "engine process did not exit");
            std::thread::sleep(Duration::from_millis(50));
        }
    }
}

impl Drop for EngineProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[test]
fn test_echo_over_the_wire() {
    let mut engine = EngineProcess::spawn(&["--size", "10x3", "--", "echo", "hello"]);

    let pid = engine.wait_for("pid");
    assert!(pid["data"]["pid"].as_i64().unwrap() > 0);

    let exit = engine.wait_for("exitCode");
    assert_eq!(exit["data"]["exitCode"], 0);

    // Post-mortem snapshot over the wire.
    engine.send(r#"{"type":"takeSnapshot"}"#);
    let snapshot = engine.wait_for("snapshot");
    assert_eq!(
        snapshot["data"]["text"].as_str().unwrap(),
        "hello     \n          \n          "
    );

    engine.send(r#"{"type":"exit"}"#);
    let status = engine.wait_exit_status();
    assert!(status.success());
}

#[test]
fn test_send_keys_and_resize_over_the_wire() {
    let mut engine = EngineProcess::spawn(&["--size", "30x6", "--", "cat"]);

    engine.wait_for("pid");
    engine.send(r#"{"type":"resize","cols":20,"rows":4}"#);
    let resize = engine.wait_for("resize");
    assert_eq!(resize["data"]["cols"], 20);
    assert_eq!(resize["data"]["rows"], 4);

    engine.send(r#"{"type":"sendKeys","keys":["hi","Enter"]}"#);
    let deadline = Instant::now() + LONG_WAIT;
    let mut seen = String::new();
    while !seen.contains("hi") {
        assert!(Instant::now() < deadline, "echo never arrived: {seen:?}");
        let event = engine.wait_for("output");
        seen.push_str(event["data"]["seq"].as_str().unwrap());
    }

    engine.send(r#"{"type":"takeSnapshot"}"#);
    let snapshot = engine.wait_for("snapshot");
    let text = snapshot["data"]["text"].as_str().unwrap();
    assert!(text.starts_with("hi"), "got: {text:?}");
    assert_eq!(text.split('\n').count(), 4);

    engine.send(r#"{"type":"exit"}"#);
    engine.wait_for("exitCode");
    let status = engine.wait_exit_status();
    assert!(status.success());
}

#[test]
fn test_malformed_command_is_rejected_not_fatal() {
    let mut engine = EngineProcess::spawn(&["--size", "20x4", "--", "cat"]);

    engine.wait_for("pid");
    engine.send("this is not json");
    let debug = engine.wait_for("debug");
    assert!(debug["data"]["tag"]
        .as_str()
        .unwrap()
        .starts_with("protocolError:"));

    // The engine keeps serving.
    engine.send(r#"{"type":"takeSnapshot"}"#);
    engine.wait_for("snapshot");

    engine.send(r#"{"type":"exit"}"#);
    let status = engine.wait_exit_status();
    assert!(status.success());
}
