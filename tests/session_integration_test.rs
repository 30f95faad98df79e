//! Integration tests for the session engine
//!
//! Covers the full client-visible surface: event ordering, key injection,
//! snapshots, resizes, and pattern waits against real child processes.

use regex::Regex;
use std::time::Duration;
use termpilot::config::EngineConfig;
use termpilot::session::{Event, EventKind, EventKindSet, Session};

/// Point the spawn wrapper at the real engine binary; the test harness
/// itself cannot serve as the wait-exit helper.
fn init() {
    std::env::set_var("TERMPILOT_HELPER_BIN", env!("CARGO_BIN_EXE_termpilot"));
}

const LONG_WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_echo_lifecycle_events_and_post_mortem_snapshot() {
    init();
    let session = Session::spawn(EngineConfig::for_command(vec!["echo", "hello"], 10, 3)).unwrap();
    let handle = session.handle();

    let mut sub = handle
        .subscribe(
            EventKindSet::empty()
                .with(EventKind::Init)
                .with(EventKind::Pid)
                .with(EventKind::Output)
                .with(EventKind::ExitCode),
        )
        .await
        .unwrap();

    let mut pid = None;
    let mut accumulated = String::new();
    let mut exit_code = None;
    let mut saw_output_before_pid = false;

    let collect = async {
        while let Some(event) = sub.next().await {
            match event {
                Event::Init(data) => accumulated.push_str(&data.text),
                Event::Pid(data) => pid = Some(data.pid),
                Event::Output(data) => {
                    if pid.is_none() {
                        saw_output_before_pid = true;
                    }
                    accumulated.push_str(&data.seq);
                }
                Event::ExitCode(data) => {
                    exit_code = Some(data.exit_code);
                    break;
                }
                _ => {}
            }
        }
    };
    tokio::time::timeout(LONG_WAIT, collect).await.unwrap();

    assert!(pid.unwrap() > 0);
    assert!(!saw_output_before_pid, "pid must precede output");
    assert!(accumulated.contains("hello"), "got: {accumulated:?}");
    assert_eq!(exit_code, Some(0));

    // ExitCode is the last event on this subscription.
    assert!(sub.next().await.is_none());

    // The engine stays alive for post-mortem snapshots.
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.text, "hello     \n          \n          ");

    handle.exit().await.ok();
    session.join().await.unwrap();
}

#[tokio::test]
async fn test_keys_then_snapshot() {
    init();
    let session = Session::spawn(EngineConfig::for_command(vec!["cat"], 20, 5)).unwrap();
    let handle = session.handle();

    handle.send_keys(["hi", "Enter"]).await.unwrap();
    handle.expect(&Regex::new("hi").unwrap()).await.unwrap();

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.text.starts_with("hi"), "got: {:?}", snapshot.text);

    handle.exit().await.unwrap();
    session.join().await.unwrap();
}

#[tokio::test]
async fn test_resize_then_wrapped_input() {
    init();
    let session = Session::spawn(EngineConfig::for_command(vec!["cat"], 80, 24)).unwrap();
    let handle = session.handle();

    handle.resize(40, 10).await.unwrap();
    let long_line = "x".repeat(100);
    handle.send_keys([long_line.as_str(), "Enter"]).await.unwrap();
    handle
        .expect_timeout(&Regex::new("x{100}").unwrap(), LONG_WAIT)
        .await
        .unwrap();

    let snapshot = handle.snapshot().await.unwrap();
    let lines: Vec<&str> = snapshot.text.split('\n').collect();
    assert_eq!(lines.len(), 10);
    assert_eq!(lines[0], "x".repeat(40));
    assert_eq!(lines[1], "x".repeat(40));
    assert!(lines[2].starts_with(&"x".repeat(20)));

    let total_x = snapshot.text.chars().filter(|c| *c == 'x').count();
    assert!(total_x >= 100);

    handle.exit().await.unwrap();
    session.join().await.unwrap();
}

#[tokio::test]
async fn test_resize_event_matches_command() {
    init();
    let session = Session::spawn(EngineConfig::for_command(vec!["cat"], 80, 24)).unwrap();
    let handle = session.handle();

    let mut sub = handle
        .subscribe(EventKindSet::empty().with(EventKind::Resize))
        .await
        .unwrap();

    handle.resize(33, 11).await.unwrap();
    match tokio::time::timeout(LONG_WAIT, sub.next()).await.unwrap() {
        Some(Event::Resize(data)) => {
            assert_eq!((data.cols, data.rows), (33, 11));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // A repeated identical resize still emits an event.
    handle.resize(33, 11).await.unwrap();
    match tokio::time::timeout(LONG_WAIT, sub.next()).await.unwrap() {
        Some(Event::Resize(data)) => {
            assert_eq!((data.cols, data.rows), (33, 11));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.text.split('\n').count(), 11);

    handle.exit().await.unwrap();
    session.join().await.unwrap();
}

#[tokio::test]
async fn test_out_of_bounds_resize_is_rejected_without_event() {
    init();
    let session = Session::spawn(EngineConfig::for_command(vec!["cat"], 80, 24)).unwrap();
    let handle = session.handle();

    let mut sub = handle
        .subscribe(EventKindSet::empty().with(EventKind::Resize))
        .await
        .unwrap();

    handle.resize(0, 24).await.unwrap();
    handle.resize(80, 2048).await.unwrap();
    handle.resize(20, 6).await.unwrap();

    // Only the valid resize produced an event.
    match tokio::time::timeout(LONG_WAIT, sub.next()).await.unwrap() {
        Some(Event::Resize(data)) => assert_eq!((data.cols, data.rows), (20, 6)),
        other => panic!("unexpected event: {other:?}"),
    }

    handle.exit().await.unwrap();
    session.join().await.unwrap();
}

#[tokio::test]
async fn test_expect_pattern_after_delay() {
    init();
    let start = std::time::Instant::now();
    let session = Session::spawn(EngineConfig::for_command(
        vec!["sleep 0.1; echo ready"],
        40,
        6,
    ))
    .unwrap();
    let handle = session.handle();

    handle.expect(&Regex::new("ready").unwrap()).await.unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));

    let snapshot = handle.snapshot().await.unwrap();
    let first_row = snapshot.text.split('\n').next().unwrap();
    assert!(first_row.starts_with("ready"), "got: {first_row:?}");

    handle.exit().await.ok();
    session.join().await.unwrap();
}

#[tokio::test]
async fn test_expect_timeout_leaves_session_running() {
    init();
    let session = Session::spawn(EngineConfig::for_command(vec!["cat"], 20, 4)).unwrap();
    let handle = session.handle();

    let result = handle
        .expect_timeout(&Regex::new("never-appears").unwrap(), Duration::from_millis(300))
        .await;
    assert!(result.is_err());

    // The session is still usable after the timeout.
    handle.send_keys(["ok", "Enter"]).await.unwrap();
    handle.expect(&Regex::new("ok").unwrap()).await.unwrap();

    handle.exit().await.unwrap();
    session.join().await.unwrap();
}

#[tokio::test]
async fn test_bad_key_is_reported_as_debug_and_state_survives() {
    init();
    let session = Session::spawn(EngineConfig::for_command(vec!["cat"], 20, 4)).unwrap();
    let handle = session.handle();

    let mut sub = handle
        .subscribe(EventKindSet::empty().with(EventKind::Debug))
        .await
        .unwrap();

    handle.send_keys(["<NoSuchKey>"]).await.unwrap();

    let wait = async {
        while let Some(event) = sub.next().await {
            if let Event::Debug(data) = event {
                if data.tag.starts_with("badKey:") {
                    return true;
                }
            }
        }
        false
    };
    assert!(tokio::time::timeout(LONG_WAIT, wait).await.unwrap());

    // Later commands still work.
    handle.send_keys(["still-alive", "Enter"]).await.unwrap();
    handle
        .expect(&Regex::new("still-alive").unwrap())
        .await
        .unwrap();

    handle.exit().await.unwrap();
    session.join().await.unwrap();
}

#[tokio::test]
async fn test_debug_command_round_trip() {
    init();
    let session = Session::spawn(EngineConfig::for_command(vec!["cat"], 20, 4)).unwrap();
    let handle = session.handle();

    let mut sub = handle
        .subscribe(EventKindSet::empty().with(EventKind::Debug))
        .await
        .unwrap();
    handle.debug("marker-123").await.unwrap();

    let wait = async {
        while let Some(event) = sub.next().await {
            if let Event::Debug(data) = event {
                if data.tag == "marker-123" {
                    return true;
                }
            }
        }
        false
    };
    assert!(tokio::time::timeout(LONG_WAIT, wait).await.unwrap());

    handle.exit().await.unwrap();
    session.join().await.unwrap();
}

#[tokio::test]
async fn test_late_subscriber_catches_up_after_exit() {
    init();
    let session = Session::spawn(EngineConfig::for_command(vec!["echo", "done"], 20, 4)).unwrap();
    let handle = session.handle();

    // Wait until the child has exited.
    let code = handle.wait_for_exit(LONG_WAIT).await.unwrap();
    assert_eq!(code, 0);

    // A subscriber joining now still observes init, pid, and exactly one
    // final ExitCode.
    let mut sub = handle.subscribe(EventKindSet::ALL).await.unwrap();
    let mut kinds = Vec::new();
    while let Some(event) = sub.next().await {
        kinds.push(event.kind());
        if kinds.last() == Some(&EventKind::ExitCode) {
            break;
        }
    }
    assert_eq!(kinds.first(), Some(&EventKind::Init));
    assert!(kinds.contains(&EventKind::Pid));
    assert_eq!(kinds.last(), Some(&EventKind::ExitCode));
    assert!(sub.next().await.is_none());

    handle.exit().await.ok();
    session.join().await.unwrap();
}

#[tokio::test]
async fn test_snapshot_idempotent_without_intervening_output() {
    init();
    let session = Session::spawn(EngineConfig::for_command(vec!["echo", "stable"], 20, 4)).unwrap();
    let handle = session.handle();

    handle.wait_for_exit(LONG_WAIT).await.unwrap();

    let first = handle.snapshot().await.unwrap();
    let second = handle.snapshot().await.unwrap();
    assert_eq!(first.text, second.text);
    assert_eq!(first.seq, second.seq);

    handle.exit().await.ok();
    session.join().await.unwrap();
}

#[tokio::test]
async fn test_exit_status_preserved_across_rendezvous() {
    init();
    let session = Session::spawn(EngineConfig::for_command(vec!["exit 42"], 20, 4)).unwrap();
    let handle = session.handle();
    let code = handle.wait_for_exit(LONG_WAIT).await.unwrap();
    assert_eq!(code, 42);
    handle.exit().await.ok();
    session.join().await.unwrap();
}
