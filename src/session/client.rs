//! In-process client handle.
//!
//! A cheap, cloneable front door to a running session: submit commands,
//! subscribe to events, and use the blocking conveniences (snapshot, exit,
//! expect) that the JSON shim and embedding clients share.

use super::command::Command;
use super::event::{Event, EventKind, EventKindSet, SnapshotData};
use super::subscriber::Subscription;
use crate::config::TimeoutConfig;
use crate::error::{SessionError, SessionResult};
use regex::Regex;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// How long `subscribe` waits for the broker to acknowledge
const SUBSCRIPTION_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval of `expect_absent`
const ABSENT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Handle to a live session
#[derive(Clone)]
pub struct SessionHandle {
    command_tx: mpsc::Sender<Command>,
    timeouts: TimeoutConfig,
    pid: i32,
}

impl SessionHandle {
    pub(crate) fn new(command_tx: mpsc::Sender<Command>, timeouts: TimeoutConfig, pid: i32) -> Self {
        Self {
            command_tx,
            timeouts,
            pid,
        }
    }

    /// OS pid of the child process
    pub fn pid(&self) -> i32 {
        self.pid
    }

    /// Submit a command. A successful send is the acknowledgment that the
    /// command was accepted into the queue; effects become visible through
    /// events.
    pub async fn submit(&self, command: Command) -> SessionResult<()> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SessionError::SessionClosed)
    }

    /// Register a subscription for the given event kinds
    pub async fn subscribe(&self, kinds: EventKindSet) -> SessionResult<Subscription> {
        let (ack, ack_rx) = oneshot::channel();
        self.submit(Command::Subscribe { kinds, ack }).await?;
        match tokio::time::timeout(SUBSCRIPTION_TIMEOUT, ack_rx).await {
            Ok(Ok(subscription)) => Ok(subscription),
            Ok(Err(_)) => Err(SessionError::SessionClosed),
            Err(_) => Err(SessionError::TimedOut {
                operation: "subscribe",
                timeout: SUBSCRIPTION_TIMEOUT,
            }),
        }
    }

    /// Translate and inject a key sequence
    pub async fn send_keys<I, S>(&self, keys: I) -> SessionResult<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        self.submit(Command::SendKeys(keys)).await
    }

    /// Request a snapshot event without waiting for it
    pub async fn request_snapshot(&self) -> SessionResult<()> {
        self.submit(Command::TakeSnapshot).await
    }

    /// Take a snapshot and wait for it
    pub async fn snapshot(&self) -> SessionResult<SnapshotData> {
        let mut sub = self
            .subscribe(EventKindSet::empty().with(EventKind::Snapshot))
            .await?;
        self.submit(Command::TakeSnapshot).await?;

        let timeout = self.timeouts.snapshot();
        let wait = async {
            while let Some(event) = sub.next().await {
                if let Event::Snapshot(data) = event {
                    return Ok(data);
                }
            }
            Err(SessionError::SessionClosed)
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SessionError::TimedOut {
                operation: "snapshot",
                timeout,
            })?
    }

    /// Resize the PTY and the terminal model
    pub async fn resize(&self, cols: u16, rows: u16) -> SessionResult<()> {
        self.submit(Command::Resize { cols, rows }).await
    }

    /// Round-trip a diagnostic tag through the broker
    pub async fn debug<S: Into<String>>(&self, tag: S) -> SessionResult<()> {
        self.submit(Command::Debug(tag.into())).await
    }

    /// Request graceful shutdown and wait for the child's exit code.
    ///
    /// On timeout the session is left running; pair with another `exit`
    /// call or drop the handle to tear it down.
    pub async fn exit(&self) -> SessionResult<i32> {
        let mut sub = self
            .subscribe(EventKindSet::empty().with(EventKind::ExitCode))
            .await?;
        self.submit(Command::Exit).await?;
        let timeout = self.timeouts.exit();
        Self::await_exit_code(&mut sub, timeout).await
    }

    /// Wait for the child to exit on its own
    pub async fn wait_for_exit(&self, timeout: Duration) -> SessionResult<i32> {
        let mut sub = self
            .subscribe(EventKindSet::empty().with(EventKind::ExitCode))
            .await?;
        Self::await_exit_code(&mut sub, timeout).await
    }

    async fn await_exit_code(sub: &mut Subscription, timeout: Duration) -> SessionResult<i32> {
        let wait = async {
            while let Some(event) = sub.next().await {
                if let Event::ExitCode(data) = event {
                    return Ok(data.exit_code);
                }
            }
            Err(SessionError::SessionClosed)
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SessionError::TimedOut {
                operation: "exit",
                timeout,
            })?
    }

    /// Wait until the cumulative output (seeded with the current screen
    /// text) matches `pattern`. Returns the accumulated text.
    pub async fn expect(&self, pattern: &Regex) -> SessionResult<String> {
        self.expect_timeout(pattern, self.timeouts.expect()).await
    }

    pub async fn expect_timeout(
        &self,
        pattern: &Regex,
        timeout: Duration,
    ) -> SessionResult<String> {
        let mut sub = self
            .subscribe(
                EventKindSet::empty()
                    .with(EventKind::Init)
                    .with(EventKind::Output),
            )
            .await?;

        let wait = async {
            let mut accumulated = String::new();
            loop {
                match sub.next().await {
                    Some(Event::Init(data)) => accumulated.push_str(&data.text),
                    Some(Event::Output(data)) => accumulated.push_str(&data.seq),
                    Some(_) => {}
                    None => return Err(SessionError::SessionClosed),
                }
                if pattern.is_match(&accumulated) {
                    return Ok(accumulated);
                }
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| SessionError::TimedOut {
                operation: "expect",
                timeout,
            })?
    }

    /// Wait until `pattern` no longer matches the current screen text
    pub async fn expect_absent(&self, pattern: &Regex) -> SessionResult<()> {
        let timeout = self.timeouts.expect();
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let snapshot = self.snapshot().await?;
            if !pattern.is_match(&snapshot.text) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(SessionError::TimedOut {
                    operation: "expect",
                    timeout,
                });
            }
            tokio::time::sleep(ABSENT_POLL_INTERVAL).await;
        }
    }
}
