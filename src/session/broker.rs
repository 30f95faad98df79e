//! Session Broker: the single serializer of engine state.
//!
//! Owns the terminal model and the PTY driver. Receives commands, feeds
//! child output into the model, fans events out to subscribers, and hosts
//! the quiescence-based exit coordination. All model mutation happens on
//! this task; no lock is held across I/O.

use super::command::Command;
use super::event::{
    Event, EventKind, EventKindSet, ExitCodeData, InitData, OutputData, PidData, ResizeData,
    SnapshotData,
};
use super::exit::ExitRendezvous;
use super::subscriber::{SubscriberSet, Subscription};
use crate::config::EngineConfig;
use crate::error::Result;
use crate::keys;
use crate::pty::driver::{PtyDriver, PtyStreams};
use crate::term::TerminalModel;
use std::ops::ControlFlow;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Resolution of the quiescence check
pub const QUIESCENCE_TICK: Duration = Duration::from_millis(10);

/// Keep-alive tick while idle after child exit
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Grace period for an in-flight exit code after an `Exit` command before
/// termination escalates
const EXIT_GRACE: Duration = Duration::from_millis(500);

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Starting,
    Running,
    Draining,
    Terminated,
}

impl SessionState {
    fn tag(self) -> &'static str {
        match self {
            SessionState::Starting => "state:starting",
            SessionState::Running => "state:running",
            SessionState::Draining => "state:draining",
            SessionState::Terminated => "state:terminated",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Termination {
    NotStarted,
    TermSent(Instant),
    KillSent(Instant),
}

pub(crate) struct Broker {
    config: EngineConfig,
    model: TerminalModel,
    driver: PtyDriver,
    rendezvous: ExitRendezvous,
    subscribers: SubscriberSet,
    state: SessionState,
    /// Timestamp of the most recently accepted command; the quiescence
    /// window measures from here
    last_command_at: Instant,
    /// The helper is blocked on the FIFO and awaits release
    pending_waitexit: bool,
    /// `CommandCompleted` arrives at most once; repeats are ignored
    completion_seen: bool,
    exit_code: Option<i32>,
    pty_eof: bool,
    exit_requested_at: Option<Instant>,
    termination: Termination,
    force_terminated: bool,
}

impl Broker {
    pub fn new(
        config: EngineConfig,
        model: TerminalModel,
        driver: PtyDriver,
        rendezvous: ExitRendezvous,
    ) -> Self {
        let state = if config.start_on_output {
            SessionState::Starting
        } else {
            SessionState::Running
        };
        Self {
            config,
            model,
            driver,
            rendezvous,
            subscribers: SubscriberSet::new(),
            state,
            last_command_at: Instant::now(),
            pending_waitexit: false,
            completion_seen: false,
            exit_code: None,
            pty_eof: false,
            exit_requested_at: None,
            termination: Termination::NotStarted,
            force_terminated: false,
        }
    }

    pub async fn run(mut self, mut command_rx: mpsc::Receiver<Command>, streams: PtyStreams) -> Result<()> {
        let PtyStreams {
            mut output_rx,
            mut exit_rx,
        } = streams;
        let mut exit_stream_open = true;

        info!(pid = self.driver.pid(), state = ?self.state, "session broker started");
        self.emit(Event::Pid(PidData {
            pid: self.driver.pid(),
        }));

        let mut quiescence = tokio::time::interval(QUIESCENCE_TICK);
        quiescence.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + HEARTBEAT_INTERVAL,
            HEARTBEAT_INTERVAL,
        );

        loop {
            tokio::select! {
                maybe_cmd = command_rx.recv() => match maybe_cmd {
                    Some(cmd) => {
                        self.last_command_at = Instant::now();
                        if self.handle_command(cmd, &mut output_rx).await.is_break() {
                            break;
                        }
                    }
                    None => {
                        debug!("command channel closed; shutting down");
                        break;
                    }
                },

                chunk = output_rx.recv(), if !self.pty_eof => match chunk {
                    Some(bytes) => self.handle_output(&bytes),
                    None => {
                        // Done signal from the PTY driver. The broker stays
                        // alive for post-mortem snapshots.
                        self.pty_eof = true;
                        self.emit_debug("ptyEof");
                    }
                },

                code = exit_rx.recv(), if exit_stream_open => {
                    exit_stream_open = false;
                    if let Some(code) = code {
                        self.handle_exit_code(code);
                    }
                },

                _ = quiescence.tick() => {
                    if self.on_tick().await.is_break() {
                        break;
                    }
                },

                _ = heartbeat.tick() => self.emit_debug("heartbeat"),
            }
        }

        self.transition(SessionState::Draining);
        self.subscribers.close_all();
        self.transition(SessionState::Terminated);
        info!(pid = self.driver.pid(), forced = self.force_terminated, "session broker finished");
        Ok(())
    }

    async fn handle_command(
        &mut self,
        command: Command,
        output_rx: &mut mpsc::Receiver<Vec<u8>>,
    ) -> ControlFlow<()> {
        match command {
            Command::SendKeys(keys) => self.handle_send_keys(&keys).await,

            Command::TakeSnapshot => {
                // Bytes already read from the PTY but still queued must be
                // part of the snapshot.
                self.drain_pending_output(output_rx);
                let snapshot = self.model.snapshot();
                self.emit(Event::Snapshot(SnapshotData {
                    cols: snapshot.cols,
                    rows: snapshot.rows,
                    text: snapshot.text,
                    seq: snapshot.seq,
                }));
            }

            Command::Resize { cols, rows } => match self.driver.resize(cols, rows) {
                Ok(()) => {
                    self.model.resize(cols as usize, rows as usize);
                    self.emit(Event::Resize(ResizeData { cols, rows }));
                }
                Err(e) => {
                    warn!(cols, rows, error = %e, "resize rejected");
                    self.emit_debug(format!("resizeFailed:{e}"));
                }
            },

            Command::Subscribe { kinds, ack } => self.handle_subscribe(kinds, ack),

            Command::Exit => {
                self.emit_debug("exitRequested");
                if self.exit_requested_at.is_none() {
                    self.exit_requested_at = Some(Instant::now());
                }
                if self.exit_code.is_none() && self.pending_waitexit {
                    // The user command already finished; release the helper
                    // as if the channel were quiescent.
                    self.pending_waitexit = false;
                    self.rendezvous.signal().await;
                    self.emit_debug("exitSignalSent");
                }
            }

            Command::Debug(tag) => self.emit(Event::debug(tag)),

            Command::CommandCompleted(_fifo) => {
                if !self.completion_seen {
                    self.completion_seen = true;
                    self.pending_waitexit = true;
                    self.emit_debug("commandCompleted");
                }
            }
        }
        ControlFlow::Continue(())
    }

    async fn handle_send_keys(&mut self, keys: &[String]) {
        match keys::translate_keys(keys, self.model.app_cursor_keys()) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return;
                }
                if let Err(e) = self.driver.write(bytes).await {
                    warn!(error = %e, "key injection failed");
                    self.emit_debug(format!("writeFailed:{e}"));
                }
            }
            Err(e) => {
                warn!(error = %e, "bad key in sendKeys");
                self.emit_debug(format!("badKey:{e}"));
            }
        }
    }

    fn handle_subscribe(&mut self, kinds: EventKindSet, ack: oneshot::Sender<Subscription>) {
        let mut catch_up = Vec::new();
        if kinds.contains(EventKind::Init) {
            let snapshot = self.model.snapshot();
            catch_up.push(Event::Init(InitData {
                cols: snapshot.cols,
                rows: snapshot.rows,
                pid: Some(self.driver.pid()),
                text: snapshot.text,
                seq: snapshot.seq,
            }));
        }
        if kinds.contains(EventKind::Pid) {
            catch_up.push(Event::Pid(PidData {
                pid: self.driver.pid(),
            }));
        }

        // A subscriber joining after the exit code was broadcast still gets
        // exactly one ExitCode, as its final event.
        let mut closed = false;
        if let Some(code) = self.exit_code {
            if kinds.contains(EventKind::ExitCode) {
                catch_up.push(Event::ExitCode(ExitCodeData { exit_code: code }));
                closed = true;
            }
        }

        let subscription = self.subscribers.subscribe(kinds, catch_up, closed);
        debug!(subscriber = %subscription.id, ?kinds, "subscriber registered");
        let _ = ack.send(subscription);
    }

    fn handle_output(&mut self, bytes: &[u8]) {
        if self.state == SessionState::Starting {
            self.transition(SessionState::Running);
        }
        self.model.feed(bytes);
        self.emit(Event::Output(OutputData {
            seq: String::from_utf8_lossy(bytes).into_owned(),
        }));
    }

    fn handle_exit_code(&mut self, code: i32) {
        info!(code, forced = self.force_terminated, "child exit code collected");
        self.exit_code = Some(code);
        if self.force_terminated {
            self.emit_debug("forceTerminated");
        }
        self.emit(Event::ExitCode(ExitCodeData { exit_code: code }));
    }

    fn drain_pending_output(&mut self, output_rx: &mut mpsc::Receiver<Vec<u8>>) {
        loop {
            match output_rx.try_recv() {
                Ok(bytes) => self.handle_output(&bytes),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if !self.pty_eof {
                        self.pty_eof = true;
                        self.emit_debug("ptyEof");
                    }
                    break;
                }
            }
        }
    }

    /// Quiescence check; also drives the escalating termination ladder once
    /// an `Exit` has been requested.
    async fn on_tick(&mut self) -> ControlFlow<()> {
        let quiet = self.last_command_at.elapsed() >= self.config.timeouts.quiescence_window();

        if self.pending_waitexit && quiet {
            self.pending_waitexit = false;
            self.rendezvous.signal().await;
            self.emit_debug("exitSignalSent");
        }

        if let Some(requested_at) = self.exit_requested_at {
            if self.exit_code.is_some() {
                if quiet {
                    return ControlFlow::Break(());
                }
            } else {
                match self.termination {
                    Termination::NotStarted if requested_at.elapsed() >= EXIT_GRACE => {
                        self.force_terminated = true;
                        self.driver.terminate_graceful();
                        self.emit_debug("sigtermSent");
                        self.termination = Termination::TermSent(Instant::now());
                    }
                    Termination::TermSent(at)
                        if at.elapsed() >= self.config.timeouts.graceful_termination() =>
                    {
                        self.driver.terminate_forced();
                        self.emit_debug("sigkillSent");
                        self.termination = Termination::KillSent(Instant::now());
                    }
                    Termination::KillSent(at)
                        if at.elapsed() >= self.config.timeouts.subprocess_wait() =>
                    {
                        warn!("child unresponsive after SIGKILL; giving up");
                        self.emit_debug("terminationTimedOut");
                        return ControlFlow::Break(());
                    }
                    _ => {}
                }
            }
        }

        ControlFlow::Continue(())
    }

    fn transition(&mut self, state: SessionState) {
        if self.state == state {
            return;
        }
        debug!(from = ?self.state, to = ?state, "session state transition");
        self.state = state;
        self.emit_debug(state.tag());
    }

    fn emit(&mut self, event: Event) {
        let overrun = self.subscribers.broadcast(&event);
        for id in overrun {
            warn!(subscriber = %id, "subscriber overrun; stream closed");
            let _ = self
                .subscribers
                .broadcast(&Event::debug(format!("subscriberOverrun:{id}")));
        }
    }

    fn emit_debug<S: Into<String>>(&mut self, tag: S) {
        self.emit(Event::debug(tag.into()));
    }
}
