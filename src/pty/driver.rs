//! PTY Driver.
//!
//! Owns the master/slave pair and the child process. Raw reads and writes
//! happen on dedicated blocking threads bridged into the broker through
//! bounded channels; the child's exit status is collected by a non-blocking
//! waitpid loop and delivered exactly once.

use crate::config::EngineConfig;
use crate::error::{PtyError, PtyResult};
use nix::sys::signal::{killpg, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use std::io::{Read, Write};
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, trace, warn};

/// Read buffer size for the master fd
pub const READ_BUF_SIZE: usize = 128 * 1024;

/// Geometry bounds accepted by resize
pub const MIN_DIMENSION: u16 = 1;
pub const MAX_DIMENSION: u16 = 1024;

/// Channel capacity between the reader thread and the broker
const OUTPUT_CHANNEL_SIZE: usize = 1024;

/// Poll interval of the waitpid loop
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Streams handed to the broker at spawn time.
///
/// `output_rx` closing is the done signal: the master fd reached EOF or
/// failed, and no further output will arrive.
pub struct PtyStreams {
    pub output_rx: mpsc::Receiver<Vec<u8>>,
    pub exit_rx: mpsc::Receiver<i32>,
}

/// Handle over a live PTY and its child
pub struct PtyDriver {
    master: Box<dyn MasterPty + Send>,
    input_tx: mpsc::Sender<Vec<u8>>,
    child_pid: i32,
    // Held so the child handle outlives the session; reaping is done by the
    // waitpid loop, never through this handle.
    _child: Box<dyn Child + Send + Sync>,
}

// SAFETY: every `MasterPty` method takes `&self` and operates on the
// underlying fd via syscalls (ioctl/read/write setup), which are safe to
// invoke concurrently from multiple threads; portable-pty just omits the
// `Sync` bound on the trait object type.
unsafe impl Sync for PtyDriver {}

impl PtyDriver {
    /// Allocate a PTY, spawn `shell_command` under `/bin/sh -c`, and start
    /// the reader, writer, and waitpid threads.
    #[instrument(skip_all, fields(cols = config.cols, rows = config.rows))]
    pub fn spawn(config: &EngineConfig, shell_command: &str) -> PtyResult<(Self, PtyStreams)> {
        let size = PtySize {
            rows: config.rows,
            cols: config.cols,
            pixel_width: 0,
            pixel_height: 0,
        };

        let pair = native_pty_system().openpty(size).map_err(|e| {
            error!(error = %e, "failed to open PTY");
            PtyError::PtyAllocFailed {
                reason: e.to_string(),
            }
        })?;

        let mut cmd = CommandBuilder::new("/bin/sh");
        cmd.args(["-c", shell_command]);
        cmd.env("TERM", "xterm-256color");
        for (key, value) in &config.env {
            cmd.env(key, value);
        }
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            error!(error = %e, "failed to spawn child");
            PtyError::SpawnFailed {
                reason: e.to_string(),
            }
        })?;

        let child_pid = child.process_id().ok_or_else(|| PtyError::SpawnFailed {
            reason: "child has no pid".to_string(),
        })? as i32;

        // Keep only the master side; a retained slave would hold the line
        // open past child exit.
        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::PtyAllocFailed {
                reason: e.to_string(),
            })?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::PtyAllocFailed {
                reason: e.to_string(),
            })?;
        drop(pair.slave);

        info!(pid = child_pid, command = shell_command, "child spawned");

        let (output_tx, output_rx) = mpsc::channel(OUTPUT_CHANNEL_SIZE);
        let (input_tx, input_rx) = mpsc::channel(OUTPUT_CHANNEL_SIZE);
        let (exit_tx, exit_rx) = mpsc::channel(1);

        spawn_reader(reader, output_tx);
        spawn_writer(writer, input_rx);
        spawn_waiter(child_pid, exit_tx);

        Ok((
            Self {
                master: pair.master,
                input_tx,
                child_pid,
                _child: child,
            },
            PtyStreams { output_rx, exit_rx },
        ))
    }

    /// OS pid of the child
    pub fn pid(&self) -> i32 {
        self.child_pid
    }

    /// Queue bytes for the master fd. The writer thread retries until the
    /// buffer drains or the fd breaks.
    pub async fn write(&self, bytes: Vec<u8>) -> PtyResult<()> {
        self.input_tx
            .send(bytes)
            .await
            .map_err(|_| PtyError::WriteBroken)
    }

    /// Window-size ioctl on the master fd
    #[instrument(skip(self), fields(pid = self.child_pid))]
    pub fn resize(&self, cols: u16, rows: u16) -> PtyResult<()> {
        if !(MIN_DIMENSION..=MAX_DIMENSION).contains(&cols)
            || !(MIN_DIMENSION..=MAX_DIMENSION).contains(&rows)
        {
            return Err(PtyError::ResizeFailed {
                reason: format!("geometry {cols}x{rows} out of bounds"),
            });
        }
        self.master
            .resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::ResizeFailed {
                reason: e.to_string(),
            })
    }

    /// SIGTERM to the child's process group
    pub fn terminate_graceful(&self) {
        self.signal_group(Signal::SIGTERM);
    }

    /// SIGKILL to the child's process group
    pub fn terminate_forced(&self) {
        self.signal_group(Signal::SIGKILL);
    }

    fn signal_group(&self, signal: Signal) {
        // The child is its session leader, so pid doubles as pgid. ESRCH
        // just means it is already gone.
        match killpg(Pid::from_raw(self.child_pid), signal) {
            Ok(()) => debug!(pid = self.child_pid, ?signal, "signalled child group"),
            Err(nix::errno::Errno::ESRCH) => {
                debug!(pid = self.child_pid, ?signal, "child group already gone")
            }
            Err(e) => warn!(pid = self.child_pid, ?signal, error = %e, "killpg failed"),
        }
    }
}

fn spawn_reader(mut reader: Box<dyn Read + Send>, output_tx: mpsc::Sender<Vec<u8>>) {
    thread::Builder::new()
        .name("pty-reader".to_string())
        .spawn(move || {
            let mut buf = vec![0u8; READ_BUF_SIZE];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => {
                        debug!("PTY master reached EOF");
                        break;
                    }
                    Ok(n) => {
                        trace!(bytes = n, "PTY read");
                        if output_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(10));
                    }
                    Err(e) => {
                        debug!(error = %e, "PTY read failed, closing output stream");
                        break;
                    }
                }
            }
            // Dropping output_tx is the done signal to the broker.
        })
        .ok();
}

fn spawn_writer(mut writer: Box<dyn Write + Send>, mut input_rx: mpsc::Receiver<Vec<u8>>) {
    thread::Builder::new()
        .name("pty-writer".to_string())
        .spawn(move || {
            while let Some(data) = input_rx.blocking_recv() {
                if let Err(e) = write_all_retrying(&mut *writer, &data) {
                    debug!(error = %e, "PTY write failed, stopping writer");
                    break;
                }
                trace!(bytes = data.len(), "PTY write");
            }
        })
        .ok();
}

/// Drain `data` into the writer, backing off on short or would-block writes
fn write_all_retrying(writer: &mut dyn Write, data: &[u8]) -> std::io::Result<()> {
    let mut remaining = data;
    while !remaining.is_empty() {
        match writer.write(remaining) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    "PTY master accepted no bytes",
                ))
            }
            Ok(n) => remaining = &remaining[n..],
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(1));
            }
            Err(e) => return Err(e),
        }
    }
    writer.flush()
}

fn spawn_waiter(child_pid: i32, exit_tx: mpsc::Sender<i32>) {
    thread::Builder::new()
        .name("pty-waiter".to_string())
        .spawn(move || {
            let pid = Pid::from_raw(child_pid);
            loop {
                match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
                    Ok(WaitStatus::Exited(_, code)) => {
                        debug!(pid = child_pid, code, "child exited");
                        let _ = exit_tx.blocking_send(code);
                        break;
                    }
                    Ok(WaitStatus::Signaled(_, signal, _)) => {
                        debug!(pid = child_pid, ?signal, "child killed by signal");
                        let _ = exit_tx.blocking_send(-(signal as i32));
                        break;
                    }
                    Ok(WaitStatus::StillAlive) => {
                        thread::sleep(WAIT_POLL_INTERVAL);
                    }
                    Ok(_) => {
                        // Stopped/continued; keep polling.
                        thread::sleep(WAIT_POLL_INTERVAL);
                    }
                    Err(nix::errno::Errno::ECHILD) => {
                        warn!(pid = child_pid, "child already reaped elsewhere");
                        let _ = exit_tx.blocking_send(-1);
                        break;
                    }
                    Err(e) => {
                        warn!(pid = child_pid, error = %e, "waitpid failed");
                        let _ = exit_tx.blocking_send(-1);
                        break;
                    }
                }
            }
        })
        .ok();
}
