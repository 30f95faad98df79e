//! Exit rendezvous: FIFO creation, watching, and release.
//!
//! Completion detection is decoupled from engine shutdown. The child runs
//! under a shell wrapper that invokes the `wait-exit` helper once the user
//! command finishes; the helper creates a FIFO and blocks reading it. The
//! FIFO's existence is the completion signal; a single `exit` line releases
//! the helper so the shell can return the preserved exit status.

use super::command::Command;
use crate::error::{EngineError, Result};
use nix::sys::stat::Mode;
use nix::unistd::mkfifo;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// How often the watcher polls for the FIFO's existence
pub const FIFO_POLL_INTERVAL: Duration = Duration::from_millis(50);

const FIFO_NAME: &str = "wait-exit.fifo";

/// The engine side of the rendezvous: owns the FIFO path and its one-shot
/// writer.
pub struct ExitRendezvous {
    // Removing the directory on drop unlinks the FIFO with it.
    _dir: TempDir,
    fifo_path: PathBuf,
    signaled: bool,
}

impl ExitRendezvous {
    pub fn new() -> Result<Self> {
        let dir = TempDir::with_prefix("termpilot-").map_err(EngineError::Io)?;
        let fifo_path = dir.path().join(FIFO_NAME);
        Ok(Self {
            _dir: dir,
            fifo_path,
            signaled: false,
        })
    }

    pub fn fifo_path(&self) -> &Path {
        &self.fifo_path
    }

    /// Poll until the FIFO appears, then notify the broker once.
    pub fn spawn_watcher(&self, command_tx: mpsc::Sender<Command>) -> JoinHandle<()> {
        let path = self.fifo_path.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(FIFO_POLL_INTERVAL);
            loop {
                interval.tick().await;
                if path.exists() {
                    let _ = command_tx.send(Command::CommandCompleted(path)).await;
                    break;
                }
                if command_tx.is_closed() {
                    break;
                }
            }
        })
    }

    /// Write `exit\n` to the FIFO, releasing the helper. At most one write
    /// happens per session; repeats are suppressed.
    ///
    /// Returns whether the write happened now.
    pub async fn signal(&mut self) -> bool {
        if self.signaled {
            return false;
        }
        self.signaled = true;

        let path = self.fifo_path.clone();
        let result = tokio::task::spawn_blocking(move || write_release(&path)).await;

        match result {
            Ok(Ok(())) => {
                debug!("exit signal written to rendezvous FIFO");
                true
            }
            Ok(Err(e)) => {
                warn!(error = %e, "failed to write exit signal");
                true
            }
            Err(e) => {
                warn!(error = %e, "exit signal task failed");
                true
            }
        }
    }

    pub fn signaled(&self) -> bool {
        self.signaled
    }
}

/// Open the FIFO for writing without blocking and send the release line.
///
/// A blocking open could hang forever if the helper died between creating
/// the FIFO and reading it; ENXIO (no reader yet) is retried briefly
/// instead.
fn write_release(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let deadline = std::time::Instant::now() + Duration::from_secs(1);
    loop {
        match std::fs::OpenOptions::new()
            .write(true)
            .custom_flags(nix::libc::O_NONBLOCK)
            .open(path)
        {
            Ok(mut file) => {
                file.write_all(b"exit\n")?;
                return Ok(());
            }
            Err(e)
                if e.raw_os_error() == Some(nix::libc::ENXIO)
                    && std::time::Instant::now() < deadline =>
            {
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(e) => return Err(e),
        }
    }
}

/// The `wait-exit` helper: create the FIFO (mode 0600) if absent, then read
/// lines until one equals `exit`.
pub fn wait_exit(path: &Path) -> std::io::Result<()> {
    match mkfifo(path, Mode::S_IRUSR | Mode::S_IWUSR) {
        Ok(()) => {}
        Err(nix::errno::Errno::EEXIST) => {}
        Err(e) => return Err(std::io::Error::from(e)),
    }

    // Opening blocks until the engine opens the write side.
    let file = std::fs::File::open(path)?;
    for line in BufReader::new(file).lines() {
        if line?.trim() == "exit" {
            break;
        }
    }
    Ok(())
}

/// Path of the helper binary referenced by the spawn wrapper.
///
/// `TERMPILOT_HELPER_BIN` is a test-only override.
pub fn helper_bin() -> std::io::Result<PathBuf> {
    if let Ok(path) = std::env::var("TERMPILOT_HELPER_BIN") {
        return Ok(PathBuf::from(path));
    }
    std::env::current_exe()
}

/// Build the shell wrapper that preserves the user command's exit status
/// across the rendezvous.
pub fn wrapper_command(user_command: &str, helper: &Path, fifo: &Path) -> String {
    format!(
        "{user_command}; ec=$?; {} wait-exit {}; exit $ec",
        shell_quote(&helper.to_string_lossy()),
        shell_quote(&fifo.to_string_lossy()),
    )
}

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_path_is_unique_per_session() {
        let a = ExitRendezvous::new().unwrap();
        let b = ExitRendezvous::new().unwrap();
        assert_ne!(a.fifo_path(), b.fifo_path());
        assert!(!a.fifo_path().exists());
    }

    #[test]
    fn test_wrapper_command_shape() {
        let wrapper = wrapper_command(
            "echo hello",
            Path::new("/usr/bin/termpilot"),
            Path::new("/tmp/x/wait-exit.fifo"),
        );
        assert_eq!(
            wrapper,
            "echo hello; ec=$?; '/usr/bin/termpilot' wait-exit '/tmp/x/wait-exit.fifo'; exit $ec"
        );
    }

    #[test]
    fn test_shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("a'b"), r"'a'\''b'");
    }

    #[tokio::test]
    async fn test_helper_roundtrip() {
        let mut rendezvous = ExitRendezvous::new().unwrap();
        let path = rendezvous.fifo_path().to_path_buf();

        let helper = std::thread::spawn(move || wait_exit(&path));

        // Wait for the helper to create the FIFO, as the watcher would.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while !rendezvous.fifo_path().exists() {
            assert!(std::time::Instant::now() < deadline, "FIFO never appeared");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(rendezvous.signal().await);
        // Repeated signals are suppressed.
        assert!(!rendezvous.signal().await);
        assert!(rendezvous.signaled());

        helper.join().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_watcher_reports_completion() {
        let rendezvous = ExitRendezvous::new().unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let watcher = rendezvous.spawn_watcher(tx);

        // Nothing before the FIFO exists.
        assert!(
            tokio::time::timeout(Duration::from_millis(120), rx.recv())
                .await
                .is_err()
        );

        mkfifo(rendezvous.fifo_path(), Mode::S_IRUSR | Mode::S_IWUSR).unwrap();
        match tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
        {
            Some(Command::CommandCompleted(path)) => {
                assert_eq!(path, rendezvous.fifo_path());
            }
            other => panic!("unexpected: {other:?}"),
        }
        watcher.await.unwrap();
    }
}
