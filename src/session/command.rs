//! Commands accepted by the session broker.

use super::event::EventKindSet;
use super::subscriber::Subscription;
use std::path::PathBuf;
use tokio::sync::oneshot;

/// A command submitted to the broker.
///
/// Commands are processed strictly in FIFO order; acceptance into the queue
/// is the acknowledgment.
#[derive(Debug)]
pub enum Command {
    /// Translate and inject keys into the child
    SendKeys(Vec<String>),
    /// Emit a snapshot event reflecting all output received so far
    TakeSnapshot,
    /// Resize the PTY and the terminal model
    Resize { cols: u16, rows: u16 },
    /// Register a subscriber; the subscription is delivered on `ack`
    Subscribe {
        kinds: EventKindSet,
        ack: oneshot::Sender<Subscription>,
    },
    /// Begin graceful shutdown
    Exit,
    /// Round-trip a diagnostic tag
    Debug(String),
    /// The child's user command finished and the exit helper is blocked on
    /// the rendezvous FIFO (internal; produced by the FIFO watcher)
    CommandCompleted(PathBuf),
}
