//! Error types for the terminal-session engine.
//!
//! Centralized error handling using thiserror for type-safe errors.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("PTY error: {0}")]
    Pty(#[from] PtyError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// PTY-related errors
#[derive(Error, Debug)]
pub enum PtyError {
    #[error("Failed to allocate PTY: {reason}")]
    PtyAllocFailed { reason: String },

    #[error("Failed to spawn child: {reason}")]
    SpawnFailed { reason: String },

    #[error("PTY write channel is broken")]
    WriteBroken,

    #[error("PTY resize failed: {reason}")]
    ResizeFailed { reason: String },

    #[error("PTY I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Session and broker errors surfaced to clients
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Unrecognized key name: '{name}'")]
    BadKey { name: String },

    #[error("Operation '{operation}' timed out after {timeout:?}")]
    TimedOut {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("Child process has already exited")]
    ChildExited,

    #[error("Subscriber queue overran its capacity")]
    SubscriberOverrun,

    #[error("PTY is broken; command cannot be delivered")]
    PtyBroken,

    #[error("Session has shut down")]
    SessionClosed,
}

/// Wire protocol errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed command: {reason}")]
    Malformed { reason: String },

    #[error("Protocol I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Result type alias for PTY operations
pub type PtyResult<T> = std::result::Result<T, PtyError>;

/// Result type alias for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;
