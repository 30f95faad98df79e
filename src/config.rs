//! Engine configuration.
//!
//! Configuration is constructed by the embedding client (or the thin CLI
//! front-end) and handed to [`crate::session::Session::spawn`]. The engine
//! never reads configuration from disk.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default terminal geometry
fn default_cols() -> u16 {
    120
}

fn default_rows() -> u16 {
    40
}

fn default_command() -> Vec<String> {
    vec!["bash".to_string()]
}

fn default_true() -> bool {
    true
}

/// Default scrollback cap in lines
fn default_scrollback() -> usize {
    10_000
}

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Terminal width in columns
    #[serde(default = "default_cols")]
    pub cols: u16,
    /// Terminal height in rows
    #[serde(default = "default_rows")]
    pub rows: u16,
    /// Command to run inside the terminal (argv; joined for the shell wrapper)
    #[serde(default = "default_command")]
    pub command: Vec<String>,
    /// Extra environment variables for the child
    #[serde(default)]
    pub env: Vec<(String, String)>,
    /// Consider the session Running only after the first PTY read
    #[serde(default = "default_true")]
    pub start_on_output: bool,
    /// Scrollback cap in lines (0 = unlimited)
    #[serde(default = "default_scrollback")]
    pub scrollback: usize,
    /// Timeout knobs
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cols: default_cols(),
            rows: default_rows(),
            command: default_command(),
            env: Vec::new(),
            start_on_output: true,
            scrollback: default_scrollback(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration for running `command` at the given geometry
    pub fn for_command<S: Into<String>>(command: Vec<S>, cols: u16, rows: u16) -> Self {
        Self {
            cols,
            rows,
            command: command.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

fn default_snapshot_timeout_ms() -> u64 {
    5_000
}

fn default_exit_timeout_ms() -> u64 {
    5_000
}

fn default_expect_timeout_ms() -> u64 {
    5_000
}

fn default_subprocess_wait_timeout_ms() -> u64 {
    2_000
}

fn default_graceful_termination_timeout_ms() -> u64 {
    5_000
}

fn default_quiescence_window_ms() -> u64 {
    200
}

/// Timeouts for blocking client-facing operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_snapshot_timeout_ms")]
    pub snapshot_ms: u64,
    #[serde(default = "default_exit_timeout_ms")]
    pub exit_ms: u64,
    #[serde(default = "default_expect_timeout_ms")]
    pub expect_ms: u64,
    #[serde(default = "default_subprocess_wait_timeout_ms")]
    pub subprocess_wait_ms: u64,
    #[serde(default = "default_graceful_termination_timeout_ms")]
    pub graceful_termination_ms: u64,
    /// Command-channel quiescence required before releasing the exit helper
    #[serde(default = "default_quiescence_window_ms")]
    pub quiescence_window_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            snapshot_ms: default_snapshot_timeout_ms(),
            exit_ms: default_exit_timeout_ms(),
            expect_ms: default_expect_timeout_ms(),
            subprocess_wait_ms: default_subprocess_wait_timeout_ms(),
            graceful_termination_ms: default_graceful_termination_timeout_ms(),
            quiescence_window_ms: default_quiescence_window_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn snapshot(&self) -> Duration {
        Duration::from_millis(self.snapshot_ms)
    }

    pub fn exit(&self) -> Duration {
        Duration::from_millis(self.exit_ms)
    }

    pub fn expect(&self) -> Duration {
        Duration::from_millis(self.expect_ms)
    }

    pub fn subprocess_wait(&self) -> Duration {
        Duration::from_millis(self.subprocess_wait_ms)
    }

    pub fn graceful_termination(&self) -> Duration {
        Duration::from_millis(self.graceful_termination_ms)
    }

    pub fn quiescence_window(&self) -> Duration {
        Duration::from_millis(self.quiescence_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.cols, 120);
        assert_eq!(config.rows, 40);
        assert_eq!(config.command, vec!["bash".to_string()]);
        assert!(config.start_on_output);
        assert_eq!(config.scrollback, 10_000);
    }

    #[test]
    fn test_default_timeouts() {
        let timeouts = TimeoutConfig::default();
        assert_eq!(timeouts.snapshot(), Duration::from_secs(5));
        assert_eq!(timeouts.subprocess_wait(), Duration::from_secs(2));
        assert_eq!(timeouts.quiescence_window(), Duration::from_millis(200));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig = serde_json::from_str(r#"{"cols": 80, "rows": 24}"#).unwrap();
        assert_eq!(config.cols, 80);
        assert_eq!(config.rows, 24);
        assert_eq!(config.command, vec!["bash".to_string()]);
        assert_eq!(config.timeouts.exit_ms, 5_000);
    }

    #[test]
    fn test_for_command() {
        let config = EngineConfig::for_command(vec!["echo", "hello"], 10, 3);
        assert_eq!(config.cols, 10);
        assert_eq!(config.rows, 3);
        assert_eq!(config.command, vec!["echo", "hello"]);
    }
}
