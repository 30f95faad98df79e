//! Logging system initialization.
//!
//! Uses the tracing ecosystem for structured logging. Console output goes to
//! stderr because stdout carries the JSON event protocol. Optional file
//! output with daily rotation.
//!
//! # Environment Variables
//! - `TERMPILOT_LOG`: full filter override (e.g. "termpilot=debug,termpilot::pty=trace")
//! - `TERMPILOT_LOG_LEVEL`: simple level override (trace, debug, info, warn, error)
//! - `TERMPILOT_LOG_PATH`: enable file output into the given directory

use std::path::PathBuf;
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default log level
    pub level: Level,
    /// Show timestamps on console output
    pub timestamps: bool,
    /// Log file directory; None disables file output unless the env override is set
    pub file_path: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            timestamps: true,
            file_path: None,
        }
    }
}

/// Initialize the logging system.
///
/// Safe to call once per process; subsequent calls are ignored.
pub fn init_logging(config: &LoggingConfig) {
    let effective_level = std::env::var("TERMPILOT_LOG_LEVEL")
        .ok()
        .and_then(|s| parse_level(&s))
        .unwrap_or(config.level);

    let env_filter = EnvFilter::try_from_env("TERMPILOT_LOG").unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "termpilot={}",
            effective_level.as_str().to_lowercase()
        ))
    });

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(false);

    let console_layer = if config.timestamps {
        console_layer.boxed()
    } else {
        console_layer.without_time().boxed()
    };

    let file_layer = std::env::var("TERMPILOT_LOG_PATH")
        .ok()
        .map(PathBuf::from)
        .or_else(|| config.file_path.clone())
        .and_then(|log_dir| {
            if let Err(e) = std::fs::create_dir_all(&log_dir) {
                eprintln!("warning: failed to create log directory {log_dir:?}: {e}");
                return None;
            }
            let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, "termpilot.log");
            Some(
                fmt::layer()
                    .with_writer(file_appender)
                    .with_target(true)
                    .with_level(true)
                    .with_thread_ids(true)
                    .with_ansi(false)
                    .boxed(),
            )
        });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    tracing::debug!(level = %effective_level, "logging initialized");
}

/// Parse log level from string
fn parse_level(s: &str) -> Option<Level> {
    match s.to_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" | "warning" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        _ => None,
    }
}
