//! termpilot: headless terminal automation engine.
//!
//! Spawns a child program under a pseudoterminal, interprets its output
//! through a VT/ANSI screen model, and exposes the screen state to an
//! automating client that injects keys, takes snapshots, and waits for
//! patterns. The engine is library-first; the binary adds a JSON-lines
//! stdio front-end and the `wait-exit` rendezvous helper.
//!
//! ```no_run
//! use termpilot::config::EngineConfig;
//! use termpilot::session::Session;
//!
//! # async fn demo() -> termpilot::error::Result<()> {
//! let session = Session::spawn(EngineConfig::for_command(vec!["cat"], 80, 24))?;
//! let handle = session.handle();
//! handle.send_keys(["hello", "Enter"]).await?;
//! let snapshot = handle.snapshot().await?;
//! assert!(snapshot.text.starts_with("hello"));
//! handle.exit().await?;
//! session.join().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod keys;
pub mod logging;
pub mod protocol;
pub mod pty;
pub mod session;
pub mod term;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use session::{Session, SessionHandle};
