//! PTY lifecycle and raw I/O.

pub mod driver;

pub use driver::{PtyDriver, PtyStreams, MAX_DIMENSION, MIN_DIMENSION, READ_BUF_SIZE};
