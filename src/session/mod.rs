//! Session: PTY + terminal model + broker + exit coordination.
//!
//! [`Session::spawn`] wires the pieces together: it creates the rendezvous
//! FIFO path, spawns the child under the wait-exit wrapper, starts the FIFO
//! watcher, and launches the broker task. The returned [`SessionHandle`] is
//! the client's front door.

mod broker;
pub mod client;
pub mod command;
pub mod event;
mod exit;
mod subscriber;

pub use broker::{SessionState, HEARTBEAT_INTERVAL, QUIESCENCE_TICK};
pub use client::SessionHandle;
pub use command::Command;
pub use event::{
    DebugData, Event, EventKind, EventKindSet, ExitCodeData, InitData, OutputData, PidData,
    ResizeData, SnapshotData,
};
pub use exit::{helper_bin, wait_exit, wrapper_command, FIFO_POLL_INTERVAL};
pub use subscriber::{Subscription, SUBSCRIBER_QUEUE_SIZE};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result, SessionError};
use crate::pty::driver::PtyDriver;
use crate::term::TerminalModel;
use broker::Broker;
use exit::ExitRendezvous;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::instrument;

/// Command queue depth between clients and the broker
pub const COMMAND_CHANNEL_SIZE: usize = 1024;

/// A live engine instance
pub struct Session {
    handle: SessionHandle,
    broker_task: JoinHandle<Result<()>>,
}

impl Session {
    /// Spawn the child under a PTY and start the broker.
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(skip(config), fields(command = ?config.command, cols = config.cols, rows = config.rows))]
    pub fn spawn(config: EngineConfig) -> Result<Self> {
        let rendezvous = ExitRendezvous::new()?;
        let helper = helper_bin().map_err(EngineError::Io)?;
        let user_command = config.command.join(" ");
        let wrapper = wrapper_command(&user_command, &helper, rendezvous.fifo_path());

        let (driver, streams) = PtyDriver::spawn(&config, &wrapper)?;
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        rendezvous.spawn_watcher(command_tx.clone());

        let model = TerminalModel::new(
            config.cols as usize,
            config.rows as usize,
            config.scrollback,
        );
        let handle = SessionHandle::new(command_tx, config.timeouts.clone(), driver.pid());
        let broker = Broker::new(config, model, driver, rendezvous);
        let broker_task = tokio::spawn(broker.run(command_rx, streams));

        Ok(Self {
            handle,
            broker_task,
        })
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Wait for the broker task to finish (after an `exit` command or once
    /// every client handle is gone)
    pub async fn join(self) -> Result<()> {
        drop(self.handle);
        self.broker_task
            .await
            .map_err(|_| EngineError::Session(SessionError::SessionClosed))?
    }
}
