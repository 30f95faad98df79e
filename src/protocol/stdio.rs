//! The stdio front-end: JSON commands in, JSON events out.
//!
//! One JSON object per line on stdin is decoded into a command; every event
//! the session emits is written to stdout as one JSON line. Malformed input
//! is rejected with a `protocolError` debug event and does not advance
//! state.

use super::WireCommand;
use crate::error::{EngineError, ProtocolError, Result};
use crate::session::{Command, EventKind, EventKindSet, SessionHandle};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

/// Bridge a session to stdin/stdout until the session shuts down.
pub async fn run(handle: SessionHandle) -> Result<()> {
    let reader_handle = {
        let handle = handle.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if dispatch_line(&handle, &line).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        // Commands may still be buffered; the session keeps
                        // running until it is told to exit.
                        debug!("stdin closed; no further commands");
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        })
    };

    let mut stdout = tokio::io::stdout();
    let mut kinds = EventKindSet::ALL;
    loop {
        let Ok(mut subscription) = handle.subscribe(kinds).await else {
            // The broker is gone; nothing more to stream.
            break;
        };
        while let Some(event) = subscription.next().await {
            let mut line = serde_json::to_string(&event).map_err(|e| {
                EngineError::Protocol(ProtocolError::Malformed {
                    reason: e.to_string(),
                })
            })?;
            line.push('\n');
            stdout.write_all(line.as_bytes()).await?;
            stdout.flush().await?;
        }
        // The stream closes once the exit code has been delivered, but the
        // engine stays alive for post-mortem traffic; keep serving it on a
        // fresh subscription that cannot repeat init/pid/exitCode.
        kinds = EventKindSet::empty()
            .with(EventKind::Output)
            .with(EventKind::Snapshot)
            .with(EventKind::Resize)
            .with(EventKind::Debug);
    }

    reader_handle.abort();
    Ok(())
}

async fn dispatch_line(
    handle: &SessionHandle,
    line: &str,
) -> std::result::Result<(), crate::error::SessionError> {
    match serde_json::from_str::<WireCommand>(line) {
        Ok(WireCommand::SendKeys { keys }) => handle.submit(Command::SendKeys(keys)).await,
        Ok(WireCommand::TakeSnapshot) => handle.submit(Command::TakeSnapshot).await,
        Ok(WireCommand::Resize { cols, rows }) => {
            handle.submit(Command::Resize { cols, rows }).await
        }
        Ok(WireCommand::Exit) => handle.submit(Command::Exit).await,
        Ok(WireCommand::Debug { tag }) => handle.submit(Command::Debug(tag)).await,
        Err(e) => {
            warn!(error = %e, "malformed command line");
            handle.debug(format!("protocolError:{e}")).await
        }
    }
}
