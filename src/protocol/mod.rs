//! JSON-lines wire protocol.

pub mod stdio;

use serde::Deserialize;

/// A client command as decoded from one line of JSON
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WireCommand {
    SendKeys { keys: Vec<String> },
    TakeSnapshot,
    Resize { cols: u16, rows: u16 },
    Exit,
    Debug { tag: String },
}
