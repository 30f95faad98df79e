//! Typed events fanned out to subscribers.
//!
//! Events serialize directly into the wire shape
//! `{ "type": <kind>, "data": <payload> }`.

use serde::{Deserialize, Serialize};

/// The kinds of events a subscriber can request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    Init,
    Pid,
    Output,
    Snapshot,
    Resize,
    ExitCode,
    Debug,
}

impl EventKind {
    const ALL_KINDS: [EventKind; 7] = [
        EventKind::Init,
        EventKind::Pid,
        EventKind::Output,
        EventKind::Snapshot,
        EventKind::Resize,
        EventKind::ExitCode,
        EventKind::Debug,
    ];

    fn bit(self) -> u8 {
        match self {
            EventKind::Init => 1 << 0,
            EventKind::Pid => 1 << 1,
            EventKind::Output => 1 << 2,
            EventKind::Snapshot => 1 << 3,
            EventKind::Resize => 1 << 4,
            EventKind::ExitCode => 1 << 5,
            EventKind::Debug => 1 << 6,
        }
    }
}

/// A compact set of requested event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventKindSet(u8);

impl EventKindSet {
    pub const ALL: EventKindSet = EventKindSet(0x7f);

    pub fn empty() -> Self {
        EventKindSet(0)
    }

    pub fn with(self, kind: EventKind) -> Self {
        EventKindSet(self.0 | kind.bit())
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        EventKind::ALL_KINDS
            .iter()
            .copied()
            .filter(|k| self.contains(*k))
            .collect()
    }
}

impl FromIterator<EventKind> for EventKindSet {
    fn from_iter<I: IntoIterator<Item = EventKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

/// Initial catch-up state delivered to a new subscriber
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitData {
    pub cols: usize,
    pub rows: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pid: Option<i32>,
    pub text: String,
    pub seq: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PidData {
    pub pid: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputData {
    /// Raw terminal bytes, UTF-8 with escape sequences preserved
    pub seq: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotData {
    pub cols: usize,
    pub rows: usize,
    /// Plain text: rows padded to `cols`, joined by newlines
    pub text: String,
    /// Styled rendition, suitable for re-feeding into a terminal
    pub seq: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResizeData {
    pub cols: u16,
    pub rows: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitCodeData {
    /// Negative for signal-terminated children
    pub exit_code: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugData {
    pub tag: String,
}

/// An event emitted by the broker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Event {
    Init(InitData),
    Pid(PidData),
    Output(OutputData),
    Snapshot(SnapshotData),
    Resize(ResizeData),
    ExitCode(ExitCodeData),
    Debug(DebugData),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Init(_) => EventKind::Init,
            Event::Pid(_) => EventKind::Pid,
            Event::Output(_) => EventKind::Output,
            Event::Snapshot(_) => EventKind::Snapshot,
            Event::Resize(_) => EventKind::Resize,
            Event::ExitCode(_) => EventKind::ExitCode,
            Event::Debug(_) => EventKind::Debug,
        }
    }

    pub fn debug<S: Into<String>>(tag: S) -> Self {
        Event::Debug(DebugData { tag: tag.into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_set_operations() {
        let set = EventKindSet::empty()
            .with(EventKind::Output)
            .with(EventKind::ExitCode);
        assert!(set.contains(EventKind::Output));
        assert!(set.contains(EventKind::ExitCode));
        assert!(!set.contains(EventKind::Pid));
        assert_eq!(set.kinds(), vec![EventKind::Output, EventKind::ExitCode]);
    }

    #[test]
    fn test_kind_set_all() {
        for kind in [
            EventKind::Init,
            EventKind::Pid,
            EventKind::Output,
            EventKind::Snapshot,
            EventKind::Resize,
            EventKind::ExitCode,
            EventKind::Debug,
        ] {
            assert!(EventKindSet::ALL.contains(kind));
        }
    }

    #[test]
    fn test_event_wire_shape() {
        let event = Event::ExitCode(ExitCodeData { exit_code: -15 });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "exitCode", "data": {"exitCode": -15}})
        );

        let event = Event::Pid(PidData { pid: 123 });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, serde_json::json!({"type": "pid", "data": {"pid": 123}}));
    }

    #[test]
    fn test_output_event_preserves_escapes() {
        let event = Event::Output(OutputData {
            seq: "\u{1b}[1mhi\u{1b}[0m".to_string(),
        });
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_snapshot_event_fields() {
        let event = Event::Snapshot(SnapshotData {
            cols: 4,
            rows: 1,
            text: "hi  ".to_string(),
            seq: "hi".to_string(),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["data"]["text"], "hi  ");
        assert_eq!(json["data"]["seq"], "hi");
    }
}
