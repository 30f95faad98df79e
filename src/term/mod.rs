//! Terminal Model: the in-memory screen driven by child output.
//!
//! Consumes raw output bytes through a VT/ANSI state machine and produces
//! plain-text and styled snapshots. Owned exclusively by the session broker;
//! nothing here is shared across tasks.

pub mod interpreter;
pub mod screen;
pub mod style;

pub use screen::{Cell, Screen, StyledRun};
pub use style::{Color, Style};

use serde::{Deserialize, Serialize};

/// Cursor position and visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub row: usize,
    /// May equal `cols` when a wrap is pending
    pub col: usize,
    pub visible: bool,
}

/// An immutable rendering of the screen at an instant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub cols: usize,
    pub rows: usize,
    /// Rows padded to `cols` with spaces, joined by newlines
    pub text: String,
    /// SGR-annotated rendition; feeding it into a fresh model of the same
    /// geometry reproduces `text`
    pub seq: String,
}

/// The terminal model: a VT parser over a [`Screen`]
pub struct TerminalModel {
    parser: vte::Parser,
    screen: Screen,
}

impl TerminalModel {
    pub fn new(cols: usize, rows: usize, scrollback_cap: usize) -> Self {
        Self {
            parser: vte::Parser::new(),
            screen: Screen::new(cols, rows, scrollback_cap),
        }
    }

    /// Advance the state machine. Never fails; malformed sequences are
    /// dropped.
    pub fn feed(&mut self, bytes: &[u8]) {
        for byte in bytes {
            self.parser.advance(&mut self.screen, *byte);
        }
    }

    /// Produce a plain and styled snapshot of the visible screen
    pub fn snapshot(&self) -> Snapshot {
        let (cols, rows) = self.screen.size();
        Snapshot {
            cols,
            rows,
            text: self.screen.text(),
            seq: self.screen.dump_seq(),
        }
    }

    /// Styled runs of the visible screen
    pub fn styled_runs(&self) -> Vec<StyledRun> {
        self.screen.styled_runs()
    }

    /// Resize the grid, preserving content and scrollback where possible
    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.screen.resize(cols, rows);
    }

    pub fn cursor(&self) -> Cursor {
        let (row, col, visible) = self.screen.cursor();
        Cursor { row, col, visible }
    }

    pub fn size(&self) -> (usize, usize) {
        self.screen.size()
    }

    /// DECCKM state, consulted for arrow-key translation
    pub fn app_cursor_keys(&self) -> bool {
        self.screen.app_cursor_keys()
    }
}
