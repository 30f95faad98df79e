//! Terminal screen buffer.
//!
//! A logical grid of styled cells plus cursor, scroll region, tab stops,
//! scrollback, and the primary/alternate screen pair. All mutation happens
//! through the interpreter; the broker reads snapshots.

use super::style::Style;
use std::collections::VecDeque;
use unicode_width::UnicodeWidthChar;

/// A single cell in the terminal grid
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub style: Style,
    /// Leading cell of a double-width character
    pub wide: bool,
    /// Trailing filler cell of a double-width character
    pub continuation: bool,
    /// Combining marks attached to this cell
    pub combining: Vec<char>,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            style: Style::default(),
            wide: false,
            continuation: false,
            combining: Vec::new(),
        }
    }
}

impl Cell {
    fn styled(ch: char, style: Style) -> Self {
        Self {
            ch,
            style,
            ..Self::default()
        }
    }

    fn continuation(style: Style) -> Self {
        Self {
            ch: ' ',
            style,
            wide: false,
            continuation: true,
            combining: Vec::new(),
        }
    }
}

/// A horizontal run of equally-styled text, part of a styled snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct StyledRun {
    pub row: usize,
    pub col: usize,
    pub text: String,
    pub style: Style,
}

#[derive(Debug, Clone)]
struct SavedCursor {
    row: usize,
    col: usize,
    pen: Style,
    origin_mode: bool,
}

/// Primary-screen state parked while the alternate screen is active
struct ParkedPrimary {
    grid: Vec<Vec<Cell>>,
    scrollback: VecDeque<Vec<Cell>>,
    cursor_row: usize,
    cursor_col: usize,
    pending_wrap: bool,
    saved_cursor: Option<SavedCursor>,
}

/// Logical terminal screen
pub struct Screen {
    cols: usize,
    rows: usize,
    grid: Vec<Vec<Cell>>,
    scrollback: VecDeque<Vec<Cell>>,
    scrollback_cap: usize,
    cursor_row: usize,
    cursor_col: usize,
    /// Set after printing in the last column; the next print wraps first
    pending_wrap: bool,
    pen: Style,
    /// Scroll region, 0-indexed inclusive
    scroll_top: usize,
    scroll_bottom: usize,
    cursor_visible: bool,
    /// DECAWM
    autowrap: bool,
    /// DECOM
    origin_mode: bool,
    /// LNM: line feed implies carriage return
    newline_mode: bool,
    /// DECCKM
    app_cursor_keys: bool,
    tab_stops: Vec<bool>,
    saved_cursor: Option<SavedCursor>,
    parked_primary: Option<ParkedPrimary>,
}

fn blank_row(cols: usize) -> Vec<Cell> {
    vec![Cell::default(); cols]
}

fn default_tab_stops(cols: usize) -> Vec<bool> {
    (0..cols).map(|c| c % 8 == 0).collect()
}

impl Screen {
    pub fn new(cols: usize, rows: usize, scrollback_cap: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            cols,
            rows,
            grid: vec![blank_row(cols); rows],
            scrollback: VecDeque::new(),
            scrollback_cap,
            cursor_row: 0,
            cursor_col: 0,
            pending_wrap: false,
            pen: Style::default(),
            scroll_top: 0,
            scroll_bottom: rows - 1,
            cursor_visible: true,
            autowrap: true,
            origin_mode: false,
            newline_mode: false,
            app_cursor_keys: false,
            tab_stops: default_tab_stops(cols),
            saved_cursor: None,
            parked_primary: None,
        }
    }

    pub fn size(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    /// Cursor position; the column may equal `cols` when a wrap is pending
    pub fn cursor(&self) -> (usize, usize, bool) {
        let col = if self.pending_wrap {
            self.cols
        } else {
            self.cursor_col
        };
        (self.cursor_row, col, self.cursor_visible)
    }

    pub fn app_cursor_keys(&self) -> bool {
        self.app_cursor_keys
    }

    pub fn scrollback_len(&self) -> usize {
        self.scrollback.len()
    }

    // ------------------------------------------------------------------
    // Printing
    // ------------------------------------------------------------------

    pub fn put_char(&mut self, c: char) {
        let width = UnicodeWidthChar::width(c).unwrap_or(0);

        if width == 0 {
            self.attach_combining(c);
            return;
        }

        if width == 2 && self.cols < 2 {
            return;
        }

        if self.pending_wrap {
            if self.autowrap {
                self.wrap_to_next_line();
            } else {
                self.pending_wrap = false;
            }
        }

        // A wide character that would straddle the right margin wraps
        // (autowrap on) or is discarded (autowrap off).
        if width == 2 && self.cursor_col + 2 > self.cols {
            if self.autowrap {
                self.wrap_to_next_line();
            } else {
                return;
            }
        }

        let (row, col) = (self.cursor_row, self.cursor_col);
        self.clear_wide_at(row, col);
        if width == 2 {
            self.clear_wide_at(row, col + 1);
        }

        let mut cell = Cell::styled(c, self.pen);
        cell.wide = width == 2;
        self.grid[row][col] = cell;
        if width == 2 {
            self.grid[row][col + 1] = Cell::continuation(self.pen);
        }

        if col + width < self.cols {
            self.cursor_col = col + width;
        } else if self.autowrap {
            self.cursor_col = self.cols - 1;
            self.pending_wrap = true;
        } else {
            self.cursor_col = self.cols - width;
        }
    }

    /// Attach a combining mark to the most recently printed cell
    fn attach_combining(&mut self, c: char) {
        let row = self.cursor_row;
        let mut col = if self.pending_wrap {
            self.cursor_col
        } else if self.cursor_col > 0 {
            self.cursor_col - 1
        } else {
            return;
        };
        if self.grid[row][col].continuation && col > 0 {
            col -= 1;
        }
        self.grid[row][col].combining.push(c);
    }

    /// Overwriting half of a wide character blanks the other half
    fn clear_wide_at(&mut self, row: usize, col: usize) {
        if col >= self.cols {
            return;
        }
        if self.grid[row][col].continuation && col > 0 && self.grid[row][col - 1].wide {
            self.grid[row][col - 1] = Cell::default();
        }
        if self.grid[row][col].wide && col + 1 < self.cols {
            self.grid[row][col + 1] = Cell::default();
        }
    }

    fn wrap_to_next_line(&mut self) {
        self.pending_wrap = false;
        self.cursor_col = 0;
        self.linefeed_no_cr();
    }

    // ------------------------------------------------------------------
    // Control characters
    // ------------------------------------------------------------------

    pub fn linefeed(&mut self) {
        self.linefeed_no_cr();
        if self.newline_mode {
            self.carriage_return();
        }
    }

    fn linefeed_no_cr(&mut self) {
        self.pending_wrap = false;
        if self.cursor_row == self.scroll_bottom {
            self.scroll_up(1);
        } else if self.cursor_row + 1 < self.rows {
            self.cursor_row += 1;
        }
    }

    pub fn carriage_return(&mut self) {
        self.cursor_col = 0;
        self.pending_wrap = false;
    }

    pub fn backspace(&mut self) {
        if self.pending_wrap {
            self.pending_wrap = false;
        } else {
            self.cursor_col = self.cursor_col.saturating_sub(1);
        }
    }

    pub fn tab(&mut self) {
        self.pending_wrap = false;
        let mut col = self.cursor_col + 1;
        while col < self.cols && !self.tab_stops[col] {
            col += 1;
        }
        self.cursor_col = col.min(self.cols - 1);
    }

    pub fn backtab(&mut self, n: usize) {
        self.pending_wrap = false;
        for _ in 0..n.max(1) {
            let mut col = self.cursor_col;
            while col > 0 {
                col -= 1;
                if self.tab_stops[col] {
                    break;
                }
            }
            self.cursor_col = col;
        }
    }

    // ------------------------------------------------------------------
    // Cursor motion
    // ------------------------------------------------------------------

    pub fn cursor_up(&mut self, n: usize) {
        self.pending_wrap = false;
        let limit = if self.cursor_row >= self.scroll_top {
            self.scroll_top
        } else {
            0
        };
        self.cursor_row = self.cursor_row.saturating_sub(n.max(1)).max(limit);
    }

    pub fn cursor_down(&mut self, n: usize) {
        self.pending_wrap = false;
        let limit = if self.cursor_row <= self.scroll_bottom {
            self.scroll_bottom
        } else {
            self.rows - 1
        };
        self.cursor_row = (self.cursor_row + n.max(1)).min(limit);
    }

    pub fn cursor_forward(&mut self, n: usize) {
        self.pending_wrap = false;
        self.cursor_col = (self.cursor_col + n.max(1)).min(self.cols - 1);
    }

    pub fn cursor_back(&mut self, n: usize) {
        self.pending_wrap = false;
        self.cursor_col = self.cursor_col.saturating_sub(n.max(1));
    }

    /// Absolute cursor positioning, 0-indexed; honors DEC origin mode
    pub fn cursor_to(&mut self, row: usize, col: usize) {
        self.pending_wrap = false;
        if self.origin_mode {
            self.cursor_row = (self.scroll_top + row).min(self.scroll_bottom);
        } else {
            self.cursor_row = row.min(self.rows - 1);
        }
        self.cursor_col = col.min(self.cols - 1);
    }

    pub fn cursor_to_col(&mut self, col: usize) {
        self.pending_wrap = false;
        self.cursor_col = col.min(self.cols - 1);
    }

    pub fn cursor_to_row(&mut self, row: usize) {
        self.cursor_to(row, self.cursor_col);
    }

    /// Index: move down, scrolling at the bottom margin
    pub fn index(&mut self) {
        self.linefeed_no_cr();
    }

    /// Reverse index: move up, scrolling at the top margin
    pub fn reverse_index(&mut self) {
        self.pending_wrap = false;
        if self.cursor_row == self.scroll_top {
            self.scroll_down(1);
        } else {
            self.cursor_row = self.cursor_row.saturating_sub(1);
        }
    }

    pub fn next_line(&mut self) {
        self.linefeed_no_cr();
        self.carriage_return();
    }

    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some(SavedCursor {
            row: self.cursor_row,
            col: self.cursor_col,
            pen: self.pen,
            origin_mode: self.origin_mode,
        });
    }

    pub fn restore_cursor(&mut self) {
        self.pending_wrap = false;
        if let Some(saved) = self.saved_cursor.clone() {
            self.cursor_row = saved.row.min(self.rows - 1);
            self.cursor_col = saved.col.min(self.cols - 1);
            self.pen = saved.pen;
            self.origin_mode = saved.origin_mode;
        } else {
            self.cursor_row = 0;
            self.cursor_col = 0;
            self.pen = Style::default();
        }
    }

    // ------------------------------------------------------------------
    // Scrolling and line editing
    // ------------------------------------------------------------------

    pub fn scroll_up(&mut self, n: usize) {
        for _ in 0..n.max(1) {
            if self.scroll_top > self.scroll_bottom {
                break;
            }
            let evicted = self.grid.remove(self.scroll_top);
            self.grid.insert(self.scroll_bottom, blank_row(self.cols));
            // Only lines leaving the top of the primary screen are history.
            if self.scroll_top == 0 && self.parked_primary.is_none() {
                self.push_scrollback(evicted);
            }
        }
    }

    pub fn scroll_down(&mut self, n: usize) {
        for _ in 0..n.max(1) {
            if self.scroll_top > self.scroll_bottom {
                break;
            }
            self.grid.remove(self.scroll_bottom);
            self.grid.insert(self.scroll_top, blank_row(self.cols));
        }
    }

    fn push_scrollback(&mut self, line: Vec<Cell>) {
        self.scrollback.push_back(line);
        if self.scrollback_cap > 0 {
            while self.scrollback.len() > self.scrollback_cap {
                self.scrollback.pop_front();
            }
        }
    }

    pub fn insert_lines(&mut self, n: usize) {
        if self.cursor_row < self.scroll_top || self.cursor_row > self.scroll_bottom {
            return;
        }
        self.pending_wrap = false;
        for _ in 0..n.max(1).min(self.scroll_bottom - self.cursor_row + 1) {
            self.grid.remove(self.scroll_bottom);
            self.grid.insert(self.cursor_row, blank_row(self.cols));
        }
    }

    pub fn delete_lines(&mut self, n: usize) {
        if self.cursor_row < self.scroll_top || self.cursor_row > self.scroll_bottom {
            return;
        }
        self.pending_wrap = false;
        for _ in 0..n.max(1).min(self.scroll_bottom - self.cursor_row + 1) {
            self.grid.remove(self.cursor_row);
            self.grid.insert(self.scroll_bottom, blank_row(self.cols));
        }
    }

    pub fn insert_chars(&mut self, n: usize) {
        self.pending_wrap = false;
        let row = &mut self.grid[self.cursor_row];
        for _ in 0..n.max(1).min(self.cols - self.cursor_col) {
            row.pop();
            row.insert(self.cursor_col, Cell::default());
        }
    }

    pub fn delete_chars(&mut self, n: usize) {
        self.pending_wrap = false;
        let row = &mut self.grid[self.cursor_row];
        for _ in 0..n.max(1).min(self.cols - self.cursor_col) {
            row.remove(self.cursor_col);
            row.push(Cell::default());
        }
    }

    pub fn erase_chars(&mut self, n: usize) {
        self.pending_wrap = false;
        let end = (self.cursor_col + n.max(1)).min(self.cols);
        for col in self.cursor_col..end {
            self.grid[self.cursor_row][col] = Cell::default();
        }
    }

    // ------------------------------------------------------------------
    // Erasing
    // ------------------------------------------------------------------

    pub fn erase_line(&mut self, mode: u16) {
        self.pending_wrap = false;
        let row = &mut self.grid[self.cursor_row];
        let range = match mode {
            0 => self.cursor_col..self.cols,
            1 => 0..(self.cursor_col + 1).min(self.cols),
            2 => 0..self.cols,
            _ => return,
        };
        for col in range {
            row[col] = Cell::default();
        }
    }

    pub fn erase_display(&mut self, mode: u16) {
        self.pending_wrap = false;
        match mode {
            0 => {
                self.erase_line(0);
                for row in (self.cursor_row + 1)..self.rows {
                    self.grid[row] = blank_row(self.cols);
                }
            }
            1 => {
                self.erase_line(1);
                for row in 0..self.cursor_row {
                    self.grid[row] = blank_row(self.cols);
                }
            }
            2 | 3 => {
                for row in 0..self.rows {
                    self.grid[row] = blank_row(self.cols);
                }
                if mode == 3 {
                    self.scrollback.clear();
                }
            }
            _ => {}
        }
    }

    // ------------------------------------------------------------------
    // Modes and regions
    // ------------------------------------------------------------------

    pub fn pen(&self) -> Style {
        self.pen
    }

    pub fn set_pen(&mut self, pen: Style) {
        self.pen = pen;
    }

    /// DECSTBM; 0-indexed inclusive bounds. Homes the cursor.
    pub fn set_scroll_region(&mut self, top: usize, bottom: usize) {
        let top = top.min(self.rows - 1);
        let bottom = bottom.min(self.rows - 1);
        if top >= bottom {
            return;
        }
        self.scroll_top = top;
        self.scroll_bottom = bottom;
        self.cursor_to(0, 0);
    }

    pub fn set_autowrap(&mut self, on: bool) {
        self.autowrap = on;
        if !on {
            self.pending_wrap = false;
        }
    }

    pub fn set_origin_mode(&mut self, on: bool) {
        self.origin_mode = on;
        self.cursor_to(0, 0);
    }

    pub fn set_newline_mode(&mut self, on: bool) {
        self.newline_mode = on;
    }

    pub fn set_app_cursor_keys(&mut self, on: bool) {
        self.app_cursor_keys = on;
    }

    pub fn set_cursor_visible(&mut self, on: bool) {
        self.cursor_visible = on;
    }

    pub fn set_tab_stop(&mut self) {
        if self.cursor_col < self.cols {
            self.tab_stops[self.cursor_col] = true;
        }
    }

    pub fn clear_tab_stop(&mut self, mode: u16) {
        match mode {
            0 => {
                if self.cursor_col < self.cols {
                    self.tab_stops[self.cursor_col] = false;
                }
            }
            3 => self.tab_stops.iter_mut().for_each(|s| *s = false),
            _ => {}
        }
    }

    pub fn enter_alternate(&mut self, save_cursor: bool) {
        if self.parked_primary.is_some() {
            return;
        }
        if save_cursor {
            self.save_cursor();
        }
        let parked = ParkedPrimary {
            grid: std::mem::replace(&mut self.grid, vec![blank_row(self.cols); self.rows]),
            scrollback: std::mem::take(&mut self.scrollback),
            cursor_row: self.cursor_row,
            cursor_col: self.cursor_col,
            pending_wrap: self.pending_wrap,
            saved_cursor: self.saved_cursor.clone(),
        };
        self.parked_primary = Some(parked);
        self.cursor_row = 0;
        self.cursor_col = 0;
        self.pending_wrap = false;
    }

    pub fn exit_alternate(&mut self, restore_cursor: bool) {
        let Some(parked) = self.parked_primary.take() else {
            return;
        };
        self.grid = parked.grid;
        self.scrollback = parked.scrollback;
        self.cursor_row = parked.cursor_row.min(self.rows - 1);
        self.cursor_col = parked.cursor_col.min(self.cols - 1);
        self.pending_wrap = parked.pending_wrap;
        self.saved_cursor = parked.saved_cursor;
        if restore_cursor {
            self.restore_cursor();
        }
    }

    pub fn alternate_active(&self) -> bool {
        self.parked_primary.is_some()
    }

    /// RIS: full reset to initial state. Scrollback is dropped.
    pub fn reset(&mut self) {
        *self = Screen::new(self.cols, self.rows, self.scrollback_cap);
    }

    // ------------------------------------------------------------------
    // Resize
    // ------------------------------------------------------------------

    /// Resize the grid, truncating or padding rows and columns.
    ///
    /// Rows evicted from the top of a shrinking primary screen move into
    /// scrollback; the cursor is clamped into the new bounds.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        let cols = cols.max(1);
        let rows = rows.max(1);
        if cols == self.cols && rows == self.rows {
            return;
        }

        if rows < self.rows {
            let excess = self.rows - rows;
            for _ in 0..excess {
                let evicted = self.grid.remove(0);
                if self.parked_primary.is_none() {
                    self.push_scrollback(evicted);
                }
            }
            self.cursor_row = self.cursor_row.saturating_sub(excess);
        } else {
            for _ in 0..(rows - self.rows) {
                self.grid.push(blank_row(cols));
            }
        }

        for row in &mut self.grid {
            row.resize(cols, Cell::default());
            // Truncation may orphan the leading half of a wide character.
            if let Some(last) = row.last_mut() {
                if last.wide {
                    *last = Cell::default();
                }
            }
        }
        if let Some(parked) = &mut self.parked_primary {
            parked.grid.resize(rows, blank_row(cols));
            for row in &mut parked.grid {
                row.resize(cols, Cell::default());
            }
            parked.cursor_row = parked.cursor_row.min(rows - 1);
            parked.cursor_col = parked.cursor_col.min(cols - 1);
        }

        let mut tab_stops = default_tab_stops(cols);
        for (col, stop) in self.tab_stops.iter().enumerate().take(cols) {
            tab_stops[col] = *stop;
        }
        self.tab_stops = tab_stops;

        self.cols = cols;
        self.rows = rows;
        self.scroll_top = 0;
        self.scroll_bottom = rows - 1;
        self.cursor_row = self.cursor_row.min(rows - 1);
        self.cursor_col = self.cursor_col.min(cols - 1);
        self.pending_wrap = false;
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    /// One row as text with display width exactly `cols`; continuation
    /// cells are skipped and short rows are padded.
    pub fn row_text(&self, row: usize) -> String {
        let mut out = String::with_capacity(self.cols);
        let mut width = 0;
        for cell in &self.grid[row] {
            if cell.continuation {
                continue;
            }
            out.push(cell.ch);
            out.extend(cell.combining.iter());
            width += if cell.wide { 2 } else { 1 };
        }
        for _ in width..self.cols {
            out.push(' ');
        }
        out
    }

    /// Full-screen text: rows padded to `cols`, joined by newlines
    pub fn text(&self) -> String {
        (0..self.rows)
            .map(|row| self.row_text(row))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Styled runs in row-major order, covering every cell
    pub fn styled_runs(&self) -> Vec<StyledRun> {
        let mut runs = Vec::new();
        for (row_idx, row) in self.grid.iter().enumerate() {
            let mut col = 0;
            while col < self.cols {
                let style = row[col].style;
                let start = col;
                let mut text = String::new();
                while col < self.cols && row[col].style == style {
                    if !row[col].continuation {
                        text.push(row[col].ch);
                        text.extend(row[col].combining.iter());
                    }
                    col += 1;
                }
                runs.push(StyledRun {
                    row: row_idx,
                    col: start,
                    text,
                    style,
                });
            }
        }
        runs
    }

    /// SGR-annotated rendition of the visible screen.
    ///
    /// Feeding the result into a fresh screen of the same geometry
    /// reproduces `text()`.
    pub fn dump_seq(&self) -> String {
        let mut seq = String::new();
        let mut current_row = usize::MAX;
        for run in self.styled_runs() {
            if run.row != current_row {
                current_row = run.row;
                seq.push_str(&format!("\x1b[{};1H", run.row + 1));
            }
            seq.push_str(&run.style.sgr());
            seq.push_str(&run.text);
        }
        seq.push_str("\x1b[0m");
        let (row, col, visible) = self.cursor();
        seq.push_str(&format!("\x1b[{};{}H", row + 1, col.min(self.cols - 1) + 1));
        seq.push_str(if visible { "\x1b[?25h" } else { "\x1b[?25l" });
        seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::style::Color;

    fn screen(cols: usize, rows: usize) -> Screen {
        Screen::new(cols, rows, 100)
    }

    fn type_str(s: &mut Screen, text: &str) {
        for ch in text.chars() {
            s.put_char(ch);
        }
    }

    #[test]
    fn test_put_and_text() {
        let mut s = screen(10, 3);
        type_str(&mut s, "hello");
        assert_eq!(s.text(), "hello     \n          \n          ");
        assert_eq!(s.cursor(), (0, 5, true));
    }

    #[test]
    fn test_autowrap_pending() {
        let mut s = screen(5, 3);
        type_str(&mut s, "abcde");
        // Wrap is pending: cursor reports one past the last column.
        assert_eq!(s.cursor(), (0, 5, true));
        s.put_char('f');
        assert_eq!(s.row_text(0), "abcde");
        assert_eq!(s.row_text(1), "f    ");
        assert_eq!(s.cursor(), (1, 1, true));
    }

    #[test]
    fn test_autowrap_off_pins_margin() {
        let mut s = screen(5, 3);
        s.set_autowrap(false);
        type_str(&mut s, "abcdefg");
        assert_eq!(s.row_text(0), "abcdg");
        assert_eq!(s.cursor(), (0, 4, true));
    }

    #[test]
    fn test_scroll_pushes_scrollback() {
        let mut s = screen(5, 2);
        type_str(&mut s, "one");
        s.carriage_return();
        s.linefeed();
        type_str(&mut s, "two");
        s.carriage_return();
        s.linefeed();
        type_str(&mut s, "three");
        assert_eq!(s.row_text(0), "two  ");
        assert_eq!(s.row_text(1), "three");
        assert_eq!(s.scrollback_len(), 1);
    }

    #[test]
    fn test_scroll_region() {
        let mut s = screen(4, 4);
        for (row, text) in ["aaaa", "bbbb", "cccc", "dddd"].iter().enumerate() {
            s.cursor_to(row, 0);
            type_str(&mut s, text);
        }
        s.set_scroll_region(1, 2);
        s.cursor_to(1, 0); // row 2 on screen (origin mode off)
        s.scroll_up(1);
        assert_eq!(s.row_text(0), "aaaa");
        assert_eq!(s.row_text(1), "cccc");
        assert_eq!(s.row_text(2), "    ");
        assert_eq!(s.row_text(3), "dddd");
        // Region-interior scroll does not touch scrollback.
        assert_eq!(s.scrollback_len(), 0);
    }

    #[test]
    fn test_origin_mode_addressing() {
        let mut s = screen(4, 4);
        s.set_scroll_region(1, 2);
        s.set_origin_mode(true);
        s.cursor_to(0, 0);
        assert_eq!(s.cursor().0, 1);
        s.cursor_to(5, 0);
        assert_eq!(s.cursor().0, 2);
    }

    #[test]
    fn test_insert_delete_lines() {
        let mut s = screen(3, 3);
        for (row, text) in ["aaa", "bbb", "ccc"].iter().enumerate() {
            s.cursor_to(row, 0);
            type_str(&mut s, text);
        }
        s.cursor_to(1, 0);
        s.insert_lines(1);
        assert_eq!(s.text(), "aaa\n   \nbbb");
        s.delete_lines(1);
        assert_eq!(s.text(), "aaa\nbbb\n   ");
    }

    #[test]
    fn test_insert_delete_chars() {
        let mut s = screen(5, 1);
        type_str(&mut s, "abcde");
        s.cursor_to(0, 1);
        s.insert_chars(2);
        assert_eq!(s.row_text(0), "a  bc");
        s.delete_chars(2);
        assert_eq!(s.row_text(0), "abc  ");
    }

    #[test]
    fn test_erase_line_modes() {
        let mut s = screen(5, 1);
        type_str(&mut s, "abcde");
        s.cursor_to(0, 2);
        s.erase_line(0);
        assert_eq!(s.row_text(0), "ab   ");
        type_str(&mut s, "cde");
        s.cursor_to(0, 2);
        s.erase_line(1);
        assert_eq!(s.row_text(0), "   de");
    }

    #[test]
    fn test_erase_display_clears_scrollback_on_mode3() {
        let mut s = screen(3, 2);
        for _ in 0..5 {
            s.linefeed();
        }
        assert!(s.scrollback_len() > 0);
        s.erase_display(3);
        assert_eq!(s.scrollback_len(), 0);
    }

    #[test]
    fn test_tab_stops() {
        let mut s = screen(20, 1);
        s.tab();
        assert_eq!(s.cursor().1, 8);
        s.tab();
        assert_eq!(s.cursor().1, 16);
        s.tab();
        assert_eq!(s.cursor().1, 19);
        s.cursor_to(0, 4);
        s.set_tab_stop();
        s.cursor_to(0, 0);
        s.tab();
        assert_eq!(s.cursor().1, 4);
        s.backtab(1);
        assert_eq!(s.cursor().1, 0);
    }

    #[test]
    fn test_alternate_screen_roundtrip() {
        let mut s = screen(5, 2);
        type_str(&mut s, "main");
        s.enter_alternate(true);
        assert_eq!(s.text(), "     \n     ");
        type_str(&mut s, "alt");
        assert!(s.alternate_active());
        s.exit_alternate(true);
        assert_eq!(s.row_text(0), "main ");
        assert_eq!(s.cursor(), (0, 4, true));
    }

    #[test]
    fn test_wide_char_occupies_two_cells() {
        let mut s = screen(6, 1);
        type_str(&mut s, "a\u{4f60}b");
        assert_eq!(s.row_text(0), "a\u{4f60}b  ");
        assert_eq!(s.cursor().1, 4);
    }

    #[test]
    fn test_wide_char_wraps_at_margin() {
        let mut s = screen(4, 2);
        type_str(&mut s, "abc\u{4f60}");
        assert_eq!(s.row_text(0), "abc ");
        assert_eq!(s.row_text(1), "\u{4f60}  ");
    }

    #[test]
    fn test_combining_mark_attaches() {
        let mut s = screen(5, 1);
        type_str(&mut s, "e\u{301}x");
        assert_eq!(s.row_text(0), "e\u{301}x   ");
        assert_eq!(s.cursor().1, 2);
    }

    #[test]
    fn test_resize_shrink_clamps_cursor() {
        let mut s = screen(10, 5);
        s.cursor_to(4, 9);
        s.resize(4, 2);
        let (row, col, _) = s.cursor();
        assert!(row < 2);
        assert!(col < 4);
        assert_eq!(s.size(), (4, 2));
        assert_eq!(s.text().lines().count(), 2);
    }

    #[test]
    fn test_resize_is_idempotent() {
        let mut s = screen(10, 5);
        type_str(&mut s, "hello");
        s.resize(8, 4);
        let first = s.text();
        s.resize(8, 4);
        assert_eq!(s.text(), first);
    }

    #[test]
    fn test_styled_runs_group_by_style() {
        let mut s = screen(6, 1);
        type_str(&mut s, "ab");
        s.set_pen(Style {
            fg: Some(Color::Indexed(1)),
            ..Style::default()
        });
        type_str(&mut s, "cd");
        let runs = s.styled_runs();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].text, "ab");
        assert_eq!(runs[1].text, "cd");
        assert_eq!(runs[1].col, 2);
        assert_eq!(runs[2].text, "  ");
    }

    #[test]
    fn test_reverse_index_scrolls_down() {
        let mut s = screen(3, 2);
        type_str(&mut s, "top");
        s.cursor_to(0, 0);
        s.reverse_index();
        assert_eq!(s.row_text(0), "   ");
        assert_eq!(s.row_text(1), "top");
    }
}
