//! ANSI escape sequence interpretation.
//!
//! Implements `vte::Perform` for [`Screen`], mapping the VT feature set onto
//! the grid operations. Unrecognized or malformed sequences are dropped
//! silently, as a real terminal would.

use super::screen::Screen;
use super::style::{Color, Style};
use vte::{Params, Perform};

fn param(params: &[u16], index: usize, default: u16) -> u16 {
    params.get(index).copied().unwrap_or(default)
}

fn param_or_one(params: &[u16], index: usize) -> usize {
    param(params, index, 1).max(1) as usize
}

impl Perform for Screen {
    fn print(&mut self, c: char) {
        self.put_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            // Backspace
            0x08 => self.backspace(),
            // Horizontal tab
            0x09 => self.tab(),
            // Line feed / vertical tab / form feed
            0x0A | 0x0B | 0x0C => self.linefeed(),
            // Carriage return
            0x0D => self.carriage_return(),
            // Bell, SO/SI and the rest are ignored
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {
        // Titles, clipboard and hyperlinks have no meaning headless.
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        if ignore {
            return;
        }
        let params: Vec<u16> = params.iter().flatten().copied().collect();
        let private = intermediates.first() == Some(&b'?');

        match (action, private) {
            ('A', false) => self.cursor_up(param_or_one(&params, 0)),
            ('B', false) | ('e', false) => self.cursor_down(param_or_one(&params, 0)),
            ('C', false) | ('a', false) => self.cursor_forward(param_or_one(&params, 0)),
            ('D', false) => self.cursor_back(param_or_one(&params, 0)),
            ('E', false) => {
                self.cursor_down(param_or_one(&params, 0));
                self.carriage_return();
            }
            ('F', false) => {
                self.cursor_up(param_or_one(&params, 0));
                self.carriage_return();
            }
            ('G', false) | ('`', false) => self.cursor_to_col(param_or_one(&params, 0) - 1),
            ('H', false) | ('f', false) => {
                let row = param_or_one(&params, 0) - 1;
                let col = param_or_one(&params, 1) - 1;
                self.cursor_to(row, col);
            }
            ('I', false) => {
                for _ in 0..param_or_one(&params, 0) {
                    self.tab();
                }
            }
            ('J', false) => self.erase_display(param(&params, 0, 0)),
            ('K', false) => self.erase_line(param(&params, 0, 0)),
            ('L', false) => self.insert_lines(param_or_one(&params, 0)),
            ('M', false) => self.delete_lines(param_or_one(&params, 0)),
            ('P', false) => self.delete_chars(param_or_one(&params, 0)),
            ('@', false) => self.insert_chars(param_or_one(&params, 0)),
            ('S', false) => self.scroll_up(param_or_one(&params, 0)),
            ('T', false) => self.scroll_down(param_or_one(&params, 0)),
            ('X', false) => self.erase_chars(param_or_one(&params, 0)),
            ('Z', false) => self.backtab(param_or_one(&params, 0)),
            ('d', false) => self.cursor_to_row(param_or_one(&params, 0) - 1),
            ('g', false) => self.clear_tab_stop(param(&params, 0, 0)),
            ('m', false) => {
                if intermediates.is_empty() {
                    self.select_graphic_rendition(&params);
                }
            }
            ('r', false) => {
                let (_, rows) = self.size();
                let top = param_or_one(&params, 0) - 1;
                let bottom = param(&params, 1, rows as u16).max(1) as usize - 1;
                self.set_scroll_region(top, bottom);
            }
            ('s', false) => self.save_cursor(),
            ('u', false) => self.restore_cursor(),
            ('h', _) | ('l', _) => {
                let enable = action == 'h';
                for mode in &params {
                    self.set_mode(*mode, private, enable);
                }
            }
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        if !intermediates.is_empty() {
            return;
        }
        match byte {
            b'7' => self.save_cursor(),
            b'8' => self.restore_cursor(),
            b'D' => self.index(),
            b'E' => self.next_line(),
            b'H' => self.set_tab_stop(),
            b'M' => self.reverse_index(),
            b'c' => self.reset(),
            _ => {}
        }
    }
}

impl Screen {
    fn set_mode(&mut self, mode: u16, private: bool, enable: bool) {
        if private {
            match mode {
                1 => self.set_app_cursor_keys(enable),
                6 => self.set_origin_mode(enable),
                7 => self.set_autowrap(enable),
                25 => self.set_cursor_visible(enable),
                47 | 1047 => {
                    if enable {
                        self.enter_alternate(false);
                    } else {
                        self.exit_alternate(false);
                    }
                }
                1049 => {
                    if enable {
                        self.enter_alternate(true);
                    } else {
                        self.exit_alternate(true);
                    }
                }
                _ => {}
            }
        } else if mode == 20 {
            self.set_newline_mode(enable);
        }
    }

    fn select_graphic_rendition(&mut self, params: &[u16]) {
        let mut pen = self.pen();
        if params.is_empty() {
            pen = Style::default();
        }

        let mut i = 0;
        while i < params.len() {
            match params[i] {
                0 => pen = Style::default(),
                1 => pen.bold = true,
                3 => pen.italic = true,
                4 => pen.underline = true,
                5 => pen.blink = true,
                7 => pen.inverse = true,
                22 => pen.bold = false,
                23 => pen.italic = false,
                24 => pen.underline = false,
                25 => pen.blink = false,
                27 => pen.inverse = false,
                30..=37 => pen.fg = Some(Color::Indexed(params[i] as u8 - 30)),
                38 => {
                    if let Some((color, consumed)) = extended_color(&params[i + 1..]) {
                        pen.fg = Some(color);
                        i += consumed;
                    }
                }
                39 => pen.fg = None,
                40..=47 => pen.bg = Some(Color::Indexed(params[i] as u8 - 40)),
                48 => {
                    if let Some((color, consumed)) = extended_color(&params[i + 1..]) {
                        pen.bg = Some(color);
                        i += consumed;
                    }
                }
                49 => pen.bg = None,
                90..=97 => pen.fg = Some(Color::Indexed(params[i] as u8 - 90 + 8)),
                100..=107 => pen.bg = Some(Color::Indexed(params[i] as u8 - 100 + 8)),
                _ => {}
            }
            i += 1;
        }

        self.set_pen(pen);
    }
}

/// Parse the tail of a 38/48 extended-color introducer.
///
/// Returns the color and how many parameters it consumed.
fn extended_color(rest: &[u16]) -> Option<(Color, usize)> {
    match rest.first() {
        Some(5) => rest.get(1).map(|idx| (Color::Indexed(*idx as u8), 2)),
        Some(2) => match (rest.get(1), rest.get(2), rest.get(3)) {
            (Some(r), Some(g), Some(b)) => {
                Some((Color::Rgb(*r as u8, *g as u8, *b as u8), 4))
            }
            _ => None,
        },
        _ => None,
    }
}
