//! Cell styling: colors and text attributes.
//!
//! The color model mirrors what SGR can express: the 256-color palette
//! (indices 0-15 being the classic ANSI colors) and 24-bit RGB. `None`
//! means the terminal default.

use serde::{Deserialize, Serialize};

/// A terminal color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Color {
    /// 256-color palette index (0-15 = ANSI palette)
    Indexed(u8),
    /// 24-bit RGB
    Rgb(u8, u8, u8),
}

/// Style attributes for a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Style {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub fg: Option<Color>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub bg: Option<Color>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inverse: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub blink: bool,
}

impl Style {
    /// True when every attribute is at its default
    pub fn is_default(&self) -> bool {
        *self == Style::default()
    }

    /// Render this style as an SGR escape sequence, starting from a reset.
    ///
    /// The default style renders as a bare reset.
    pub fn sgr(&self) -> String {
        let mut params: Vec<String> = vec!["0".to_string()];
        if self.bold {
            params.push("1".to_string());
        }
        if self.italic {
            params.push("3".to_string());
        }
        if self.underline {
            params.push("4".to_string());
        }
        if self.blink {
            params.push("5".to_string());
        }
        if self.inverse {
            params.push("7".to_string());
        }
        if let Some(fg) = self.fg {
            push_color_params(&mut params, fg, false);
        }
        if let Some(bg) = self.bg {
            push_color_params(&mut params, bg, true);
        }
        format!("\x1b[{}m", params.join(";"))
    }
}

fn push_color_params(params: &mut Vec<String>, color: Color, background: bool) {
    match color {
        Color::Indexed(idx @ 0..=7) => {
            let base = if background { 40 } else { 30 };
            params.push((base + idx as u16).to_string());
        }
        Color::Indexed(idx @ 8..=15) => {
            let base = if background { 100 } else { 90 };
            params.push((base + (idx as u16 - 8)).to_string());
        }
        Color::Indexed(idx) => {
            params.push(if background { "48" } else { "38" }.to_string());
            params.push("5".to_string());
            params.push(idx.to_string());
        }
        Color::Rgb(r, g, b) => {
            params.push(if background { "48" } else { "38" }.to_string());
            params.push("2".to_string());
            params.push(r.to_string());
            params.push(g.to_string());
            params.push(b.to_string());
        }
    }
}
