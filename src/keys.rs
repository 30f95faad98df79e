//! Key-name translation.
//!
//! Elements of a `sendKeys` command are either literal text (sent verbatim,
//! UTF-8 encoded) or named specials that translate to control bytes. Names
//! are recognized bare (`Enter`) or wrapped in angle brackets (`<Enter>`);
//! an angle-bracketed name that is not recognized is an error, while an
//! unrecognized bare token falls back to literal text.

use crate::error::SessionError;

/// Translate one key element into the bytes written to the PTY master.
///
/// `app_cursor` selects the DECCKM (application cursor keys) encoding for
/// the arrow keys.
pub fn translate_key(key: &str, app_cursor: bool) -> Result<Vec<u8>, SessionError> {
    // Angle-bracketed form must name a known special.
    if let Some(inner) = key
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
    {
        return named_key(inner, app_cursor).ok_or_else(|| SessionError::BadKey {
            name: key.to_string(),
        });
    }

    if let Some(bytes) = named_key(key, app_cursor) {
        return Ok(bytes);
    }

    Ok(key.as_bytes().to_vec())
}

/// Translate a whole key sequence, concatenating the per-element bytes.
pub fn translate_keys(keys: &[String], app_cursor: bool) -> Result<Vec<u8>, SessionError> {
    let mut out = Vec::new();
    for key in keys {
        out.extend(translate_key(key, app_cursor)?);
    }
    Ok(out)
}

fn named_key(name: &str, app_cursor: bool) -> Option<Vec<u8>> {
    // C-<ch>: control byte is the character masked to its low five bits.
    if let Some(ch) = name.strip_prefix("C-") {
        let mut chars = ch.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii() {
                return Some(vec![(c as u8) & 0x1f]);
            }
        }
        return None;
    }

    let arrows = |csi: &str, ss3: &str| -> Vec<u8> {
        if app_cursor {
            ss3.as_bytes().to_vec()
        } else {
            csi.as_bytes().to_vec()
        }
    };

    let bytes: &[u8] = match name {
        "Enter" | "Return" => b"\r",
        "Tab" => b"\t",
        "Backspace" => b"\x7f",
        "Escape" => b"\x1b",
        "Space" => b" ",
        "Up" => return Some(arrows("\x1b[A", "\x1bOA")),
        "Down" => return Some(arrows("\x1b[B", "\x1bOB")),
        "Right" => return Some(arrows("\x1b[C", "\x1bOC")),
        "Left" => return Some(arrows("\x1b[D", "\x1bOD")),
        "Home" => b"\x1b[H",
        "End" => b"\x1b[F",
        "PageUp" => b"\x1b[5~",
        "PageDown" => b"\x1b[6~",
        "F1" => b"\x1bOP",
        "F2" => b"\x1bOQ",
        "F3" => b"\x1bOR",
        "F4" => b"\x1bOS",
        "F5" => b"\x1b[15~",
        "F6" => b"\x1b[17~",
        "F7" => b"\x1b[18~",
        "F8" => b"\x1b[19~",
        "F9" => b"\x1b[20~",
        "F10" => b"\x1b[21~",
        "F11" => b"\x1b[23~",
        "F12" => b"\x1b[24~",
        _ => return None,
    };

    Some(bytes.to_vec())
}
