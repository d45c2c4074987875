//! Position conversions between LSP and the session cache.
//!
//! LSP positions are 0-based lines with UTF-16 code unit characters; the
//! session cache takes 1-based lines with 1-based byte columns.

use tower_lsp::lsp_types::Position;

/// Byte offset of a UTF-16 character offset within one line.
///
/// Returns `None` past the end of the line or inside a surrogate pair.
pub(crate) fn utf16_to_byte(line: &str, character: u32) -> Option<usize> {
    let mut units = 0u32;
    for (offset, ch) in line.char_indices() {
        if units >= character {
            return (units == character).then_some(offset);
        }
        units += ch.len_utf16() as u32;
    }
    (units == character).then_some(line.len())
}

/// Byte offset of `position` in `content`.
///
/// Characters past the end of a line clamp to the line end.
pub(crate) fn position_to_offset(content: &str, position: Position) -> Option<usize> {
    let mut start = 0;
    for _ in 0..position.line {
        start += content[start..].find('\n')? + 1;
    }
    let rest = &content[start..];
    let line = rest.split('\n').next().unwrap_or_default();
    let line = line.strip_suffix('\r').unwrap_or(line);
    Some(start + utf16_to_byte(line, position.character).unwrap_or(line.len()))
}

/// The session cache's `(line, column)` for an LSP position in `line_text`.
pub(crate) fn session_position(line_text: &str, position: Position) -> Option<(u32, u32)> {
    let byte = utf16_to_byte(line_text, position.character)?;
    let column = u32::try_from(byte + 1).ok()?;
    Some((position.line + 1, column))
}
