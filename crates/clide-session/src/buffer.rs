//! Immutable editor buffer snapshots.

use std::sync::Arc;

use crate::error::SessionError;

/// Immutable view of a file's in-editor content.
///
/// Cloning is cheap; the text is shared. Two snapshots are equal when their
/// text is equal, regardless of where they came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BufferSnapshot {
    text: Arc<str>,
}

impl BufferSnapshot {
    /// Creates a snapshot from buffer text.
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self { text: text.into() }
    }

    /// Returns the buffer text.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Returns the buffer length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Returns true if the buffer has no text.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Returns the number of lines. An empty buffer has one (empty) line.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    /// Returns the text of a 1-based line without its line terminator.
    #[must_use]
    pub fn line(&self, line: u32) -> Option<&str> {
        let index = usize::try_from(line).ok()?.checked_sub(1)?;
        self.text
            .split('\n')
            .nth(index)
            .map(|text| text.strip_suffix('\r').unwrap_or(text))
    }

    /// Returns true if both snapshots hold the same text.
    ///
    /// Snapshots cloned from one another compare by pointer first.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.text, &other.text) || self.text == other.text
    }

    /// Checks a 1-based line and 1-based byte column against the buffer.
    ///
    /// The column may point one past the last byte of the line, which is
    /// where the cursor sits while typing at the end of a line.
    pub fn validate_position(&self, line: u32, column: u32) -> Result<(), SessionError> {
        let out_of_range = || SessionError::PositionOutOfRange { line, column };
        let text = self.line(line).ok_or_else(out_of_range)?;
        let column_index = usize::try_from(column).map_err(|_| out_of_range())?;
        if column_index == 0 || column_index > text.len() + 1 {
            return Err(out_of_range());
        }
        Ok(())
    }
}

impl From<String> for BufferSnapshot {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for BufferSnapshot {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<Arc<str>> for BufferSnapshot {
    fn from(text: Arc<str>) -> Self {
        Self { text }
    }
}
