//! Error types for the session cache.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a backend collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BackendError {
    message: String,
}

impl BackendError {
    /// Creates a backend error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the backend message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// Errors returned by [`crate::SessionManager`] operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The file has no live session entry.
    #[error("file is not open: {}", .0.display())]
    NotOpen(PathBuf),

    /// The backend could not produce a parsed unit.
    #[error("failed to parse {}: {source}", path.display())]
    ParseFailed {
        /// File that failed to parse.
        path: PathBuf,
        /// Backend failure.
        source: BackendError,
    },

    /// The backend could not update an existing parsed unit.
    #[error("failed to reparse {}: {source}", path.display())]
    ReparseFailed {
        /// File that failed to reparse.
        path: PathBuf,
        /// Backend failure.
        source: BackendError,
    },

    /// The cursor lies outside the supplied buffer.
    #[error("position {line}:{column} is outside the buffer")]
    PositionOutOfRange {
        /// 1-based line.
        line: u32,
        /// 1-based byte column.
        column: u32,
    },

    /// The backend failed while enumerating completion candidates.
    #[error("completion failed for {}: {source}", path.display())]
    CompletionFailed {
        /// File being completed.
        path: PathBuf,
        /// Backend failure.
        source: BackendError,
    },
}

impl SessionError {
    /// Returns true for failures the editor should surface to the user.
    ///
    /// `NotOpen` and out-of-range cursors are routine during fast typing and
    /// buffer switches; backend failures are not.
    #[must_use]
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::ParseFailed { .. } | Self::ReparseFailed { .. } | Self::CompletionFailed { .. }
        )
    }
}
