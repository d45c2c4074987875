//! Parsing backend interface.

use std::path::Path;

use crate::buffer::BufferSnapshot;
use crate::candidate::BackendCandidate;
use crate::error::BackendError;

/// Compiler flags handed to every parse, fixed for the whole session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileArgs(Vec<String>);

impl CompileArgs {
    /// Creates compile arguments from a list of flags.
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(args.into_iter().map(Into::into).collect())
    }

    /// Appends one flag.
    pub fn push(&mut self, arg: impl Into<String>) {
        self.0.push(arg.into());
    }

    /// Returns the flags in order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Iterates over the flags in order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the number of flags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if there are no flags.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for CompileArgs {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// The parsing/completion library the session cache drives.
///
/// A backend owns nothing per file; every parsed unit it hands out is owned by
/// exactly one session entry and given back through [`Backend::release`]
/// exactly once.
pub trait Backend: Send + Sync + 'static {
    /// Backend-owned parsed state of one file.
    type Unit: Send + Sync + 'static;

    /// Parses `path` from disk.
    fn parse(&self, path: &Path, args: &CompileArgs) -> Result<Self::Unit, BackendError>;

    /// Updates `unit` in place, from `unsaved` when given and from disk otherwise.
    ///
    /// On error `unit` must still be usable in its previous state.
    fn reparse(
        &self,
        unit: &mut Self::Unit,
        unsaved: Option<&BufferSnapshot>,
    ) -> Result<(), BackendError>;

    /// Enumerates completion candidates at a 1-based line and byte column.
    fn completions_at(
        &self,
        unit: &Self::Unit,
        line: u32,
        column: u32,
        unsaved: Option<&BufferSnapshot>,
    ) -> Result<Vec<BackendCandidate>, BackendError>;

    /// Frees the backend resources behind `unit`. The unit itself is dropped
    /// right after and is never used again.
    fn release(&self, unit: &mut Self::Unit);
}
