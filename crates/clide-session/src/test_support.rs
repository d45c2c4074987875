//! Test helpers shared across session unit tests.

use std::path::{Path, PathBuf};

use crate::backend::{Backend, CompileArgs};
use crate::buffer::BufferSnapshot;
use crate::candidate::BackendCandidate;
use crate::error::BackendError;

/// Backend whose units are just the parsed path.
pub(crate) struct NullBackend;

impl Backend for NullBackend {
    type Unit = PathBuf;

    fn parse(&self, path: &Path, _args: &CompileArgs) -> Result<Self::Unit, BackendError> {
        Ok(path.to_path_buf())
    }

    fn reparse(
        &self,
        _unit: &mut Self::Unit,
        _unsaved: Option<&BufferSnapshot>,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    fn completions_at(
        &self,
        _unit: &Self::Unit,
        _line: u32,
        _column: u32,
        _unsaved: Option<&BufferSnapshot>,
    ) -> Result<Vec<BackendCandidate>, BackendError> {
        Ok(Vec::new())
    }

    fn release(&self, _unit: &mut Self::Unit) {}
}
