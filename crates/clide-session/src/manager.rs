//! The session manager: public open/save/close/complete operations.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::ops::Deref;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{Backend, CompileArgs};
use crate::buffer::BufferSnapshot;
use crate::candidate::Completion;
use crate::entry::{CreatingGuard, LoadedUnit, ParsedFrom, SessionEntry, UnitState};
use crate::error::SessionError;
use crate::file_id::FileId;
use crate::table::SessionTable;
use crate::unit::{Counters, ParsedUnit};

/// Snapshot of the session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Backend `parse` calls.
    pub parses: u64,
    /// Backend `reparse` calls.
    pub reparses: u64,
    /// Successful completion queries.
    pub completions: u64,
    /// Backend `release` calls.
    pub releases: u64,
    /// Files with a live session entry.
    pub open_files: usize,
}

/// Keeps one parsed unit per open file and serves completions against them.
///
/// Construct one per editor session and share it (`Arc`) across request
/// handlers; every method takes `&self` and may be called concurrently.
pub struct SessionManager<B: Backend> {
    backend: Arc<B>,
    compile_args: CompileArgs,
    table: SessionTable<B>,
    counters: Arc<Counters>,
}

/// A pinned entry; dropping it unpins and retires the entry if it was the
/// last user of a closing entry.
struct Pinned<'m, B: Backend> {
    manager: &'m SessionManager<B>,
    entry: Arc<SessionEntry<B>>,
}

impl<'m, B: Backend> Pinned<'m, B> {
    /// Takes over a pin already acquired through the table.
    fn adopt(manager: &'m SessionManager<B>, entry: Arc<SessionEntry<B>>) -> Self {
        Self { manager, entry }
    }
}

impl<B: Backend> Deref for Pinned<'_, B> {
    type Target = SessionEntry<B>;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}

impl<B: Backend> Drop for Pinned<'_, B> {
    fn drop(&mut self) {
        if self.entry.unpin() {
            self.manager.retire(&self.entry);
        }
    }
}

impl<B: Backend> SessionManager<B> {
    /// Creates a session manager. `compile_args` apply to every parse.
    pub fn new(backend: B, compile_args: CompileArgs) -> Self {
        Self {
            backend: Arc::new(backend),
            compile_args,
            table: SessionTable::new(),
            counters: Arc::new(Counters::default()),
        }
    }

    /// Returns the backend collaborator.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Returns the compile arguments used for every parse.
    pub fn compile_args(&self) -> &CompileArgs {
        &self.compile_args
    }

    /// Parses `path` and keeps the result warm.
    ///
    /// Opening an already open file waits for its first parse and succeeds
    /// without reparsing. A failed parse leaves nothing behind, so a later
    /// `open` retries from scratch.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let id = FileId::new(path);
        loop {
            let (entry, creating) = self.table.find_or_insert(&id);
            let entry = Pinned::adopt(self, entry);
            if let Some(guard) = creating {
                return self.create(&entry, guard);
            }

            let state = entry.state().read();
            if let UnitState::Ready(_) = &*state {
                debug!("File already open: {id}");
                return Ok(());
            }
            // The creating call gave up on this entry; make sure it gets replaced.
            drop(state);
            self.table.mark_closing(&entry);
        }
    }

    /// Reparses an open file from its on-disk content.
    ///
    /// On failure the previous parsed state stays in place.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let id = FileId::new(path);
        let entry = self.pinned_lookup(&id)?;
        let mut state = entry.state().write();
        let UnitState::Ready(loaded) = &mut *state else {
            return Err(SessionError::NotOpen(id.to_path_buf()));
        };
        self.reparse(&id, loaded, None)?;
        debug!("Reparsed {id} from disk");
        Ok(())
    }

    /// Stops tracking a file. Closing a file that is not open is a no-op.
    ///
    /// When queries are still running against the file, the parsed unit is
    /// released by the last of them instead.
    pub fn close(&self, path: impl AsRef<Path>) -> Result<(), SessionError> {
        let id = FileId::new(path);
        let Some(entry) = self.table.close(&id) else {
            debug!("Ignoring close of unopened file: {id}");
            return Ok(());
        };
        if entry.is_retirable() {
            self.retire(&entry);
        } else {
            debug!(
                "Deferring release of {id} until {} operations finish",
                entry.pins()
            );
        }
        Ok(())
    }

    /// Returns completions at a 1-based line and byte column of `buffer`.
    ///
    /// When `buffer` differs from the content the unit was last parsed from,
    /// the unit is reparsed from `buffer` first; concurrent queries on the
    /// same file wait for that reparse. Candidates keep backend order.
    pub fn find_completions(
        &self,
        path: impl AsRef<Path>,
        line: u32,
        column: u32,
        buffer: impl Into<BufferSnapshot>,
    ) -> Result<Vec<Completion>, SessionError> {
        let id = FileId::new(path);
        let buffer = buffer.into();
        let entry = self.pinned_lookup(&id)?;
        buffer.validate_position(line, column)?;

        let state = entry.state().read();
        let fresh = match &*state {
            UnitState::Ready(loaded) => loaded.source.matches(&buffer),
            _ => return Err(SessionError::NotOpen(id.to_path_buf())),
        };
        let state = if fresh {
            debug!("Reusing parsed unit for {id}");
            state
        } else {
            drop(state);
            self.refresh(&id, entry.state(), &buffer)?
        };

        let UnitState::Ready(loaded) = &*state else {
            return Err(SessionError::NotOpen(id.to_path_buf()));
        };
        let candidates = self
            .backend
            .completions_at(loaded.unit.get(), line, column, Some(&buffer))
            .map_err(|source| {
                warn!("Completion failed for {id}: {source}");
                SessionError::CompletionFailed {
                    path: id.to_path_buf(),
                    source,
                }
            })?;
        Counters::bump(&self.counters.completions);
        debug!("{} completions at {id}:{line}:{column}", candidates.len());
        Ok(candidates.into_iter().map(Completion::from).collect())
    }

    /// Closes every file. Units still in use are released when their last
    /// operation finishes. The manager stays usable afterwards.
    pub fn shutdown(&self) {
        let entries = self.table.drain();
        let total = entries.len();
        let mut deferred = 0usize;
        for entry in entries {
            if entry.is_retirable() {
                entry.finalize();
            } else {
                deferred += 1;
            }
        }
        info!("Session manager shut down ({total} files, {deferred} still in use)");
    }

    /// Returns true if `path` has a live session entry.
    pub fn is_open(&self, path: impl AsRef<Path>) -> bool {
        self.table.contains(&FileId::new(path))
    }

    /// Returns the identities of all open files, sorted.
    pub fn open_files(&self) -> Vec<FileId> {
        self.table.live_ids()
    }

    /// Returns a snapshot of the session counters.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            parses: self.counters.parses.load(Ordering::Relaxed),
            reparses: self.counters.reparses.load(Ordering::Relaxed),
            completions: self.counters.completions.load(Ordering::Relaxed),
            releases: self.counters.releases.load(Ordering::Relaxed),
            open_files: self.table.live_ids().len(),
        }
    }

    fn pinned_lookup(&self, id: &FileId) -> Result<Pinned<'_, B>, SessionError> {
        self.table
            .lookup(id)
            .map(|entry| Pinned::adopt(self, entry))
            .ok_or_else(|| SessionError::NotOpen(id.to_path_buf()))
    }

    fn create(
        &self,
        entry: &SessionEntry<B>,
        mut guard: CreatingGuard<B>,
    ) -> Result<(), SessionError> {
        let id = entry.id();
        Counters::bump(&self.counters.parses);
        match self.backend.parse(id.as_path(), &self.compile_args) {
            Ok(unit) => {
                let unit =
                    ParsedUnit::new(Arc::clone(&self.backend), Arc::clone(&self.counters), unit);
                *guard = UnitState::Ready(LoadedUnit {
                    unit,
                    source: ParsedFrom::Disk,
                });
                info!("Parsed {id}");
                Ok(())
            }
            Err(source) => {
                *guard = UnitState::Discarded;
                drop(guard);
                self.table.mark_closing(entry);
                warn!("Failed to parse {id}: {source}");
                Err(SessionError::ParseFailed {
                    path: id.to_path_buf(),
                    source,
                })
            }
        }
    }

    /// Brings the unit in line with `buffer` under the write lock, then hands
    /// back a read guard without letting another writer in between.
    fn refresh<'e>(
        &self,
        id: &FileId,
        lock: &'e RwLock<UnitState<B>>,
        buffer: &BufferSnapshot,
    ) -> Result<RwLockReadGuard<'e, UnitState<B>>, SessionError> {
        let mut state = lock.write();
        match &mut *state {
            UnitState::Ready(loaded) if loaded.source.matches(buffer) => {
                debug!("Unit for {id} already reparsed by a concurrent query");
            }
            UnitState::Ready(loaded) => self.reparse(id, loaded, Some(buffer))?,
            _ => return Err(SessionError::NotOpen(id.to_path_buf())),
        }
        Ok(RwLockWriteGuard::downgrade(state))
    }

    fn reparse(
        &self,
        id: &FileId,
        loaded: &mut LoadedUnit<B>,
        unsaved: Option<&BufferSnapshot>,
    ) -> Result<(), SessionError> {
        Counters::bump(&self.counters.reparses);
        if let Err(source) = self.backend.reparse(loaded.unit.get_mut(), unsaved) {
            warn!("Failed to reparse {id}: {source}");
            return Err(SessionError::ReparseFailed {
                path: id.to_path_buf(),
                source,
            });
        }
        loaded.source = unsaved.map_or(ParsedFrom::Disk, |buffer| ParsedFrom::Buffer(buffer.clone()));
        Ok(())
    }

    fn retire(&self, entry: &Arc<SessionEntry<B>>) {
        let unlinked = self.table.remove_if_unreferenced(entry.id(), entry);
        if entry.finalize() {
            debug!("Released session for {} (unlinked: {unlinked})", entry.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullBackend;

    #[test]
    fn pins_balance_across_operations() {
        let sessions = SessionManager::new(NullBackend, CompileArgs::default());
        sessions.open("/virtual/a.cpp").expect("open");
        sessions
            .find_completions("/virtual/a.cpp", 1, 1, "")
            .expect("complete");
        sessions.save("/virtual/a.cpp").expect("save");

        let entry = sessions
            .table
            .lookup(&FileId::new("/virtual/a.cpp"))
            .expect("live entry");
        assert_eq!(entry.pins(), 1);
        entry.unpin();
    }

    #[test]
    fn stats_track_backend_calls() {
        let sessions = SessionManager::new(NullBackend, CompileArgs::default());
        sessions.open("/virtual/a.cpp").expect("open");
        sessions
            .find_completions("/virtual/a.cpp", 1, 1, "x")
            .expect("complete");
        sessions.close("/virtual/a.cpp").expect("close");

        assert_eq!(
            sessions.stats(),
            SessionStats {
                parses: 1,
                reparses: 1,
                completions: 1,
                releases: 1,
                open_files: 0,
            }
        );
    }
}
