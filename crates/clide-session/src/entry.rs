//! Per-file session entries.

use parking_lot::{ArcRwLockWriteGuard, RawRwLock, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::backend::Backend;
use crate::buffer::BufferSnapshot;
use crate::file_id::FileId;
use crate::unit::ParsedUnit;

/// Owned write guard the creator of an entry holds until its first parse ends.
pub(crate) type CreatingGuard<B> = ArcRwLockWriteGuard<RawRwLock, UnitState<B>>;

/// Content a parsed unit currently reflects.
#[derive(Debug, Clone)]
pub(crate) enum ParsedFrom {
    /// The file as stored on disk at the last parse or save.
    Disk,
    /// An unsaved editor buffer.
    Buffer(BufferSnapshot),
}

impl ParsedFrom {
    /// Returns true if a query against `buffer` can reuse the unit as-is.
    pub(crate) fn matches(&self, buffer: &BufferSnapshot) -> bool {
        match self {
            Self::Disk => false,
            Self::Buffer(parsed) => parsed.same_content(buffer),
        }
    }
}

pub(crate) struct LoadedUnit<B: Backend> {
    pub(crate) unit: ParsedUnit<B>,
    pub(crate) source: ParsedFrom,
}

pub(crate) enum UnitState<B: Backend> {
    /// Inserted, first parse still running under the creator's write lock.
    Creating,
    /// Parsed and queryable.
    Ready(LoadedUnit<B>),
    /// The first parse failed or the unit was released.
    Discarded,
}

/// Session metadata wrapping one parsed unit.
///
/// `pins` counts in-flight operations using the unit. Pins are only taken
/// under the table lock and never on a closing entry, so once an entry is
/// closing its pin count can only fall. Whoever observes "closing and no
/// pins" retires the entry; `finalized` makes that happen once.
pub(crate) struct SessionEntry<B: Backend> {
    id: FileId,
    pins: AtomicUsize,
    closing: AtomicBool,
    finalized: AtomicBool,
    state: Arc<RwLock<UnitState<B>>>,
}

impl<B: Backend> SessionEntry<B> {
    /// Creates an entry in `Creating` state together with its held write lock.
    ///
    /// The lock is taken before the entry becomes visible to other threads,
    /// so anyone who finds the entry blocks until the creator finishes.
    pub(crate) fn new_creating(id: FileId) -> (Arc<Self>, CreatingGuard<B>) {
        let state = Arc::new(RwLock::new(UnitState::Creating));
        let guard = state.write_arc();
        let entry = Arc::new(Self {
            id,
            pins: AtomicUsize::new(0),
            closing: AtomicBool::new(false),
            finalized: AtomicBool::new(false),
            state,
        });
        (entry, guard)
    }

    pub(crate) fn id(&self) -> &FileId {
        &self.id
    }

    pub(crate) fn state(&self) -> &RwLock<UnitState<B>> {
        &self.state
    }

    pub(crate) fn pins(&self) -> usize {
        self.pins.load(Ordering::SeqCst)
    }

    pub(crate) fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Must be called with the table lock held.
    pub(crate) fn pin(&self) {
        self.pins.fetch_add(1, Ordering::SeqCst);
    }

    /// Drops one pin. Returns true if the entry is now closing and unpinned.
    pub(crate) fn unpin(&self) -> bool {
        let previous = self.pins.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(previous > 0, "unbalanced unpin on {}", self.id);
        previous == 1 && self.is_closing()
    }

    /// Must be called with the table lock held. Returns false if already closing.
    pub(crate) fn mark_closing(&self) -> bool {
        !self.closing.swap(true, Ordering::SeqCst)
    }

    /// Returns true if the entry is closing and nothing uses it any more.
    pub(crate) fn is_retirable(&self) -> bool {
        self.is_closing() && self.pins() == 0
    }

    /// Releases the parsed unit. Returns true for the call that actually ran.
    ///
    /// Only valid once [`Self::is_retirable`] holds; no lock on this entry
    /// can be held by anyone at that point.
    pub(crate) fn finalize(&self) -> bool {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return false;
        }
        let previous = std::mem::replace(&mut *self.state.write(), UnitState::Discarded);
        drop(previous);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullBackend;

    #[test]
    fn creator_lock_is_held_from_birth() {
        let (entry, guard) = SessionEntry::<NullBackend>::new_creating(FileId::new("/a.cpp"));
        assert!(entry.state().try_read().is_none());
        drop(guard);
        assert!(matches!(
            *entry.state().try_read().expect("lock released"),
            UnitState::Creating
        ));
    }

    #[test]
    fn unpin_reports_last_pin_on_closing_entry() {
        let (entry, _guard) = SessionEntry::<NullBackend>::new_creating(FileId::new("/a.cpp"));
        entry.pin();
        entry.pin();
        assert!(!entry.unpin());
        assert!(entry.mark_closing());
        assert!(!entry.mark_closing());
        assert!(entry.unpin());
        assert!(entry.is_retirable());
    }

    #[test]
    fn finalize_runs_once() {
        let (entry, guard) = SessionEntry::<NullBackend>::new_creating(FileId::new("/a.cpp"));
        drop(guard);
        entry.mark_closing();
        assert!(entry.finalize());
        assert!(!entry.finalize());
        assert!(matches!(*entry.state().read(), UnitState::Discarded));
    }

    #[test]
    fn disk_content_never_matches_a_buffer() {
        let buffer = BufferSnapshot::from("int x;");
        assert!(!ParsedFrom::Disk.matches(&buffer));
        assert!(ParsedFrom::Buffer(BufferSnapshot::from("int x;")).matches(&buffer));
    }
}
