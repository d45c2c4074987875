//! The concurrent session table.

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

use crate::backend::Backend;
use crate::entry::{CreatingGuard, SessionEntry};
use crate::file_id::FileId;

/// Map from file identity to the current live session entry.
///
/// The mutex covers structural changes and pin/closing transitions only. It
/// is never held across a backend call or while waiting on an entry lock.
pub(crate) struct SessionTable<B: Backend> {
    entries: Mutex<FxHashMap<FileId, Arc<SessionEntry<B>>>>,
}

impl<B: Backend> SessionTable<B> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
        }
    }

    /// Returns the live entry for `id` pinned, or inserts a fresh pinned one.
    ///
    /// A closing entry is never returned; it is replaced in the map and left
    /// to be retired by whoever drops its last pin. The guard is `Some` exactly
    /// when a new entry was created; its holder must run the first parse.
    pub(crate) fn find_or_insert(
        &self,
        id: &FileId,
    ) -> (Arc<SessionEntry<B>>, Option<CreatingGuard<B>>) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get(id) {
            if !entry.is_closing() {
                entry.pin();
                return (Arc::clone(entry), None);
            }
        }
        let (entry, guard) = SessionEntry::new_creating(id.clone());
        entry.pin();
        entries.insert(id.clone(), Arc::clone(&entry));
        (entry, Some(guard))
    }

    /// Returns the live entry for `id` pinned, or `None`.
    pub(crate) fn lookup(&self, id: &FileId) -> Option<Arc<SessionEntry<B>>> {
        let entries = self.entries.lock();
        let entry = entries.get(id)?;
        if entry.is_closing() {
            return None;
        }
        entry.pin();
        Some(Arc::clone(entry))
    }

    /// Marks the live entry for `id` closing and returns it.
    ///
    /// Returns `None` when there is no live entry (never opened, or already closing).
    pub(crate) fn close(&self, id: &FileId) -> Option<Arc<SessionEntry<B>>> {
        let entries = self.entries.lock();
        let entry = entries.get(id)?;
        entry.mark_closing().then(|| Arc::clone(entry))
    }

    /// Marks a specific entry closing, whether or not it is still mapped.
    pub(crate) fn mark_closing(&self, entry: &SessionEntry<B>) -> bool {
        let _entries = self.entries.lock();
        entry.mark_closing()
    }

    /// Unlinks `entry` iff it is still the mapping for `id` and unpinned.
    pub(crate) fn remove_if_unreferenced(&self, id: &FileId, entry: &Arc<SessionEntry<B>>) -> bool {
        let mut entries = self.entries.lock();
        if entry.pins() != 0 {
            return false;
        }
        match entries.get(id) {
            Some(current) if Arc::ptr_eq(current, entry) => {
                entries.remove(id);
                true
            }
            _ => false,
        }
    }

    /// Marks every entry closing and unlinks all of them.
    pub(crate) fn drain(&self) -> Vec<Arc<SessionEntry<B>>> {
        let mut entries = self.entries.lock();
        entries
            .drain()
            .map(|(_, entry)| {
                entry.mark_closing();
                entry
            })
            .collect()
    }

    /// Returns true if `id` has a live entry.
    pub(crate) fn contains(&self, id: &FileId) -> bool {
        self.entries
            .lock()
            .get(id)
            .is_some_and(|entry| !entry.is_closing())
    }

    /// Returns the identities of all live entries, sorted.
    pub(crate) fn live_ids(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| !entry.is_closing())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullBackend;

    fn id(path: &str) -> FileId {
        FileId::new(path)
    }

    #[test]
    fn find_or_insert_creates_once() {
        let table = SessionTable::<NullBackend>::new();
        let (first, guard) = table.find_or_insert(&id("/a.cpp"));
        assert!(guard.is_some());
        drop(guard);

        let (second, guard) = table.find_or_insert(&id("/a.cpp"));
        assert!(guard.is_none());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.pins(), 2);
    }

    #[test]
    fn closing_entries_are_replaced_and_hidden() {
        let table = SessionTable::<NullBackend>::new();
        let (old, guard) = table.find_or_insert(&id("/a.cpp"));
        drop(guard);

        let closed = table.close(&id("/a.cpp")).expect("live entry");
        assert!(Arc::ptr_eq(&old, &closed));
        assert!(table.close(&id("/a.cpp")).is_none());
        assert!(table.lookup(&id("/a.cpp")).is_none());
        assert!(!table.contains(&id("/a.cpp")));

        let (fresh, guard) = table.find_or_insert(&id("/a.cpp"));
        assert!(guard.is_some());
        assert!(!Arc::ptr_eq(&old, &fresh));

        // The replaced entry is no longer the mapping, so it cannot unlink the fresh one.
        old.unpin();
        assert!(!table.remove_if_unreferenced(&id("/a.cpp"), &old));
        assert!(table.contains(&id("/a.cpp")));
    }

    #[test]
    fn remove_respects_pins() {
        let table = SessionTable::<NullBackend>::new();
        let (entry, guard) = table.find_or_insert(&id("/a.cpp"));
        drop(guard);
        table.close(&id("/a.cpp"));

        assert!(!table.remove_if_unreferenced(&id("/a.cpp"), &entry));
        assert!(entry.unpin());
        assert!(table.remove_if_unreferenced(&id("/a.cpp"), &entry));
        assert!(!table.remove_if_unreferenced(&id("/a.cpp"), &entry));
    }

    #[test]
    fn drain_closes_everything() {
        let table = SessionTable::<NullBackend>::new();
        for path in ["/b.cpp", "/a.cpp"] {
            let (entry, guard) = table.find_or_insert(&id(path));
            drop(guard);
            entry.unpin();
        }
        assert_eq!(table.live_ids(), vec![id("/a.cpp"), id("/b.cpp")]);

        let drained = table.drain();
        assert_eq!(drained.len(), 2);
        assert!(drained.iter().all(|entry| entry.is_retirable()));
        assert!(table.live_ids().is_empty());
    }
}
