//! Owned parsed-unit handles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backend::Backend;

/// Session-wide operation counters.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) parses: AtomicU64,
    pub(crate) reparses: AtomicU64,
    pub(crate) completions: AtomicU64,
    pub(crate) releases: AtomicU64,
}

impl Counters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// A backend unit that hands itself back to the backend when dropped.
///
/// The wrapped unit never leaves this type, so the single `release` call in
/// `Drop` is the only one that can happen.
pub(crate) struct ParsedUnit<B: Backend> {
    backend: Arc<B>,
    counters: Arc<Counters>,
    unit: B::Unit,
}

impl<B: Backend> ParsedUnit<B> {
    pub(crate) fn new(backend: Arc<B>, counters: Arc<Counters>, unit: B::Unit) -> Self {
        Self {
            backend,
            counters,
            unit,
        }
    }

    pub(crate) fn get(&self) -> &B::Unit {
        &self.unit
    }

    pub(crate) fn get_mut(&mut self) -> &mut B::Unit {
        &mut self.unit
    }
}

impl<B: Backend> Drop for ParsedUnit<B> {
    fn drop(&mut self) {
        self.backend.release(&mut self.unit);
        Counters::bump(&self.counters.releases);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullBackend;
    use std::path::PathBuf;

    #[test]
    fn dropping_a_unit_releases_it_once() {
        let counters = Arc::new(Counters::default());
        let mut unit = ParsedUnit::new(
            Arc::new(NullBackend),
            Arc::clone(&counters),
            PathBuf::from("/src/a.cpp"),
        );
        unit.get_mut().set_file_name("b.cpp");
        assert_eq!(unit.get(), &PathBuf::from("/src/b.cpp"));
        assert_eq!(counters.releases.load(Ordering::Relaxed), 0);

        drop(unit);
        assert_eq!(counters.releases.load(Ordering::Relaxed), 1);
    }
}
