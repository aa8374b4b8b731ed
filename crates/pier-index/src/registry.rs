//! Published snapshots, swapped copy-on-write.
//!
//! The registry maps index names to `Arc`-shared snapshots. Readers clone an
//! `Arc` under a brief read lock and then work lock-free on an immutable
//! view; a refresh that finishes later never changes what an in-flight reader
//! sees. Publishing replaces every snapshot a source owns in one write-lock
//! critical section, so readers observe a source's refresh atomically.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::snapshot::IndexSnapshot;

#[derive(Default)]
struct Inner {
    snapshots: BTreeMap<String, Arc<IndexSnapshot>>,
    /// Index names each source currently owns, so sub-indexes that vanish
    /// from storage vanish from the registry on the next publish.
    owned: HashMap<usize, Vec<String>>,
    generation: u64,
}

#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current snapshot of one index, if that index exists.
    pub fn snapshot(&self, name: &str) -> Option<Arc<IndexSnapshot>> {
        self.inner.read().snapshots.get(name).cloned()
    }

    /// All current snapshots, in index-name order.
    pub fn snapshots(&self) -> Vec<Arc<IndexSnapshot>> {
        self.inner.read().snapshots.values().cloned().collect()
    }

    pub fn index_names(&self) -> Vec<String> {
        self.inner.read().snapshots.keys().cloned().collect()
    }

    /// Strictly increasing across publishes; readers can use it to tell
    /// whether anything changed since they last looked.
    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    /// Swap in a source's freshly built snapshots, retiring any index the
    /// source previously owned but no longer produced.
    pub(crate) fn publish(&self, source_id: usize, snapshots: Vec<IndexSnapshot>) {
        let mut inner = self.inner.write();
        inner.generation += 1;
        let generation = inner.generation;

        let names: Vec<String> = snapshots.iter().map(|s| s.name().to_string()).collect();
        if let Some(previous) = inner.owned.insert(source_id, names.clone()) {
            for stale in previous {
                if !names.contains(&stale) {
                    inner.snapshots.remove(&stale);
                }
            }
        }
        for mut snapshot in snapshots {
            snapshot.generation = generation;
            inner
                .snapshots
                .insert(snapshot.name().to_string(), Arc::new(snapshot));
        }
        tracing::debug!(
            target = "pier.index",
            generation,
            indexes = names.len(),
            "published snapshots"
        );
    }
}
