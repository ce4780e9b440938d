use crate::engine::SearchEngine;
use parking_lot::RwLock;
use std::sync::Arc;

/// Atomic publication point for built engines.
///
/// `build` tears the index while it runs, so a live engine is never rebuilt
/// in place. Instead a fresh engine is built from a complete snapshot and
/// swapped in here; readers holding the previous `Arc` keep a consistent
/// view until they drop it.
pub struct SnapshotStore {
    current: RwLock<Arc<SearchEngine>>,
}

impl SnapshotStore {
    /// Starts with an empty engine, which answers every query with no
    /// results until the first publish.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(SearchEngine::new())),
        }
    }

    /// Replace the published engine. In-flight readers are unaffected.
    pub fn publish(&self, engine: SearchEngine) {
        *self.current.write() = Arc::new(engine);
    }

    /// The currently published engine.
    pub fn current(&self) -> Arc<SearchEngine> {
        self.current.read().clone()
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocKind, Document};

    fn doc(name: &str) -> Document {
        Document {
            id: 1,
            kind: DocKind::Building,
            name: name.to_string(),
            popular_name: None,
            address: None,
            ancestors: Vec::new(),
            geo: None,
            gross_area: None,
            num_floors: None,
            num_rooms: None,
            properties: Default::default(),
            updated_at: None,
            business_type_id: None,
        }
    }

    #[test]
    fn readers_keep_their_snapshot_across_a_publish() {
        let store = SnapshotStore::new();
        let mut first = SearchEngine::new();
        first.build(vec![doc("Old Hall")]);
        store.publish(first);

        let held = store.current();
        assert_eq!(held.len(), 1);

        let mut second = SearchEngine::new();
        second.build(vec![doc("New Hall"), doc("Annex")]);
        store.publish(second);

        // The held reference still sees the old snapshot.
        assert_eq!(held.len(), 1);
        assert_eq!(store.current().len(), 2);
    }

    #[test]
    fn unpublished_store_serves_the_empty_engine() {
        let store = SnapshotStore::new();
        assert!(store.current().is_empty());
    }
}
