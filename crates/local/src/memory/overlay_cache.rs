//! In-memory document overlay cache
//!
//! Holds at most one overlay per document key, plus a secondary index from
//! batch id to the keys whose overlay carries that id, so removing a batch
//! does not scan every overlay.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use parking_lot::RwLock;
use tracing::trace;

use docstore_core::{
    BatchId, DocumentKey, DocumentOverlayCache, Mutation, Overlay, ResourcePath, StoreResult,
};

#[derive(Debug, Default)]
struct OverlayState {
    overlays: BTreeMap<DocumentKey, Overlay>,
    overlay_by_batch_id: HashMap<BatchId, BTreeSet<DocumentKey>>,
}

impl OverlayState {
    fn save_overlay(&mut self, largest_batch_id: BatchId, mutation: Mutation) {
        let key = mutation.key().clone();

        // Drop the key from the batch that previously owned its overlay.
        if let Some(existing) = self.overlays.get(&key) {
            let previous_batch = existing.largest_batch_id();
            if let Some(keys) = self.overlay_by_batch_id.get_mut(&previous_batch) {
                keys.remove(&key);
                if keys.is_empty() {
                    self.overlay_by_batch_id.remove(&previous_batch);
                }
            }
        }

        self.overlays.insert(key.clone(), Overlay::new(largest_batch_id, mutation));
        self.overlay_by_batch_id
            .entry(largest_batch_id)
            .or_default()
            .insert(key);
    }
}

/// Overlay cache backed by ordered maps
#[derive(Debug, Default)]
pub struct MemoryDocumentOverlayCache {
    state: RwLock<OverlayState>,
}

impl MemoryDocumentOverlayCache {
    /// Create an empty overlay cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored overlays
    pub fn len(&self) -> usize {
        self.state.read().overlays.len()
    }

    /// True if no overlay is stored
    pub fn is_empty(&self) -> bool {
        self.state.read().overlays.is_empty()
    }
}

impl DocumentOverlayCache for MemoryDocumentOverlayCache {
    fn get_overlay(&self, key: &DocumentKey) -> StoreResult<Option<Overlay>> {
        Ok(self.state.read().overlays.get(key).cloned())
    }

    fn get_overlays(
        &self,
        keys: &BTreeSet<DocumentKey>,
    ) -> StoreResult<BTreeMap<DocumentKey, Overlay>> {
        let state = self.state.read();
        Ok(keys
            .iter()
            .filter_map(|key| state.overlays.get(key).map(|o| (key.clone(), o.clone())))
            .collect())
    }

    fn save_overlays(
        &self,
        largest_batch_id: BatchId,
        overlays: &BTreeMap<DocumentKey, Mutation>,
    ) -> StoreResult<()> {
        let mut state = self.state.write();
        for mutation in overlays.values() {
            state.save_overlay(largest_batch_id, mutation.clone());
        }
        trace!(
            target: "docstore::local",
            batch_id = largest_batch_id,
            count = overlays.len(),
            "Overlays saved"
        );
        Ok(())
    }

    fn remove_overlays_for_batch_id(&self, batch_id: BatchId) -> StoreResult<()> {
        let mut state = self.state.write();
        if let Some(keys) = state.overlay_by_batch_id.remove(&batch_id) {
            for key in keys {
                state.overlays.remove(&key);
            }
        }
        Ok(())
    }

    fn get_overlays_in_collection(
        &self,
        collection: &ResourcePath,
        since_batch_id: BatchId,
    ) -> StoreResult<BTreeMap<DocumentKey, Overlay>> {
        let state = self.state.read();
        let start = DocumentKey::from_path(collection.child(""))
            .unwrap_or_else(|_| DocumentKey::empty());

        let mut results = BTreeMap::new();
        for (key, overlay) in state.overlays.range((Bound::Included(start), Bound::Unbounded)) {
            if !collection.is_prefix_of(key.path()) {
                break;
            }
            if collection.is_immediate_parent_of(key.path())
                && overlay.largest_batch_id() > since_batch_id
            {
                results.insert(key.clone(), overlay.clone());
            }
        }
        Ok(results)
    }

    fn get_overlays_in_collection_group(
        &self,
        collection_group: &str,
        since_batch_id: BatchId,
        count: usize,
    ) -> StoreResult<BTreeMap<DocumentKey, Overlay>> {
        let state = self.state.read();

        let mut by_batch: BTreeMap<BatchId, Vec<&Overlay>> = BTreeMap::new();
        for overlay in state.overlays.values() {
            if overlay.key().has_collection_id(collection_group)
                && overlay.largest_batch_id() > since_batch_id
            {
                by_batch.entry(overlay.largest_batch_id()).or_default().push(overlay);
            }
        }

        // Batches are never split, so the result may exceed `count`.
        let mut results = BTreeMap::new();
        for overlays in by_batch.into_values() {
            for overlay in overlays {
                results.insert(overlay.key().clone(), overlay.clone());
            }
            if results.len() >= count {
                break;
            }
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_core::ObjectValue;

    fn key(path: &str) -> DocumentKey {
        DocumentKey::from_path_str(path).unwrap()
    }

    fn set(path: &str) -> Mutation {
        Mutation::Set {
            key: key(path),
            data: ObjectValue::new(),
        }
    }

    fn save(cache: &MemoryDocumentOverlayCache, batch_id: BatchId, paths: &[&str]) {
        let overlays = paths.iter().map(|p| (key(p), set(p))).collect();
        cache.save_overlays(batch_id, &overlays).unwrap();
    }

    #[test]
    fn test_get_overlay_hit_and_miss() {
        let cache = MemoryDocumentOverlayCache::new();
        save(&cache, 1, &["coll/a"]);
        let overlay = cache.get_overlay(&key("coll/a")).unwrap().unwrap();
        assert_eq!(overlay.largest_batch_id(), 1);
        assert!(cache.get_overlay(&key("coll/b")).unwrap().is_none());
    }

    #[test]
    fn test_get_overlays_returns_only_hits() {
        let cache = MemoryDocumentOverlayCache::new();
        save(&cache, 1, &["coll/a", "coll/c"]);
        let keys: BTreeSet<_> = ["coll/a", "coll/b", "coll/c", "coll/d"]
            .iter()
            .map(|p| key(p))
            .collect();
        let result = cache.get_overlays(&keys).unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_newer_overlay_replaces_older_batch() {
        let cache = MemoryDocumentOverlayCache::new();
        save(&cache, 1, &["coll/a", "coll/b"]);
        save(&cache, 2, &["coll/a"]);

        cache.remove_overlays_for_batch_id(1).unwrap();
        assert!(cache.get_overlay(&key("coll/a")).unwrap().is_some());
        assert!(cache.get_overlay(&key("coll/b")).unwrap().is_none());

        cache.remove_overlays_for_batch_id(2).unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_collection_read_filters_batch_and_depth() {
        let cache = MemoryDocumentOverlayCache::new();
        save(&cache, 1, &["coll/a"]);
        save(&cache, 2, &["coll/b", "coll/b/sub/x", "other/c"]);

        let all = cache.get_overlays_in_collection(&"coll".parse().unwrap(), -1).unwrap();
        assert_eq!(all.len(), 2);

        let newer = cache.get_overlays_in_collection(&"coll".parse().unwrap(), 1).unwrap();
        assert_eq!(newer.len(), 1);
        assert!(newer.contains_key(&key("coll/b")));
    }

    #[test]
    fn test_collection_group_read_keeps_batches_whole() {
        let cache = MemoryDocumentOverlayCache::new();
        save(&cache, 1, &["a/1/msgs/x"]);
        save(&cache, 2, &["b/2/msgs/y", "c/3/msgs/z"]);
        save(&cache, 3, &["msgs/w"]);
        save(&cache, 4, &["rooms/r"]);

        let result = cache.get_overlays_in_collection_group("msgs", -1, 2).unwrap();
        assert_eq!(result.len(), 3);
        assert!(!result.contains_key(&key("msgs/w")));

        let since = cache.get_overlays_in_collection_group("msgs", 2, 10).unwrap();
        assert_eq!(since.len(), 1);
        assert!(since.contains_key(&key("msgs/w")));
    }
}
