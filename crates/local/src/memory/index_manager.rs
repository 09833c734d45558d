//! In-memory collection parent index

use std::collections::{BTreeSet, HashMap};

use parking_lot::RwLock;

use docstore_core::{IndexManager, ResourcePath, StoreResult};

/// Index manager that only tracks collection parents
///
/// Maps a collection id to every parent path holding a collection of that
/// id, which is what collection group queries fan out over. Field indexes
/// are not kept.
#[derive(Debug, Default)]
pub struct MemoryIndexManager {
    collection_parents: RwLock<HashMap<String, BTreeSet<ResourcePath>>>,
}

impl MemoryIndexManager {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }
}

impl IndexManager for MemoryIndexManager {
    fn add_to_collection_parent_index(&self, collection_path: &ResourcePath) -> StoreResult<()> {
        if let Some(collection_id) = collection_path.last_segment() {
            self.collection_parents
                .write()
                .entry(collection_id.to_string())
                .or_default()
                .insert(collection_path.parent());
        }
        Ok(())
    }

    fn collection_parents(&self, collection_id: &str) -> StoreResult<Vec<ResourcePath>> {
        Ok(self
            .collection_parents
            .read()
            .get(collection_id)
            .map(|parents| parents.iter().cloned().collect())
            .unwrap_or_default())
    }
}
