//! In-memory remote document cache
//!
//! Documents live in a key-ordered `BTreeMap` behind a `parking_lot::RwLock`.
//! Because paths sort directly after their prefixes, a collection scan is a
//! range scan starting at the collection path.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use docstore_core::{
    DocumentKey, IndexManager, IndexOffset, MutableDocument, RemoteDocumentCache, ResourcePath,
    SnapshotVersion, StoreResult,
};

/// Remote document cache backed by an ordered map
#[derive(Default)]
pub struct MemoryRemoteDocumentCache {
    documents: RwLock<BTreeMap<DocumentKey, MutableDocument>>,
    index_manager: RwLock<Option<Arc<dyn IndexManager>>>,
}

impl MemoryRemoteDocumentCache {
    /// Create an empty cache with no index manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached documents
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// True if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

impl std::fmt::Debug for MemoryRemoteDocumentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRemoteDocumentCache")
            .field("documents", &self.len())
            .field("has_index_manager", &self.index_manager.read().is_some())
            .finish()
    }
}

impl RemoteDocumentCache for MemoryRemoteDocumentCache {
    fn set_index_manager(&self, index_manager: Arc<dyn IndexManager>) {
        *self.index_manager.write() = Some(index_manager);
    }

    fn add(&self, mut document: MutableDocument, read_time: SnapshotVersion) -> StoreResult<()> {
        let collection_path = document.key().collection_path();
        document.set_read_time(read_time);
        trace!(
            target: "docstore::local",
            key = %document.key(),
            read_time = %read_time,
            "Document cached"
        );
        self.documents.write().insert(document.key().clone(), document);

        // Registered outside the data lock so the index manager may call back in.
        if let Some(index_manager) = self.index_manager.read().clone() {
            index_manager.add_to_collection_parent_index(&collection_path)?;
        }
        Ok(())
    }

    fn remove_all(&self, keys: &[DocumentKey]) -> StoreResult<()> {
        let mut documents = self.documents.write();
        for key in keys {
            documents.remove(key);
        }
        Ok(())
    }

    fn get(&self, key: &DocumentKey) -> StoreResult<MutableDocument> {
        Ok(self
            .documents
            .read()
            .get(key)
            .cloned()
            .unwrap_or_else(|| MutableDocument::new_invalid_document(key.clone())))
    }

    fn get_all(&self, keys: &[DocumentKey]) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        let documents = self.documents.read();
        Ok(keys
            .iter()
            .map(|key| {
                let document = documents
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| MutableDocument::new_invalid_document(key.clone()));
                (key.clone(), document)
            })
            .collect())
    }

    fn get_all_in_collection_group(
        &self,
        collection_group: &str,
        offset: &IndexOffset,
        limit: usize,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        let documents = self.documents.read();
        let mut candidates: Vec<(IndexOffset, &MutableDocument)> = documents
            .values()
            .filter(|doc| doc.key().has_collection_id(collection_group))
            .map(|doc| (IndexOffset::from_document(doc), doc))
            .filter(|(doc_offset, _)| doc_offset > offset)
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(candidates
            .into_iter()
            .take(limit)
            .map(|(_, doc)| (doc.key().clone(), doc.clone()))
            .collect())
    }

    fn get_all_in_collection(
        &self,
        collection: &ResourcePath,
        offset: &IndexOffset,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        let documents = self.documents.read();
        let mut results = BTreeMap::new();

        // Keys inside the collection form one contiguous range, but the range
        // also holds documents of nested subcollections. An empty document id
        // sorts before every real one, so it marks the start of the range.
        let start = DocumentKey::from_path(collection.child(""))
            .unwrap_or_else(|_| DocumentKey::empty());
        for (key, doc) in documents.range((Bound::Included(start), Bound::Unbounded)) {
            if !collection.is_prefix_of(key.path()) {
                break;
            }
            if !collection.is_immediate_parent_of(key.path()) {
                continue;
            }
            if IndexOffset::from_document(doc) <= *offset {
                continue;
            }
            results.insert(key.clone(), doc.clone());
        }
        Ok(results)
    }
}
