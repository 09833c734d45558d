//! Counting decorator for the remote document cache
//!
//! Forwards every call to the wrapped cache. Reads are counted after the
//! wrapped call returns successfully:
//! - `get` / `get_all`: one by-key read per *valid* document in the result;
//!   "not found" sentinels are free
//! - collection and collection group scans: one by-collection read per
//!   returned document
//!
//! Writes are forwarded uncounted. `set_index_manager` is deliberately not
//! forwarded: the wrapped cache already has its index manager, and the probe
//! must not rewire the storage it observes.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::trace;

use docstore_core::{
    DocumentKey, IndexManager, IndexOffset, MutableDocument, RemoteDocumentCache, ResourcePath,
    SnapshotVersion, StoreResult,
};

use crate::counters::{AccessShape, ReadCounters};

/// Remote document cache that counts document reads
pub struct CountingRemoteDocumentCache {
    subject: Arc<dyn RemoteDocumentCache>,
    counters: Arc<ReadCounters>,
}

impl CountingRemoteDocumentCache {
    /// Wrap `subject`, recording reads into `counters`
    pub fn new(subject: Arc<dyn RemoteDocumentCache>, counters: Arc<ReadCounters>) -> Self {
        Self { subject, counters }
    }

    /// The wrapped cache
    pub fn subject(&self) -> &Arc<dyn RemoteDocumentCache> {
        &self.subject
    }

    fn record_collection_scan(&self, result: &BTreeMap<DocumentKey, MutableDocument>) {
        self.counters
            .record_documents(AccessShape::ByCollection, result.len() as u64);
    }
}

impl std::fmt::Debug for CountingRemoteDocumentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingRemoteDocumentCache")
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl RemoteDocumentCache for CountingRemoteDocumentCache {
    fn set_index_manager(&self, _index_manager: Arc<dyn IndexManager>) {
        // Not forwarded.
    }

    fn add(&self, document: MutableDocument, read_time: SnapshotVersion) -> StoreResult<()> {
        self.subject.add(document, read_time)
    }

    fn remove_all(&self, keys: &[DocumentKey]) -> StoreResult<()> {
        self.subject.remove_all(keys)
    }

    fn get(&self, key: &DocumentKey) -> StoreResult<MutableDocument> {
        let result = self.subject.get(key)?;
        if result.is_valid_document() {
            self.counters.record_documents(AccessShape::ByKey, 1);
        }
        trace!(
            target: "docstore::probe",
            key = %key,
            found = result.is_valid_document(),
            "Document read by key"
        );
        Ok(result)
    }

    fn get_all(&self, keys: &[DocumentKey]) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        let result = self.subject.get_all(keys)?;
        let found = result.values().filter(|doc| doc.is_valid_document()).count() as u64;
        self.counters.record_documents(AccessShape::ByKey, found);
        trace!(target: "docstore::probe", requested = keys.len(), found, "Documents read by key");
        Ok(result)
    }

    fn get_all_in_collection_group(
        &self,
        collection_group: &str,
        offset: &IndexOffset,
        limit: usize,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        let result = self
            .subject
            .get_all_in_collection_group(collection_group, offset, limit)?;
        self.record_collection_scan(&result);
        trace!(
            target: "docstore::probe",
            collection_group,
            limit,
            read = result.len(),
            "Documents read by collection group"
        );
        Ok(result)
    }

    fn get_all_in_collection(
        &self,
        collection: &ResourcePath,
        offset: &IndexOffset,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        let result = self.subject.get_all_in_collection(collection, offset)?;
        self.record_collection_scan(&result);
        trace!(
            target: "docstore::probe",
            collection = %collection,
            read = result.len(),
            "Documents read by collection"
        );
        Ok(result)
    }
}
