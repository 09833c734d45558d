//! Counting decorator for the document overlay cache
//!
//! Key lookups are charged per key *requested*, hit or miss, since an
//! overlay lookup pays for the probe whether or not anything is there.
//! Collection and collection group reads are charged per overlay returned.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::trace;

use docstore_core::{
    BatchId, DocumentKey, DocumentOverlayCache, Mutation, Overlay, ResourcePath, StoreResult,
};

use crate::counters::{AccessShape, ReadCounters};

/// Overlay cache that counts overlay reads
pub struct CountingDocumentOverlayCache {
    subject: Arc<dyn DocumentOverlayCache>,
    counters: Arc<ReadCounters>,
}

impl CountingDocumentOverlayCache {
    /// Wrap `subject`, recording reads into `counters`
    pub fn new(subject: Arc<dyn DocumentOverlayCache>, counters: Arc<ReadCounters>) -> Self {
        Self { subject, counters }
    }

    /// The wrapped cache
    pub fn subject(&self) -> &Arc<dyn DocumentOverlayCache> {
        &self.subject
    }
}

impl std::fmt::Debug for CountingDocumentOverlayCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingDocumentOverlayCache")
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl DocumentOverlayCache for CountingDocumentOverlayCache {
    fn get_overlay(&self, key: &DocumentKey) -> StoreResult<Option<Overlay>> {
        let overlay = self.subject.get_overlay(key)?;
        self.counters.record_overlays(AccessShape::ByKey, 1);
        trace!(
            target: "docstore::probe",
            key = %key,
            hit = overlay.is_some(),
            "Overlay read by key"
        );
        Ok(overlay)
    }

    fn get_overlays(
        &self,
        keys: &BTreeSet<DocumentKey>,
    ) -> StoreResult<BTreeMap<DocumentKey, Overlay>> {
        let overlays = self.subject.get_overlays(keys)?;
        self.counters.record_overlays(AccessShape::ByKey, keys.len() as u64);
        trace!(
            target: "docstore::probe",
            requested = keys.len(),
            hits = overlays.len(),
            "Overlays read by key"
        );
        Ok(overlays)
    }

    fn save_overlays(
        &self,
        largest_batch_id: BatchId,
        overlays: &BTreeMap<DocumentKey, Mutation>,
    ) -> StoreResult<()> {
        self.subject.save_overlays(largest_batch_id, overlays)
    }

    fn remove_overlays_for_batch_id(&self, batch_id: BatchId) -> StoreResult<()> {
        self.subject.remove_overlays_for_batch_id(batch_id)
    }

    fn get_overlays_in_collection(
        &self,
        collection: &ResourcePath,
        since_batch_id: BatchId,
    ) -> StoreResult<BTreeMap<DocumentKey, Overlay>> {
        let overlays = self.subject.get_overlays_in_collection(collection, since_batch_id)?;
        self.counters
            .record_overlays(AccessShape::ByCollection, overlays.len() as u64);
        trace!(
            target: "docstore::probe",
            collection = %collection,
            read = overlays.len(),
            "Overlays read by collection"
        );
        Ok(overlays)
    }

    fn get_overlays_in_collection_group(
        &self,
        collection_group: &str,
        since_batch_id: BatchId,
        count: usize,
    ) -> StoreResult<BTreeMap<DocumentKey, Overlay>> {
        let overlays = self
            .subject
            .get_overlays_in_collection_group(collection_group, since_batch_id, count)?;
        self.counters
            .record_overlays(AccessShape::ByCollection, overlays.len() as u64);
        trace!(
            target: "docstore::probe",
            collection_group,
            read = overlays.len(),
            "Overlays read by collection group"
        );
        Ok(overlays)
    }
}
