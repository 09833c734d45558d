//! Local documents view
//!
//! Composes the remote document cache, the mutation queue, the overlay cache
//! and the index manager into the locally visible state of each document:
//! the remote version with its pending overlay applied.
//!
//! The view holds shared handles to its components and never caches
//! anything itself, so every read below reaches the components. Wrapping a
//! component (e.g. with a counting decorator) therefore observes every read
//! the view performs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use docstore_core::{
    BatchId, DocumentKey, DocumentOverlayCache, IndexManager, IndexOffset, MutableDocument,
    Mutation, MutationBatch, MutationQueue, ObjectValue, Overlay, Query, RemoteDocumentCache,
    ResourcePath, StoreError, StoreResult, BATCH_ID_UNKNOWN,
};

/// Documents returned by an incremental collection group scan
#[derive(Debug, Clone, PartialEq)]
pub struct LocalDocumentsResult {
    batch_id: BatchId,
    documents: BTreeMap<DocumentKey, MutableDocument>,
}

impl LocalDocumentsResult {
    /// Largest batch id among the overlays applied
    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    /// Documents with overlays applied
    pub fn documents(&self) -> &BTreeMap<DocumentKey, MutableDocument> {
        &self.documents
    }

    /// Consume into the document map
    pub fn into_documents(self) -> BTreeMap<DocumentKey, MutableDocument> {
        self.documents
    }
}

/// The locally visible documents: remote state plus pending writes
#[derive(Clone)]
pub struct LocalDocumentsView {
    remote_document_cache: Arc<dyn RemoteDocumentCache>,
    mutation_queue: Arc<dyn MutationQueue>,
    document_overlay_cache: Arc<dyn DocumentOverlayCache>,
    index_manager: Arc<dyn IndexManager>,
}

impl std::fmt::Debug for LocalDocumentsView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalDocumentsView").finish_non_exhaustive()
    }
}

impl LocalDocumentsView {
    /// Compose a view from its four components
    pub fn new(
        remote_document_cache: Arc<dyn RemoteDocumentCache>,
        mutation_queue: Arc<dyn MutationQueue>,
        document_overlay_cache: Arc<dyn DocumentOverlayCache>,
        index_manager: Arc<dyn IndexManager>,
    ) -> Self {
        Self {
            remote_document_cache,
            mutation_queue,
            document_overlay_cache,
            index_manager,
        }
    }

    /// Remote document cache component
    pub fn remote_document_cache(&self) -> &Arc<dyn RemoteDocumentCache> {
        &self.remote_document_cache
    }

    /// Mutation queue component
    pub fn mutation_queue(&self) -> &Arc<dyn MutationQueue> {
        &self.mutation_queue
    }

    /// Overlay cache component
    pub fn document_overlay_cache(&self) -> &Arc<dyn DocumentOverlayCache> {
        &self.document_overlay_cache
    }

    /// Index manager component
    pub fn index_manager(&self) -> &Arc<dyn IndexManager> {
        &self.index_manager
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Local view of one document
    ///
    /// Returns the invalid sentinel if neither the remote cache nor an overlay
    /// knows the key.
    pub fn get_document(&self, key: &DocumentKey) -> StoreResult<MutableDocument> {
        let overlay = self.document_overlay_cache.get_overlay(key)?;
        let mut document = self.get_base_document(key, overlay.as_ref())?;
        if let Some(overlay) = overlay {
            overlay.mutation().apply_to_local_view(&mut document);
        }
        Ok(document)
    }

    /// Local views of `keys`, one entry per key
    pub fn get_documents(
        &self,
        keys: &BTreeSet<DocumentKey>,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        let requested: Vec<DocumentKey> = keys.iter().cloned().collect();
        let documents = self.remote_document_cache.get_all(&requested)?;
        let overlays = self.document_overlay_cache.get_overlays(keys)?;
        Ok(apply_overlays(documents, &overlays))
    }

    /// Documents matching `query` that changed after `offset`
    ///
    /// Offsets let a caller rescan only documents read or written after a
    /// previous scan; pass [`IndexOffset::none`] for a full scan.
    pub fn get_documents_matching_query(
        &self,
        query: &Query,
        offset: &IndexOffset,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        if query.is_document_query() {
            self.get_documents_matching_document_query(query.path())
        } else if let Some(collection_id) = query.collection_group_id() {
            self.get_documents_matching_collection_group_query(query, collection_id, offset)
        } else {
            self.get_documents_matching_collection_query(query, offset)
        }
    }

    /// Next page of documents in `collection_group` after `offset`
    ///
    /// Reads at most `count` remote documents, then fills any remaining room
    /// with documents that only have pending overlays. The returned batch id
    /// is the largest among the overlays applied, for resuming the scan.
    pub fn get_next_documents(
        &self,
        collection_group: &str,
        offset: &IndexOffset,
        count: usize,
    ) -> StoreResult<LocalDocumentsResult> {
        let mut documents = self
            .remote_document_cache
            .get_all_in_collection_group(collection_group, offset, count)?;
        let mut overlays = if count > documents.len() {
            self.document_overlay_cache.get_overlays_in_collection_group(
                collection_group,
                offset.largest_batch_id(),
                count - documents.len(),
            )?
        } else {
            BTreeMap::new()
        };

        let mut batch_id = BATCH_ID_UNKNOWN;
        for (key, overlay) in &overlays {
            if !documents.contains_key(key) {
                let base = self.get_base_document(key, Some(overlay))?;
                documents.insert(key.clone(), base);
            }
            batch_id = batch_id.max(overlay.largest_batch_id());
        }

        // Documents read from the remote cache may carry overlays older than
        // the group read returned.
        let missing: BTreeSet<DocumentKey> = documents
            .keys()
            .filter(|key| !overlays.contains_key(*key))
            .cloned()
            .collect();
        if !missing.is_empty() {
            overlays.extend(self.document_overlay_cache.get_overlays(&missing)?);
        }

        Ok(LocalDocumentsResult {
            batch_id,
            documents: apply_overlays(documents, &overlays),
        })
    }

    fn get_base_document(
        &self,
        key: &DocumentKey,
        overlay: Option<&Overlay>,
    ) -> StoreResult<MutableDocument> {
        match overlay {
            // Set and delete overlays replace the remote document entirely.
            Some(overlay) if !overlay.mutation().is_patch() => {
                Ok(MutableDocument::new_invalid_document(key.clone()))
            }
            _ => self.remote_document_cache.get(key),
        }
    }

    fn get_documents_matching_document_query(
        &self,
        path: &ResourcePath,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        let key = DocumentKey::from_path(path.clone())?;
        let document = self.get_document(&key)?;
        let mut results = BTreeMap::new();
        if document.is_found_document() {
            results.insert(key, document);
        }
        Ok(results)
    }

    fn get_documents_matching_collection_group_query(
        &self,
        query: &Query,
        collection_id: &str,
        offset: &IndexOffset,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        let mut results = BTreeMap::new();
        for parent in self.index_manager.collection_parents(collection_id)? {
            let collection = parent.child(collection_id);
            if !query.path().is_prefix_of(&collection) {
                continue;
            }
            let collection_query = query.as_collection_query_at_path(collection);
            results.extend(
                self.get_documents_matching_collection_query(&collection_query, offset)?,
            );
        }
        Ok(results)
    }

    fn get_documents_matching_collection_query(
        &self,
        query: &Query,
        offset: &IndexOffset,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        let remote = self
            .remote_document_cache
            .get_all_in_collection(query.path(), offset)?;
        let overlays = self
            .document_overlay_cache
            .get_overlays_in_collection(query.path(), offset.largest_batch_id())?;

        Ok(apply_overlays(remote, &overlays)
            .into_iter()
            .filter(|(_, document)| query.matches(document))
            .collect())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Queue `mutations` as one batch and update the overlays it touches
    pub fn add_local_mutations(&self, mutations: Vec<Mutation>) -> StoreResult<MutationBatch> {
        if mutations.is_empty() {
            return Err(StoreError::invalid_operation(
                "a mutation batch needs at least one mutation",
            ));
        }
        let batch = self.mutation_queue.add_mutation_batch(mutations)?;
        self.recalculate_and_save_overlays(&batch.keys())?;
        Ok(batch)
    }

    /// Drop a batch (acknowledged or rejected) and rebuild affected overlays
    pub fn remove_mutation_batch(&self, batch_id: BatchId) -> StoreResult<()> {
        let batch = self
            .mutation_queue
            .lookup_mutation_batch(batch_id)?
            .ok_or(StoreError::BatchNotFound(batch_id))?;
        self.mutation_queue.remove_mutation_batch(batch_id)?;
        self.document_overlay_cache.remove_overlays_for_batch_id(batch_id)?;
        self.recalculate_and_save_overlays(&batch.keys())
    }

    /// Rebuild the overlays of `keys` from the remote documents and every queued batch
    ///
    /// Each overlay is tagged with the largest batch id that touches its key.
    /// Keys no queued batch touches are left without an overlay.
    pub fn recalculate_and_save_overlays(&self, keys: &BTreeSet<DocumentKey>) -> StoreResult<()> {
        let batches = self.mutation_queue.all_mutation_batches_affecting_keys(keys)?;
        let requested: Vec<DocumentKey> = keys.iter().cloned().collect();
        let mut documents = self.remote_document_cache.get_all(&requested)?;

        let mut overlays_by_batch: BTreeMap<BatchId, BTreeMap<DocumentKey, Mutation>> =
            BTreeMap::new();
        for key in keys {
            let mut largest_batch_id = BATCH_ID_UNKNOWN;
            let mut mutations = Vec::new();
            for batch in &batches {
                let before = mutations.len();
                mutations.extend(batch.mutations().iter().filter(|m| m.key() == key));
                if mutations.len() > before {
                    largest_batch_id = largest_batch_id.max(batch.batch_id());
                }
            }
            if mutations.is_empty() {
                continue;
            }

            let document = documents
                .entry(key.clone())
                .or_insert_with(|| MutableDocument::new_invalid_document(key.clone()));
            for mutation in &mutations {
                mutation.apply_to_local_view(document);
            }
            overlays_by_batch
                .entry(largest_batch_id)
                .or_default()
                .insert(key.clone(), calculate_overlay_mutation(document, &mutations));
        }

        for (batch_id, overlays) in &overlays_by_batch {
            self.document_overlay_cache.save_overlays(*batch_id, overlays)?;
        }
        debug!(
            target: "docstore::local",
            keys = keys.len(),
            batches = batches.len(),
            "Overlays recalculated"
        );
        Ok(())
    }
}

/// Apply each overlay to its document, materializing overlay-only keys
fn apply_overlays(
    mut documents: BTreeMap<DocumentKey, MutableDocument>,
    overlays: &BTreeMap<DocumentKey, Overlay>,
) -> BTreeMap<DocumentKey, MutableDocument> {
    for (key, overlay) in overlays {
        let document = documents
            .entry(key.clone())
            .or_insert_with(|| MutableDocument::new_invalid_document(key.clone()));
        overlay.mutation().apply_to_local_view(document);
    }
    documents
}

/// Collapse the mutations applied to `document` into one overlay mutation
///
/// A set or delete anywhere in the chain fixes the whole document, so the
/// overlay records the final state. A chain of patches stays a patch over
/// the union of their field masks, so it keeps applying on top of whatever
/// remote version arrives later.
fn calculate_overlay_mutation(document: &MutableDocument, mutations: &[&Mutation]) -> Mutation {
    let key = document.key().clone();
    if document.is_no_document() {
        return Mutation::Delete { key };
    }
    if mutations.iter().any(|m| !m.is_patch()) {
        return Mutation::Set {
            key,
            data: document.data().clone(),
        };
    }

    let mut field_mask: Vec<String> = Vec::new();
    for mutation in mutations {
        if let Mutation::Patch { field_mask: mask, .. } = mutation {
            for field in mask {
                if !field_mask.contains(field) {
                    field_mask.push(field.clone());
                }
            }
        }
    }
    let mut data = ObjectValue::new();
    for field in &field_mask {
        if let Some(value) = document.field(field) {
            data.set_field(field, value.clone());
        }
    }
    Mutation::Patch { key, data, field_mask }
}
