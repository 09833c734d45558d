//! Collaborator traits of the local document store
//!
//! This module defines the storage interfaces a query engine composes: the
//! remote document cache, the overlay cache, the mutation queue and the
//! index manager. Implementations can be swapped (in-memory, persistent,
//! or wrapped by an instrumenting decorator) without touching the engine.
//!
//! Thread safety: All methods take `&self` and implementations must be safe to
//! share between threads (requires Send + Sync).
//!
//! Every operation returns [`StoreResult`]. Decorators must hand errors back
//! to their caller untouched.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::document::MutableDocument;
use crate::error::StoreResult;
use crate::mutation::{BatchId, Mutation, MutationBatch, Overlay};
use crate::path::{DocumentKey, ResourcePath};
use crate::version::{IndexOffset, SnapshotVersion};

/// Cache of documents as last seen from the backend
pub trait RemoteDocumentCache: Send + Sync {
    /// Register the index manager notified about new collection parents
    fn set_index_manager(&self, index_manager: Arc<dyn IndexManager>);

    /// Store `document`, stamped with `read_time`
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn add(&self, document: MutableDocument, read_time: SnapshotVersion) -> StoreResult<()>;

    /// Remove every key in `keys`
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn remove_all(&self, keys: &[DocumentKey]) -> StoreResult<()>;

    /// Look up one document
    ///
    /// Returns the invalid-document sentinel, never an error, when the key is
    /// not cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, key: &DocumentKey) -> StoreResult<MutableDocument>;

    /// Look up a batch of documents
    ///
    /// The result holds one entry per requested key, sentinels included.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_all(&self, keys: &[DocumentKey]) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>>;

    /// Scan every collection named `collection_group` past `offset`
    ///
    /// Documents are taken in offset order and at most `limit` are returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_all_in_collection_group(
        &self,
        collection_group: &str,
        offset: &IndexOffset,
        limit: usize,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>>;

    /// Scan the immediate children of `collection` past `offset`
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_all_in_collection(
        &self,
        collection: &ResourcePath,
        offset: &IndexOffset,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>>;
}

/// Cache of pending local writes, one overlay per document
pub trait DocumentOverlayCache: Send + Sync {
    /// Overlay for `key`, if any
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_overlay(&self, key: &DocumentKey) -> StoreResult<Option<Overlay>>;

    /// Overlays for `keys`; keys without an overlay are absent from the result
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_overlays(
        &self,
        keys: &BTreeSet<DocumentKey>,
    ) -> StoreResult<BTreeMap<DocumentKey, Overlay>>;

    /// Store `overlays`, each tagged with `largest_batch_id`
    ///
    /// Replaces any existing overlay for the same key.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn save_overlays(
        &self,
        largest_batch_id: BatchId,
        overlays: &BTreeMap<DocumentKey, Mutation>,
    ) -> StoreResult<()>;

    /// Remove every overlay tagged with `batch_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn remove_overlays_for_batch_id(&self, batch_id: BatchId) -> StoreResult<()>;

    /// Overlays for the immediate children of `collection` newer than `since_batch_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_overlays_in_collection(
        &self,
        collection: &ResourcePath,
        since_batch_id: BatchId,
    ) -> StoreResult<BTreeMap<DocumentKey, Overlay>>;

    /// Overlays in `collection_group` newer than `since_batch_id`
    ///
    /// Whole batches are returned in ascending batch id order until at least
    /// `count` overlays are collected, so the result may exceed `count`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get_overlays_in_collection_group(
        &self,
        collection_group: &str,
        since_batch_id: BatchId,
        count: usize,
    ) -> StoreResult<BTreeMap<DocumentKey, Overlay>>;
}

/// Queue of unacknowledged write batches
pub trait MutationQueue: Send + Sync {
    /// Append a batch and return it with its newly allocated id
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn add_mutation_batch(&self, mutations: Vec<Mutation>) -> StoreResult<MutationBatch>;

    /// Batch with `batch_id`, if still queued
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn lookup_mutation_batch(&self, batch_id: BatchId) -> StoreResult<Option<MutationBatch>>;

    /// All queued batches in id order
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn all_mutation_batches(&self) -> StoreResult<Vec<MutationBatch>>;

    /// Queued batches writing at least one of `keys`, in id order
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn all_mutation_batches_affecting_keys(
        &self,
        keys: &BTreeSet<DocumentKey>,
    ) -> StoreResult<Vec<MutationBatch>>;

    /// Drop the batch with `batch_id`
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::BatchNotFound`] if no such batch is queued.
    fn remove_mutation_batch(&self, batch_id: BatchId) -> StoreResult<()>;
}

/// Index bookkeeping used by collection group queries
pub trait IndexManager: Send + Sync {
    /// Record that `collection_path` holds documents
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn add_to_collection_parent_index(&self, collection_path: &ResourcePath) -> StoreResult<()>;

    /// Every parent path holding a collection named `collection_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn collection_parents(&self, collection_id: &str) -> StoreResult<Vec<ResourcePath>>;
}
