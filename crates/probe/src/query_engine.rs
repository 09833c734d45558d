//! Query engine wrapper that exposes storage read counts
//!
//! [`CountingQueryEngine`] intercepts [`QueryEngine::initialize`] and hands
//! the wrapped engine a [`LocalDocumentsView`] whose remote document cache and
//! overlay cache are counting decorators. The mutation queue is passed through
//! unwrapped; mutation batch reads are not counted.
//!
//! ```text
//!   CountingQueryEngine ──► E: QueryEngine
//!                                │
//!                     LocalDocumentsView (rebuilt)
//!             ┌──────────────┬───┴──────────┬──────────────┐
//!   CountingRemoteDocCache  MutationQueue  CountingOverlayCache  IndexManager
//!             │                              │
//!       wrapped remote cache           wrapped overlay cache
//! ```
//!
//! Counts accumulate across queries until [`CountingQueryEngine::reset_counts`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use docstore_core::{
    DocumentKey, IndexManager, MutableDocument, Query, SnapshotVersion, StoreError, StoreResult,
};
use docstore_local::{LocalDocumentsView, QueryEngine};

use crate::counters::{ReadCounters, ReadCounts};
use crate::overlay_cache::CountingDocumentOverlayCache;
use crate::remote_document_cache::CountingRemoteDocumentCache;

/// Lifecycle of a [`CountingQueryEngine`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Constructed, `initialize` not yet called
    Uninitialized,
    /// Caches wrapped and handed to the inner engine
    Initialized,
}

/// A [`QueryEngine`] that counts the storage reads of the engine it wraps
///
/// # Example
///
/// ```
/// use std::collections::BTreeSet;
/// use std::sync::Arc;
/// use docstore_core::{Query, SnapshotVersion};
/// use docstore_local::{DefaultQueryEngine, MemoryPersistence, QueryEngine};
/// use docstore_probe::CountingQueryEngine;
///
/// let persistence = MemoryPersistence::new();
/// let mut engine = CountingQueryEngine::new(DefaultQueryEngine::new());
/// engine
///     .initialize(Arc::new(persistence.local_documents_view()), persistence.index_manager())
///     .unwrap();
///
/// let query = Query::at_path("rooms".parse().unwrap());
/// engine
///     .get_documents_matching_query(&query, SnapshotVersion::NONE, &BTreeSet::new())
///     .unwrap();
/// assert_eq!(engine.documents_read_by_collection(), 0);
/// ```
#[derive(Debug)]
pub struct CountingQueryEngine<E> {
    subject: E,
    counters: Arc<ReadCounters>,
    state: EngineState,
}

impl<E: QueryEngine> CountingQueryEngine<E> {
    /// Wrap `subject` with all counters at zero
    pub fn new(subject: E) -> Self {
        Self {
            subject,
            counters: Arc::new(ReadCounters::new()),
            state: EngineState::Uninitialized,
        }
    }

    /// Set all four counters to zero
    pub fn reset_counts(&self) {
        self.counters.reset();
        debug!(target: "docstore::probe", "Read counters reset");
    }

    /// Consistent snapshot of all four counters
    pub fn counts(&self) -> ReadCounts {
        self.counters.snapshot()
    }

    /// Valid documents read by key since the last reset
    pub fn documents_read_by_key(&self) -> u64 {
        self.counts().documents_read_by_key
    }

    /// Documents read by collection scans since the last reset
    pub fn documents_read_by_collection(&self) -> u64 {
        self.counts().documents_read_by_collection
    }

    /// Overlay keys probed since the last reset
    pub fn overlays_read_by_key(&self) -> u64 {
        self.counts().overlays_read_by_key
    }

    /// Overlays read by collection scans since the last reset
    pub fn overlays_read_by_collection(&self) -> u64 {
        self.counts().overlays_read_by_collection
    }

    /// The wrapped engine
    pub fn subject(&self) -> &E {
        &self.subject
    }

    /// Current lifecycle state
    pub fn state(&self) -> EngineState {
        self.state
    }
}

impl<E: QueryEngine> QueryEngine for CountingQueryEngine<E> {
    /// Wrap the view's caches and initialize the inner engine
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidOperation`] if called twice, and any error
    /// from the inner engine's `initialize`. A failed inner initialization
    /// leaves this engine uninitialized.
    fn initialize(
        &mut self,
        local_documents: Arc<LocalDocumentsView>,
        index_manager: Arc<dyn IndexManager>,
    ) -> StoreResult<()> {
        if self.state == EngineState::Initialized {
            return Err(StoreError::invalid_operation("counting query engine already initialized"));
        }

        let remote_document_cache = Arc::new(CountingRemoteDocumentCache::new(
            local_documents.remote_document_cache().clone(),
            self.counters.clone(),
        ));
        let document_overlay_cache = Arc::new(CountingDocumentOverlayCache::new(
            local_documents.document_overlay_cache().clone(),
            self.counters.clone(),
        ));
        let view = LocalDocumentsView::new(
            remote_document_cache,
            local_documents.mutation_queue().clone(),
            document_overlay_cache,
            index_manager.clone(),
        );

        self.subject.initialize(Arc::new(view), index_manager)?;
        self.state = EngineState::Initialized;
        debug!(target: "docstore::probe", "Counting query engine initialized");
        Ok(())
    }

    fn get_documents_matching_query(
        &self,
        query: &Query,
        last_limbo_free_snapshot_version: SnapshotVersion,
        remote_keys: &BTreeSet<DocumentKey>,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        if self.state == EngineState::Uninitialized {
            return Err(StoreError::invalid_operation(
                "counting query engine used before initialize",
            ));
        }
        self.subject
            .get_documents_matching_query(query, last_limbo_free_snapshot_version, remote_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docstore_local::{DefaultQueryEngine, MemoryPersistence};

    fn initialized() -> (CountingQueryEngine<DefaultQueryEngine>, MemoryPersistence) {
        let persistence = MemoryPersistence::new();
        let mut engine = CountingQueryEngine::new(DefaultQueryEngine::new());
        engine
            .initialize(Arc::new(persistence.local_documents_view()), persistence.index_manager())
            .unwrap();
        (engine, persistence)
    }

    #[test]
    fn test_new_engine_is_uninitialized_with_zero_counts() {
        let engine = CountingQueryEngine::new(DefaultQueryEngine::new());
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert_eq!(engine.counts(), ReadCounts::default());
        assert!(!engine.subject().is_initialized());
    }

    #[test]
    fn test_initialize_initializes_inner_engine() {
        let (engine, _persistence) = initialized();
        assert_eq!(engine.state(), EngineState::Initialized);
        assert!(engine.subject().is_initialized());
    }

    #[test]
    fn test_double_initialize_fails() {
        let (mut engine, persistence) = initialized();
        let view = Arc::new(persistence.local_documents_view());
        let result = engine.initialize(view, persistence.index_manager());
        assert!(matches!(result, Err(StoreError::InvalidOperation(_))));
        assert_eq!(engine.state(), EngineState::Initialized);
    }

    #[test]
    fn test_query_before_initialize_fails() {
        let engine = CountingQueryEngine::new(DefaultQueryEngine::new());
        let query = Query::at_path("coll".parse().unwrap());
        let result =
            engine.get_documents_matching_query(&query, SnapshotVersion::NONE, &BTreeSet::new());
        assert!(matches!(result, Err(StoreError::InvalidOperation(_))));
        assert_eq!(engine.counts().total(), 0);
    }

    #[test]
    fn test_failed_inner_initialize_leaves_engine_uninitialized() {
        struct Refusing;
        impl QueryEngine for Refusing {
            fn initialize(
                &mut self,
                _: Arc<LocalDocumentsView>,
                _: Arc<dyn IndexManager>,
            ) -> StoreResult<()> {
                Err(StoreError::storage("refused"))
            }
            fn get_documents_matching_query(
                &self,
                _: &Query,
                _: SnapshotVersion,
                _: &BTreeSet<DocumentKey>,
            ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
                Ok(BTreeMap::new())
            }
        }

        let persistence = MemoryPersistence::new();
        let mut engine = CountingQueryEngine::new(Refusing);
        let view = Arc::new(persistence.local_documents_view());
        let result = engine.initialize(view, persistence.index_manager());
        assert_eq!(result, Err(StoreError::storage("refused")));
        assert_eq!(engine.state(), EngineState::Uninitialized);
    }

    #[test]
    fn test_reset_counts() {
        let (engine, _persistence) = initialized();
        engine.counters.record_overlays(crate::counters::AccessShape::ByKey, 3);
        assert_eq!(engine.overlays_read_by_key(), 3);
        engine.reset_counts();
        assert_eq!(engine.overlays_read_by_key(), 0);
    }
}
