//! docstore - local document store with overlay-aware queries
//!
//! Documents synced from a backend live in a remote document cache. Pending
//! local writes are queued as mutation batches and summarized per document as
//! overlays. A query engine answers queries over the merged view, either by
//! re-reading a previous result set by key or by scanning a whole collection.
//!
//! # Quick Start
//!
//! ```
//! use std::collections::BTreeSet;
//! use std::sync::Arc;
//! use docstore::{
//!     CountingQueryEngine, DefaultQueryEngine, DocumentKey, MemoryPersistence, MutableDocument,
//!     ObjectValue, Query, QueryEngine, SnapshotVersion,
//! };
//!
//! let persistence = MemoryPersistence::new();
//! let key = DocumentKey::from_path_str("rooms/lobby")?;
//! let version = SnapshotVersion::from_micros(1);
//! persistence
//!     .remote_document_cache()
//!     .add(MutableDocument::new_found_document(key, version, ObjectValue::new()), version)?;
//!
//! let mut engine = CountingQueryEngine::new(DefaultQueryEngine::new());
//! engine.initialize(Arc::new(persistence.local_documents_view()), persistence.index_manager())?;
//!
//! let query = Query::at_path("rooms".parse()?);
//! let results =
//!     engine.get_documents_matching_query(&query, SnapshotVersion::NONE, &BTreeSet::new())?;
//! assert_eq!(results.len(), 1);
//! assert_eq!(engine.documents_read_by_collection(), 1);
//! # Ok::<(), docstore::StoreError>(())
//! ```
//!
//! # Architecture
//!
//! - `docstore-core`: data model, errors and the storage traits
//! - `docstore-local`: in-memory storage, the local documents view and the
//!   query engine
//! - `docstore-probe`: counting decorators that measure a query engine's reads

pub use docstore_core::{
    BatchId, DocumentKey, DocumentOverlayCache, DocumentState, DocumentType, FieldFilter,
    IndexManager, IndexOffset, Mutation, MutationBatch, MutationQueue, MutableDocument,
    ObjectValue, Operator, Overlay, Query, RemoteDocumentCache, ResourcePath, SnapshotVersion,
    StoreError, StoreResult, BATCH_ID_UNKNOWN,
};
pub use docstore_local::{
    DefaultQueryEngine, LocalDocumentsResult, LocalDocumentsView, MemoryDocumentOverlayCache,
    MemoryIndexManager, MemoryMutationQueue, MemoryPersistence, MemoryRemoteDocumentCache,
    QueryEngine, QueryEngineConfig,
};
pub use docstore_probe::{
    AccessShape, CountingDocumentOverlayCache, CountingQueryEngine, CountingRemoteDocumentCache,
    EngineState, ReadCounters, ReadCounts,
};
