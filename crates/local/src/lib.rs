//! Local document store for docstore
//!
//! This crate composes the collaborator traits from `docstore-core` into a
//! queryable local store:
//! - memory: in-memory remote document cache, overlay cache, mutation queue
//!   and index manager, plus `MemoryPersistence` wiring them together
//! - LocalDocumentsView: remote documents with pending overlays applied
//! - QueryEngine / DefaultQueryEngine: query execution by previous result
//!   keys or by full collection scan
//! - QueryEngineConfig: engine settings loaded from TOML

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod local_documents;
pub mod memory;
pub mod query_engine;

pub use config::QueryEngineConfig;
pub use local_documents::{LocalDocumentsResult, LocalDocumentsView};
pub use memory::{
    MemoryDocumentOverlayCache, MemoryIndexManager, MemoryMutationQueue, MemoryPersistence,
    MemoryRemoteDocumentCache,
};
pub use query_engine::{DefaultQueryEngine, QueryEngine};
