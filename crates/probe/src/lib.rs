//! Read-count instrumentation for docstore query engines
//!
//! Wraps a [`docstore_local::QueryEngine`] so that every read it makes
//! against the remote document cache and the overlay cache is counted:
//! - counters: the four shared counters and their snapshot type
//! - remote_document_cache: counting decorator for document reads
//! - overlay_cache: counting decorator for overlay reads
//! - query_engine: `CountingQueryEngine`, which installs both decorators
//!
//! Tests use the counts to assert *how* a query was answered (by previous
//! result keys or by a full scan), not just what it returned.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod counters;
pub mod overlay_cache;
pub mod query_engine;
pub mod remote_document_cache;

pub use counters::{AccessShape, ReadCounters, ReadCounts};
pub use overlay_cache::CountingDocumentOverlayCache;
pub use query_engine::{CountingQueryEngine, EngineState};
pub use remote_document_cache::CountingRemoteDocumentCache;
