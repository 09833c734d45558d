//! Core types and traits for the local document store
//!
//! This crate defines the foundational types used throughout the system:
//! - ResourcePath / DocumentKey: slash-separated document addressing
//! - SnapshotVersion / IndexOffset: versions and collection scan cursors
//! - MutableDocument: document slot, including the "not found" sentinel
//! - Mutation / Overlay / MutationBatch: pending local writes
//! - Query: collection, collection group and single document queries
//! - Error: error type shared by every layer
//! - Traits: collaborator interfaces (RemoteDocumentCache, DocumentOverlayCache,
//!   MutationQueue, IndexManager)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod error;
pub mod mutation;
pub mod path;
pub mod query;
pub mod traits;
pub mod version;

pub use document::{DocumentState, DocumentType, MutableDocument, ObjectValue};
pub use error::{StoreError, StoreResult};
pub use mutation::{BatchId, Mutation, MutationBatch, Overlay, BATCH_ID_UNKNOWN};
pub use path::{DocumentKey, ResourcePath};
pub use query::{FieldFilter, Operator, Query};
pub use traits::{DocumentOverlayCache, IndexManager, MutationQueue, RemoteDocumentCache};
pub use version::{IndexOffset, SnapshotVersion};
