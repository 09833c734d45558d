//! Snapshot versions and scan offsets
//!
//! ## Precision
//!
//! Versions are stored as microseconds since Unix epoch. `SnapshotVersion::NONE`
//! (zero) means "no version", e.g. a document that was never read from the
//! backend or a query that never reached a limbo-free state.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::document::MutableDocument;
use crate::mutation::{BatchId, BATCH_ID_UNKNOWN};
use crate::path::DocumentKey;

/// Microsecond-precision snapshot version
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotVersion(u64);

impl SnapshotVersion {
    /// The absent version
    pub const NONE: SnapshotVersion = SnapshotVersion(0);

    /// Create a version from microseconds since epoch
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        SnapshotVersion(micros)
    }

    /// Microseconds since epoch
    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.0
    }

    /// The smallest version strictly greater than `self`
    #[inline]
    pub const fn successor(&self) -> Self {
        SnapshotVersion(self.0.saturating_add(1))
    }
}

impl fmt::Display for SnapshotVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}us", self.0)
    }
}

/// Resume position of a collection scan
///
/// Offsets order by read time, then document key, then batch id. A scan from
/// offset `o` yields only documents whose [`IndexOffset::from_document`] is
/// strictly greater than `o`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexOffset {
    read_time: SnapshotVersion,
    document_key: DocumentKey,
    largest_batch_id: BatchId,
}

impl IndexOffset {
    /// Offset that precedes every document and every batch
    pub fn none() -> Self {
        Self::new(SnapshotVersion::NONE, DocumentKey::empty(), BATCH_ID_UNKNOWN)
    }

    /// Create an offset from its parts
    pub fn new(
        read_time: SnapshotVersion,
        document_key: DocumentKey,
        largest_batch_id: BatchId,
    ) -> Self {
        Self {
            read_time,
            document_key,
            largest_batch_id,
        }
    }

    /// Offset positioned exactly at `document`
    pub fn from_document(document: &MutableDocument) -> Self {
        Self::new(document.read_time(), document.key().clone(), BATCH_ID_UNKNOWN)
    }

    /// Offset that includes every document read after `read_time`
    pub fn create_successor(read_time: SnapshotVersion, largest_batch_id: BatchId) -> Self {
        Self::new(read_time.successor(), DocumentKey::empty(), largest_batch_id)
    }

    /// Read time component
    pub fn read_time(&self) -> SnapshotVersion {
        self.read_time
    }

    /// Document key component
    pub fn document_key(&self) -> &DocumentKey {
        &self.document_key
    }

    /// Largest batch id component
    pub fn largest_batch_id(&self) -> BatchId {
        self.largest_batch_id
    }
}

impl Default for IndexOffset {
    fn default() -> Self {
        Self::none()
    }
}
