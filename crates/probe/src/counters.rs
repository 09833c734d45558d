//! Read counters shared by the probes and the counting query engine
//!
//! Four independent counters, partitioned by what was read (documents or
//! overlays) and how it was addressed ([`AccessShape`]). Counters only grow;
//! [`ReadCounters::reset`] is the only way back to zero. Reset and
//! [`ReadCounters::snapshot`] each take the single lock once, so neither can
//! observe or leave a partial state.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// How a read addressed its data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessShape {
    /// Single key or explicit key batch
    ByKey,
    /// Scan over a collection or collection group
    ByCollection,
}

/// Point-in-time copy of the four counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReadCounts {
    /// Valid documents returned by single-key and key-batch lookups
    pub documents_read_by_key: u64,
    /// Documents returned by collection and collection group scans
    pub documents_read_by_collection: u64,
    /// Keys probed by single-key and key-batch overlay lookups
    pub overlays_read_by_key: u64,
    /// Overlays returned by collection and collection group scans
    pub overlays_read_by_collection: u64,
}

impl ReadCounts {
    /// Sum of all four counters
    pub fn total(&self) -> u64 {
        self.documents_read_by_key
            + self.documents_read_by_collection
            + self.overlays_read_by_key
            + self.overlays_read_by_collection
    }
}

/// Resettable read counters
#[derive(Debug, Default)]
pub struct ReadCounters {
    counts: Mutex<ReadCounts>,
}

impl ReadCounters {
    /// Create counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` document reads of the given shape
    pub fn record_documents(&self, shape: AccessShape, count: u64) {
        let mut counts = self.counts.lock();
        match shape {
            AccessShape::ByKey => counts.documents_read_by_key += count,
            AccessShape::ByCollection => counts.documents_read_by_collection += count,
        }
    }

    /// Add `count` overlay reads of the given shape
    pub fn record_overlays(&self, shape: AccessShape, count: u64) {
        let mut counts = self.counts.lock();
        match shape {
            AccessShape::ByKey => counts.overlays_read_by_key += count,
            AccessShape::ByCollection => counts.overlays_read_by_collection += count,
        }
    }

    /// Current values of all four counters
    pub fn snapshot(&self) -> ReadCounts {
        *self.counts.lock()
    }

    /// Set all four counters to zero
    pub fn reset(&self) {
        *self.counts.lock() = ReadCounts::default();
    }
}
