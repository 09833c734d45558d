//! Resource paths and document keys
//!
//! A [`ResourcePath`] is a slash-separated list of segments such as
//! `rooms/eros/messages`. Paths with an odd number of segments name a
//! collection; paths with an even number name a document, which is what a
//! [`DocumentKey`] wraps.
//!
//! ## Ordering
//!
//! Paths compare segment by segment, so a path always sorts directly before
//! every path it is a prefix of. Key-ordered maps rely on this to scan a
//! collection as a contiguous range.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{StoreError, StoreResult};

/// Ordered list of path segments
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourcePath {
    segments: Vec<String>,
}

impl ResourcePath {
    /// The empty (root) path
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a path from individual segments
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Segments of this path, root first
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True for the root path
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Segment at `index`
    pub fn segment(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(String::as_str)
    }

    /// Last segment, or None for the root path
    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// New path with `segment` appended
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// New path without the last segment (root stays root)
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    /// True if every segment of `self` leads `other`
    pub fn is_prefix_of(&self, other: &ResourcePath) -> bool {
        self.len() <= other.len() && other.segments[..self.len()] == self.segments[..]
    }

    /// True if `other` is exactly one segment below `self`
    pub fn is_immediate_parent_of(&self, other: &ResourcePath) -> bool {
        self.len() + 1 == other.len() && self.is_prefix_of(other)
    }
}

impl FromStr for ResourcePath {
    type Err = StoreError;

    /// Parse `a/b/c`. Empty segments (leading, trailing or doubled slashes) are dropped.
    fn from_str(s: &str) -> StoreResult<Self> {
        Ok(Self::from_segments(s.split('/').filter(|seg| !seg.is_empty())))
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// Path of a single document
///
/// Invariant: the wrapped path has an even number of segments. The only
/// exception is [`DocumentKey::empty`], which sorts before every real key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentKey(ResourcePath);

impl DocumentKey {
    /// Create a key from a document path
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidPath`] if the path does not name a document.
    pub fn from_path(path: ResourcePath) -> StoreResult<Self> {
        if Self::is_document_key(&path) {
            Ok(Self(path))
        } else {
            Err(StoreError::InvalidPath(format!(
                "'{}' is not a document path (even, non-zero segment count required)",
                path
            )))
        }
    }

    /// Parse a key from a slash-separated document path
    pub fn from_path_str(path: &str) -> StoreResult<Self> {
        Self::from_path(path.parse()?)
    }

    /// The smallest possible key, used as a tie-breaker in offsets
    pub fn empty() -> Self {
        Self(ResourcePath::empty())
    }

    /// True if `path` has the shape of a document path
    pub fn is_document_key(path: &ResourcePath) -> bool {
        !path.is_empty() && path.len() % 2 == 0
    }

    /// Full document path
    pub fn path(&self) -> &ResourcePath {
        &self.0
    }

    /// Path of the collection holding this document
    pub fn collection_path(&self) -> ResourcePath {
        self.0.parent()
    }

    /// Id of the collection holding this document (the collection group)
    pub fn collection_group(&self) -> Option<&str> {
        self.0.len().checked_sub(2).and_then(|idx| self.0.segment(idx))
    }

    /// True if the document's parent collection is named `collection_id`
    pub fn has_collection_id(&self, collection_id: &str) -> bool {
        self.collection_group() == Some(collection_id)
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
