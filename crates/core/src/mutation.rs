//! Local writes: mutations, batches and overlays
//!
//! A [`MutationBatch`] is one user write as queued in the mutation queue. The
//! overlay cache stores, per document key, a single [`Overlay`]: the mutation
//! that turns the remote document into its locally visible version, tagged
//! with the largest batch id that contributed to it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::document::{MutableDocument, ObjectValue};
use crate::path::DocumentKey;
use crate::version::SnapshotVersion;

/// Identifier of a mutation batch
pub type BatchId = i32;

/// Batch id used where no batch applies
pub const BATCH_ID_UNKNOWN: BatchId = -1;

/// A single pending write to one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Replace the whole document
    Set {
        /// Target document
        key: DocumentKey,
        /// New document data
        data: ObjectValue,
    },
    /// Update the masked fields of an existing document
    Patch {
        /// Target document
        key: DocumentKey,
        /// Values for masked fields; masked fields absent here are deleted
        data: ObjectValue,
        /// Dotted field paths touched by this patch
        field_mask: Vec<String>,
    },
    /// Delete the document
    Delete {
        /// Target document
        key: DocumentKey,
    },
}

impl Mutation {
    /// Key of the document this mutation writes
    pub fn key(&self) -> &DocumentKey {
        match self {
            Mutation::Set { key, .. }
            | Mutation::Patch { key, .. }
            | Mutation::Delete { key } => key,
        }
    }

    /// True for [`Mutation::Patch`]
    pub fn is_patch(&self) -> bool {
        matches!(self, Mutation::Patch { .. })
    }

    /// Apply this mutation to the local view of `document`
    ///
    /// Patches only apply to documents that currently exist.
    pub fn apply_to_local_view(&self, document: &mut MutableDocument) {
        match self {
            Mutation::Set { data, .. } => {
                let version = document.version();
                document
                    .convert_to_found_document(version, data.clone())
                    .set_has_local_mutations();
            }
            Mutation::Patch { data, field_mask, .. } => {
                if !document.is_found_document() {
                    return;
                }
                for field in field_mask {
                    match data.field(field) {
                        Some(value) => document.data_mut().set_field(field, value.clone()),
                        None => document.data_mut().delete_field(field),
                    }
                }
                document.set_has_local_mutations();
            }
            Mutation::Delete { .. } => {
                document
                    .convert_to_no_document(SnapshotVersion::NONE)
                    .set_has_local_mutations();
            }
        }
    }
}

/// A pending write as stored in the overlay cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    largest_batch_id: BatchId,
    mutation: Mutation,
}

impl Overlay {
    /// Create an overlay
    pub fn new(largest_batch_id: BatchId, mutation: Mutation) -> Self {
        Self {
            largest_batch_id,
            mutation,
        }
    }

    /// Largest batch id folded into this overlay
    pub fn largest_batch_id(&self) -> BatchId {
        self.largest_batch_id
    }

    /// The overlay mutation
    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }

    /// Key of the overlaid document
    pub fn key(&self) -> &DocumentKey {
        self.mutation.key()
    }
}

/// One user write, possibly touching several documents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationBatch {
    batch_id: BatchId,
    mutations: Vec<Mutation>,
}

impl MutationBatch {
    /// Create a batch
    pub fn new(batch_id: BatchId, mutations: Vec<Mutation>) -> Self {
        Self { batch_id, mutations }
    }

    /// Id of the batch
    pub fn batch_id(&self) -> BatchId {
        self.batch_id
    }

    /// Mutations in write order
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Every key written by this batch
    pub fn keys(&self) -> BTreeSet<DocumentKey> {
        self.mutations.iter().map(|m| m.key().clone()).collect()
    }

    /// Apply every mutation for `document`'s key, in order
    pub fn apply_to_local_view(&self, document: &mut MutableDocument) {
        let key = document.key().clone();
        for mutation in self.mutations.iter().filter(|m| m.key() == &key) {
            mutation.apply_to_local_view(document);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key(path: &str) -> DocumentKey {
        DocumentKey::from_path_str(path).unwrap()
    }

    fn object(value: serde_json::Value) -> ObjectValue {
        ObjectValue::from_json(value).unwrap()
    }

    fn found(path: &str, value: serde_json::Value) -> MutableDocument {
        MutableDocument::new_found_document(
            key(path),
            SnapshotVersion::from_micros(5),
            object(value),
        )
    }

    #[test]
    fn test_set_creates_document() {
        let mut doc = MutableDocument::new_invalid_document(key("coll/a"));
        Mutation::Set {
            key: key("coll/a"),
            data: object(json!({"x": 1})),
        }
        .apply_to_local_view(&mut doc);

        assert!(doc.is_found_document());
        assert!(doc.has_local_mutations());
        assert_eq!(doc.field("x"), Some(&json!(1)));
    }

    #[test]
    fn test_patch_skips_missing_document() {
        let mut doc = MutableDocument::new_invalid_document(key("coll/a"));
        Mutation::Patch {
            key: key("coll/a"),
            data: object(json!({"x": 1})),
            field_mask: vec!["x".to_string()],
        }
        .apply_to_local_view(&mut doc);

        assert!(!doc.is_valid_document());
        assert!(!doc.has_local_mutations());
    }

    #[test]
    fn test_patch_sets_and_deletes_masked_fields() {
        let mut doc = found("coll/a", json!({"x": 1, "y": 2, "z": 3}));
        Mutation::Patch {
            key: key("coll/a"),
            data: object(json!({"x": 10, "z": 99})),
            field_mask: vec!["x".to_string(), "y".to_string()],
        }
        .apply_to_local_view(&mut doc);

        assert_eq!(doc.field("x"), Some(&json!(10)));
        assert_eq!(doc.field("y"), None);
        assert_eq!(doc.field("z"), Some(&json!(3)));
        assert_eq!(doc.version(), SnapshotVersion::from_micros(5));
    }

    #[test]
    fn test_delete_makes_tombstone() {
        let mut doc = found("coll/a", json!({"x": 1}));
        Mutation::Delete { key: key("coll/a") }.apply_to_local_view(&mut doc);
        assert!(doc.is_no_document());
        assert!(doc.has_local_mutations());
    }

    #[test]
    fn test_batch_applies_only_matching_keys() {
        let batch = MutationBatch::new(
            1,
            vec![
                Mutation::Set {
                    key: key("coll/a"),
                    data: object(json!({"v": 1})),
                },
                Mutation::Delete { key: key("coll/b") },
                Mutation::Patch {
                    key: key("coll/a"),
                    data: object(json!({"w": 2})),
                    field_mask: vec!["w".to_string()],
                },
            ],
        );
        assert_eq!(batch.keys().len(), 2);

        let mut doc = MutableDocument::new_invalid_document(key("coll/a"));
        batch.apply_to_local_view(&mut doc);
        assert_eq!(doc.field("v"), Some(&json!(1)));
        assert_eq!(doc.field("w"), Some(&json!(2)));
    }

    #[test]
    fn test_batch_apply_leaves_other_documents_alone() {
        let batch = MutationBatch::new(
            2,
            vec![
                Mutation::Delete { key: key("coll/a") },
                Mutation::Set {
                    key: key("coll/b"),
                    data: object(json!({"v": 1})),
                },
            ],
        );

        let mut doc = found("coll/b", json!({"v": 0}));
        batch.apply_to_local_view(&mut doc);
        assert!(doc.is_found_document());
        assert_eq!(doc.key(), &key("coll/b"));
        assert_eq!(doc.field("v"), Some(&json!(1)));

        let mut untouched = found("coll/c", json!({"v": 0}));
        batch.apply_to_local_view(&mut untouched);
        assert!(!untouched.has_local_mutations());
    }

    #[test]
    fn test_overlay_key_follows_mutation() {
        let overlay = Overlay::new(3, Mutation::Delete { key: key("coll/a") });
        assert_eq!(overlay.key(), &key("coll/a"));
        assert_eq!(overlay.largest_batch_id(), 3);
        assert!(!overlay.mutation().is_patch());
    }
}
