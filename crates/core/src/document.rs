//! Documents and their field data
//!
//! A [`MutableDocument`] is the unit every cache hands out. Lookups for keys
//! that were never stored return an *invalid* document rather than `None`:
//! callers (and the counting probes) tell real reads from misses with
//! [`MutableDocument::is_valid_document`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::path::DocumentKey;
use crate::version::SnapshotVersion;

/// JSON object holding a document's fields
///
/// Field paths are dot-separated (`address.city`) and address nested objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectValue(Map<String, Value>);

impl ObjectValue {
    /// Empty object
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wrap an existing JSON value; non-objects yield None
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// Underlying JSON map
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Value at a dotted field path
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.0.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    /// Set the value at a dotted field path, creating intermediate objects
    pub fn set_field(&mut self, path: &str, value: Value) {
        let parts: Vec<&str> = path.split('.').collect();
        let (last, parents) = match parts.split_last() {
            Some(split) => split,
            None => return,
        };
        let mut current = &mut self.0;
        for part in parents {
            let entry = current
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = match entry {
                Value::Object(map) => map,
                _ => return,
            };
        }
        current.insert(last.to_string(), value);
    }

    /// Remove the value at a dotted field path
    pub fn delete_field(&mut self, path: &str) {
        let parts: Vec<&str> = path.split('.').collect();
        let (last, parents) = match parts.split_last() {
            Some(split) => split,
            None => return,
        };
        let mut current = &mut self.0;
        for part in parents {
            current = match current.get_mut(*part) {
                Some(Value::Object(map)) => map,
                _ => return,
            };
        }
        current.remove(*last);
    }
}

impl From<Map<String, Value>> for ObjectValue {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// What a document slot holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentType {
    /// Nothing is known about the key (the "not found" sentinel)
    Invalid,
    /// The document exists and its data is known
    FoundDocument,
    /// The document is known not to exist (tombstone)
    NoDocument,
    /// The document exists but its data is unknown
    UnknownDocument,
}

/// Whether a document carries writes not yet reflected by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DocumentState {
    /// Matches the backend
    Synced,
    /// Has locally applied, unacknowledged writes
    HasLocalMutations,
    /// Has writes acknowledged by the backend but not yet observed in a snapshot
    HasCommittedMutations,
}

/// A document slot: key, type, versions, data and local-write state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutableDocument {
    key: DocumentKey,
    document_type: DocumentType,
    version: SnapshotVersion,
    read_time: SnapshotVersion,
    data: ObjectValue,
    document_state: DocumentState,
}

impl MutableDocument {
    fn with_type(
        key: DocumentKey,
        document_type: DocumentType,
        version: SnapshotVersion,
        data: ObjectValue,
    ) -> Self {
        Self {
            key,
            document_type,
            version,
            read_time: SnapshotVersion::NONE,
            data,
            document_state: DocumentState::Synced,
        }
    }

    /// The "not found" sentinel for `key`
    pub fn new_invalid_document(key: DocumentKey) -> Self {
        Self::with_type(key, DocumentType::Invalid, SnapshotVersion::NONE, ObjectValue::new())
    }

    /// An existing document with known data
    pub fn new_found_document(
        key: DocumentKey,
        version: SnapshotVersion,
        data: ObjectValue,
    ) -> Self {
        Self::with_type(key, DocumentType::FoundDocument, version, data)
    }

    /// A tombstone
    pub fn new_no_document(key: DocumentKey, version: SnapshotVersion) -> Self {
        Self::with_type(key, DocumentType::NoDocument, version, ObjectValue::new())
    }

    /// An existing document whose data is unknown
    pub fn new_unknown_document(key: DocumentKey, version: SnapshotVersion) -> Self {
        let mut doc =
            Self::with_type(key, DocumentType::UnknownDocument, version, ObjectValue::new());
        doc.document_state = DocumentState::HasCommittedMutations;
        doc
    }

    /// Key of this document
    pub fn key(&self) -> &DocumentKey {
        &self.key
    }

    /// Slot type
    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    /// Backend version of the document
    pub fn version(&self) -> SnapshotVersion {
        self.version
    }

    /// When the document was read into the cache
    pub fn read_time(&self) -> SnapshotVersion {
        self.read_time
    }

    /// Document fields
    pub fn data(&self) -> &ObjectValue {
        &self.data
    }

    /// Field at a dotted path
    pub fn field(&self, path: &str) -> Option<&Value> {
        self.data.field(path)
    }

    /// True for every slot except the "not found" sentinel
    pub fn is_valid_document(&self) -> bool {
        self.document_type != DocumentType::Invalid
    }

    /// True if the document exists with known data
    pub fn is_found_document(&self) -> bool {
        self.document_type == DocumentType::FoundDocument
    }

    /// True for tombstones
    pub fn is_no_document(&self) -> bool {
        self.document_type == DocumentType::NoDocument
    }

    /// True if data is unknown
    pub fn is_unknown_document(&self) -> bool {
        self.document_type == DocumentType::UnknownDocument
    }

    /// True if local writes were applied to this view of the document
    pub fn has_local_mutations(&self) -> bool {
        self.document_state == DocumentState::HasLocalMutations
    }

    /// True if local or committed writes are not yet reflected by the backend
    pub fn has_pending_writes(&self) -> bool {
        self.document_state != DocumentState::Synced
    }

    /// Turn this slot into an existing document with `data`
    pub fn convert_to_found_document(
        &mut self,
        version: SnapshotVersion,
        data: ObjectValue,
    ) -> &mut Self {
        self.version = version;
        self.document_type = DocumentType::FoundDocument;
        self.data = data;
        self.document_state = DocumentState::Synced;
        self
    }

    /// Turn this slot into a tombstone
    pub fn convert_to_no_document(&mut self, version: SnapshotVersion) -> &mut Self {
        self.version = version;
        self.document_type = DocumentType::NoDocument;
        self.data = ObjectValue::new();
        self.document_state = DocumentState::Synced;
        self
    }

    /// Mutable access to the document fields
    pub fn data_mut(&mut self) -> &mut ObjectValue {
        &mut self.data
    }

    /// Record the cache read time
    pub fn set_read_time(&mut self, read_time: SnapshotVersion) -> &mut Self {
        self.read_time = read_time;
        self
    }

    /// Mark the document as carrying local writes
    pub fn set_has_local_mutations(&mut self) -> &mut Self {
        self.document_state = DocumentState::HasLocalMutations;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn key() -> DocumentKey {
        DocumentKey::from_path_str("rooms/eros").unwrap()
    }

    fn object(value: Value) -> ObjectValue {
        ObjectValue::from_json(value).unwrap()
    }

    #[test]
    fn test_invalid_document_is_not_valid() {
        let doc = MutableDocument::new_invalid_document(key());
        assert!(!doc.is_valid_document());
        assert!(!doc.is_found_document());
    }

    #[test]
    fn test_tombstone_is_valid() {
        let doc = MutableDocument::new_no_document(key(), SnapshotVersion::from_micros(3));
        assert!(doc.is_valid_document());
        assert!(doc.is_no_document());
        assert!(!doc.has_pending_writes());
    }

    #[test]
    fn test_unknown_document_has_pending_writes() {
        let doc = MutableDocument::new_unknown_document(key(), SnapshotVersion::from_micros(3));
        assert!(doc.is_unknown_document());
        assert!(doc.has_pending_writes());
        assert!(!doc.has_local_mutations());
    }

    #[test]
    fn test_nested_field_access() {
        let data = object(json!({"address": {"city": "Oslo"}, "n": 1}));
        assert_eq!(data.field("address.city"), Some(&json!("Oslo")));
        assert_eq!(data.field("n"), Some(&json!(1)));
        assert_eq!(data.field("address.zip"), None);
        assert_eq!(data.field("n.x"), None);
    }

    #[test]
    fn test_set_and_delete_field() {
        let mut data = ObjectValue::new();
        data.set_field("a.b", json!(2));
        data.set_field("c", json!("x"));
        assert_eq!(data.field("a.b"), Some(&json!(2)));

        data.delete_field("a.b");
        assert_eq!(data.field("a.b"), None);
        assert_eq!(data.field("a"), Some(&json!({})));

        data.delete_field("missing.path");
        assert_eq!(data.field("c"), Some(&json!("x")));
    }

    #[test]
    fn test_set_field_replaces_scalar_parent() {
        let mut data = object(json!({"a": 1}));
        data.set_field("a.b", json!(true));
        assert_eq!(data.field("a.b"), Some(&json!(true)));
    }

    #[test]
    fn test_convert_found_then_no_document() {
        let mut doc = MutableDocument::new_invalid_document(key());
        doc.convert_to_found_document(SnapshotVersion::from_micros(1), object(json!({"v": 1})))
            .set_has_local_mutations();
        assert!(doc.is_found_document());
        assert!(doc.has_local_mutations());

        doc.convert_to_no_document(SnapshotVersion::NONE);
        assert!(doc.is_no_document());
        assert_eq!(doc.field("v"), None);
    }
}
