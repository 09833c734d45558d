//! Query descriptors
//!
//! A [`Query`] targets either a single document, the immediate children of a
//! collection, or every collection with a given id below a base path
//! (a collection group query). Results are always ordered by document key.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::document::MutableDocument;
use crate::path::{DocumentKey, ResourcePath};

/// Comparison operator of a field filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
}

/// `field <op> value`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldFilter {
    field: String,
    op: Operator,
    value: Value,
}

impl FieldFilter {
    /// Create a filter on a dotted field path
    pub fn new(field: impl Into<String>, op: Operator, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
        }
    }

    /// True if `document` has the field and it satisfies the comparison
    ///
    /// Values of different JSON types never compare, so a range filter on
    /// a numeric field skips documents holding a string there.
    pub fn matches(&self, document: &MutableDocument) -> bool {
        let Some(actual) = document.field(&self.field) else {
            return false;
        };
        match self.op {
            Operator::Equal => actual == &self.value,
            Operator::NotEqual => actual != &self.value,
            op => match compare_values(actual, &self.value) {
                Some(ordering) => match op {
                    Operator::LessThan => ordering == Ordering::Less,
                    Operator::LessThanOrEqual => ordering != Ordering::Greater,
                    Operator::GreaterThan => ordering == Ordering::Greater,
                    Operator::GreaterThanOrEqual => ordering != Ordering::Less,
                    Operator::Equal | Operator::NotEqual => false,
                },
                None => false,
            },
        }
    }
}

fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

/// Query descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    path: ResourcePath,
    collection_group: Option<String>,
    filters: Vec<FieldFilter>,
    limit: Option<usize>,
}

impl Query {
    /// Query for the collection or document at `path`
    pub fn at_path(path: ResourcePath) -> Self {
        Self {
            path,
            collection_group: None,
            filters: Vec::new(),
            limit: None,
        }
    }

    /// Query across every collection named `collection_id`
    pub fn collection_group(collection_id: impl Into<String>) -> Self {
        Self {
            path: ResourcePath::empty(),
            collection_group: Some(collection_id.into()),
            filters: Vec::new(),
            limit: None,
        }
    }

    /// Add a field filter
    pub fn with_filter(mut self, field: impl Into<String>, op: Operator, value: Value) -> Self {
        self.filters.push(FieldFilter::new(field, op, value));
        self
    }

    /// Cap the number of results
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Base path
    pub fn path(&self) -> &ResourcePath {
        &self.path
    }

    /// Collection id of a collection group query
    pub fn collection_group_id(&self) -> Option<&str> {
        self.collection_group.as_deref()
    }

    /// Field filters
    pub fn filters(&self) -> &[FieldFilter] {
        &self.filters
    }

    /// Result limit
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// True if this query addresses a single document
    pub fn is_document_query(&self) -> bool {
        self.collection_group.is_none()
            && DocumentKey::is_document_key(&self.path)
            && self.filters.is_empty()
    }

    /// True if this is a collection group query
    pub fn is_collection_group_query(&self) -> bool {
        self.collection_group.is_some()
    }

    /// True if every document in the target matches (no filters, no limit)
    pub fn matches_all_documents(&self) -> bool {
        self.filters.is_empty() && self.limit.is_none()
    }

    /// Rewrite a collection group query as a query on one collection
    pub fn as_collection_query_at_path(&self, path: ResourcePath) -> Self {
        Self {
            path,
            collection_group: None,
            filters: self.filters.clone(),
            limit: self.limit,
        }
    }

    /// True if `document` exists and belongs in this query's result set
    pub fn matches(&self, document: &MutableDocument) -> bool {
        document.is_found_document()
            && self.matches_path(document.key())
            && self.filters.iter().all(|filter| filter.matches(document))
    }

    fn matches_path(&self, key: &DocumentKey) -> bool {
        match &self.collection_group {
            Some(group) => key.has_collection_id(group) && self.path.is_prefix_of(key.path()),
            None if DocumentKey::is_document_key(&self.path) => key.path() == &self.path,
            None => self.path.is_immediate_parent_of(key.path()),
        }
    }
}
