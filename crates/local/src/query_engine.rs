//! Query execution over the local documents view
//!
//! The engine picks the cheapest way to answer a query:
//!
//! 1. **Previous results by key.** When the caller knows the query's result
//!    set as of a limbo-free snapshot version, the engine reads exactly those
//!    keys and then scans only documents read after that version.
//! 2. **Full collection scan.** Otherwise every document in the target
//!    collection (or collection group) is read and filtered.
//!
//! Both strategies return the same documents; they differ only in which
//! storage reads they perform.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::{debug, warn};

use docstore_core::{
    DocumentKey, IndexManager, IndexOffset, MutableDocument, Query, SnapshotVersion, StoreError,
    StoreResult, BATCH_ID_UNKNOWN,
};

use crate::config::QueryEngineConfig;
use crate::local_documents::LocalDocumentsView;

/// Executes queries against a [`LocalDocumentsView`]
pub trait QueryEngine {
    /// Bind the engine to the documents it queries
    ///
    /// # Errors
    ///
    /// Implementations may reject repeated initialization.
    fn initialize(
        &mut self,
        local_documents: Arc<LocalDocumentsView>,
        index_manager: Arc<dyn IndexManager>,
    ) -> StoreResult<()>;

    /// Documents matching `query`, ordered by key
    ///
    /// `remote_keys` is the query's result set as of
    /// `last_limbo_free_snapshot_version`; pass [`SnapshotVersion::NONE`] if
    /// no such snapshot exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidOperation`] before initialization, and any
    /// error raised by the underlying storage.
    fn get_documents_matching_query(
        &self,
        query: &Query,
        last_limbo_free_snapshot_version: SnapshotVersion,
        remote_keys: &BTreeSet<DocumentKey>,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>>;
}

/// The standard query engine
#[derive(Debug, Default)]
pub struct DefaultQueryEngine {
    config: QueryEngineConfig,
    local_documents: Option<Arc<LocalDocumentsView>>,
}

impl DefaultQueryEngine {
    /// Create an engine with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine with `config`
    pub fn with_config(config: QueryEngineConfig) -> Self {
        Self {
            config,
            local_documents: None,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &QueryEngineConfig {
        &self.config
    }

    /// True once [`QueryEngine::initialize`] has run
    pub fn is_initialized(&self) -> bool {
        self.local_documents.is_some()
    }

    fn local_documents(&self) -> StoreResult<&Arc<LocalDocumentsView>> {
        self.local_documents
            .as_ref()
            .ok_or_else(|| StoreError::invalid_operation("query engine used before initialize"))
    }

    /// Answer from the previous result set plus documents changed since.
    ///
    /// Returns `None` when the previous results cannot be trusted and the
    /// caller must fall back to a full scan.
    fn perform_query_using_remote_keys(
        &self,
        local_documents: &LocalDocumentsView,
        query: &Query,
        last_limbo_free_snapshot_version: SnapshotVersion,
        remote_keys: &BTreeSet<DocumentKey>,
    ) -> StoreResult<Option<BTreeMap<DocumentKey, MutableDocument>>> {
        // Queries that match every document gain nothing from a key lookup.
        if !self.config.reuse_limbo_free_results
            || query.matches_all_documents()
            || last_limbo_free_snapshot_version == SnapshotVersion::NONE
        {
            return Ok(None);
        }

        let documents = local_documents.get_documents(remote_keys)?;
        let previous_results = apply_query(query, documents);
        if needs_refill(query, &previous_results, remote_keys, last_limbo_free_snapshot_version) {
            return Ok(None);
        }

        debug!(
            target: "docstore::query",
            version = %last_limbo_free_snapshot_version,
            previous = previous_results.len(),
            "Re-using previous result to execute query"
        );
        let offset =
            IndexOffset::create_successor(last_limbo_free_snapshot_version, BATCH_ID_UNKNOWN);
        let mut results = local_documents.get_documents_matching_query(query, &offset)?;
        results.extend(previous_results);
        Ok(Some(results))
    }

    fn execute_full_collection_scan(
        &self,
        local_documents: &LocalDocumentsView,
        query: &Query,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        debug!(
            target: "docstore::query",
            path = %query.path(),
            "Using full collection scan to execute query"
        );
        let results = local_documents.get_documents_matching_query(query, &IndexOffset::none())?;
        if let Some(threshold) = self.config.full_scan_warn_threshold {
            if results.len() > threshold {
                warn!(
                    target: "docstore::query",
                    path = %query.path(),
                    results = results.len(),
                    threshold,
                    "Full collection scan returned a large result"
                );
            }
        }
        Ok(results)
    }
}

impl QueryEngine for DefaultQueryEngine {
    fn initialize(
        &mut self,
        local_documents: Arc<LocalDocumentsView>,
        _index_manager: Arc<dyn IndexManager>,
    ) -> StoreResult<()> {
        // Field indexes are not kept, so the index manager is only used by
        // the view for collection group fan-out.
        self.local_documents = Some(local_documents);
        Ok(())
    }

    fn get_documents_matching_query(
        &self,
        query: &Query,
        last_limbo_free_snapshot_version: SnapshotVersion,
        remote_keys: &BTreeSet<DocumentKey>,
    ) -> StoreResult<BTreeMap<DocumentKey, MutableDocument>> {
        let local_documents = self.local_documents()?;
        if let Some(results) = self.perform_query_using_remote_keys(
            local_documents,
            query,
            last_limbo_free_snapshot_version,
            remote_keys,
        )? {
            return Ok(results);
        }
        self.execute_full_collection_scan(local_documents, query)
    }
}

fn apply_query(
    query: &Query,
    documents: BTreeMap<DocumentKey, MutableDocument>,
) -> BTreeMap<DocumentKey, MutableDocument> {
    documents
        .into_iter()
        .filter(|(_, document)| query.matches(document))
        .collect()
}

/// True if a limited query's previous results may have lost documents.
///
/// A limit query needs a full scan if a document that was in the result set
/// no longer matches, or if the document at the limit edge changed after the
/// snapshot. Either way a document outside `remote_keys` may now belong to
/// the result.
fn needs_refill(
    query: &Query,
    sorted_previous_results: &BTreeMap<DocumentKey, MutableDocument>,
    remote_keys: &BTreeSet<DocumentKey>,
    limbo_free_snapshot_version: SnapshotVersion,
) -> bool {
    if query.limit().is_none() {
        return false;
    }
    if remote_keys.len() != sorted_previous_results.len() {
        return true;
    }
    match sorted_previous_results.values().next_back() {
        Some(edge) => edge.has_pending_writes() || edge.version() > limbo_free_snapshot_version,
        None => false,
    }
}
