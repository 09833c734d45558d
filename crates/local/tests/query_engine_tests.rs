//! Query Engine Integration Tests
//!
//! Drives `DefaultQueryEngine` over `MemoryPersistence` through the public
//! API: both execution strategies must agree on which documents match, local
//! mutations must be visible, and the engine must honor its TOML config.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use docstore_core::{
    DocumentKey, Mutation, MutableDocument, ObjectValue, Operator, Query, SnapshotVersion,
    StoreError,
};
use docstore_local::config::CONFIG_FILE_NAME;
use docstore_local::{DefaultQueryEngine, MemoryPersistence, QueryEngine, QueryEngineConfig};
use proptest::prelude::*;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// Helpers
// ============================================================================

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn key(path: &str) -> DocumentKey {
    DocumentKey::from_path_str(path).unwrap()
}

fn v(micros: u64) -> SnapshotVersion {
    SnapshotVersion::from_micros(micros)
}

fn object(value: serde_json::Value) -> ObjectValue {
    ObjectValue::from_json(value).unwrap()
}

fn add_remote(persistence: &MemoryPersistence, path: &str, value: serde_json::Value, version: u64) {
    let doc = MutableDocument::new_found_document(key(path), v(version), object(value));
    persistence.remote_document_cache().add(doc, v(version)).unwrap();
}

fn matching_query() -> Query {
    Query::at_path("coll".parse().unwrap()).with_filter("matches", Operator::Equal, json!(true))
}

fn engine_over(persistence: &MemoryPersistence, config: QueryEngineConfig) -> DefaultQueryEngine {
    let mut engine = DefaultQueryEngine::with_config(config);
    engine
        .initialize(Arc::new(persistence.local_documents_view()), persistence.index_manager())
        .unwrap();
    engine
}

fn keys_of(results: &BTreeMap<DocumentKey, MutableDocument>) -> BTreeSet<DocumentKey> {
    results.keys().cloned().collect()
}

// ============================================================================
// Local mutations
// ============================================================================

#[test]
fn local_set_then_acknowledge_round_trip() {
    let persistence = MemoryPersistence::new();
    add_remote(&persistence, "coll/a", json!({"matches": false}), 1);
    let engine = engine_over(&persistence, QueryEngineConfig::default());
    let view = persistence.local_documents_view();

    let batch = view
        .add_local_mutations(vec![Mutation::Set {
            key: key("coll/a"),
            data: object(json!({"matches": true})),
        }])
        .unwrap();
    let results = engine
        .get_documents_matching_query(&matching_query(), SnapshotVersion::NONE, &BTreeSet::new())
        .unwrap();
    assert!(results[&key("coll/a")].has_local_mutations());

    // Acknowledged: the server version arrives and the batch is dropped.
    add_remote(&persistence, "coll/a", json!({"matches": true}), 2);
    view.remove_mutation_batch(batch.batch_id()).unwrap();

    let results = engine
        .get_documents_matching_query(&matching_query(), SnapshotVersion::NONE, &BTreeSet::new())
        .unwrap();
    assert!(!results[&key("coll/a")].has_local_mutations());
    assert_eq!(results[&key("coll/a")].version(), v(2));
}

#[test]
fn rejected_batch_restores_remote_state() {
    let persistence = MemoryPersistence::new();
    add_remote(&persistence, "coll/a", json!({"matches": true}), 1);
    let engine = engine_over(&persistence, QueryEngineConfig::default());
    let view = persistence.local_documents_view();

    let batch = view
        .add_local_mutations(vec![Mutation::Delete { key: key("coll/a") }])
        .unwrap();
    assert!(engine
        .get_documents_matching_query(&matching_query(), SnapshotVersion::NONE, &BTreeSet::new())
        .unwrap()
        .is_empty());

    view.remove_mutation_batch(batch.batch_id()).unwrap();
    let results = engine
        .get_documents_matching_query(&matching_query(), SnapshotVersion::NONE, &BTreeSet::new())
        .unwrap();
    assert_eq!(keys_of(&results), [key("coll/a")].into_iter().collect());
}

#[test]
fn removing_unknown_batch_fails() {
    let persistence = MemoryPersistence::new();
    let result = persistence.local_documents_view().remove_mutation_batch(42);
    assert_eq!(result, Err(StoreError::BatchNotFound(42)));
}

#[test]
fn collection_group_query_sees_local_writes_in_every_parent() {
    let persistence = MemoryPersistence::new();
    add_remote(&persistence, "rooms/r1/msgs/m1", json!({"matches": true}), 1);
    add_remote(&persistence, "rooms/r2/msgs/m2", json!({"matches": true}), 1);
    let engine = engine_over(&persistence, QueryEngineConfig::default());

    persistence
        .local_documents_view()
        .add_local_mutations(vec![Mutation::Patch {
            key: key("rooms/r2/msgs/m2"),
            data: object(json!({"matches": false})),
            field_mask: vec!["matches".to_string()],
        }])
        .unwrap();

    let query =
        Query::collection_group("msgs").with_filter("matches", Operator::Equal, json!(true));
    let results = engine
        .get_documents_matching_query(&query, SnapshotVersion::NONE, &BTreeSet::new())
        .unwrap();
    assert_eq!(keys_of(&results), [key("rooms/r1/msgs/m1")].into_iter().collect());
}

#[test]
fn next_documents_pages_through_collection_group() {
    let persistence = MemoryPersistence::new();
    add_remote(&persistence, "rooms/r1/msgs/m1", json!({}), 1);
    add_remote(&persistence, "rooms/r1/msgs/m2", json!({}), 2);
    add_remote(&persistence, "rooms/r2/msgs/m3", json!({}), 3);
    let view = persistence.local_documents_view();

    let first = view
        .get_next_documents("msgs", &docstore_core::IndexOffset::none(), 2)
        .unwrap();
    assert_eq!(first.documents().len(), 2);

    let last = first.documents().values().max_by_key(|doc| doc.read_time()).unwrap();
    let offset = docstore_core::IndexOffset::from_document(last);
    let second = view.get_next_documents("msgs", &offset, 2).unwrap();
    assert_eq!(
        second.documents().keys().cloned().collect::<Vec<_>>(),
        vec![key("rooms/r2/msgs/m3")]
    );
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn config_file_drives_engine() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(
        &path,
        "reuse_limbo_free_results = false\nfull_scan_warn_threshold = 1\n",
    )
    .unwrap();

    let config = QueryEngineConfig::from_file(&path).unwrap();
    let persistence = MemoryPersistence::new();
    add_remote(&persistence, "coll/a", json!({"matches": true}), 1);
    add_remote(&persistence, "coll/b", json!({"matches": true}), 20);
    let engine = engine_over(&persistence, config);
    assert!(!engine.config().reuse_limbo_free_results);

    // Without reuse the stale remote keys are ignored and both documents found.
    let stale: BTreeSet<_> = [key("coll/a")].into_iter().collect();
    let results = engine
        .get_documents_matching_query(&matching_query(), v(10), &stale)
        .unwrap();
    assert_eq!(results.len(), 2);
}

// ============================================================================
// Strategy equivalence
// ============================================================================

#[derive(Debug, Clone)]
enum Change {
    Remote(u8, bool),
    LocalSet(u8, bool),
    LocalDelete(u8),
}

fn change() -> impl Strategy<Value = Change> {
    prop_oneof![
        (0u8..8, any::<bool>()).prop_map(|(id, m)| Change::Remote(id, m)),
        (0u8..8, any::<bool>()).prop_map(|(id, m)| Change::LocalSet(id, m)),
        (0u8..8).prop_map(Change::LocalDelete),
    ]
}

fn doc_path(id: u8) -> String {
    format!("coll/d{}", id)
}

proptest! {
    #[test]
    fn previous_results_agree_with_full_scan(
        initial in prop::collection::vec(prop::option::of(any::<bool>()), 8),
        changes in prop::collection::vec(change(), 0..12),
    ) {
        let persistence = MemoryPersistence::new();
        let mut remote_keys = BTreeSet::new();
        for (id, matches) in initial.iter().enumerate() {
            if let Some(matches) = matches {
                add_remote(&persistence, &doc_path(id as u8), json!({"matches": matches}), 10);
                if *matches {
                    remote_keys.insert(key(&doc_path(id as u8)));
                }
            }
        }

        let view = persistence.local_documents_view();
        for (step, change) in changes.into_iter().enumerate() {
            match change {
                Change::Remote(id, matches) => {
                    let version = 20 + step as u64;
                    add_remote(&persistence, &doc_path(id), json!({"matches": matches}), version);
                }
                Change::LocalSet(id, matches) => {
                    view.add_local_mutations(vec![Mutation::Set {
                        key: key(&doc_path(id)),
                        data: object(json!({"matches": matches})),
                    }]).unwrap();
                }
                Change::LocalDelete(id) => {
                    view.add_local_mutations(vec![Mutation::Delete { key: key(&doc_path(id)) }])
                        .unwrap();
                }
            }
        }

        let engine = engine_over(&persistence, QueryEngineConfig::default());
        let reused = engine
            .get_documents_matching_query(&matching_query(), v(10), &remote_keys)
            .unwrap();
        let scanned = engine
            .get_documents_matching_query(
                &matching_query(),
                SnapshotVersion::NONE,
                &BTreeSet::new(),
            )
            .unwrap();
        prop_assert_eq!(keys_of(&reused), keys_of(&scanned));
    }
}
