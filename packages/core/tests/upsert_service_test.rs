//! Integration tests for UpsertService over the in-memory store
//!
//! Tests cover:
//! - Idempotent repeated loads
//! - History chains built by updates
//! - Ambiguous and empty lookups
//! - Cache reuse within a run, and stale entries after rekeys and deletes

use graphkb_core::db::{MemoryStore, RecordStore};
use graphkb_core::{
    Record, RecordCache, SelectQuery, UpsertError, UpsertOptions, UpsertOutcome, UpsertService,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

fn content(value: Value) -> Record {
    value.as_object().cloned().unwrap()
}

fn setup() -> (Arc<MemoryStore>, UpsertService<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let service = UpsertService::new(store.clone());
    (store, service)
}

fn by_source_id() -> UpsertOptions {
    UpsertOptions::default().with_unique_fields(["sourceId"])
}

// =========================================================================
// Idempotence
// =========================================================================

#[tokio::test]
async fn test_second_load_leaves_store_unchanged() {
    let (store, service) = setup();
    let source = store
        .create("Source", content(json!({"name": "civic"})), "etl")
        .await
        .unwrap();

    let rows = vec![
        json!({"sourceId": "1", "name": "KRAS", "source": source.clone()}),
        json!({"sourceId": "2", "name": "BRAF", "source": source.clone()}),
    ];

    for row in &rows {
        let outcome = service
            .upsert("Feature", content(row.clone()), &by_source_id(), &RecordCache::new(), "etl")
            .await
            .unwrap();
        assert!(matches!(outcome, UpsertOutcome::Created(_)));
    }
    let records_after_first_load = store.len().await;

    for row in &rows {
        let outcome = service
            .upsert("Feature", content(row.clone()), &by_source_id(), &RecordCache::new(), "etl")
            .await
            .unwrap();
        assert!(matches!(outcome, UpsertOutcome::Unchanged(_)));
    }
    assert_eq!(store.len().await, records_after_first_load);
}

#[tokio::test]
async fn test_linked_record_detail_does_not_trigger_update() {
    let (store, service) = setup();
    let cache = RecordCache::new();
    let source = store
        .create("Source", content(json!({"name": "civic"})), "etl")
        .await
        .unwrap();
    let rid = source["@rid"].clone();

    service
        .upsert(
            "Feature",
            content(json!({"sourceId": "1", "source": {"@rid": rid.clone(), "name": "civic"}})),
            &by_source_id(),
            &cache,
            "etl",
        )
        .await
        .unwrap();
    let outcome = service
        .upsert(
            "Feature",
            content(json!({"sourceId": "1", "source": {"@rid": rid, "name": "CIViC"}})),
            &by_source_id(),
            &cache,
            "etl",
        )
        .await
        .unwrap();
    assert!(matches!(outcome, UpsertOutcome::Unchanged(_)));
}

// =========================================================================
// History
// =========================================================================

#[tokio::test]
async fn test_updates_build_history_chain() {
    let (store, service) = setup();
    let cache = RecordCache::new();

    let mut rid = None;
    for name in ["kras", "Kras", "KRAS"] {
        let outcome = service
            .upsert(
                "Feature",
                content(json!({"sourceId": "1", "name": name})),
                &by_source_id(),
                &cache,
                "etl",
            )
            .await
            .unwrap();
        rid.get_or_insert_with(|| outcome.rid().unwrap());
        assert_eq!(outcome.rid(), rid);
    }

    let rid = rid.unwrap();
    let history = store.history(&rid).await.unwrap();
    let names: Vec<&Value> = history.iter().map(|record| &record["name"]).collect();
    assert_eq!(names, vec![&json!("Kras"), &json!("kras")]);
    assert!(history.iter().all(|record| record.contains_key("deletedAt")));

    let active = store
        .select("Feature", &SelectQuery::default())
        .await
        .unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["name"], json!("KRAS"));
}

// =========================================================================
// Lookup Errors
// =========================================================================

#[tokio::test]
async fn test_ambiguous_lookup() {
    let (store, service) = setup();
    for name in ["KRAS", "KRAS2"] {
        store
            .create("Feature", content(json!({"sourceId": "1", "name": name})), "etl")
            .await
            .unwrap();
    }

    let result = service
        .upsert(
            "Feature",
            content(json!({"sourceId": "1", "name": "KRAS"})),
            &by_source_id(),
            &RecordCache::new(),
            "etl",
        )
        .await;
    assert!(matches!(result, Err(UpsertError::Ambiguous { count: 2, .. })));
}

#[tokio::test]
async fn test_empty_lookup_is_rejected() {
    let (store, service) = setup();
    let seeded = store
        .create("Feature", content(json!({"name": "kras", "biotype": "gene"})), "etl")
        .await
        .unwrap();
    let rid = seeded["@rid"].as_str().unwrap().to_string();

    for row in [json!({"createdBy": "x"}), json!({})] {
        let result = service
            .upsert("Feature", content(row), &UpsertOptions::default(), &RecordCache::new(), "etl")
            .await;
        assert!(matches!(result, Err(UpsertError::EmptyLookup { model }) if model == "Feature"));
    }

    let stored = store.get(&rid).await.unwrap().unwrap();
    assert_eq!(stored["name"], json!("kras"));
    assert_eq!(stored["biotype"], json!("gene"));
    assert!(!stored.contains_key("deletedAt"));
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_deleted_records_are_not_matched() {
    let (store, service) = setup();
    let created = store
        .create("Feature", content(json!({"sourceId": "1"})), "etl")
        .await
        .unwrap();
    let rid = created["@rid"].as_str().unwrap().to_string();
    store.remove("Feature", &rid, "etl").await.unwrap();

    let outcome = service
        .upsert(
            "Feature",
            content(json!({"sourceId": "1"})),
            &by_source_id(),
            &RecordCache::new(),
            "etl",
        )
        .await
        .unwrap();
    assert!(matches!(outcome, UpsertOutcome::Created(_)));
    assert_ne!(outcome.rid(), Some(rid));
}

// =========================================================================
// Cache
// =========================================================================

#[tokio::test]
async fn test_cache_serves_repeated_keys() {
    let (_store, service) = setup();
    let cache = RecordCache::new();
    let row = content(json!({"sourceId": "1", "name": "KRAS"}));

    for _ in 0..3 {
        service
            .upsert("Feature", row.clone(), &by_source_id(), &cache, "etl")
            .await
            .unwrap();
    }

    let stats = cache.stats().await;
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 1);
}

#[tokio::test]
async fn test_cache_entry_dropped_after_rekey() {
    let (store, service) = setup();
    let cache = RecordCache::new();
    let by_name = UpsertOptions::default().with_unique_fields(["name"]);

    let first = service
        .upsert(
            "Feature",
            content(json!({"sourceId": "1", "name": "kras"})),
            &by_source_id(),
            &cache,
            "etl",
        )
        .await
        .unwrap();
    assert!(matches!(first, UpsertOutcome::Created(_)));

    let second = service
        .upsert(
            "Feature",
            content(json!({"sourceId": "2", "name": "kras"})),
            &by_name,
            &cache,
            "etl",
        )
        .await
        .unwrap();
    assert!(matches!(second, UpsertOutcome::Updated(_)));
    assert_eq!(first.rid(), second.rid());

    let third = service
        .upsert(
            "Feature",
            content(json!({"sourceId": "1", "name": "kras"})),
            &by_source_id(),
            &cache,
            "etl",
        )
        .await
        .unwrap();
    assert!(matches!(third, UpsertOutcome::Created(_)));
    assert_ne!(third.rid(), first.rid());

    let active = store
        .select("Feature", &SelectQuery::default())
        .await
        .unwrap();
    let mut source_ids: Vec<&Value> = active.iter().map(|record| &record["sourceId"]).collect();
    source_ids.sort_by_key(|value| value.to_string());
    assert_eq!(source_ids, vec![&json!("1"), &json!("2")]);
}

#[tokio::test]
async fn test_cache_entry_checked_against_store() {
    let (store, service) = setup();
    let cache = RecordCache::new();
    let row = content(json!({"sourceId": "1", "name": "kras"}));

    let first = service
        .upsert("Feature", row.clone(), &by_source_id(), &cache, "etl")
        .await
        .unwrap();
    let rid = first.rid().unwrap();

    // rewritten behind the cache's back
    store
        .update("Feature", &rid, content(json!({"sourceId": "3", "name": "kras"})), "curator")
        .await
        .unwrap();

    let outcome = service
        .upsert("Feature", row, &by_source_id(), &cache, "etl")
        .await
        .unwrap();
    assert!(matches!(outcome, UpsertOutcome::Created(_)));
    assert_ne!(outcome.rid(), Some(rid));
}

#[tokio::test]
async fn test_removed_record_is_recreated_with_same_cache() {
    let (store, service) = setup();
    let cache = RecordCache::new();
    let row = content(json!({"sourceId": "1", "name": "kras"}));

    let first = service
        .upsert("Feature", row.clone(), &by_source_id(), &cache, "etl")
        .await
        .unwrap();
    let removed_rid = first.rid().unwrap();
    store.remove("Feature", &removed_rid, "curator").await.unwrap();

    let recreated = service
        .upsert("Feature", row, &by_source_id(), &cache, "etl")
        .await
        .unwrap();
    assert!(matches!(recreated, UpsertOutcome::Created(_)));
    assert_ne!(recreated.rid(), Some(removed_rid.clone()));

    let changed = service
        .upsert(
            "Feature",
            content(json!({"sourceId": "1", "name": "KRAS"})),
            &by_source_id(),
            &cache,
            "etl",
        )
        .await
        .unwrap();
    assert!(matches!(changed, UpsertOutcome::Updated(_)));
    assert_eq!(changed.rid(), recreated.rid());
    assert_eq!(changed.record()["name"], json!("KRAS"));

    let removed = store.get(&removed_rid).await.unwrap().unwrap();
    assert!(removed.contains_key("deletedAt"));
}

// =========================================================================
// Property: upserting any content twice is a no-op the second time
// =========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_upsert_twice_is_unchanged(
        fields in prop::collection::btree_map("f[a-z]{0,5}", "[A-Za-z0-9 ]{0,12}", 1..5)
    ) {
        tokio_test::block_on(async {
            let (store, service) = setup();
            let cache = RecordCache::new();
            let row: Record = fields
                .into_iter()
                .map(|(key, value)| (key, Value::String(value)))
                .collect();

            let first = service
                .upsert("Feature", row.clone(), &UpsertOptions::default(), &cache, "etl")
                .await
                .unwrap();
            let size = store.len().await;
            let second = service
                .upsert("Feature", row, &UpsertOptions::default(), &RecordCache::new(), "etl")
                .await
                .unwrap();

            prop_assert!(matches!(second, UpsertOutcome::Unchanged(_)));
            prop_assert_eq!(first.rid(), second.rid());
            prop_assert_eq!(store.len().await, size);
            Ok(())
        })?;
    }
}
