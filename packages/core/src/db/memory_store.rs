//! In-Memory Record Store
//!
//! Process-local [`RecordStore`] used by tests and the development API server.
//!
//! # History Chains
//!
//! Updates never overwrite a version in place. The current version is copied to
//! a fresh identifier and soft-deleted; the live record keeps its identifier and
//! links to that copy through `history`. Following `history` from a live record
//! therefore visits every earlier version, newest first, exactly once.
//!
//! # Identifiers
//!
//! Records get `#<cluster>:<position>` identifiers, one cluster per model.

use crate::db::filter_eval::{matches_filter, RecordResolver};
use crate::db::{RecordStore, StoreError};
use crate::models::{
    is_deleted, record_id_string, Record, CLASS_FIELD, DELETED_AT_FIELD, DELETED_BY_FIELD,
    HISTORY_FIELD, RID_FIELD, SERVER_MANAGED_FIELDS,
};
use crate::services::{simplify_records_links, SelectQuery};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory graph record store
pub struct MemoryStore {
    state: RwLock<StoreState>,
    page_size: i64,
}

#[derive(Default)]
struct StoreState {
    /// Identifiers in insertion order
    order: Vec<String>,
    records: HashMap<String, Record>,
    clusters: HashMap<String, u32>,
    positions: HashMap<u32, u64>,
}

impl StoreState {
    fn next_rid(&mut self, model: &str) -> String {
        let next_cluster = self.clusters.len() as u32 + 1;
        let cluster = *self.clusters.entry(model.to_string()).or_insert(next_cluster);
        let position = self.positions.entry(cluster).or_insert(0);
        let rid = format!("#{}:{}", cluster, position);
        *position += 1;
        rid
    }

    fn insert(&mut self, rid: String, record: Record) {
        self.order.push(rid.clone());
        self.records.insert(rid, record);
    }

    fn active_record(&self, model: &str, rid: &str) -> Result<&Record, StoreError> {
        let record = self
            .records
            .get(rid)
            .ok_or_else(|| StoreError::not_found(rid))?;
        let class = record
            .get(CLASS_FIELD)
            .and_then(Value::as_str)
            .unwrap_or_default();
        if class != model {
            return Err(StoreError::model_mismatch(rid, model, class));
        }
        Ok(record)
    }
}

impl RecordResolver for StoreState {
    fn resolve(&self, rid: &str) -> Option<&Record> {
        self.records.get(rid)
    }

    fn edges(&self, classes: &BTreeSet<String>) -> Vec<&Record> {
        self.order
            .iter()
            .filter_map(|rid| self.records.get(rid))
            .filter(|record| !is_deleted(record))
            .filter(|record| {
                record
                    .get(CLASS_FIELD)
                    .and_then(Value::as_str)
                    .map(|class| classes.contains(class))
                    .unwrap_or(false)
            })
            .collect()
    }
}

impl MemoryStore {
    /// Create an empty store with the default page size
    pub fn new() -> Self {
        Self::with_page_size(crate::config::MAX_QUERY_LIMIT)
    }

    /// Create an empty store returning at most `page_size` records per select
    pub fn with_page_size(page_size: i64) -> Self {
        Self {
            state: RwLock::new(StoreState::default()),
            page_size,
        }
    }

    /// Number of stored records, including deleted versions
    pub async fn len(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Previous versions of a record, newest first
    pub async fn history(&self, rid: &str) -> Result<Vec<Record>, StoreError> {
        let state = self.state.read().await;
        let mut current = state
            .records
            .get(rid)
            .ok_or_else(|| StoreError::not_found(rid))?;

        let mut versions = Vec::new();
        let mut seen = BTreeSet::from([rid.to_string()]);
        while let Some(previous_rid) = current.get(HISTORY_FIELD).and_then(record_id_string) {
            if !seen.insert(previous_rid.clone()) {
                return Err(StoreError::conflict(format!(
                    "History chain of {} revisits {}",
                    rid, previous_rid
                )));
            }
            current = state
                .records
                .get(&previous_rid)
                .ok_or_else(|| StoreError::not_found(&previous_rid))?;
            versions.push(current.clone());
        }
        Ok(versions)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Content fields only: server-managed fields dropped, links collapsed
fn content_fields(content: Record) -> Record {
    content
        .into_iter()
        .filter(|(key, _)| !SERVER_MANAGED_FIELDS.contains(&key.as_str()))
        .map(|(key, value)| {
            let value = simplify_records_links(&value);
            (key, value)
        })
        .collect()
}

fn now_millis() -> Value {
    Value::from(Utc::now().timestamp_millis())
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, model: &str, content: Record, user: &str) -> Result<Record, StoreError> {
        if model.trim().is_empty() {
            return Err(StoreError::invalid_record("model name must not be empty"));
        }

        let mut state = self.state.write().await;
        let rid = state.next_rid(model);

        let mut record = Record::new();
        record.insert(RID_FIELD.to_string(), Value::String(rid.clone()));
        record.insert(CLASS_FIELD.to_string(), Value::String(model.to_string()));
        record.extend(content_fields(content));
        record.insert("uuid".to_string(), Value::String(Uuid::new_v4().to_string()));
        record.insert("createdAt".to_string(), now_millis());
        record.insert("createdBy".to_string(), Value::String(user.to_string()));

        tracing::debug!(model, rid = %rid, "created record");
        state.insert(rid, record.clone());
        Ok(record)
    }

    async fn update(
        &self,
        model: &str,
        rid: &str,
        content: Record,
        user: &str,
    ) -> Result<Record, StoreError> {
        let mut state = self.state.write().await;
        let current = state.active_record(model, rid)?.clone();
        if is_deleted(&current) {
            return Err(StoreError::conflict(format!(
                "Cannot update deleted record {}",
                rid
            )));
        }

        let now = now_millis();
        let history_rid = state.next_rid(model);
        let mut previous = current.clone();
        previous.insert(RID_FIELD.to_string(), Value::String(history_rid.clone()));
        previous.insert(DELETED_AT_FIELD.to_string(), now.clone());
        previous.insert(DELETED_BY_FIELD.to_string(), Value::String(user.to_string()));

        let mut updated: Record = current
            .into_iter()
            .filter(|(key, _)| SERVER_MANAGED_FIELDS.contains(&key.as_str()))
            .collect();
        updated.extend(content_fields(content));
        updated.insert(HISTORY_FIELD.to_string(), Value::String(history_rid.clone()));
        updated.insert("updatedAt".to_string(), now);
        updated.insert("updatedBy".to_string(), Value::String(user.to_string()));

        tracing::debug!(model, rid, history = %history_rid, "updated record");
        state.insert(history_rid, previous);
        state.records.insert(rid.to_string(), updated.clone());
        Ok(updated)
    }

    async fn remove(&self, model: &str, rid: &str, user: &str) -> Result<Record, StoreError> {
        let mut state = self.state.write().await;
        if is_deleted(state.active_record(model, rid)?) {
            return Err(StoreError::not_found(rid));
        }

        let record = state
            .records
            .get_mut(rid)
            .ok_or_else(|| StoreError::not_found(rid))?;
        record.insert(DELETED_AT_FIELD.to_string(), now_millis());
        record.insert(DELETED_BY_FIELD.to_string(), Value::String(user.to_string()));

        tracing::debug!(model, rid, "removed record");
        Ok(record.clone())
    }

    async fn select(&self, model: &str, query: &SelectQuery) -> Result<Vec<Record>, StoreError> {
        let state = self.state.read().await;
        let options = &query.options;
        let skip = options.skip.unwrap_or(0).max(0) as usize;
        let limit = options.limit.unwrap_or(self.page_size).max(0) as usize;

        let matched = state
            .order
            .iter()
            .filter_map(|rid| state.records.get(rid))
            .filter(|record| record.get(CLASS_FIELD).and_then(Value::as_str) == Some(model))
            .filter(|record| !options.active_only || !is_deleted(record))
            .filter(|record| {
                query
                    .filter
                    .as_ref()
                    .map(|filter| matches_filter(record, filter, &*state))
                    .unwrap_or(true)
            })
            .skip(skip)
            .take(limit);

        let records: Vec<Record> = match &options.return_properties {
            Some(properties) => matched
                .map(|record| {
                    properties
                        .iter()
                        .filter_map(|name| {
                            record.get(name).map(|value| (name.clone(), value.clone()))
                        })
                        .collect::<Record>()
                })
                .collect(),
            None => matched.cloned().collect(),
        };
        Ok(records)
    }

    async fn get(&self, rid: &str) -> Result<Option<Record>, StoreError> {
        Ok(self.state.read().await.records.get(rid).cloned())
    }
}
