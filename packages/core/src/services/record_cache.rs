//! Per-Run Record Cache
//!
//! Caches records fetched during one ETL run so repeated upserts of the same
//! key (a gene referenced by hundreds of evidence rows, say) hit the store
//! once.
//!
//! # Lifecycle
//!
//! Construct a cache at the start of a run, pass it to every upsert, and drop
//! it when the run ends. Nothing survives between runs.

use crate::models::{record_id_string, Record, RID_FIELD};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Cache usage counters
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Record cache keyed by model name and lookup key
#[derive(Default)]
pub struct RecordCache {
    entries: RwLock<HashMap<(String, String), Record>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached record for `(model, key)`, counting the hit or miss
    pub async fn get(&self, model: &str, key: &str) -> Option<Record> {
        let entries = self.entries.read().await;
        match entries.get(&(model.to_string(), key.to_string())) {
            Some(record) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(record.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn insert(&self, model: &str, key: &str, record: Record) {
        self.entries
            .write()
            .await
            .insert((model.to_string(), key.to_string()), record);
    }

    /// Drop one entry, returning whether it was present
    pub async fn invalidate(&self, model: &str, key: &str) -> bool {
        self.entries
            .write()
            .await
            .remove(&(model.to_string(), key.to_string()))
            .is_some()
    }

    /// Drop every entry holding the record `rid`, returning how many were dropped
    pub async fn invalidate_record(&self, rid: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, record| {
            record.get(RID_FIELD).and_then(record_id_string).as_deref() != Some(rid)
        });
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().await.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
