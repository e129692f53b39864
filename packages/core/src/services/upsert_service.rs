//! Upsert Service
//!
//! Idempotent create-or-update of records produced by the source loaders
//! (CIViC, OncoKB, ClinicalTrials.gov, Entrez):
//!
//! 1. Look up the active record equal on the unique fields (cache first,
//!    re-read from the store so deleted or rekeyed records are not reused)
//! 2. None found: create it
//! 3. Found: update only if [`should_update`] reports a real change
//!
//! Upserting the same content twice leaves the store unchanged the second time.

use crate::db::{RecordStore, StoreError};
use crate::models::{is_deleted, record_id_string, Record, RID_FIELD, SERVER_MANAGED_FIELDS};
use crate::services::error::UpsertError;
use crate::services::link_simplifier::simplify_records_links;
use crate::services::query_compiler::SelectQuery;
use crate::services::record_cache::RecordCache;
use crate::services::update_decision::should_update;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

/// How an upsert identifies and compares records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOptions {
    /// Fields that identify the record; empty means every content field
    pub unique_fields: Vec<String>,
    /// Fields ignored when deciding whether to update
    pub excluded_fields: Vec<String>,
    /// Whether `excluded_fields` lists every field expected to differ
    pub is_exhaustive: bool,
}

impl Default for UpsertOptions {
    fn default() -> Self {
        Self {
            unique_fields: Vec::new(),
            excluded_fields: Vec::new(),
            is_exhaustive: true,
        }
    }
}

impl UpsertOptions {
    pub fn with_unique_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_excluded_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn non_exhaustive(mut self) -> Self {
        self.is_exhaustive = false;
        self
    }
}

/// Result of an upsert
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome {
    Created(Record),
    Updated(Record),
    Unchanged(Record),
}

impl UpsertOutcome {
    /// The record as stored after the upsert
    pub fn record(&self) -> &Record {
        match self {
            UpsertOutcome::Created(record)
            | UpsertOutcome::Updated(record)
            | UpsertOutcome::Unchanged(record) => record,
        }
    }

    pub fn rid(&self) -> Option<String> {
        self.record().get(RID_FIELD).and_then(record_id_string)
    }
}

/// Create-or-update over any [`RecordStore`]
pub struct UpsertService<S: RecordStore + ?Sized> {
    store: Arc<S>,
}

impl<S: RecordStore + ?Sized> Clone for UpsertService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: RecordStore + ?Sized> UpsertService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create or update a record of `model`
    ///
    /// # Errors
    ///
    /// - `MissingUniqueField` if `content` lacks one of the unique fields
    /// - `EmptyLookup` if no identifying field is left to match on
    /// - `Ambiguous` if more than one active record matches
    /// - `Store` if the store rejects the lookup or write
    #[instrument(skip(self, content, options, cache))]
    pub async fn upsert(
        &self,
        model: &str,
        content: Record,
        options: &UpsertOptions,
        cache: &RecordCache,
        user: &str,
    ) -> Result<UpsertOutcome, UpsertError> {
        let lookup = lookup_fields(model, &content, &options.unique_fields)?;
        let key = lookup_key(&lookup);

        let existing = match self.cached_match(model, &key, &lookup, cache).await? {
            Some(record) => Some(record),
            None => self.find_existing(model, &key, &lookup).await?,
        };

        let Some(existing) = existing else {
            let created = self.store.create(model, content, user).await?;
            tracing::debug!(key = %key, "created new record");
            cache.insert(model, &key, created.clone()).await;
            return Ok(UpsertOutcome::Created(created));
        };

        let excluded: Vec<&str> = options
            .excluded_fields
            .iter()
            .map(String::as_str)
            .chain(SERVER_MANAGED_FIELDS.iter().copied())
            .collect();

        if !should_update(model, &existing, &content, &excluded, options.is_exhaustive) {
            cache.insert(model, &key, existing.clone()).await;
            return Ok(UpsertOutcome::Unchanged(existing));
        }

        let rid = existing
            .get(RID_FIELD)
            .and_then(record_id_string)
            .ok_or_else(|| {
                UpsertError::Store(StoreError::invalid_record(format!(
                    "Stored {} record has no {}",
                    model, RID_FIELD
                )))
            })?;
        let updated = self.store.update(model, &rid, content, user).await?;
        tracing::debug!(key = %key, rid = %rid, "updated changed record");
        cache.invalidate_record(&rid).await;
        cache.insert(model, &key, updated.clone()).await;
        Ok(UpsertOutcome::Updated(updated))
    }

    /// Cached record for `key`, as currently stored
    ///
    /// An entry whose record was deleted or no longer carries the lookup
    /// values is dropped and reported as a miss.
    async fn cached_match(
        &self,
        model: &str,
        key: &str,
        lookup: &[(String, Value)],
        cache: &RecordCache,
    ) -> Result<Option<Record>, UpsertError> {
        let Some(cached) = cache.get(model, key).await else {
            return Ok(None);
        };
        let current = match cached.get(RID_FIELD).and_then(record_id_string) {
            Some(rid) => self.store.get(&rid).await?,
            None => None,
        };

        match current {
            Some(record) if !is_deleted(&record) && matches_lookup(&record, lookup) => {
                Ok(Some(record))
            }
            _ => {
                tracing::debug!(key = %key, "dropping stale cache entry");
                cache.invalidate(model, key).await;
                Ok(None)
            }
        }
    }

    async fn find_existing(
        &self,
        model: &str,
        key: &str,
        lookup: &[(String, Value)],
    ) -> Result<Option<Record>, UpsertError> {
        let query = SelectQuery::matching(
            lookup.iter().map(|(name, value)| (name.as_str(), value)),
        )
        .with_limit(2);

        let mut matches = self.store.select(model, &query).await?;
        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            count => Err(UpsertError::ambiguous(model, key, count)),
        }
    }
}

/// Simplified values of the identifying fields
///
/// An empty lookup would match every active record, so it is rejected.
fn lookup_fields(
    model: &str,
    content: &Record,
    unique_fields: &[String],
) -> Result<Vec<(String, Value)>, UpsertError> {
    let lookup: Vec<(String, Value)> = if unique_fields.is_empty() {
        content
            .iter()
            .filter(|(name, _)| !SERVER_MANAGED_FIELDS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), simplify_records_links(value)))
            .collect()
    } else {
        unique_fields
            .iter()
            .map(|field| {
                content
                    .get(field)
                    .map(|value| (field.clone(), simplify_records_links(value)))
                    .ok_or_else(|| UpsertError::missing_unique_field(model, field))
            })
            .collect::<Result<_, _>>()?
    };

    if lookup.is_empty() {
        return Err(UpsertError::empty_lookup(model));
    }
    Ok(lookup)
}

fn matches_lookup(record: &Record, lookup: &[(String, Value)]) -> bool {
    lookup.iter().all(|(name, value)| {
        record.get(name).map(simplify_records_links).as_ref() == Some(value)
    })
}

fn lookup_key(lookup: &[(String, Value)]) -> String {
    let pairs: serde_json::Map<String, Value> = lookup.iter().cloned().collect();
    Value::Object(pairs).to_string()
}
