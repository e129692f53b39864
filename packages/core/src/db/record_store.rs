//! Record Store Abstraction
//!
//! The storage collaborator used by the upsert service and the HTTP layer.
//! Every write names the acting user so implementations can stamp audit
//! fields.

use crate::db::StoreError;
use crate::models::Record;
use crate::services::SelectQuery;
use async_trait::async_trait;

/// CRUD access to graph records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create a record of `model`, returning it with server-managed fields set
    async fn create(&self, model: &str, content: Record, user: &str) -> Result<Record, StoreError>;

    /// Replace the content of an active record
    ///
    /// Server-managed fields are kept. The previous version stays reachable
    /// through the record's `history` link.
    async fn update(
        &self,
        model: &str,
        rid: &str,
        content: Record,
        user: &str,
    ) -> Result<Record, StoreError>;

    /// Soft-delete an active record
    async fn remove(&self, model: &str, rid: &str, user: &str) -> Result<Record, StoreError>;

    /// Select records of `model` matching the query
    async fn select(&self, model: &str, query: &SelectQuery) -> Result<Vec<Record>, StoreError>;

    /// Fetch any record (active or not) by identifier
    async fn get(&self, rid: &str) -> Result<Option<Record>, StoreError>;
}
