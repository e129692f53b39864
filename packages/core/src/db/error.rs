//! Database Error Types
//!
//! Errors raised by [`RecordStore`](super::RecordStore) implementations.

use thiserror::Error;

/// Storage operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No active record with this identifier
    #[error("Record not found: {rid}")]
    NotFound { rid: String },

    /// Record exists but belongs to a different model
    #[error("Record {rid} is a {actual}, not a {expected}")]
    ModelMismatch {
        rid: String,
        expected: String,
        actual: String,
    },

    /// Write rejected because of the record's current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Content could not be stored
    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(rid: impl Into<String>) -> Self {
        Self::NotFound { rid: rid.into() }
    }

    /// Create a model mismatch error
    pub fn model_mismatch(
        rid: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::ModelMismatch {
            rid: rid.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create an invalid record error
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }
}
