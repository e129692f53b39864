//! Service Layer Error Types
//!
//! This module defines error types for service-layer operations: query
//! parameter validation and record upserts.

use crate::db::StoreError;
use thiserror::Error;

/// Query parsing and compilation errors
///
/// Every variant is recoverable by the caller; the HTTP layer maps
/// `InputValidation` to a bad-request response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Malformed, out-of-range or ambiguous query parameter
    #[error("{0}")]
    InputValidation(String),
}

impl QueryError {
    /// Create an input validation error
    pub fn input_validation(msg: impl Into<String>) -> Self {
        Self::InputValidation(msg.into())
    }

    /// Human-readable message
    pub fn message(&self) -> &str {
        match self {
            Self::InputValidation(msg) => msg,
        }
    }
}

/// Upsert errors
#[derive(Error, Debug)]
pub enum UpsertError {
    /// More than one active record matched the unique fields
    #[error("Expected a single {model} record matching {key}, found {count}")]
    Ambiguous {
        model: String,
        key: String,
        count: usize,
    },

    /// Unique field missing from the proposed content
    #[error("Record content for {model} is missing unique field '{field}'")]
    MissingUniqueField { model: String, field: String },

    /// Content has no identifying field to look the record up by
    #[error("Record content for {model} has no fields to identify it by")]
    EmptyLookup { model: String },

    /// Storage operation failed
    #[error("Storage operation failed: {0}")]
    Store(#[from] StoreError),
}

impl UpsertError {
    /// Create an ambiguous match error
    pub fn ambiguous(model: impl Into<String>, key: impl Into<String>, count: usize) -> Self {
        Self::Ambiguous {
            model: model.into(),
            key: key.into(),
            count,
        }
    }

    /// Create an empty lookup error
    pub fn empty_lookup(model: impl Into<String>) -> Self {
        Self::EmptyLookup {
            model: model.into(),
        }
    }

    /// Create a missing unique field error
    pub fn missing_unique_field(model: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingUniqueField {
            model: model.into(),
            field: field.into(),
        }
    }
}
