//! HTTP error handling for the API server
//!
//! Every handler error becomes a JSON body `{"error": kind, "message": text}`
//! with a status derived from the kind.

use crate::db::StoreError;
use crate::services::QueryError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Handler error
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Request body or path could not be used as given
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Query(QueryError::InputValidation(_)) | ApiError::BadRequest(_) => {
                "InputValidationError"
            }
            ApiError::Store(err) => store_kind(err),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            "InputValidationError" => StatusCode::BAD_REQUEST,
            "NotFoundError" => StatusCode::NOT_FOUND,
            "RecordConflictError" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn store_kind(err: &StoreError) -> &'static str {
    match err {
        StoreError::NotFound { .. } => "NotFoundError",
        StoreError::ModelMismatch { .. } | StoreError::InvalidRecord(_) => "InputValidationError",
        StoreError::Conflict(_) => "RecordConflictError",
    }
}

/// JSON error body
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        tracing::warn!(kind = self.kind(), status = %status, "Rejected request: {}", self);

        let body = ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
