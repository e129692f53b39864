//! Record Endpoints
//!
//! # Endpoints
//!
//! - `GET /api/health` - Health check endpoint
//! - `GET /api/:model` - Query records with query-string filters
//! - `POST /api/:model` - Create a record
//! - `GET /api/:model/:rid` - Get an active record
//! - `PATCH /api/:model/:rid` - Update fields of a record
//! - `DELETE /api/:model/:rid` - Soft-delete a record
//!
//! Record identifiers may be given with or without the leading `#`
//! (`/api/Feature/2:0` and `/api/Feature/%232:0` are the same record).
//!
//! # Usage
//!
//! ```bash
//! # Features from the civic source whose name contains "kras"
//! curl "http://localhost:8080/api/Feature?source[name]=civic&name=~kras"
//!
//! # Create a record as user "etl"
//! curl -X POST http://localhost:8080/api/Feature \
//!   -H "x-user: etl" -H "Content-Type: application/json" \
//!   -d '{"name": "KRAS", "source": "#1:0"}'
//! ```

use super::query_string::nest_query_pairs;
use super::{ApiError, AppState};
use crate::db::StoreError;
use crate::models::{is_deleted, Operator, Record, CLASS_FIELD, SERVER_MANAGED_FIELDS};
use crate::services::compile_query;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};

/// Header naming the acting user for writes
pub const USER_HEADER: &str = "x-user";

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
}

async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Query records of a model
///
/// The query string is nested (`source[name]=civic`), parsed into a filter
/// tree and compiled to a select. Any invalid parameter rejects the whole
/// request with 400.
async fn query_records(
    State(state): State<AppState>,
    Path(model): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Value>, ApiError> {
    let params = nest_query_pairs(pairs)?;
    let parsed = state
        .parser
        .parse_query_language(&params, Operator::Equals)?;
    let query = compile_query(&parsed)?;
    tracing::debug!(model = %model, filter = ?query.filter, "Query records");

    let records = state.store.select(&model, &query).await?;
    Ok(Json(json!({ "result": records })))
}

async fn get_record(
    State(state): State<AppState>,
    Path((model, rid)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let rid = normalize_rid(&rid)?;
    let record = active_record(&state, &model, &rid).await?;
    Ok(Json(json!({ "result": record })))
}

async fn create_record(
    State(state): State<AppState>,
    Path(model): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let content = body_content(body)?;
    let user = acting_user(&headers, &state.default_user);

    let record = state.store.create(&model, content, &user).await?;
    tracing::info!(model = %model, user = %user, "Created record");
    Ok((StatusCode::CREATED, Json(json!({ "result": record }))))
}

/// Update a record
///
/// Fields in the body replace the stored ones; fields not mentioned are kept.
async fn update_record(
    State(state): State<AppState>,
    Path((model, rid)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let rid = normalize_rid(&rid)?;
    let changes = body_content(body)?;
    let user = acting_user(&headers, &state.default_user);

    let mut content: Record = active_record(&state, &model, &rid)
        .await?
        .into_iter()
        .filter(|(key, _)| !SERVER_MANAGED_FIELDS.contains(&key.as_str()))
        .collect();
    content.extend(changes);

    let record = state.store.update(&model, &rid, content, &user).await?;
    tracing::info!(model = %model, rid = %rid, user = %user, "Updated record");
    Ok(Json(json!({ "result": record })))
}

async fn delete_record(
    State(state): State<AppState>,
    Path((model, rid)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    let rid = normalize_rid(&rid)?;
    let user = acting_user(&headers, &state.default_user);

    let record = state.store.remove(&model, &rid, &user).await?;
    tracing::info!(model = %model, rid = %rid, user = %user, "Deleted record");
    Ok(Json(json!({ "result": record })))
}

/// Active (not soft-deleted) record of `model` with this identifier
async fn active_record(state: &AppState, model: &str, rid: &str) -> Result<Record, ApiError> {
    let record = state
        .store
        .get(rid)
        .await?
        .filter(|record| !is_deleted(record))
        .ok_or_else(|| StoreError::not_found(rid))?;

    let class = record
        .get(CLASS_FIELD)
        .and_then(Value::as_str)
        .unwrap_or_default();
    if class != model {
        return Err(StoreError::model_mismatch(rid, model, class).into());
    }
    Ok(record)
}

/// `#12:3` from `12:3` or `#12:3`
fn normalize_rid(raw: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    let body = trimmed.strip_prefix('#').unwrap_or(trimmed);
    let valid = body
        .split_once(':')
        .map(|(cluster, position)| {
            cluster.parse::<u32>().is_ok() && position.parse::<u64>().is_ok()
        })
        .unwrap_or(false);
    if !valid {
        return Err(ApiError::bad_request(format!(
            "Invalid record identifier '{}'. Expected #<cluster>:<position>",
            raw
        )));
    }
    Ok(format!("#{}", body))
}

fn body_content(body: Value) -> Result<Record, ApiError> {
    match body {
        Value::Object(content) => Ok(content),
        other => Err(ApiError::bad_request(format!(
            "Request body must be a JSON object, not {}",
            other
        ))),
    }
}

fn acting_user(headers: &HeaderMap, default_user: &str) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|user| !user.is_empty())
        .unwrap_or(default_user)
        .to_string()
}

/// Router with every record endpoint
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/:model", get(query_records).post(create_record))
        .route(
            "/api/:model/:rid",
            get(get_record).patch(update_record).delete(delete_record),
        )
        .with_state(state)
}
