//! HTTP API
//!
//! Thin axum layer over a [`RecordStore`]: query strings go through the query
//! parser and compiler, writes go straight to the store.
//!
//! # Architecture
//!
//! - `query_string` - flat query pairs to the nested parameter map
//! - `routes` - record endpoints (`/api/:model`, `/api/:model/:rid`)
//! - `error` - `ApiError` to `{"error", "message"}` responses
//!
//! # Usage
//!
//! ```rust,no_run
//! use graphkb_core::api::serve;
//! use graphkb_core::config::GraphKbConfig;
//! use graphkb_core::db::MemoryStore;
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = GraphKbConfig::from_env();
//! let store = Arc::new(MemoryStore::with_page_size(config.query.max_page_size));
//! serve(&config, store).await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod query_string;
mod routes;

pub use error::{ApiError, ErrorBody};
pub use query_string::nest_query_pairs;
pub use routes::{HealthStatus, USER_HEADER};

use crate::config::GraphKbConfig;
use crate::db::RecordStore;
use crate::services::QueryParser;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all endpoints
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub parser: QueryParser,
    /// User recorded on writes without an `x-user` header
    pub default_user: String,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, config: &GraphKbConfig) -> Self {
        Self {
            store,
            parser: QueryParser::new(config.query.clone()),
            default_user: config.default_user.clone(),
        }
    }
}

/// Create the application router with request tracing
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(routes::routes(state))
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server on `config.port`
///
/// # Errors
///
/// Returns error if the server fails to bind or stops unexpectedly.
pub async fn serve(config: &GraphKbConfig, store: Arc<dyn RecordStore>) -> anyhow::Result<()> {
    let app = router(AppState::new(store, config));

    let addr = format!("127.0.0.1:{}", config.port);
    tracing::info!("GraphKB API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
