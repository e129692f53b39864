//! Development API server
//!
//! Serves the GraphKB HTTP API over an in-memory store, optionally seeded from
//! a JSON file, for exercising query strings from a browser or curl.
//!
//! ```bash
//! RUST_LOG=graphkb_core=debug cargo run --bin dev-api -- seed.json
//! ```
//!
//! The seed file maps model names to arrays of record content:
//!
//! ```json
//! {"Source": [{"name": "civic"}], "Feature": [{"name": "KRAS"}]}
//! ```

use anyhow::{bail, Context};
use graphkb_core::api::serve;
use graphkb_core::config::GraphKbConfig;
use graphkb_core::db::{MemoryStore, RecordStore};
use serde_json::Value;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const SEED_USER: &str = "dev-api";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = GraphKbConfig::from_env();
    let store = Arc::new(MemoryStore::with_page_size(config.query.max_page_size));

    if let Some(path) = std::env::args().nth(1) {
        let seeded = seed_store(store.as_ref(), &path).await?;
        tracing::info!("Seeded {} records from {}", seeded, path);
    }

    serve(&config, store).await
}

async fn seed_store(store: &MemoryStore, path: &str) -> anyhow::Result<usize> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let seed: Value = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path))?;
    let Value::Object(models) = seed else {
        bail!("{} must contain a JSON object of model name to records", path);
    };

    let mut count = 0;
    for (model, records) in models {
        let Value::Array(records) = records else {
            bail!("Seed records for {} must be an array", model);
        };
        for content in records {
            let Value::Object(content) = content else {
                bail!("Seed record for {} must be an object", model);
            };
            store.create(&model, content, SEED_USER).await?;
            count += 1;
        }
    }
    Ok(count)
}
