//! Schema column cache
//!
//! Column sets are fetched once per table and kept for the process
//! lifetime; schema changes need a restart unless [`SchemaCache::invalidate`]
//! is called. Concurrent misses for the same table share one introspection
//! query.

use crate::db::store::GlodapStore;
use crate::error::{GlodapError, Result};
use moka::future::Cache;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Maximum number of distinct tables kept
pub const DEFAULT_CAPACITY: u64 = 64;

pub struct SchemaCache {
    store: Arc<dyn GlodapStore>,
    columns: Cache<String, Arc<BTreeSet<String>>>,
}

impl SchemaCache {
    pub fn new(store: Arc<dyn GlodapStore>) -> Self {
        Self::with_capacity(store, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(store: Arc<dyn GlodapStore>, capacity: u64) -> Self {
        Self {
            store,
            columns: Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// Column names of `table`. Failed introspection is not cached.
    pub async fn columns(&self, table: &str) -> Result<Arc<BTreeSet<String>>> {
        let store = Arc::clone(&self.store);
        let name = table.to_string();
        self.columns
            .try_get_with(table.to_string(), async move {
                debug!(table = %name, "schema cache miss");
                store.fetch_columns(&name).await.map(Arc::new)
            })
            .await
            .map_err(|e: Arc<GlodapError>| GlodapError::Store(store_message(&e)))
    }

    pub async fn invalidate(&self, table: &str) {
        self.columns.invalidate(table).await;
    }

    pub fn invalidate_all(&self) {
        self.columns.invalidate_all();
    }
}

fn store_message(err: &GlodapError) -> String {
    match err {
        GlodapError::Store(msg) => msg.clone(),
        other => other.to_string(),
    }
}
