//! Database module for PostgreSQL connection and read-only queries
//!
//! This module provides the connection pool, the store seam used by the
//! query service, and the schema column cache.

pub mod connection;
pub mod schema_cache;
pub mod store;

pub use connection::{init_pool, DbPool};
pub use schema_cache::SchemaCache;
pub use store::{GlodapStore, PgStore};
