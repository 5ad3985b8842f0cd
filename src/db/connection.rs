//! Database connection management using sqlx

use crate::config::PoolSettings;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

pub type DbPool = PgPool;

/// Initialize the database connection pool.
///
/// sqlx has no separate overflow tier: the pool may grow to
/// `pool_size + max_overflow`, and connections beyond the steady-state size
/// are closed again once idle for the acquire timeout.
pub async fn init_pool(database_url: &str, settings: &PoolSettings) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections())
        .min_connections(0)
        .acquire_timeout(settings.acquire_timeout)
        .idle_timeout(Some(settings.acquire_timeout))
        .max_lifetime(Some(settings.recycle))
        .connect(database_url)
        .await?;

    // Test the connection
    sqlx::query("SELECT 1").execute(&pool).await?;

    info!(
        max_connections = settings.max_connections(),
        "database pool ready"
    );
    Ok(pool)
}
