//! HTTP Server for the GLODAP query API

use anyhow::{Context, Result};
use clap::Parser;
use glodap_api::config::AppConfig;
use glodap_api::db::{init_pool, PgStore};
use glodap_api::http;
use glodap_api::GlodapService;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "glodap-api")]
#[command(about = "Open API to query GLODAP v2.2023 bottle data and cruise metadata")]
struct Args {
    /// Address to listen on (overrides BIND_ADDR)
    #[arg(long)]
    bind: Option<String>,

    /// Log filter directive, e.g. "info" or "glodap_api=debug" (overrides RUST_LOG)
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = AppConfig::from_env()?;

    let filter = match args.log_filter {
        Some(ref directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let pool = init_pool(&config.database_url, &config.pool)
        .await
        .context("failed to connect to the database")?;
    let service = Arc::new(GlodapService::new(Arc::new(PgStore::new(pool))));

    let bind_addr = args.bind.unwrap_or(config.bind_addr);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!(
        bind = %bind_addr,
        app_host = config.app_host.as_deref().unwrap_or("-"),
        "GLODAP API listening"
    );

    http::serve(listener, service).await?;
    Ok(())
}
