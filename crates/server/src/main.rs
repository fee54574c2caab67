//! pantry-sw server entry point.
//!
//! Loads configuration, opens the persistent cache, starts the configured
//! controller version (installing it only if its store is new) and then
//! serves the hosting runtime over MCP stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use pantry_client::{ControllerConfig, FetchConfig, HttpFetcher};
use pantry_core::{AppConfig, CacheDb};
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use tracing_subscriber::EnvFilter;

mod handler;
mod host;
mod tools;

#[cfg(test)]
mod test_support;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let base = ControllerConfig::from_app_config(&config)?;

    tracing::info!(db_path = %config.db_path.display(), version = %base.version, "Starting pantry-sw on stdio transport");

    let storage = CacheDb::open(&config.db_path).await?;
    let fetcher = HttpFetcher::new(&FetchConfig::from(&config))?;
    let host = Arc::new(host::ServiceHost::new(Arc::new(storage), Arc::new(fetcher)));

    let registration = host.start(base.clone()).await;
    tracing::info!(
        version = %registration.version,
        phase = ?registration.phase,
        precached = registration.precached,
        "controller registered"
    );

    let handler = handler::PantryServer::new(host, base);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
