// src/state.rs

use crate::config::AppConfig;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::upstream::Provider;
use reqwest::Client;
use std::time::Duration;
use tracing::info;

// Per-call timeouts bound worst-case latency per attempt; the retry
// loop multiplies these by the pool size.
const CATALOG_TIMEOUT: Duration = Duration::from_secs(10);
const RATINGS_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared application state: one gateway per upstream provider, each
/// with its own key pool and HTTP client.
#[derive(Debug)]
pub struct AppState {
    pub catalog: Gateway,
    pub ratings: Gateway,
}

impl AppState {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let catalog_client = build_client(CATALOG_TIMEOUT)?;
        let ratings_client = build_client(RATINGS_TIMEOUT)?;

        let catalog = Gateway::new(
            Provider::Catalog,
            config.catalog.base_url.clone(),
            config.catalog.keys.clone(),
            catalog_client,
        );
        let ratings = Gateway::new(
            Provider::Ratings,
            config.ratings.base_url.clone(),
            config.ratings.keys.clone(),
            ratings_client,
        );

        info!("application state initialized");
        Ok(Self { catalog, ratings })
    }
}

fn build_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(timeout)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .build()?;
    Ok(client)
}
