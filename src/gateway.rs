// src/gateway.rs

use crate::key_pool::{key_preview, KeyPool, PoolError};
use crate::upstream::{self, Provider, UpstreamOutcome};
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("no API credentials configured for this provider")]
    NotConfigured,
    #[error("all upstream attempts failed ({last})")]
    Exhausted { last: String },
}

/// One resilient gateway to one upstream provider: a key pool, a
/// pre-built HTTP client with a bounded per-call timeout, and the
/// retry loop that drives them.
///
/// Shared across all concurrent inbound requests via `Arc`; each
/// request runs its own attempt loop over the shared pool.
#[derive(Debug)]
pub struct Gateway {
    provider: Provider,
    base_url: String,
    pool: KeyPool,
    client: Client,
}

impl Gateway {
    pub fn new(provider: Provider, base_url: String, keys: Vec<String>, client: Client) -> Self {
        let pool = KeyPool::new(keys);
        info!(
            provider = provider.name(),
            keys = pool.len(),
            "gateway initialized"
        );
        Self {
            provider,
            base_url,
            pool,
            client,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn key_count(&self) -> usize {
        self.pool.len()
    }

    pub fn quarantined_count(&self) -> usize {
        self.pool.quarantined_count()
    }

    /// Fetches `path` from the provider, rotating through the key pool
    /// on credential-level failures.
    ///
    /// At most `pool.len()` attempts are made, strictly sequentially:
    /// each selection depends on the quarantine state left by the
    /// previous attempt. Auth, rate-limit, and quota failures
    /// quarantine the key and move on; transient failures retry
    /// without blaming the key. The last observed outcome is reported
    /// once the pool is exhausted.
    pub async fn fetch(&self, path: &str, params: &[(&str, String)]) -> Result<Value, GatewayError> {
        if self.pool.is_empty() {
            return Err(GatewayError::NotConfigured);
        }

        let mut last: Option<UpstreamOutcome> = None;
        for attempt in 1..=self.pool.len() {
            let key = match self.pool.select_key() {
                Ok(key) => key,
                Err(PoolError::NoCredentialsConfigured) => return Err(GatewayError::NotConfigured),
            };

            let outcome = upstream::execute_once(
                &self.client,
                self.provider,
                &self.base_url,
                path,
                params,
                &key,
            )
            .await;

            match outcome {
                UpstreamOutcome::Success(body) => return Ok(body),
                outcome if outcome.is_credential_failure() => {
                    warn!(
                        provider = self.provider.name(),
                        attempt,
                        outcome = outcome.label(),
                        key.preview = %key_preview(&key),
                        "credential-level failure; quarantining key"
                    );
                    self.pool.mark_failed(&key);
                    last = Some(outcome);
                }
                outcome => {
                    warn!(
                        provider = self.provider.name(),
                        attempt,
                        outcome = outcome.label(),
                        "transient failure; retrying without quarantine"
                    );
                    last = Some(outcome);
                }
            }
        }

        let last = last.map_or_else(|| "no attempts made".to_string(), |o| describe(&o));
        Err(GatewayError::Exhausted { last })
    }
}

fn describe(outcome: &UpstreamOutcome) -> String {
    match outcome {
        UpstreamOutcome::TransientError(cause) => format!("transient error: {cause}"),
        other => other.label().to_string(),
    }
}
