// src/upstream.rs

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;

/// The two upstream providers this proxy fronts. Each injects its
/// credential under a different query parameter and embeds soft errors
/// in a different body shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Movie/TV metadata catalog (TMDB-shaped API).
    Catalog,
    /// Title rating lookup (OMDb-shaped API).
    Ratings,
}

impl Provider {
    pub fn key_param(self) -> &'static str {
        match self {
            Provider::Catalog => "api_key",
            Provider::Ratings => "apikey",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Provider::Catalog => "catalog",
            Provider::Ratings => "ratings",
        }
    }
}

/// Classified result of a single upstream attempt.
#[derive(Debug)]
pub enum UpstreamOutcome {
    Success(Value),
    AuthFailure,
    RateLimited,
    QuotaExceeded,
    TransientError(String),
}

impl UpstreamOutcome {
    /// True for failures attributable to the key itself, which should
    /// quarantine it. Transient failures are the call's fault, not the
    /// key's, and must not.
    pub fn is_credential_failure(&self) -> bool {
        matches!(
            self,
            UpstreamOutcome::AuthFailure
                | UpstreamOutcome::RateLimited
                | UpstreamOutcome::QuotaExceeded
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            UpstreamOutcome::Success(_) => "success",
            UpstreamOutcome::AuthFailure => "auth_failure",
            UpstreamOutcome::RateLimited => "rate_limited",
            UpstreamOutcome::QuotaExceeded => "quota_exceeded",
            UpstreamOutcome::TransientError(_) => "transient_error",
        }
    }
}

/// Performs exactly one upstream GET with the given credential and
/// classifies the result. No side effects beyond the network call.
pub async fn execute_once(
    client: &Client,
    provider: Provider,
    base_url: &str,
    path: &str,
    params: &[(&str, String)],
    api_key: &str,
) -> UpstreamOutcome {
    let url = format!("{}{}", base_url.trim_end_matches('/'), path);
    debug!(provider = provider.name(), %url, "dispatching upstream request");

    let response = client
        .get(&url)
        .query(params)
        .query(&[(provider.key_param(), api_key)])
        .send()
        .await;

    let response = match response {
        Ok(r) => r,
        // The request URL carries the credential; strip it before the
        // error is stringified for logs and exhaustion reports.
        Err(e) => return UpstreamOutcome::TransientError(e.without_url().to_string()),
    };

    let status = response.status();
    match response.text().await {
        Ok(body) => classify(provider, status, &body),
        Err(e) => {
            UpstreamOutcome::TransientError(format!("body read failed: {}", e.without_url()))
        }
    }
}

/// Maps an upstream HTTP status and body to an outcome. First matching
/// rule wins:
///
/// 1. 401/403 -> AuthFailure
/// 2. 429, or a "rate limit" phrase in the body -> RateLimited
/// 3. provider soft-error embedded in a 2xx body -> QuotaExceeded
/// 4. any other non-2xx -> TransientError
/// 5. otherwise -> Success (body must be JSON)
///
/// Transport-level failures never reach this function; `execute_once`
/// reports them as TransientError directly.
pub fn classify(provider: Provider, status: StatusCode, body: &str) -> UpstreamOutcome {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return UpstreamOutcome::AuthFailure;
    }

    if status == StatusCode::TOO_MANY_REQUESTS || body.to_lowercase().contains("rate limit") {
        return UpstreamOutcome::RateLimited;
    }

    let json = serde_json::from_str::<Value>(body).ok();
    if status.is_success() {
        if let Some(json) = &json {
            if is_soft_error(provider, json) {
                return UpstreamOutcome::QuotaExceeded;
            }
        }
    } else {
        return UpstreamOutcome::TransientError(format!("upstream returned status {status}"));
    }

    match json {
        Some(json) => UpstreamOutcome::Success(json),
        None => UpstreamOutcome::TransientError("upstream returned non-JSON body".to_string()),
    }
}

/// Provider-specific quota/key errors embedded in an otherwise
/// ordinary response body.
fn is_soft_error(provider: Provider, body: &Value) -> bool {
    match provider {
        // Catalog status_code 7 ("invalid key") and 34 ("suspended
        // key") are key-level rejections smuggled into a 200.
        Provider::Catalog => matches!(
            body.get("status_code").and_then(Value::as_i64),
            Some(7) | Some(34)
        ),
        // Ratings provider reports errors as Response=False plus a
        // human-readable message; only quota/key messages count.
        Provider::Ratings => {
            let failed = body
                .get("Response")
                .and_then(Value::as_str)
                .is_some_and(|r| r.eq_ignore_ascii_case("false"));
            if !failed {
                return false;
            }
            body.get("Error")
                .and_then(Value::as_str)
                .map(str::to_lowercase)
                .is_some_and(|e| e.contains("request limit reached") || e.contains("invalid api key"))
        }
    }
}
