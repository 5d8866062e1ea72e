// src/error.rs

use crate::gateway::GatewayError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Structured error body returned to the caller.
#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Serialize, Debug)]
struct ErrorDetails {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Application-level errors. Implements `IntoResponse` so every
/// handler failure path produces a well-formed JSON response; upstream
/// failure details are logged but never forwarded to the caller.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("catalog provider is not configured")]
    CatalogNotConfigured,

    #[error("all upstream attempts failed: {0}")]
    UpstreamExhausted(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    YamlParsing(#[from] serde_yaml::Error),

    #[error("HTTP client build error: {0}")]
    HttpClientBuild(#[from] reqwest::Error),
}

/// Catalog routes surface gateway failures through `AppError`; the
/// ratings route absorbs them into its fallback instead.
impl From<GatewayError> for AppError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::NotConfigured => AppError::CatalogNotConfigured,
            GatewayError::Exhausted { last } => AppError::UpstreamExhausted(last),
        }
    }
}

impl AppError {
    fn to_status_and_details(&self) -> (StatusCode, ErrorDetails) {
        match self {
            Self::MissingParameter(name) => (
                StatusCode::BAD_REQUEST,
                ErrorDetails {
                    error_type: "MISSING_PARAMETER".to_string(),
                    message: format!("missing required parameter: {name}"),
                },
            ),
            Self::CatalogNotConfigured => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetails {
                    error_type: "CATALOG_NOT_CONFIGURED".to_string(),
                    message: "catalog provider is not configured; set WATCHLIST_TMDB_API_KEY"
                        .to_string(),
                },
            ),
            Self::UpstreamExhausted(last) => {
                error!(last_outcome = %last, "all upstream attempts failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "UPSTREAM_EXHAUSTED".to_string(),
                        message: "upstream request failed after trying all available keys"
                            .to_string(),
                    },
                )
            }
            Self::Config(msg) => {
                error!("configuration error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "CONFIG_ERROR".to_string(),
                        message: "internal server configuration error".to_string(),
                    },
                )
            }
            Self::Io(e) => {
                error!("IO error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "IO_ERROR".to_string(),
                        message: "internal server error".to_string(),
                    },
                )
            }
            Self::YamlParsing(e) => {
                error!("YAML parsing error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "CONFIG_PARSE_ERROR".to_string(),
                        message: "failed to parse configuration file".to_string(),
                    },
                )
            }
            Self::HttpClientBuild(e) => {
                error!("HTTP client build error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorDetails {
                        error_type: "HTTP_CLIENT_BUILD_ERROR".to_string(),
                        message: "internal server error building HTTP client".to_string(),
                    },
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, details) = self.to_status_and_details();
        (status, Json(ErrorResponse { error: details })).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn check_response(
        error: AppError,
        expected_status: StatusCode,
        expected_type: &str,
        expected_message_substring: &str,
    ) {
        let response = error.into_response();
        assert_eq!(response.status(), expected_status, "status code mismatch");

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let body: Value = serde_json::from_slice(&bytes).expect("body is not valid JSON");

        assert_eq!(body["error"]["type"].as_str().unwrap(), expected_type);
        let message = body["error"]["message"].as_str().unwrap();
        assert!(
            message.contains(expected_message_substring),
            "expected message '{message}' to contain '{expected_message_substring}'"
        );
    }

    #[tokio::test]
    async fn missing_parameter_is_bad_request() {
        check_response(
            AppError::MissingParameter("query"),
            StatusCode::BAD_REQUEST,
            "MISSING_PARAMETER",
            "query",
        )
        .await;
    }

    #[tokio::test]
    async fn catalog_not_configured_is_service_unavailable() {
        check_response(
            AppError::CatalogNotConfigured,
            StatusCode::SERVICE_UNAVAILABLE,
            "CATALOG_NOT_CONFIGURED",
            "not configured",
        )
        .await;
    }

    #[tokio::test]
    async fn upstream_exhausted_never_leaks_detail() {
        let error = AppError::UpstreamExhausted("transient error: secret backend detail".into());
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(!body.contains("secret backend detail"));
        assert!(body.contains("UPSTREAM_EXHAUSTED"));
    }

    #[tokio::test]
    async fn config_error_is_internal() {
        check_response(
            AppError::Config("bad setup".into()),
            StatusCode::INTERNAL_SERVER_ERROR,
            "CONFIG_ERROR",
            "configuration error",
        )
        .await;
    }

    #[tokio::test]
    async fn gateway_errors_map_to_catalog_contract() {
        let e: AppError = GatewayError::NotConfigured.into();
        assert!(matches!(e, AppError::CatalogNotConfigured));

        let e: AppError = GatewayError::Exhausted {
            last: "auth_failure".into(),
        }
        .into();
        assert!(matches!(e, AppError::UpstreamExhausted(_)));
    }
}
