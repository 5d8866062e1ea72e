// src/lib.rs

pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod key_pool;
pub mod state;
pub mod upstream;

use axum::{
    body::Body,
    http::{HeaderValue, Request as AxumRequest},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::{path::PathBuf, sync::Arc, time::Instant};
use tower_http::cors::CorsLayer;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use state::AppState;

/// Builds the application router. The `/api` surface is what the
/// watchlist UI consumes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/search/movies", get(handlers::search_movies))
        .route("/api/search/tv", get(handlers::search_tv))
        .route("/api/movies/:id", get(handlers::movie_details))
        .route("/api/tv/:id", get(handlers::tv_details))
        .route("/api/tv/:id/season/:season", get(handlers::tv_season))
        .route("/api/rating", get(handlers::rating_lookup))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Request-tracing middleware: assigns a request id, wraps the request
/// in a span, and logs status + duration on completion.
async fn trace_requests(
    mut req: AxumRequest<Body>,
    next: axum::middleware::Next,
) -> impl IntoResponse {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let span = info_span!(
        "request",
        request_id = %request_id,
        http.method = %method,
        url.path = %path,
    );

    req.extensions_mut().insert(request_id);

    async move {
        let mut response = next.run(req).await;
        let elapsed = start_time.elapsed();

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert("X-Request-ID", value);
        }

        info!(
            http.response.duration = ?elapsed,
            http.status_code = response.status().as_u16(),
            "finished processing request"
        );

        response
    }
    .instrument(span)
    .await
}

/// Loads configuration, builds application state, and returns the
/// ready-to-serve router.
pub async fn run(config_path_override: Option<PathBuf>) -> Result<(Router, AppConfig)> {
    let config_path = config_path_override.unwrap_or_else(|| {
        std::env::var("CONFIG_PATH").map_or_else(|_| PathBuf::from("config.yaml"), PathBuf::from)
    });

    let config = config::load_config(&config_path)?;
    let state = Arc::new(AppState::new(&config)?);

    let app = create_router(state).layer(axum::middleware::from_fn(trace_requests));
    Ok((app, config))
}
