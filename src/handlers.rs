// src/handlers.rs

use crate::{
    error::{AppError, Result},
    state::AppState,
};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    query: Option<String>,
    page: Option<u32>,
}

pub async fn search_movies(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>> {
    search(&state, "/search/movie", params).await
}

pub async fn search_tv(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>> {
    search(&state, "/search/tv", params).await
}

/// Catalog search. Input errors are rejected before any upstream call
/// is made; the catalog's 503/500 failure contract comes from the
/// `GatewayError -> AppError` mapping.
async fn search(state: &AppState, path: &str, params: SearchParams) -> Result<Json<Value>> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or(AppError::MissingParameter("query"))?;

    let mut upstream_params = vec![("query", query.to_string())];
    if let Some(page) = params.page {
        upstream_params.push(("page", page.to_string()));
    }

    let body = state.catalog.fetch(path, &upstream_params).await?;
    Ok(Json(body))
}

pub async fn movie_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Value>> {
    let body = state.catalog.fetch(&format!("/movie/{id}"), &[]).await?;
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct TvDetailParams {
    minimal: Option<bool>,
}

pub async fn tv_details(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<TvDetailParams>,
) -> Result<Json<Value>> {
    let mut body = state.catalog.fetch(&format!("/tv/{id}"), &[]).await?;
    if !params.minimal.unwrap_or(false) {
        enrich_tv_details(state.as_ref(), id, &mut body).await;
    }
    Ok(Json(body))
}

/// Recomputes `number_of_seasons` / `number_of_episodes` by fetching
/// every listed season and summing its episode list. Upstream TV
/// payloads frequently report these fields stale or missing.
///
/// Season fetches run concurrently with no fan-out cap; the per-call
/// timeout bounds each one. A season whose fetch fails is skipped
/// from the sum rather than failing the whole request. Season 0
/// ("Specials") is excluded, matching the upstream's own
/// `number_of_seasons` convention.
async fn enrich_tv_details(state: &AppState, id: i64, body: &mut Value) {
    let season_numbers: Vec<i64> = body
        .get("seasons")
        .and_then(Value::as_array)
        .map(|seasons| {
            seasons
                .iter()
                .filter_map(|s| s.get("season_number").and_then(Value::as_i64))
                .filter(|n| *n > 0)
                .collect()
        })
        .unwrap_or_default();

    if season_numbers.is_empty() {
        return;
    }

    let paths: Vec<String> = season_numbers
        .iter()
        .map(|n| format!("/tv/{id}/season/{n}"))
        .collect();
    let results = join_all(paths.iter().map(|p| state.catalog.fetch(p, &[]))).await;

    let mut episode_total: u64 = 0;
    for (season_number, result) in season_numbers.iter().zip(results) {
        match result {
            Ok(season) => {
                episode_total += season
                    .get("episodes")
                    .and_then(Value::as_array)
                    .map_or(0, |eps| eps.len() as u64);
            }
            Err(e) => {
                warn!(tv_id = id, season = season_number, error = %e, "season fetch failed; skipping from episode sum");
            }
        }
    }

    if let Some(obj) = body.as_object_mut() {
        obj.insert("number_of_seasons".to_string(), json!(season_numbers.len()));
        obj.insert("number_of_episodes".to_string(), json!(episode_total));
    }
}

pub async fn tv_season(
    State(state): State<Arc<AppState>>,
    Path((id, season)): Path<(i64, i64)>,
) -> Result<Json<Value>> {
    let body = state
        .catalog
        .fetch(&format!("/tv/{id}/season/{season}"), &[])
        .await?;
    Ok(Json(body))
}

#[derive(Debug, Deserialize)]
pub struct RatingParams {
    title: Option<String>,
    year: Option<String>,
    imdb_id: Option<String>,
}

/// Rating lookup never surfaces upstream errors: other than the 400
/// for missing input, every outcome is a 200 carrying either the real
/// rating or the documented "N/A" fallback.
pub async fn rating_lookup(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RatingParams>,
) -> Result<Json<Value>> {
    let imdb_id = params.imdb_id.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let title = params.title.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let year = params.year.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let mut upstream_params: Vec<(&str, String)> = Vec::new();
    if let Some(id) = imdb_id {
        upstream_params.push(("i", id.to_string()));
    } else if let Some(title) = title {
        upstream_params.push(("t", title.to_string()));
        if let Some(year) = year {
            upstream_params.push(("y", year.to_string()));
        }
    } else {
        return Err(AppError::MissingParameter("title or imdb_id"));
    }

    let rating = match state.ratings.fetch("/", &upstream_params).await {
        Ok(body) => extract_rating(&body).to_string(),
        Err(e) => {
            info!(error = %e, "rating lookup degraded to fallback");
            "N/A".to_string()
        }
    };

    Ok(Json(json!({ "rating": rating })))
}

/// Pulls only the rating string out of the upstream payload; the rest
/// of the body is never forwarded.
fn extract_rating(body: &Value) -> &str {
    body.get("imdbRating")
        .and_then(Value::as_str)
        .filter(|r| !r.is_empty())
        .unwrap_or("N/A")
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "providers": {
            "catalog": {
                "keys": state.catalog.key_count(),
                "quarantined": state.catalog.quarantined_count(),
            },
            "ratings": {
                "keys": state.ratings.key_count(),
                "quarantined": state.ratings.quarantined_count(),
            },
        },
    }))
}
