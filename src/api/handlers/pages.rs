//! Read-only pages: health, landing, dashboard, discover, trends

use crate::api::state::AppState;
use crate::auth::CurrentUser;
use crate::error::Result;
use crate::insights::Trends;
use crate::services::{DiscoverPage, Landing};
use crate::types::{Category, DiscoverQuery};
use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn landing(State(state): State<AppState>) -> Result<Json<Landing>> {
    Ok(Json(state.discover().landing().await?))
}

pub async fn categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.discover().categories().await?))
}

/// Cached per user and day until a log or stack changes
pub async fn dashboard(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Value>> {
    const PATH: &str = "/dashboard";
    let today = Utc::now().date_naive();

    if let Some(cached) = state.cache.get(user.id, PATH, today) {
        debug!("Dashboard cache hit for {}", user.id);
        return Ok(Json(cached));
    }

    let dashboard = state.journal().dashboard(user.id, today).await?;
    let body = serde_json::to_value(&dashboard)?;
    state.cache.put(user.id, PATH, today, body.clone());
    Ok(Json(body))
}

pub async fn discover(
    State(state): State<AppState>,
    Query(query): Query<DiscoverQuery>,
) -> Result<Json<DiscoverPage>> {
    Ok(Json(state.discover().discover(query, state.retry).await?))
}

pub async fn trends(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Trends>> {
    Ok(Json(state.journal().trends(user.id).await?))
}
