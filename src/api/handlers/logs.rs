//! Daily log endpoints

use crate::api::state::AppState;
use crate::auth::CurrentUser;
use crate::error::{Result, StackShareError};
use crate::types::{DailyLog, LogEntry, LogId};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

/// Newest first; cached per user until a log changes
pub async fn list_logs(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Value>> {
    const PATH: &str = "/dashboard/logs";
    let today = Utc::now().date_naive();

    if let Some(cached) = state.cache.get(user.id, PATH, today) {
        debug!("Logs cache hit for {}", user.id);
        return Ok(Json(cached));
    }

    let logs = state.journal().list(user.id).await?;
    let body = serde_json::to_value(&logs)?;
    state.cache.put(user.id, PATH, today, body.clone());
    Ok(Json(body))
}

pub async fn save_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(entry): Json<LogEntry>,
) -> Result<Json<DailyLog>> {
    let log = state
        .journal()
        .record(user.id, entry, Utc::now().date_naive())
        .await?;
    state.cache.revalidate_logs();
    Ok(Json(log))
}

pub async fn logs_on_date(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(date): Path<String>,
) -> Result<Json<Vec<DailyLog>>> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| StackShareError::Validation(format!("Invalid date: {}", date)))?;
    Ok(Json(state.journal().on_date(user.id, date).await?))
}

#[derive(Debug, Deserialize)]
pub struct DeleteLogRequest {
    #[serde(default, rename = "logId")]
    pub log_id: Option<String>,
}

pub async fn delete_log(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<DeleteLogRequest>,
) -> Result<impl IntoResponse> {
    let raw = request
        .log_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| StackShareError::Validation("Log ID is required".to_string()))?;
    let id: LogId = raw.trim().parse()?;

    state.journal().delete(user.id, id).await?;
    state.cache.revalidate_logs();
    Ok((StatusCode::OK, "OK"))
}
