//! Sign-in callback and sign-out

use crate::api::state::AppState;
use crate::auth::{clear_session_cookie, session_cookie};
use crate::error::{Result, StackShareError};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub token: Option<String>,
}

/// Exchange a provider token for the session cookie
pub async fn callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Result<impl IntoResponse> {
    let token = params
        .token
        .ok_or_else(|| StackShareError::Unauthorized("Missing token".to_string()))?;
    let now = Utc::now();
    let claims = state.signer.verify(&token, now)?;

    info!("User {} signed in", claims.sub);
    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &token,
        Duration::seconds(claims.exp - now.timestamp()),
    );
    Ok((
        StatusCode::FOUND,
        [(header::LOCATION, "/dashboard".to_string()), (header::SET_COOKIE, cookie)],
    ))
}

pub async fn sign_out(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, "/dashboard/discover".to_string()),
            (
                header::SET_COOKIE,
                clear_session_cookie(&state.config.auth.cookie_name),
            ),
        ],
    )
}
