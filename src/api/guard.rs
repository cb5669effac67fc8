//! Session-based redirects for page routes
//!
//! API routes (`/api/*`) and `/health` are not guarded; they answer 401
//! themselves when a session is required.

use crate::api::state::AppState;
use crate::auth::session_user;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Exactly one stack detail page (not its sub-pages)
static STACK_DETAIL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/dashboard/stacks/[^/]+$").expect("valid stack detail regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    Redirect(&'static str),
}

pub fn guard_decision(path: &str, has_session: bool) -> GuardDecision {
    if path.starts_with("/api/") || path == "/health" {
        return GuardDecision::Allow;
    }

    let public = path.starts_with("/auth/")
        || path == "/dashboard/discover"
        || STACK_DETAIL.is_match(path);
    if public {
        return GuardDecision::Allow;
    }

    match (has_session, path == "/") {
        (false, false) => GuardDecision::Redirect("/dashboard/discover"),
        (true, true) => GuardDecision::Redirect("/dashboard"),
        _ => GuardDecision::Allow,
    }
}

pub async fn route_guard(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let has_session = session_user(&state, request.headers()).is_some();
    match guard_decision(request.uri().path(), has_session) {
        GuardDecision::Allow => next.run(request).await,
        GuardDecision::Redirect(to) => {
            debug!("Redirecting {} to {}", request.uri().path(), to);
            Redirect::temporary(to).into_response()
        }
    }
}
