//! HTTP server: router assembly and graceful serving

use super::{
    guard::route_guard,
    handlers::{logs, pages, posts, session, stacks},
    state::AppState,
};
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Server address
    pub addr: SocketAddr,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            addr: ([127, 0, 0, 1], 3000).into(),
        }
    }
}

/// Every route, guarded and traced
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Health and landing
        .route("/health", get(pages::health))
        .route("/", get(pages::landing))
        // Session
        .route("/auth/callback", get(session::callback))
        .route("/auth/sign-out", post(session::sign_out))
        // Form and JSON API
        .route("/api/categories", get(pages::categories))
        .route("/api/stacks", post(stacks::create_stack))
        .route("/api/stacks/:id", delete(stacks::delete_stack))
        .route("/api/stacks/:id/items", post(stacks::add_item))
        .route("/api/logs/delete", delete(logs::delete_log))
        // Dashboard
        .route("/dashboard", get(pages::dashboard))
        .route("/dashboard/discover", get(pages::discover))
        .route("/dashboard/trends", get(pages::trends))
        .route(
            "/dashboard/active-stack",
            get(stacks::active_stack).delete(stacks::untrack),
        )
        .route("/dashboard/logs", get(logs::list_logs).post(logs::save_log))
        .route("/dashboard/logs/:date", get(logs::logs_on_date))
        // Stacks
        .route("/dashboard/stacks", get(stacks::my_stacks))
        .route(
            "/dashboard/stacks/:id",
            get(stacks::stack_detail).post(stacks::update_stack),
        )
        .route("/dashboard/stacks/:id/fork", post(stacks::fork_stack))
        .route("/dashboard/stacks/:id/activate", post(stacks::activate_stack))
        .route("/dashboard/stacks/:id/like", post(stacks::like_stack))
        .route("/dashboard/stacks/:id/save", post(stacks::save_stack))
        .route("/dashboard/saved", get(stacks::saved_stacks))
        .route("/dashboard/stacks/:id/analytics", get(stacks::stack_analytics))
        .route("/dashboard/stacks/:id/check-in", post(stacks::check_in))
        .route(
            "/dashboard/stacks/:id/items/:item_id",
            put(stacks::update_item),
        )
        .route(
            "/dashboard/stacks/:id/items/:item_id/delete",
            post(stacks::delete_item),
        )
        // Community
        .route(
            "/dashboard/stacks/:id/posts",
            get(posts::list_posts).post(posts::create_post),
        )
        .route("/dashboard/posts/:id", delete(posts::delete_post))
        .route("/dashboard/posts/:id/replies", post(posts::reply))
        .route("/dashboard/posts/:id/like", post(posts::like_post))
        .route("/dashboard/replies/:id", delete(posts::delete_reply))
        .route("/dashboard/replies/:id/like", post(posts::like_reply))
        // Middleware
        .layer(middleware::from_fn_with_state(state.clone(), route_guard))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ApiServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Serve until Ctrl-C or SIGTERM
    pub async fn serve(self) -> anyhow::Result<()> {
        let router = build_router(self.state);
        let listener = tokio::net::TcpListener::bind(self.config.addr).await?;
        info!("StackShare listening on http://{}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("StackShare stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
