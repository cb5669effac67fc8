//! StackShare - share biohacking stacks, track daily wellness
//!
//! A JSON-over-HTTP service where users:
//! - Curate stacks of supplements, foods and routines
//! - Log daily mood, energy, focus, stress and sleep quality
//! - Discover, fork, like and discuss public stacks
//!
//! # Architecture
//!
//! The system is organized into several layers:
//! - **Types**: Core data structures (Stack, DailyLog, Post, etc.)
//! - **Storage**: libSQL backend behind `StorageBackend`, object storage for images
//! - **Insights**: Pure routines (relevance, streaks, calendar, trends)
//! - **Services**: Ownership checks and orchestration
//! - **API**: axum router, route guard, page cache
//!
//! # Example
//!
//! ```ignore
//! use stackshare_core::{AppState, LibsqlStorage, StackShareConfig, api::build_router};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = StackShareConfig::load(None)?;
//!     let storage = LibsqlStorage::new_with_validation(config.database.connection_mode(), true).await?;
//!     let router = build_router(AppState::new(Arc::new(storage), None, config));
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod insights;
pub mod services;
pub mod storage;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use api::{build_router, ApiServer, ApiServerConfig, AppState};
pub use auth::{CurrentUser, SessionSigner};
pub use config::StackShareConfig;
pub use error::{Result, StackShareError};
pub use storage::{
    libsql::{ConnectionMode, LibsqlStorage},
    objects::{HttpObjectStore, MemoryObjectStore, ObjectStore},
    StorageBackend,
};
pub use types::{
    DailyLog, DiscoverQuery, DiscoverSort, ItemType, LogEntry, Ratings, Stack, StackId, StackItem,
    UserId,
};
