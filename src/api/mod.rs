//! HTTP API for StackShare
//!
//! Provides:
//! - Landing, discover and stack pages (JSON)
//! - Dashboard, logs and trends for signed-in users
//! - Form and multipart endpoints for stacks and items
//! - Route guard and per-user page cache

pub mod cache;
pub mod guard;
pub mod handlers;
pub mod server;
pub mod state;

pub use cache::PageCache;
pub use guard::{guard_decision, GuardDecision};
pub use server::{build_router, ApiServer, ApiServerConfig};
pub use state::AppState;
