//! Services layer for StackShare
//!
//! Ownership and visibility checks plus orchestration over storage.

pub mod community;
pub mod discover;
pub mod journal;
pub mod stacks;

pub use community::{CommunityService, DUPLICATE_REVIEW_MESSAGE};
pub use discover::{DiscoverPage, DiscoverService, Landing};
pub use journal::{Dashboard, JournalService};
pub use stacks::{can_view, default_username, ImageUpload, StackService};
