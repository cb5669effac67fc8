//! Utility helpers

pub mod retry;
pub mod string;

pub use retry::{retry_with_backoff, RetryPolicy};
pub use string::{blank_to_none, truncate_at_char_boundary};
