//! Relevance scoring for a user's stacks
//!
//! Score = 5 per log in the last 30 days, plus 5 each for a description
//! longer than 50 characters, at least one item, and at least one category.

use crate::types::StackWithRelations;
use chrono::{DateTime, Duration, Utc};

/// Points per recent log and per completeness signal
pub const SIGNAL_POINTS: u32 = 5;

/// Window in which logs count as recent
pub const RECENT_WINDOW_DAYS: i64 = 30;

/// Description length above which a stack counts as described
pub const DESCRIPTION_THRESHOLD: usize = 50;

/// Count logs created within the recency window before `now`
pub fn recent_log_count(log_times: &[DateTime<Utc>], now: DateTime<Utc>) -> usize {
    let window = Duration::days(RECENT_WINDOW_DAYS);
    log_times.iter().filter(|t| now - **t <= window).count()
}

/// Relevance score of a stack at `now`
pub fn relevance_score(stack: &StackWithRelations, now: DateTime<Utc>) -> u32 {
    let mut score = recent_log_count(&stack.log_times, now) as u32 * SIGNAL_POINTS;

    let described = stack
        .stack
        .description
        .as_deref()
        .map(|d| d.chars().count() > DESCRIPTION_THRESHOLD)
        .unwrap_or(false);
    if described {
        score += SIGNAL_POINTS;
    }
    if !stack.items.is_empty() {
        score += SIGNAL_POINTS;
    }
    if !stack.categories.is_empty() {
        score += SIGNAL_POINTS;
    }

    score
}
