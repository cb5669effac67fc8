//! Logging streaks over the most recent 365 days

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Number of days (ending today) inspected for streaks
pub const STREAK_WINDOW_DAYS: i64 = 365;

/// Current and longest run of consecutive logged days
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streaks {
    /// Run that ends today (0 when today has no log)
    pub current: u32,
    pub longest: u32,
}

/// Walk the window oldest-to-newest, counting consecutive logged days
///
/// The running count at `today` is the current streak. Dates outside the
/// window and duplicates are ignored.
pub fn compute_streaks<I>(log_dates: I, today: NaiveDate) -> Streaks
where
    I: IntoIterator<Item = NaiveDate>,
{
    let active: HashSet<NaiveDate> = log_dates.into_iter().collect();

    let mut running = 0u32;
    let mut longest = 0u32;

    for offset in (0..STREAK_WINDOW_DAYS).rev() {
        let day = today - Duration::days(offset);
        if active.contains(&day) {
            running += 1;
            longest = longest.max(running);
        } else {
            running = 0;
        }
    }

    Streaks {
        current: running,
        longest,
    }
}
