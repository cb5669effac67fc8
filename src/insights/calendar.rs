//! Activity heatmap layout
//!
//! A year of dates is split into Sunday-started week columns with month
//! labels pointing at the column where each month starts. The 30-day strip
//! shades each day by how many logs fall within two days of it.

use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Days shown in the recent-activity strip
pub const STRIP_DAYS: i64 = 30;

/// Month label anchored at a week column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthLabel {
    pub label: String,
    pub week: usize,
}

/// Week columns (each at most 7 dates, Sunday first) and month labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarGrid {
    pub weeks: Vec<Vec<NaiveDate>>,
    pub month_labels: Vec<MonthLabel>,
}

impl CalendarGrid {
    /// Total number of dates across all weeks
    pub fn day_count(&self) -> usize {
        self.weeks.iter().map(Vec::len).sum()
    }
}

/// One cell of the recent-activity strip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayIntensity {
    pub date: NaiveDate,
    /// 0 = no log, 1-3 = increasing density of nearby logs
    pub level: u8,
}

/// Build week columns for the inclusive range `start..=end`
///
/// An empty grid is returned when `start > end`.
pub fn build_calendar(start: NaiveDate, end: NaiveDate) -> CalendarGrid {
    let mut grid = CalendarGrid::default();
    let mut current_week: Vec<NaiveDate> = Vec::new();
    let mut current_month: Option<u32> = None;

    for day in start.iter_days().take_while(|d| *d <= end) {
        if day.weekday() == Weekday::Sun && !current_week.is_empty() {
            grid.weeks.push(std::mem::take(&mut current_week));
        }

        if current_month != Some(day.month()) {
            current_month = Some(day.month());
            grid.month_labels.push(MonthLabel {
                label: day.format("%b").to_string(),
                week: grid.weeks.len(),
            });
        }

        current_week.push(day);
    }

    if !current_week.is_empty() {
        grid.weeks.push(current_week);
    }

    grid
}

/// Calendar for the year ending at `today`
pub fn year_calendar(today: NaiveDate) -> CalendarGrid {
    let start = today
        .checked_sub_months(Months::new(12))
        .unwrap_or(today - Duration::days(365));
    build_calendar(start, today)
}

/// Shade the last 30 days (oldest first) by nearby log density
pub fn recent_intensity(log_dates: &[NaiveDate], today: NaiveDate) -> Vec<DayIntensity> {
    let active: HashSet<NaiveDate> = log_dates.iter().copied().collect();

    (0..STRIP_DAYS)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset);
            let level = if active.contains(&date) {
                let nearby = log_dates
                    .iter()
                    .filter(|d| (**d - date).num_days().abs() <= 2)
                    .count();
                nearby.min(3) as u8
            } else {
                0
            };
            DayIntensity { date, level }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_weeks_split_on_sunday() {
        // 2026-10-14 is a Wednesday, 2026-10-18 a Sunday
        let grid = build_calendar(date(2026, 10, 14), date(2026, 10, 20));
        assert_eq!(grid.weeks.len(), 2);
        assert_eq!(grid.weeks[0].len(), 4);
        assert_eq!(grid.weeks[1][0], date(2026, 10, 18));
        assert_eq!(grid.weeks[1][0].weekday(), Weekday::Sun);
        assert_eq!(grid.day_count(), 7);
    }

    #[test]
    fn test_no_week_exceeds_seven_days() {
        let grid = year_calendar(date(2026, 10, 18));
        assert!(grid.weeks.iter().all(|w| !w.is_empty() && w.len() <= 7));
        assert_eq!(grid.day_count(), 366);
    }

    #[test]
    fn test_month_labels_point_at_month_start() {
        let grid = build_calendar(date(2026, 1, 25), date(2026, 3, 5));
        let labels: Vec<&str> = grid.month_labels.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["Jan", "Feb", "Mar"]);

        for label in &grid.month_labels {
            let week = &grid.weeks[label.week];
            assert!(week.iter().any(|d| d.format("%b").to_string() == label.label));
        }
    }

    #[test]
    fn test_reversed_range_is_empty() {
        let grid = build_calendar(date(2026, 5, 2), date(2026, 5, 1));
        assert!(grid.weeks.is_empty());
        assert!(grid.month_labels.is_empty());
    }

    #[test]
    fn test_recent_intensity_levels() {
        let today = date(2026, 10, 18);
        let logs = vec![
            today,
            today - Duration::days(1),
            today - Duration::days(2),
            today - Duration::days(10),
        ];
        let strip = recent_intensity(&logs, today);
        assert_eq!(strip.len(), 30);
        assert_eq!(strip.last().unwrap().date, today);
        assert_eq!(strip.last().unwrap().level, 3);
        assert_eq!(strip[29 - 10].level, 1);
        assert_eq!(strip[29 - 5].level, 0);
    }
}
