//! Metric trends for a user and per-stack usage analytics

use crate::error::StackShareError;
use crate::types::{DailyLog, StackLogSample};
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::str::FromStr;

/// Ratings of one day (averaged when several logs share the date)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub date: NaiveDate,
    pub mood: f64,
    pub energy: f64,
    pub focus: f64,
    pub stress: f64,
    pub sleep_quality: f64,
}

/// Averages across all points, one decimal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricAverages {
    pub mood: f64,
    pub energy: f64,
    pub focus: f64,
    pub stress: f64,
    pub sleep_quality: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trends {
    /// Oldest first
    pub points: Vec<MetricPoint>,
    pub averages: Option<MetricAverages>,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn mean<I: Iterator<Item = u8>>(values: I, n: usize) -> f64 {
    round1(values.map(f64::from).sum::<f64>() / n as f64)
}

/// Per-day series and overall averages of a user's logs
pub fn compute_trends(logs: &[DailyLog]) -> Trends {
    if logs.is_empty() {
        return Trends::default();
    }

    let mut by_date: BTreeMap<NaiveDate, Vec<&DailyLog>> = BTreeMap::new();
    for log in logs {
        by_date.entry(log.date).or_default().push(log);
    }

    let points = by_date
        .into_iter()
        .map(|(date, day)| {
            let n = day.len();
            MetricPoint {
                date,
                mood: mean(day.iter().map(|l| l.ratings.mood), n),
                energy: mean(day.iter().map(|l| l.ratings.energy), n),
                focus: mean(day.iter().map(|l| l.ratings.focus), n),
                stress: mean(day.iter().map(|l| l.ratings.stress), n),
                sleep_quality: mean(day.iter().map(|l| l.ratings.sleep_quality), n),
            }
        })
        .collect();

    let n = logs.len();
    let averages = MetricAverages {
        mood: mean(logs.iter().map(|l| l.ratings.mood), n),
        energy: mean(logs.iter().map(|l| l.ratings.energy), n),
        focus: mean(logs.iter().map(|l| l.ratings.focus), n),
        stress: mean(logs.iter().map(|l| l.ratings.stress), n),
        sleep_quality: mean(logs.iter().map(|l| l.ratings.sleep_quality), n),
    };

    Trends {
        points,
        averages: Some(averages),
    }
}

/// Look-back window of stack analytics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalyticsRange {
    #[serde(rename = "7d")]
    Week,
    #[default]
    #[serde(rename = "30d")]
    Month,
    #[serde(rename = "90d")]
    Quarter,
}

impl AnalyticsRange {
    pub fn days(&self) -> i64 {
        match self {
            AnalyticsRange::Week => 7,
            AnalyticsRange::Month => 30,
            AnalyticsRange::Quarter => 90,
        }
    }
}

impl FromStr for AnalyticsRange {
    type Err = StackShareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "7d" => Ok(AnalyticsRange::Week),
            "30d" => Ok(AnalyticsRange::Month),
            "90d" => Ok(AnalyticsRange::Quarter),
            other => Err(StackShareError::Validation(format!(
                "Unknown analytics range: {} (expected 7d, 30d or 90d)",
                other
            ))),
        }
    }
}

/// Usage of a stack on one day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyStats {
    pub date: NaiveDate,
    pub users: usize,
    pub logs: usize,
    /// Percentage of stack items taken across the day's logs
    pub completion_rate: f64,
}

/// Daily stats from `today - range` to `today`, zero-filled, oldest first
pub fn stack_analytics(
    samples: &[StackLogSample],
    item_count: usize,
    range: AnalyticsRange,
    today: NaiveDate,
) -> Vec<DailyStats> {
    struct Day {
        users: HashSet<crate::types::UserId>,
        logs: usize,
        taken: usize,
    }

    let mut days: HashMap<NaiveDate, Day> = HashMap::new();
    for sample in samples {
        let day = days.entry(sample.created_at.date_naive()).or_insert_with(|| Day {
            users: HashSet::new(),
            logs: 0,
            taken: 0,
        });
        day.users.insert(sample.user_id);
        day.logs += 1;
        day.taken += sample.items_taken.min(item_count);
    }

    let start = today - Duration::days(range.days());
    start
        .iter_days()
        .take_while(|d| *d <= today)
        .map(|date| match days.get(&date) {
            Some(day) => {
                let possible = day.logs * item_count;
                let completion_rate = if possible == 0 {
                    0.0
                } else {
                    round1(day.taken as f64 * 100.0 / possible as f64)
                };
                DailyStats {
                    date,
                    users: day.users.len(),
                    logs: day.logs,
                    completion_rate,
                }
            }
            None => DailyStats {
                date,
                users: 0,
                logs: 0,
                completion_rate: 0.0,
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LogId, Ratings, UserId};
    use chrono::{TimeZone, Utc};

    fn log(date: NaiveDate, mood: u8, energy: u8) -> DailyLog {
        DailyLog {
            id: LogId::new(),
            user_id: UserId::new(),
            stack_id: None,
            date,
            ratings: Ratings {
                mood,
                energy,
                ..Ratings::default()
            },
            notes: None,
            side_effects: None,
            items_taken: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn test_trends_empty() {
        let trends = compute_trends(&[]);
        assert!(trends.points.is_empty());
        assert!(trends.averages.is_none());
    }

    #[test]
    fn test_trends_sorted_and_averaged() {
        let logs = vec![log(date(3), 8, 6), log(date(1), 4, 4), log(date(3), 6, 7)];
        let trends = compute_trends(&logs);

        assert_eq!(trends.points.len(), 2);
        assert_eq!(trends.points[0].date, date(1));
        assert_eq!(trends.points[1].mood, 7.0);
        assert_eq!(trends.points[1].energy, 6.5);

        let averages = trends.averages.unwrap();
        assert_eq!(averages.mood, 6.0);
        assert_eq!(averages.energy, 5.7);
    }

    #[test]
    fn test_range_parse() {
        assert_eq!("7d".parse::<AnalyticsRange>().unwrap(), AnalyticsRange::Week);
        assert!("1y".parse::<AnalyticsRange>().is_err());
    }

    #[test]
    fn test_analytics_zero_filled() {
        let today = date(18);
        let stats = stack_analytics(&[], 3, AnalyticsRange::Week, today);
        assert_eq!(stats.len(), 8);
        assert_eq!(stats.first().unwrap().date, date(11));
        assert!(stats.iter().all(|s| s.logs == 0 && s.completion_rate == 0.0));
    }

    #[test]
    fn test_analytics_completion_rate() {
        let today = date(18);
        let user = UserId::new();
        let at = Utc.with_ymd_and_hms(2026, 10, 17, 9, 0, 0).unwrap();
        let samples = vec![
            StackLogSample {
                user_id: user,
                created_at: at,
                items_taken: 2,
            },
            StackLogSample {
                user_id: user,
                created_at: at,
                items_taken: 1,
            },
            StackLogSample {
                user_id: UserId::new(),
                created_at: at,
                items_taken: 4,
            },
        ];

        let stats = stack_analytics(&samples, 4, AnalyticsRange::Week, today);
        let day = stats.iter().find(|s| s.date == date(17)).unwrap();
        assert_eq!(day.users, 2);
        assert_eq!(day.logs, 3);
        // (2 + 1 + 4) / (3 * 4)
        assert_eq!(day.completion_rate, 58.3);
    }
}
