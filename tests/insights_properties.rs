//! Property tests for the pure dashboard routines

use chrono::{Datelike, Duration, NaiveDate, Utc, Weekday};
use proptest::prelude::*;
use stackshare_core::insights::{
    build_calendar, compute_streaks, organize_stacks, recent_intensity, relevance_score,
};
use stackshare_core::types::{
    Category, CategoryId, ItemId, ItemType, Stack, StackId, StackItem, StackWithRelations, UserId,
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
}

fn stack(
    description_len: usize,
    item_count: usize,
    category_names: Vec<String>,
    recent_logs: usize,
) -> StackWithRelations {
    let now = Utc::now();
    let id = StackId::new();
    StackWithRelations {
        stack: Stack {
            id,
            user_id: UserId::new(),
            name: "Stack".to_string(),
            description: Some("d".repeat(description_len)),
            purpose: None,
            is_public: false,
            views: 0,
            likes: 0,
            original_stack_id: None,
            original_author: None,
            created_at: now,
            updated_at: now,
        },
        items: (0..item_count)
            .map(|i| StackItem {
                id: ItemId::new(),
                stack_id: id,
                item_type: ItemType::Food,
                name: format!("item {}", i),
                description: None,
                dosage: None,
                frequency: None,
                timing: None,
                image_url: None,
                created_at: now,
            })
            .collect(),
        categories: category_names
            .into_iter()
            .map(|name| Category {
                id: CategoryId::new(),
                slug: name.to_lowercase(),
                name,
            })
            .collect(),
        log_times: (0..recent_logs).map(|i| now - Duration::hours(i as i64)).collect(),
    }
}

proptest! {
    #[test]
    fn relevance_grows_with_recent_logs(
        desc in 0usize..120,
        items in 0usize..4,
        logs in 0usize..20,
        extra in 1usize..5,
    ) {
        let now = Utc::now();
        let base = stack(desc, items, vec![], logs);
        let mut more = base.clone();
        more.log_times.extend((0..extra).map(|i| now - Duration::minutes(i as i64 + 1)));

        let a = relevance_score(&base, now);
        let b = relevance_score(&more, now);
        prop_assert_eq!(b, a + 5 * extra as u32);
        prop_assert_eq!(a % 5, 0);
    }

    #[test]
    fn streaks_bounded_by_window(offsets in prop::collection::vec(0i64..400, 0..200)) {
        let dates: Vec<NaiveDate> = offsets.iter().map(|o| today() - Duration::days(*o)).collect();
        let streaks = compute_streaks(dates, today());
        prop_assert!(streaks.current <= streaks.longest);
        prop_assert!(streaks.longest <= 365);
    }

    #[test]
    fn calendar_covers_every_day(start_offset in 0i64..800, len in 0i64..400) {
        let start = today() - Duration::days(start_offset);
        let end = start + Duration::days(len);
        let grid = build_calendar(start, end);

        let days: Vec<NaiveDate> = grid.weeks.iter().flatten().copied().collect();
        prop_assert_eq!(days.len() as i64, len + 1);
        prop_assert!(days.windows(2).all(|w| w[1] == w[0] + Duration::days(1)));
        prop_assert!(grid.weeks.iter().all(|w| !w.is_empty() && w.len() <= 7));
        prop_assert!(grid.weeks.iter().skip(1).all(|w| w[0].weekday() == Weekday::Sun));
    }

    #[test]
    fn intensity_strip_is_thirty_days(offsets in prop::collection::vec(0i64..60, 0..40)) {
        let dates: Vec<NaiveDate> = offsets.iter().map(|o| today() - Duration::days(*o)).collect();
        let strip = recent_intensity(&dates, today());
        prop_assert_eq!(strip.len(), 30);
        prop_assert_eq!(strip.last().map(|d| d.date), Some(today()));
        prop_assert!(strip.iter().all(|d| d.level <= 3));
        for day in &strip {
            prop_assert_eq!(day.level == 0, !dates.contains(&day.date));
        }
    }

    #[test]
    fn organizer_partitions_stacks(
        specs in prop::collection::vec(
            (0usize..80, 0usize..3, prop::sample::select(vec!["Sleep", "Focus", "Gut health", ""]), 0usize..6),
            0..12,
        )
    ) {
        let stacks: Vec<StackWithRelations> = specs
            .iter()
            .map(|(desc, items, cat, logs)| {
                let categories = if cat.is_empty() { vec![] } else { vec![cat.to_string()] };
                stack(*desc, *items, categories, *logs)
            })
            .collect();
        let total = stacks.len();

        let groups = organize_stacks(stacks, Utc::now());
        let grouped: usize = groups.iter().map(|g| g.stacks.len()).sum();
        prop_assert_eq!(grouped, total);

        let mut labels: Vec<&str> = groups.iter().map(|g| g.label.as_str()).collect();
        let before = labels.len();
        labels.sort();
        labels.dedup();
        prop_assert_eq!(labels.len(), before);

        for group in &groups {
            prop_assert!(group
                .stacks
                .windows(2)
                .all(|w| w[0].relevance_score >= w[1].relevance_score));
        }
    }
}

#[test]
fn full_window_streak() {
    let dates: Vec<NaiveDate> = (0..365).map(|o| today() - Duration::days(o)).collect();
    let streaks = compute_streaks(dates, today());
    assert_eq!(streaks.current, 365);
    assert_eq!(streaks.longest, 365);
}

#[test]
fn empty_streak() {
    let streaks = compute_streaks(Vec::<NaiveDate>::new(), today());
    assert_eq!(streaks.current, 0);
    assert_eq!(streaks.longest, 0);
}
