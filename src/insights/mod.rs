//! Pure routines behind the dashboard views
//!
//! Nothing here touches storage: callers load rows and pass them in together
//! with the reference time, which keeps every routine deterministic.

pub mod calendar;
pub mod organizer;
pub mod relevance;
pub mod streak;
pub mod trends;

pub use calendar::{build_calendar, recent_intensity, year_calendar, CalendarGrid, DayIntensity};
pub use organizer::{category_label, organize_stacks, CategoryGroup, RankedStack};
pub use relevance::relevance_score;
pub use streak::{compute_streaks, Streaks};
pub use trends::{compute_trends, stack_analytics, AnalyticsRange, DailyStats, Trends};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::{
        Category, CategoryId, ItemId, ItemType, Stack, StackId, StackItem, StackWithRelations,
        UserId,
    };
    use chrono::{DateTime, Utc};

    pub fn stack_with(
        description: Option<&str>,
        items: Vec<StackItem>,
        categories: Vec<Category>,
        log_times: Vec<DateTime<Utc>>,
    ) -> StackWithRelations {
        let now = Utc::now();
        StackWithRelations {
            stack: Stack {
                id: StackId::new(),
                user_id: UserId::new(),
                name: "Test stack".to_string(),
                description: description.map(str::to_string),
                purpose: None,
                is_public: false,
                views: 0,
                likes: 0,
                original_stack_id: None,
                original_author: None,
                created_at: now,
                updated_at: now,
            },
            items,
            categories,
            log_times,
        }
    }

    pub fn item(name: &str) -> StackItem {
        StackItem {
            id: ItemId::new(),
            stack_id: StackId::new(),
            item_type: ItemType::Supplement,
            name: name.to_string(),
            description: None,
            dosage: None,
            frequency: None,
            timing: None,
            image_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn category(name: &str) -> Category {
        Category {
            id: CategoryId::new(),
            name: name.to_string(),
            slug: name.to_lowercase().replace(' ', "-"),
        }
    }
}
