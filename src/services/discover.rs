//! Public browsing: landing page and the discover feed

use crate::error::Result;
use crate::services::community::{CommunityService, ACTIVITY_LIMIT};
use crate::storage::StorageBackend;
use crate::types::{ActivityEntry, Category, CommunityStats, DiscoverQuery, StackCard};
use crate::utils::retry::RetryPolicy;
use crate::utils::string::blank_to_none;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Stacks shown per landing section
pub const LANDING_SECTION_SIZE: usize = 3;

/// Upper bound on discover results
pub const DISCOVER_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Landing {
    pub categories: Vec<Category>,
    pub newest: Vec<StackCard>,
    /// Most viewed
    pub trending: Vec<StackCard>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverPage {
    pub stacks: Vec<StackCard>,
    pub categories: Vec<Category>,
    pub stats: CommunityStats,
    pub activity: Vec<ActivityEntry>,
}

pub struct DiscoverService {
    storage: Arc<dyn StorageBackend>,
    community: CommunityService,
}

impl DiscoverService {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            community: CommunityService::new(storage.clone()),
            storage,
        }
    }

    pub async fn categories(&self) -> Result<Vec<Category>> {
        self.storage.list_categories().await
    }

    pub async fn landing(&self) -> Result<Landing> {
        Ok(Landing {
            categories: self.storage.list_categories().await?,
            newest: self.storage.newest_public_stacks(LANDING_SECTION_SIZE).await?,
            trending: self.storage.trending_stacks(LANDING_SECTION_SIZE).await?,
        })
    }

    pub async fn discover(&self, query: DiscoverQuery, policy: RetryPolicy) -> Result<DiscoverPage> {
        let query = DiscoverQuery {
            q: blank_to_none(query.q.map(|q| q.trim().to_string())),
            category: blank_to_none(query.category),
            sort: query.sort,
        };
        debug!("Discover query: {:?}", query);

        Ok(DiscoverPage {
            stacks: self.storage.discover_stacks(&query, DISCOVER_LIMIT).await?,
            categories: self.storage.list_categories().await?,
            stats: self.community.stats().await?,
            activity: self.community.activity(None, ACTIVITY_LIMIT, policy).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_utils::{create_test_storage, sample_stack};
    use crate::types::{CategoryId, DiscoverSort, UserId};

    async fn seeded() -> (DiscoverService, Arc<crate::storage::libsql::LibsqlStorage>, tempfile::TempDir) {
        let (storage, dir) = create_test_storage().await.unwrap();
        (DiscoverService::new(storage.clone()), storage, dir)
    }

    #[tokio::test]
    async fn test_landing_sections() {
        let (discover, storage, _dir) = seeded().await;
        let owner = UserId::new();
        for i in 0..5 {
            let mut stack = sample_stack(owner, &format!("Stack {}", i), true);
            stack.views = i;
            storage.insert_stack(&stack).await.unwrap();
        }
        storage
            .insert_stack(&sample_stack(owner, "Private", false))
            .await
            .unwrap();

        let landing = discover.landing().await.unwrap();
        assert_eq!(landing.categories.len(), 6);
        assert_eq!(landing.newest.len(), LANDING_SECTION_SIZE);
        assert_eq!(landing.trending.len(), LANDING_SECTION_SIZE);
        assert_eq!(landing.trending[0].stack.name, "Stack 4");
        assert!(landing
            .newest
            .iter()
            .chain(landing.trending.iter())
            .all(|c| c.stack.is_public));
    }

    #[tokio::test]
    async fn test_discover_filters() {
        let (discover, storage, _dir) = seeded().await;
        let owner = UserId::new();

        let mut sleep = sample_stack(owner, "Deep Sleep Protocol", true);
        sleep.likes = 1;
        let mut focus = sample_stack(owner, "Morning Focus", true);
        focus.description = Some("Caffeine plus L-theanine for SLEEPless nights".to_string());
        focus.likes = 9;
        let hidden = sample_stack(owner, "Secret sleep", false);
        for s in [&sleep, &focus, &hidden] {
            storage.insert_stack(s).await.unwrap();
        }

        let categories = discover.categories().await.unwrap();
        let sleep_category = categories
            .iter()
            .find(|c| c.slug == "sleep-optimization")
            .unwrap();
        storage
            .set_stack_categories(sleep.id, &[sleep_category.id])
            .await
            .unwrap();

        let page = discover
            .discover(
                DiscoverQuery {
                    q: Some("  sleep ".to_string()),
                    category: None,
                    sort: DiscoverSort::Popular,
                },
                RetryPolicy::immediate(0),
            )
            .await
            .unwrap();
        let names: Vec<_> = page.stacks.iter().map(|c| c.stack.name.as_str()).collect();
        assert_eq!(names, vec!["Morning Focus", "Deep Sleep Protocol"]);
        assert_eq!(page.stats.stacks, 2);

        let page = discover
            .discover(
                DiscoverQuery {
                    q: None,
                    category: Some("sleep-optimization".to_string()),
                    sort: DiscoverSort::Recent,
                },
                RetryPolicy::immediate(0),
            )
            .await
            .unwrap();
        assert_eq!(page.stacks.len(), 1);
        assert_eq!(page.stacks[0].stack.id, sleep.id);
        assert_eq!(page.stacks[0].categories[0].id, sleep_category.id);

        let none: Vec<CategoryId> = Vec::new();
        storage.set_stack_categories(sleep.id, &none).await.unwrap();
        let page = discover
            .discover(
                DiscoverQuery {
                    category: Some("sleep-optimization".to_string()),
                    ..DiscoverQuery::default()
                },
                RetryPolicy::immediate(0),
            )
            .await
            .unwrap();
        assert!(page.stacks.is_empty());
    }
}
