//! Per-user page cache for the heavier dashboard reads

use crate::types::UserId;
use chrono::NaiveDate;
use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::RwLock;
use tracing::debug;

/// Paths whose rendered bodies are cached
pub const CACHED_PATHS: &[&str] = &["/dashboard", "/dashboard/logs"];

/// Day-dependent pages (streaks, calendar) are keyed by the day they were
/// computed so an entry never outlives its date.
type CacheKey = (UserId, String, NaiveDate);

/// LRU of rendered JSON keyed by (user, path, day)
pub struct PageCache {
    cache: RwLock<LruCache<CacheKey, Value>>,
}

impl PageCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(capacity)),
        }
    }

    pub fn get(&self, user: UserId, path: &str, day: NaiveDate) -> Option<Value> {
        let mut cache = self.cache.write().ok()?;
        cache.get(&(user, path.to_string(), day)).cloned()
    }

    pub fn put(&self, user: UserId, path: &str, day: NaiveDate, value: Value) {
        if let Ok(mut cache) = self.cache.write() {
            cache.put((user, path.to_string(), day), value);
        }
    }

    /// Drop every user's entry for `path`
    pub fn revalidate(&self, path: &str) {
        if let Ok(mut cache) = self.cache.write() {
            let stale: Vec<CacheKey> = cache
                .iter()
                .filter(|((_, p, _), _)| p == path)
                .map(|(k, _)| k.clone())
                .collect();
            for key in &stale {
                cache.pop(key);
            }
            debug!("Revalidated {} ({} entries)", path, stale.len());
        }
    }

    /// Revalidate everything a log mutation touches
    pub fn revalidate_logs(&self) {
        for path in CACHED_PATHS {
            self.revalidate(path);
        }
    }

    /// The dashboard lists the user's stacks with their items and counters
    pub fn revalidate_stacks(&self) {
        self.revalidate("/dashboard");
    }

    pub fn len(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    #[test]
    fn test_revalidate_drops_path_for_all_users() {
        let cache = PageCache::new(8);
        let (a, b) = (UserId::new(), UserId::new());
        cache.put(a, "/dashboard", day(), json!({"user": "a"}));
        cache.put(b, "/dashboard", day(), json!({"user": "b"}));
        cache.put(a, "/dashboard/logs", day(), json!([]));

        assert_eq!(cache.get(a, "/dashboard", day()), Some(json!({"user": "a"})));

        cache.revalidate("/dashboard");
        assert!(cache.get(a, "/dashboard", day()).is_none());
        assert!(cache.get(b, "/dashboard", day()).is_none());
        assert_eq!(cache.len(), 1);

        cache.revalidate_logs();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_capacity_evicts_least_recent() {
        let cache = PageCache::new(1);
        let (a, b) = (UserId::new(), UserId::new());
        cache.put(a, "/dashboard", day(), json!(1));
        cache.put(b, "/dashboard", day(), json!(2));
        assert!(cache.get(a, "/dashboard", day()).is_none());
        assert_eq!(cache.get(b, "/dashboard", day()), Some(json!(2)));
    }

    #[test]
    fn test_entries_expire_with_the_day() {
        let cache = PageCache::new(8);
        let user = UserId::new();
        cache.put(user, "/dashboard", day(), json!({"current": 3}));

        let tomorrow = day().succ_opt().unwrap();
        assert!(cache.get(user, "/dashboard", tomorrow).is_none());
        assert!(cache.get(user, "/dashboard", day()).is_some());
    }

    #[test]
    fn test_revalidate_stacks_keeps_logs_page() {
        let cache = PageCache::new(8);
        let user = UserId::new();
        cache.put(user, "/dashboard", day(), json!({}));
        cache.put(user, "/dashboard/logs", day(), json!([]));

        cache.revalidate_stacks();
        assert!(cache.get(user, "/dashboard", day()).is_none());
        assert_eq!(cache.get(user, "/dashboard/logs", day()), Some(json!([])));
    }

    #[test]
    fn test_zero_capacity_still_usable() {
        let cache = PageCache::new(0);
        cache.put(UserId::new(), "/dashboard", day(), json!(true));
        assert_eq!(cache.len(), 1);
    }
}
