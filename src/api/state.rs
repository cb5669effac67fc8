//! Shared state handed to every handler

use crate::api::cache::PageCache;
use crate::auth::SessionSigner;
use crate::config::StackShareConfig;
use crate::services::{CommunityService, DiscoverService, JournalService, StackService};
use crate::storage::objects::ObjectStore;
use crate::storage::StorageBackend;
use crate::utils::retry::RetryPolicy;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageBackend>,
    /// Unset when image uploads are disabled
    pub objects: Option<Arc<dyn ObjectStore>>,
    pub signer: SessionSigner,
    pub cache: Arc<PageCache>,
    pub config: Arc<StackShareConfig>,
    /// Backoff for the activity feed and stack analytics
    pub retry: RetryPolicy,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        objects: Option<Arc<dyn ObjectStore>>,
        config: StackShareConfig,
    ) -> Self {
        Self {
            storage,
            objects,
            signer: SessionSigner::new(&config.auth.session_secret),
            cache: Arc::new(PageCache::new(config.cache.capacity)),
            config: Arc::new(config),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn stacks(&self) -> StackService {
        StackService::new(self.storage.clone(), self.objects.clone())
    }

    pub fn journal(&self) -> JournalService {
        JournalService::new(self.storage.clone())
    }

    pub fn community(&self) -> CommunityService {
        CommunityService::new(self.storage.clone())
    }

    pub fn discover(&self) -> DiscoverService {
        DiscoverService::new(self.storage.clone())
    }
}
