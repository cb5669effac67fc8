//! Stack authoring: creation, edits, items, forks, likes and tracking

use crate::auth::CurrentUser;
use crate::error::{Result, StackShareError};
use crate::insights::{organize_stacks, stack_analytics, AnalyticsRange, CategoryGroup, DailyStats};
use crate::storage::objects::ObjectStore;
use crate::storage::StorageBackend;
use crate::types::{
    ActiveStack, ForkOrigin, ItemFields, ItemId, NewStack, ProfileSummary, Stack, StackCard,
    StackDetail, StackId, StackItem, StackUpdate, UserId, UserProfile,
};
use crate::utils::retry::{retry_with_backoff, RetryPolicy};
use crate::utils::string::{blank_to_none, file_extension};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Attempts at finding a free username before giving up
const USERNAME_ATTEMPTS: usize = 3;

/// Image attached to a new item
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

fn random_suffix(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// Username derived from the e-mail local part, else `user_<5 random chars>`
pub fn default_username(email: Option<&str>) -> String {
    email
        .and_then(|e| e.split('@').next())
        .map(str::trim)
        .filter(|local| !local.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("user_{}", random_suffix(5)))
}

/// A stack may be read by its owner, or by anyone when public
pub fn can_view(stack: &Stack, viewer: Option<UserId>) -> bool {
    stack.is_public || viewer == Some(stack.user_id)
}

pub struct StackService {
    storage: Arc<dyn StorageBackend>,
    objects: Option<Arc<dyn ObjectStore>>,
}

impl StackService {
    pub fn new(storage: Arc<dyn StorageBackend>, objects: Option<Arc<dyn ObjectStore>>) -> Self {
        Self { storage, objects }
    }

    /// Create the user's profile on first write
    pub async fn ensure_profile(&self, user: &CurrentUser) -> Result<UserProfile> {
        if let Some(profile) = self.storage.get_profile(user.id).await? {
            return Ok(profile);
        }

        let base = default_username(user.email.as_deref());
        let mut username = base.clone();

        for attempt in 0..USERNAME_ATTEMPTS {
            let now = Utc::now();
            let profile = UserProfile {
                id: user.id,
                username: username.clone(),
                full_name: Some(username.clone()),
                avatar_url: None,
                bio: None,
                created_at: now,
                updated_at: now,
            };

            match self.storage.create_profile(&profile).await {
                Ok(()) => {
                    info!("Created profile '{}' for user {}", username, user.id);
                    return Ok(profile);
                }
                Err(StackShareError::Conflict(_)) => {
                    // a concurrent request may have created it first
                    if let Some(existing) = self.storage.get_profile(user.id).await? {
                        return Ok(existing);
                    }
                    debug!("Username '{}' taken (attempt {})", username, attempt + 1);
                    username = format!("{}_{}", base, random_suffix(4));
                }
                Err(e) => return Err(e),
            }
        }

        Err(StackShareError::Conflict(format!(
            "Could not find a free username for '{}'",
            base
        )))
    }

    /// Load a stack that must belong to `user`
    ///
    /// `NotFound` when it does not exist, `Unauthorized` when someone else owns it.
    pub async fn owned_stack(&self, user: UserId, id: StackId) -> Result<Stack> {
        let stack = self
            .storage
            .get_stack(id)
            .await?
            .ok_or_else(|| StackShareError::NotFound(format!("Stack {}", id)))?;
        if stack.user_id != user {
            return Err(StackShareError::Unauthorized(
                "Only the owner can change this stack".to_string(),
            ));
        }
        Ok(stack)
    }

    /// Load a stack the viewer may see (`NotFound` otherwise)
    pub async fn visible_stack(&self, id: StackId, viewer: Option<UserId>) -> Result<Stack> {
        match self.storage.get_stack(id).await? {
            Some(stack) if can_view(&stack, viewer) => Ok(stack),
            _ => Err(StackShareError::NotFound(format!("Stack {}", id))),
        }
    }

    pub async fn create_stack(&self, user: &CurrentUser, input: NewStack) -> Result<Stack> {
        let name = input.name.trim();
        if name.is_empty() {
            return Err(StackShareError::Validation("Name is required".to_string()));
        }

        self.ensure_profile(user).await?;

        let now = Utc::now();
        let stack = Stack {
            id: StackId::new(),
            user_id: user.id,
            name: name.to_string(),
            description: blank_to_none(input.description),
            purpose: blank_to_none(input.purpose),
            is_public: input.is_public,
            views: 0,
            likes: 0,
            original_stack_id: None,
            original_author: None,
            created_at: now,
            updated_at: now,
        };
        self.storage.insert_stack(&stack).await?;

        info!("Created stack {} for user {}", stack.id, user.id);
        Ok(stack)
    }

    /// Stack page; bumps the view counter unless the owner is looking
    pub async fn detail(&self, id: StackId, viewer: Option<UserId>) -> Result<StackDetail> {
        let mut stack = self.visible_stack(id, viewer).await?;
        let is_owner = viewer == Some(stack.user_id);

        if !is_owner {
            self.storage.increment_views(id).await?;
            stack.views += 1;
        }

        let owner = self
            .storage
            .get_profile(stack.user_id)
            .await?
            .map(|p| ProfileSummary {
                full_name: p.full_name,
                avatar_url: p.avatar_url,
            });
        let items = self.storage.list_items(id).await?;
        let categories = self.storage.stack_categories(id).await?;
        let (post_count, fork_count) = self.storage.stack_counts(id).await?;

        let forked_from = match stack.original_stack_id {
            Some(origin) => self.storage.get_stack(origin).await?.map(|s| ForkOrigin {
                id: s.id,
                name: s.name,
                author: stack.original_author.clone(),
            }),
            None => None,
        };

        let (liked, saved) = match viewer {
            Some(v) => (
                self.storage.has_liked_stack(id, v).await?,
                self.storage.has_saved_stack(id, v).await?,
            ),
            None => (false, false),
        };

        Ok(StackDetail {
            stack,
            owner,
            items,
            categories,
            forked_from,
            post_count,
            fork_count,
            is_owner,
            liked,
            saved,
        })
    }

    pub async fn update_stack(&self, user: UserId, id: StackId, update: StackUpdate) -> Result<Stack> {
        self.owned_stack(user, id).await?;

        let name = update.name.trim().to_string();
        if name.is_empty() {
            return Err(StackShareError::Validation("Name is required".to_string()));
        }
        let update = StackUpdate {
            name,
            description: blank_to_none(update.description),
            purpose: blank_to_none(update.purpose),
            is_public: update.is_public,
        };

        self.storage.update_stack(id, &update, Utc::now()).await?;
        self.owned_stack(user, id).await
    }

    /// Delete a stack, then its item images (failures there are only logged)
    pub async fn delete_stack(&self, user: UserId, id: StackId) -> Result<()> {
        self.owned_stack(user, id).await?;
        let items = self.storage.list_items(id).await?;

        self.storage.delete_stack(id).await?;
        info!("Deleted stack {}", id);

        if let Some(objects) = &self.objects {
            let paths: Vec<String> = items
                .iter()
                .filter_map(|i| i.image_url.as_deref())
                .filter_map(|url| objects.path_from_url(url))
                .collect();
            if let Err(e) = objects.remove(&paths).await {
                warn!("Stack {} deleted but images were left behind: {}", id, e);
            }
        }

        Ok(())
    }

    fn validated_fields(fields: ItemFields) -> Result<ItemFields> {
        let name = fields.name.trim().to_string();
        if name.is_empty() {
            return Err(StackShareError::Validation("Name is required".to_string()));
        }
        Ok(ItemFields {
            item_type: fields.item_type,
            name,
            description: blank_to_none(fields.description),
            dosage: blank_to_none(fields.dosage),
            frequency: blank_to_none(fields.frequency),
            timing: blank_to_none(fields.timing),
        })
    }

    /// Add an item, uploading its image to `{user}/{stack}/{random}.{ext}`
    pub async fn add_item(
        &self,
        user: UserId,
        stack_id: StackId,
        fields: ItemFields,
        image: Option<ImageUpload>,
    ) -> Result<StackItem> {
        self.owned_stack(user, stack_id).await?;
        let fields = Self::validated_fields(fields)?;

        let uploaded = match image.filter(|i| !i.bytes.is_empty()) {
            Some(image) => {
                let objects = self.objects.as_ref().ok_or_else(|| {
                    StackShareError::Validation("Image uploads are not configured".to_string())
                })?;
                let ext = file_extension(&image.file_name).ok_or_else(|| {
                    StackShareError::Validation(format!(
                        "Image file name has no extension: {}",
                        image.file_name
                    ))
                })?;
                let path = format!("{}/{}/{}.{}", user, stack_id, random_suffix(16), ext);
                let url = objects
                    .upload(&path, image.bytes, image.content_type.as_deref())
                    .await?;
                Some((path, url))
            }
            None => None,
        };
        let (image_path, image_url) = match uploaded {
            Some((path, url)) => (Some(path), Some(url)),
            None => (None, None),
        };

        let item = StackItem {
            id: ItemId::new(),
            stack_id,
            item_type: fields.item_type,
            name: fields.name,
            description: fields.description,
            dosage: fields.dosage,
            frequency: fields.frequency,
            timing: fields.timing,
            image_url,
            created_at: Utc::now(),
        };
        if let Err(e) = self.storage.insert_item(&item).await {
            if let (Some(path), Some(objects)) = (image_path, self.objects.as_ref()) {
                if let Err(remove_err) = objects.remove(&[path]).await {
                    warn!("Failed to remove orphaned image for stack {}: {}", stack_id, remove_err);
                }
            }
            return Err(e);
        }

        debug!("Added item {} to stack {}", item.id, stack_id);
        Ok(item)
    }

    async fn owned_item(&self, user: UserId, stack_id: StackId, item_id: ItemId) -> Result<StackItem> {
        self.owned_stack(user, stack_id).await?;
        match self.storage.get_item(item_id).await? {
            Some(item) if item.stack_id == stack_id => Ok(item),
            _ => Err(StackShareError::NotFound(format!("Item {}", item_id))),
        }
    }

    pub async fn update_item(
        &self,
        user: UserId,
        stack_id: StackId,
        item_id: ItemId,
        fields: ItemFields,
    ) -> Result<StackItem> {
        self.owned_item(user, stack_id, item_id).await?;
        let fields = Self::validated_fields(fields)?;
        self.storage.update_item(item_id, &fields).await?;
        self.owned_item(user, stack_id, item_id).await
    }

    /// Remove the item's image, then the item
    pub async fn delete_item(&self, user: UserId, stack_id: StackId, item_id: ItemId) -> Result<()> {
        let item = self.owned_item(user, stack_id, item_id).await?;

        if let (Some(url), Some(objects)) = (item.image_url.as_deref(), &self.objects) {
            if let Some(path) = objects.path_from_url(url) {
                objects.remove(&[path]).await?;
            }
        }

        self.storage.delete_item(item_id).await?;
        debug!("Deleted item {} from stack {}", item_id, stack_id);
        Ok(())
    }

    /// Copy a visible stack with its items and categories into a private stack
    pub async fn fork_stack(&self, user: &CurrentUser, source_id: StackId) -> Result<Stack> {
        let source = self.visible_stack(source_id, Some(user.id)).await?;
        self.ensure_profile(user).await?;

        let original_author = self
            .storage
            .get_profile(source.user_id)
            .await?
            .map(|p| p.full_name.unwrap_or(p.username));

        let now = Utc::now();
        let fork = Stack {
            id: StackId::new(),
            user_id: user.id,
            name: source.name.clone(),
            description: source.description.clone(),
            purpose: source.purpose.clone(),
            is_public: false,
            views: 0,
            likes: 0,
            original_stack_id: Some(source.id),
            original_author,
            created_at: now,
            updated_at: now,
        };
        self.storage.fork_stack(source.id, &fork).await?;

        Ok(fork)
    }

    /// Flip the viewer's like on a visible stack
    pub async fn toggle_like(&self, user: UserId, id: StackId) -> Result<bool> {
        self.visible_stack(id, Some(user)).await?;
        self.storage.toggle_stack_like(id, user).await
    }

    /// Flip the viewer's bookmark on a visible stack
    pub async fn toggle_save(&self, user: UserId, id: StackId) -> Result<bool> {
        self.visible_stack(id, Some(user)).await?;
        self.storage.toggle_stack_save(id, user).await
    }

    pub async fn saved(&self, user: UserId) -> Result<Vec<StackCard>> {
        self.storage.saved_stacks(user).await
    }

    /// Track a visible stack, replacing the previous one
    pub async fn activate(&self, user: UserId, id: StackId) -> Result<ActiveStack> {
        self.visible_stack(id, Some(user)).await?;
        let active = self.storage.set_active_stack(user, id, Utc::now()).await?;
        info!("User {} now tracking stack {}", user, id);
        Ok(active)
    }

    pub async fn active_stack(&self, user: UserId) -> Result<Option<ActiveStack>> {
        self.storage.get_active_stack(user).await
    }

    pub async fn untrack(&self, user: UserId) -> Result<bool> {
        self.storage.clear_active_stack(user).await
    }

    /// The user's stacks grouped by primary category
    pub async fn organized(&self, user: UserId, now: DateTime<Utc>) -> Result<Vec<CategoryGroup>> {
        let stacks = self.storage.list_user_stacks(user).await?;
        Ok(organize_stacks(stacks, now))
    }

    /// Daily usage of a visible stack over `range`, retried on failure
    pub async fn analytics(
        &self,
        id: StackId,
        viewer: Option<UserId>,
        range: AnalyticsRange,
        today: NaiveDate,
        policy: RetryPolicy,
    ) -> Result<Vec<DailyStats>> {
        self.visible_stack(id, viewer).await?;

        let since = (today - Duration::days(range.days()))
            .and_hms_opt(0, 0, 0)
            .map(|t| Utc.from_utc_datetime(&t))
            .ok_or_else(|| StackShareError::Validation("Invalid analytics range".to_string()))?;

        let storage = self.storage.clone();
        let (samples, items) = retry_with_backoff(policy, "stack analytics", || {
            let storage = storage.clone();
            async move {
                let samples = storage.stack_log_samples(id, since).await?;
                let items = storage.list_items(id).await?;
                Ok((samples, items))
            }
        })
        .await?;

        Ok(stack_analytics(&samples, items.len(), range, today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::objects::MemoryObjectStore;
    use crate::storage::test_utils::create_test_storage;
    use crate::types::ItemType;

    fn user(email: &str) -> CurrentUser {
        CurrentUser {
            id: UserId::new(),
            email: Some(email.to_string()),
        }
    }

    fn fields(name: &str) -> ItemFields {
        ItemFields {
            item_type: ItemType::Supplement,
            name: name.to_string(),
            description: None,
            dosage: Some("400mg".to_string()),
            frequency: None,
            timing: None,
        }
    }

    #[test]
    fn test_default_username() {
        assert_eq!(default_username(Some("ada@example.com")), "ada");
        let generated = default_username(None);
        assert!(generated.starts_with("user_"));
        assert_eq!(generated.len(), 10);
        assert!(default_username(Some("@example.com")).starts_with("user_"));
    }

    #[tokio::test]
    async fn test_create_requires_name_and_makes_profile() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let service = StackService::new(storage.clone(), None);
        let ada = user("ada@example.com");

        let err = service.create_stack(&ada, NewStack::default()).await.unwrap_err();
        assert!(matches!(err, StackShareError::Validation(_)));

        let stack = service
            .create_stack(
                &ada,
                NewStack {
                    name: "  Sleep  ".to_string(),
                    ..NewStack::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(stack.name, "Sleep");
        assert!(!stack.is_public);

        let profile = storage.get_profile(ada.id).await.unwrap().unwrap();
        assert_eq!(profile.username, "ada");
    }

    #[tokio::test]
    async fn test_duplicate_username_gets_suffix() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let service = StackService::new(storage.clone(), None);

        let first = service.ensure_profile(&user("sam@a.com")).await.unwrap();
        let second = service.ensure_profile(&user("sam@b.com")).await.unwrap();
        assert_eq!(first.username, "sam");
        assert!(second.username.starts_with("sam_"));
    }

    #[tokio::test]
    async fn test_owner_checks() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let service = StackService::new(storage, None);
        let owner = user("owner@example.com");
        let other = user("other@example.com");

        let stack = service
            .create_stack(
                &owner,
                NewStack {
                    name: "Focus".to_string(),
                    ..NewStack::default()
                },
            )
            .await
            .unwrap();

        let err = service.delete_stack(other.id, stack.id).await.unwrap_err();
        assert!(matches!(err, StackShareError::Unauthorized(_)));

        let err = service.delete_stack(owner.id, StackId::new()).await.unwrap_err();
        assert!(matches!(err, StackShareError::NotFound(_)));

        // private stacks are invisible to others
        let err = service.detail(stack.id, Some(other.id)).await.unwrap_err();
        assert!(matches!(err, StackShareError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_views_counted_for_visitors_only() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let service = StackService::new(storage, None);
        let owner = user("owner@example.com");
        let visitor = user("visitor@example.com");

        let stack = service
            .create_stack(
                &owner,
                NewStack {
                    name: "Public".to_string(),
                    is_public: true,
                    ..NewStack::default()
                },
            )
            .await
            .unwrap();

        let seen = service.detail(stack.id, Some(owner.id)).await.unwrap();
        assert_eq!(seen.stack.views, 0);
        assert!(seen.is_owner);

        let seen = service.detail(stack.id, Some(visitor.id)).await.unwrap();
        assert_eq!(seen.stack.views, 1);
        let seen = service.detail(stack.id, None).await.unwrap();
        assert_eq!(seen.stack.views, 2);
    }

    #[tokio::test]
    async fn test_item_image_lifecycle() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let objects = Arc::new(MemoryObjectStore::new());
        let service = StackService::new(storage, Some(objects.clone()));
        let owner = user("owner@example.com");

        let stack = service
            .create_stack(
                &owner,
                NewStack {
                    name: "Gut".to_string(),
                    ..NewStack::default()
                },
            )
            .await
            .unwrap();

        let item = service
            .add_item(
                owner.id,
                stack.id,
                fields("Kefir"),
                Some(ImageUpload {
                    file_name: "kefir.PNG".to_string(),
                    content_type: Some("image/png".to_string()),
                    bytes: vec![0x89, 0x50],
                }),
            )
            .await
            .unwrap();

        let url = item.image_url.clone().unwrap();
        let prefix = format!("memory://objects/{}/{}/", owner.id, stack.id);
        assert!(url.starts_with(&prefix));
        assert!(url.ends_with(".png"));
        assert_eq!(objects.len().await, 1);

        service.delete_item(owner.id, stack.id, item.id).await.unwrap();
        assert!(objects.is_empty().await);
    }

    /// Deletes the target stack while the image is in flight
    struct RacingStore {
        inner: MemoryObjectStore,
        storage: Arc<dyn StorageBackend>,
        stack: StackId,
    }

    #[async_trait::async_trait]
    impl ObjectStore for RacingStore {
        async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: Option<&str>) -> Result<String> {
            self.storage.delete_stack(self.stack).await?;
            self.inner.upload(path, bytes, content_type).await
        }

        async fn remove(&self, paths: &[String]) -> Result<()> {
            self.inner.remove(paths).await
        }

        fn path_from_url(&self, url: &str) -> Option<String> {
            self.inner.path_from_url(url)
        }
    }

    #[tokio::test]
    async fn test_failed_insert_removes_uploaded_image() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let owner = user("owner@example.com");
        let stack = StackService::new(storage.clone(), None)
            .create_stack(
                &owner,
                NewStack {
                    name: "Gut".to_string(),
                    ..NewStack::default()
                },
            )
            .await
            .unwrap();

        let objects = Arc::new(RacingStore {
            inner: MemoryObjectStore::new(),
            storage: storage.clone(),
            stack: stack.id,
        });
        let service = StackService::new(storage, Some(objects.clone()));

        let result = service
            .add_item(
                owner.id,
                stack.id,
                fields("Kefir"),
                Some(ImageUpload {
                    file_name: "kefir.png".to_string(),
                    content_type: Some("image/png".to_string()),
                    bytes: vec![0x89, 0x50],
                }),
            )
            .await;

        assert!(result.is_err());
        assert!(objects.inner.is_empty().await);
    }

    #[tokio::test]
    async fn test_upload_without_store_is_rejected() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let service = StackService::new(storage, None);
        let owner = user("owner@example.com");
        let stack = service
            .create_stack(
                &owner,
                NewStack {
                    name: "Gut".to_string(),
                    ..NewStack::default()
                },
            )
            .await
            .unwrap();

        let err = service
            .add_item(
                owner.id,
                stack.id,
                fields("Kefir"),
                Some(ImageUpload {
                    file_name: "kefir.png".to_string(),
                    content_type: None,
                    bytes: vec![1],
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StackShareError::Validation(_)));
    }

    #[tokio::test]
    async fn test_fork_copies_items_and_lineage() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let service = StackService::new(storage.clone(), None);
        let author = user("author@example.com");
        let forker = user("forker@example.com");

        let source = service
            .create_stack(
                &author,
                NewStack {
                    name: "Morning".to_string(),
                    is_public: true,
                    ..NewStack::default()
                },
            )
            .await
            .unwrap();
        service
            .add_item(author.id, source.id, fields("Creatine"), None)
            .await
            .unwrap();

        let fork = service.fork_stack(&forker, source.id).await.unwrap();
        assert_eq!(fork.user_id, forker.id);
        assert_eq!(fork.original_stack_id, Some(source.id));
        assert_eq!(fork.original_author.as_deref(), Some("author"));
        assert!(!fork.is_public);

        let items = storage.list_items(fork.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "Creatine");

        let detail = service.detail(source.id, None).await.unwrap();
        assert_eq!(detail.fork_count, 1);
    }

    #[tokio::test]
    async fn test_like_toggles_counter() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let service = StackService::new(storage, None);
        let owner = user("owner@example.com");
        let fan = user("fan@example.com");

        let stack = service
            .create_stack(
                &owner,
                NewStack {
                    name: "Recovery".to_string(),
                    is_public: true,
                    ..NewStack::default()
                },
            )
            .await
            .unwrap();

        assert!(service.toggle_like(fan.id, stack.id).await.unwrap());
        let detail = service.detail(stack.id, Some(fan.id)).await.unwrap();
        assert_eq!(detail.stack.likes, 1);
        assert!(detail.liked);

        assert!(!service.toggle_like(fan.id, stack.id).await.unwrap());
        let detail = service.detail(stack.id, Some(owner.id)).await.unwrap();
        assert_eq!(detail.stack.likes, 0);
    }

    #[tokio::test]
    async fn test_save_toggles_bookmark() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let service = StackService::new(storage, None);
        let owner = user("owner@example.com");
        let reader = user("reader@example.com");

        let public = service
            .create_stack(
                &owner,
                NewStack {
                    name: "Focus".to_string(),
                    is_public: true,
                    ..NewStack::default()
                },
            )
            .await
            .unwrap();
        let private = service
            .create_stack(
                &owner,
                NewStack {
                    name: "Hidden".to_string(),
                    ..NewStack::default()
                },
            )
            .await
            .unwrap();

        assert!(service.toggle_save(reader.id, public.id).await.unwrap());
        let detail = service.detail(public.id, Some(reader.id)).await.unwrap();
        assert!(detail.saved);
        assert!(!detail.liked);
        assert_eq!(detail.stack.likes, 0);

        let saved = service.saved(reader.id).await.unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].stack.id, public.id);

        let err = service.toggle_save(reader.id, private.id).await.unwrap_err();
        assert!(matches!(err, StackShareError::NotFound(_)));

        assert!(!service.toggle_save(reader.id, public.id).await.unwrap());
        assert!(service.saved(reader.id).await.unwrap().is_empty());
        assert!(!service.detail(public.id, Some(reader.id)).await.unwrap().saved);
    }

    #[tokio::test]
    async fn test_activate_replaces_previous() {
        let (storage, _dir) = create_test_storage().await.unwrap();
        let service = StackService::new(storage, None);
        let owner = user("owner@example.com");

        let mut ids = Vec::new();
        for name in ["A", "B"] {
            let stack = service
                .create_stack(
                    &owner,
                    NewStack {
                        name: name.to_string(),
                        ..NewStack::default()
                    },
                )
                .await
                .unwrap();
            ids.push(stack.id);
        }

        service.activate(owner.id, ids[0]).await.unwrap();
        service.activate(owner.id, ids[1]).await.unwrap();
        let active = service.active_stack(owner.id).await.unwrap().unwrap();
        assert_eq!(active.stack_id, ids[1]);

        assert!(service.untrack(owner.id).await.unwrap());
        assert!(service.active_stack(owner.id).await.unwrap().is_none());
    }
}
