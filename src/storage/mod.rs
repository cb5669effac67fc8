//! Storage layer for StackShare
//!
//! `StorageBackend` is the seam between services and the database; the
//! libSQL implementation lives in [`libsql`]. Uploaded item images go through
//! the separate [`objects::ObjectStore`] seam.

pub mod libsql;
pub mod objects;

#[cfg(test)]
pub(crate) mod test_utils;

use crate::error::Result;
use crate::types::{
    ActiveStack, Category, CategoryId, CommunityStats, DailyLog, DiscoverQuery, ItemFields,
    ItemId, LogId, Post, PostId, PostReply, PostThread, ReplyId, Stack, StackCard, StackId,
    StackItem, StackLogSample, StackUpdate, StackWithRelations, UserId, UserProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Log row as read for the community feed, before display defaults apply
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRow {
    pub log_id: LogId,
    pub created_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub author: Option<String>,
    pub stack_name: Option<String>,
}

/// Fully resolved log write (date already defaulted, ratings validated)
#[derive(Debug, Clone, PartialEq)]
pub struct LogUpsert {
    pub user_id: UserId,
    pub stack_id: Option<StackId>,
    pub date: NaiveDate,
    pub ratings: crate::types::Ratings,
    pub notes: Option<String>,
    pub side_effects: Option<String>,
    pub items_taken: Vec<ItemId>,
}

/// Storage backend trait defining all required operations
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // Profiles

    async fn get_profile(&self, user: UserId) -> Result<Option<UserProfile>>;

    /// Insert a profile; `Conflict` when the username is taken
    async fn create_profile(&self, profile: &UserProfile) -> Result<()>;

    // Categories

    /// Whole taxonomy, ordered by name
    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Replace the category tags of a stack
    async fn set_stack_categories(&self, stack: StackId, categories: &[CategoryId]) -> Result<()>;

    async fn stack_categories(&self, stack: StackId) -> Result<Vec<Category>>;

    // Stacks

    async fn insert_stack(&self, stack: &Stack) -> Result<()>;

    async fn get_stack(&self, id: StackId) -> Result<Option<Stack>>;

    async fn update_stack(&self, id: StackId, update: &StackUpdate, at: DateTime<Utc>) -> Result<()>;

    /// Delete a stack; dependent rows go with it
    async fn delete_stack(&self, id: StackId) -> Result<()>;

    /// A user's stacks with items, categories and log times, newest first
    async fn list_user_stacks(&self, user: UserId) -> Result<Vec<StackWithRelations>>;

    async fn increment_views(&self, id: StackId) -> Result<()>;

    /// (post count, fork count)
    async fn stack_counts(&self, id: StackId) -> Result<(i64, i64)>;

    /// Public stacks matching the discovery filters
    async fn discover_stacks(&self, query: &DiscoverQuery, limit: usize) -> Result<Vec<StackCard>>;

    /// Most recently created public stacks
    async fn newest_public_stacks(&self, limit: usize) -> Result<Vec<StackCard>>;

    /// Most viewed public stacks
    async fn trending_stacks(&self, limit: usize) -> Result<Vec<StackCard>>;

    /// Insert `fork` and copy the items and categories of `source` into it
    async fn fork_stack(&self, source: StackId, fork: &Stack) -> Result<()>;

    /// Flip the viewer's like; returns whether the stack is now liked
    async fn toggle_stack_like(&self, stack: StackId, user: UserId) -> Result<bool>;

    async fn has_liked_stack(&self, stack: StackId, user: UserId) -> Result<bool>;

    /// Flip the viewer's bookmark; returns whether the stack is now saved
    async fn toggle_stack_save(&self, stack: StackId, user: UserId) -> Result<bool>;

    async fn has_saved_stack(&self, stack: StackId, user: UserId) -> Result<bool>;

    /// Public stacks the user bookmarked, most recently saved first
    async fn saved_stacks(&self, user: UserId) -> Result<Vec<StackCard>>;

    // Items

    async fn insert_item(&self, item: &StackItem) -> Result<()>;

    async fn get_item(&self, id: ItemId) -> Result<Option<StackItem>>;

    async fn update_item(&self, id: ItemId, fields: &ItemFields) -> Result<()>;

    async fn delete_item(&self, id: ItemId) -> Result<()>;

    /// Items of a stack in creation order
    async fn list_items(&self, stack: StackId) -> Result<Vec<StackItem>>;

    // Daily logs

    /// Update the row keyed by (user, date, stack) or insert a new one
    async fn upsert_log(&self, log: &LogUpsert, at: DateTime<Utc>) -> Result<DailyLog>;

    async fn get_log(&self, id: LogId) -> Result<Option<DailyLog>>;

    async fn delete_log(&self, id: LogId) -> Result<()>;

    /// A user's logs, newest date first
    async fn list_user_logs(&self, user: UserId) -> Result<Vec<DailyLog>>;

    async fn logs_on_date(&self, user: UserId, date: NaiveDate) -> Result<Vec<DailyLog>>;

    /// Logs recorded against a stack since `since`
    async fn stack_log_samples(&self, stack: StackId, since: DateTime<Utc>) -> Result<Vec<StackLogSample>>;

    /// Latest logs on public stacks, optionally limited to one stack
    async fn recent_activity(&self, stack: Option<StackId>, limit: usize) -> Result<Vec<ActivityRow>>;

    async fn community_stats(&self) -> Result<CommunityStats>;

    // Active stack

    async fn get_active_stack(&self, user: UserId) -> Result<Option<ActiveStack>>;

    /// Replace whatever stack the user tracked before
    async fn set_active_stack(&self, user: UserId, stack: StackId, at: DateTime<Utc>) -> Result<ActiveStack>;

    /// Returns whether a mark was removed
    async fn clear_active_stack(&self, user: UserId) -> Result<bool>;

    // Posts and replies

    /// Insert a post; `Conflict` on a second rated review the same day
    async fn insert_post(&self, post: &Post) -> Result<()>;

    async fn get_post(&self, id: PostId) -> Result<Option<Post>>;

    async fn delete_post(&self, id: PostId) -> Result<()>;

    async fn has_review_on(&self, stack: StackId, user: UserId, date: NaiveDate) -> Result<bool>;

    /// Posts of a stack (newest first) with replies (oldest first)
    async fn list_post_threads(&self, stack: StackId, viewer: Option<UserId>) -> Result<Vec<PostThread>>;

    async fn insert_reply(&self, reply: &PostReply) -> Result<()>;

    async fn get_reply(&self, id: ReplyId) -> Result<Option<PostReply>>;

    async fn delete_reply(&self, id: ReplyId) -> Result<()>;

    async fn toggle_post_like(&self, post: PostId, user: UserId) -> Result<bool>;

    async fn toggle_reply_like(&self, reply: ReplyId, user: UserId) -> Result<bool>;
}
