//! Discussion threads, likes and the community activity feed

use crate::error::{Result, StackShareError};
use crate::services::stacks::can_view;
use crate::storage::StorageBackend;
use crate::types::{
    ActivityEntry, CommunityStats, NewPost, Post, PostId, PostReply, PostThread, ReplyId, StackId,
    UserId,
};
use crate::utils::retry::{retry_with_backoff, RetryPolicy};
use crate::utils::string::truncate_at_char_boundary;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info};

pub const DUPLICATE_REVIEW_MESSAGE: &str =
    "You have already reviewed this stack today. You can post another review tomorrow.";

/// Notes longer than this are cut in the activity feed
pub const ACTIVITY_NOTE_CHARS: usize = 140;

/// Entries shown in the activity feed
pub const ACTIVITY_LIMIT: usize = 10;

pub struct CommunityService {
    storage: Arc<dyn StorageBackend>,
}

impl CommunityService {
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    async fn ensure_visible(&self, stack: StackId, viewer: Option<UserId>) -> Result<()> {
        match self.storage.get_stack(stack).await? {
            Some(s) if can_view(&s, viewer) => Ok(()),
            _ => Err(StackShareError::NotFound(format!("Stack {}", stack))),
        }
    }

    async fn visible_post(&self, id: PostId, viewer: UserId) -> Result<Post> {
        let post = self
            .storage
            .get_post(id)
            .await?
            .ok_or_else(|| StackShareError::NotFound(format!("Post {}", id)))?;
        self.ensure_visible(post.stack_id, Some(viewer)).await?;
        Ok(post)
    }

    pub async fn threads(&self, stack: StackId, viewer: Option<UserId>) -> Result<Vec<PostThread>> {
        self.ensure_visible(stack, viewer).await?;
        self.storage.list_post_threads(stack, viewer).await
    }

    /// Post on a stack; a rated post is a review, limited to one per day
    pub async fn create_post(
        &self,
        user: UserId,
        stack: StackId,
        input: NewPost,
        today: NaiveDate,
    ) -> Result<Post> {
        self.ensure_visible(stack, Some(user)).await?;

        let content = input.content.trim();
        if content.is_empty() {
            return Err(StackShareError::Validation("Content is required".to_string()));
        }
        if let Some(rating) = input.rating {
            if !(1..=5).contains(&rating) {
                return Err(StackShareError::Validation(
                    "Rating must be between 1 and 5".to_string(),
                ));
            }
            if self.storage.has_review_on(stack, user, today).await? {
                return Err(StackShareError::Conflict(DUPLICATE_REVIEW_MESSAGE.to_string()));
            }
        }

        let post = Post {
            id: PostId::new(),
            stack_id: stack,
            user_id: user,
            content: content.to_string(),
            rating: input.rating,
            created_date: today,
            created_at: Utc::now(),
        };
        self.storage.insert_post(&post).await?;

        info!("User {} posted {} on stack {}", user, post.id, stack);
        Ok(post)
    }

    /// Author-only delete
    pub async fn delete_post(&self, user: UserId, id: PostId) -> Result<()> {
        let post = self
            .storage
            .get_post(id)
            .await?
            .ok_or_else(|| StackShareError::NotFound(format!("Post {}", id)))?;
        if post.user_id != user {
            return Err(StackShareError::Unauthorized(
                "Only the author can delete this post".to_string(),
            ));
        }
        self.storage.delete_post(id).await
    }

    pub async fn reply(&self, user: UserId, post: PostId, content: &str) -> Result<PostReply> {
        self.visible_post(post, user).await?;

        let content = content.trim();
        if content.is_empty() {
            return Err(StackShareError::Validation("Content is required".to_string()));
        }

        let reply = PostReply {
            id: ReplyId::new(),
            post_id: post,
            user_id: user,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        self.storage.insert_reply(&reply).await?;

        debug!("User {} replied {} to post {}", user, reply.id, post);
        Ok(reply)
    }

    /// Author-only delete
    pub async fn delete_reply(&self, user: UserId, id: ReplyId) -> Result<()> {
        let reply = self
            .storage
            .get_reply(id)
            .await?
            .ok_or_else(|| StackShareError::NotFound(format!("Reply {}", id)))?;
        if reply.user_id != user {
            return Err(StackShareError::Unauthorized(
                "Only the author can delete this reply".to_string(),
            ));
        }
        self.storage.delete_reply(id).await
    }

    pub async fn toggle_post_like(&self, user: UserId, post: PostId) -> Result<bool> {
        self.visible_post(post, user).await?;
        self.storage.toggle_post_like(post, user).await
    }

    pub async fn toggle_reply_like(&self, user: UserId, reply: ReplyId) -> Result<bool> {
        let found = self
            .storage
            .get_reply(reply)
            .await?
            .ok_or_else(|| StackShareError::NotFound(format!("Reply {}", reply)))?;
        self.visible_post(found.post_id, user).await?;
        self.storage.toggle_reply_like(reply, user).await
    }

    /// Latest public logs, retried with backoff
    pub async fn activity(
        &self,
        stack: Option<StackId>,
        limit: usize,
        policy: RetryPolicy,
    ) -> Result<Vec<ActivityEntry>> {
        let storage = self.storage.clone();
        let rows = retry_with_backoff(policy, "activity feed", || {
            let storage = storage.clone();
            async move { storage.recent_activity(stack, limit).await }
        })
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| ActivityEntry {
                log_id: row.log_id,
                created_at: row.created_at,
                notes: row
                    .notes
                    .map(|n| truncate_at_char_boundary(&n, ACTIVITY_NOTE_CHARS)),
                author: row
                    .author
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or_else(|| "Anonymous".to_string()),
                stack_name: row
                    .stack_name
                    .unwrap_or_else(|| "Unknown Stack".to_string()),
            })
            .collect())
    }

    pub async fn stats(&self) -> Result<CommunityStats> {
        self.storage.community_stats().await
    }
}
