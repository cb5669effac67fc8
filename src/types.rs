//! Core data types for StackShare
//!
//! Rows of the store (stacks, items, logs, posts), the shapes assembled for
//! read endpoints, and the inputs accepted by write endpoints.

use crate::error::StackShareError;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random id
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an id from a string
            pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_string(s)
            }
        }
    };
}

define_id!(
    /// Identity of a signed-in user (issued by the identity provider)
    UserId
);
define_id!(StackId);
define_id!(ItemId);
define_id!(LogId);
define_id!(CategoryId);
define_id!(PostId);
define_id!(ReplyId);

/// Public profile of a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Author attribution shown next to stacks and posts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

/// A named collection of items owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stack {
    pub id: StackId,
    pub user_id: UserId,
    pub name: String,
    pub description: Option<String>,
    pub purpose: Option<String>,
    pub is_public: bool,
    pub views: i64,
    pub likes: i64,
    /// Set when this stack was forked from another one
    pub original_stack_id: Option<StackId>,
    pub original_author: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of stack item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    Supplement,
    Food,
    Routine,
    Other,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Supplement => "supplement",
            ItemType::Food => "food",
            ItemType::Routine => "routine",
            ItemType::Other => "other",
        }
    }
}

impl FromStr for ItemType {
    type Err = StackShareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "supplement" => Ok(ItemType::Supplement),
            "food" => Ok(ItemType::Food),
            "routine" => Ok(ItemType::Routine),
            "other" => Ok(ItemType::Other),
            other => Err(StackShareError::Validation(format!(
                "Unknown item type: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry belonging to one stack; dosage/frequency/timing are free text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackItem {
    pub id: ItemId,
    pub stack_id: StackId,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub name: String,
    pub description: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub timing: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Entry of the fixed category taxonomy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

/// Self-reported ratings, each 1-10
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ratings {
    pub mood: u8,
    pub energy: u8,
    pub focus: u8,
    pub stress: u8,
    pub sleep_quality: u8,
}

impl Default for Ratings {
    fn default() -> Self {
        Self {
            mood: 5,
            energy: 5,
            focus: 5,
            stress: 5,
            sleep_quality: 5,
        }
    }
}

impl Ratings {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 10;

    /// Reject any rating outside 1-10
    pub fn validate(&self) -> Result<(), StackShareError> {
        let fields = [
            ("mood", self.mood),
            ("energy", self.energy),
            ("focus", self.focus),
            ("stress", self.stress),
            ("sleep_quality", self.sleep_quality),
        ];
        for (name, value) in fields {
            if !(Self::MIN..=Self::MAX).contains(&value) {
                return Err(StackShareError::Validation(format!(
                    "{} must be between {} and {}",
                    name,
                    Self::MIN,
                    Self::MAX
                )));
            }
        }
        Ok(())
    }
}

/// Per-user, per-date wellness record (optionally tied to a stack)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLog {
    pub id: LogId,
    pub user_id: UserId,
    pub stack_id: Option<StackId>,
    pub date: NaiveDate,
    #[serde(flatten)]
    pub ratings: Ratings,
    pub notes: Option<String>,
    pub side_effects: Option<String>,
    pub items_taken: Vec<ItemId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Community discussion post on a stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub stack_id: StackId,
    pub user_id: UserId,
    pub content: String,
    /// Present when the post is a review (1-5)
    pub rating: Option<u8>,
    pub created_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Reply to a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostReply {
    pub id: ReplyId,
    pub post_id: PostId,
    pub user_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The single stack a user is currently tracking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveStack {
    pub user_id: UserId,
    pub stack_id: StackId,
    pub activated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Assembled read shapes
// ---------------------------------------------------------------------------

/// Stack with the nested rows needed for ranking and organizing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackWithRelations {
    #[serde(flatten)]
    pub stack: Stack,
    pub items: Vec<StackItem>,
    pub categories: Vec<Category>,
    /// Creation times of the logs recorded against this stack
    pub log_times: Vec<DateTime<Utc>>,
}

/// Where a forked stack came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForkOrigin {
    pub id: StackId,
    pub name: String,
    pub author: Option<String>,
}

/// Everything shown on a stack page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackDetail {
    #[serde(flatten)]
    pub stack: Stack,
    pub owner: Option<ProfileSummary>,
    pub items: Vec<StackItem>,
    pub categories: Vec<Category>,
    pub forked_from: Option<ForkOrigin>,
    pub post_count: i64,
    pub fork_count: i64,
    pub is_owner: bool,
    pub liked: bool,
    pub saved: bool,
}

/// Stack as listed on discovery and landing pages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackCard {
    #[serde(flatten)]
    pub stack: Stack,
    pub author: Option<ProfileSummary>,
    pub categories: Vec<Category>,
}

/// Reply with attribution and like state for the viewer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyThread {
    #[serde(flatten)]
    pub reply: PostReply,
    pub author: String,
    pub like_count: i64,
    pub liked: bool,
}

/// Post with its replies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostThread {
    #[serde(flatten)]
    pub post: Post,
    pub author: String,
    pub like_count: i64,
    pub liked: bool,
    pub replies: Vec<ReplyThread>,
}

/// Row of the community activity feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub log_id: LogId,
    pub created_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub author: String,
    pub stack_name: String,
}

/// Site-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunityStats {
    pub stacks: i64,
    pub users: i64,
    pub logs: i64,
}

/// One log of a stack, reduced to what analytics needs
#[derive(Debug, Clone, PartialEq)]
pub struct StackLogSample {
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub items_taken: usize,
}

// ---------------------------------------------------------------------------
// Write inputs
// ---------------------------------------------------------------------------

/// Fields of a new stack
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewStack {
    pub name: String,
    pub description: Option<String>,
    pub purpose: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

/// Owner edit of a stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackUpdate {
    pub name: String,
    pub description: Option<String>,
    pub purpose: Option<String>,
    pub is_public: bool,
}

/// Fields of a stack item (new or edited)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFields {
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub name: String,
    pub description: Option<String>,
    pub dosage: Option<String>,
    pub frequency: Option<String>,
    pub timing: Option<String>,
}

/// Daily log submission; upserted on (user, date, stack)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub stack_id: Option<StackId>,
    /// Defaults to today (UTC)
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(flatten)]
    pub ratings: Ratings,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub side_effects: Option<String>,
    #[serde(default)]
    pub items_taken: Vec<ItemId>,
}

/// New post on a stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPost {
    pub content: String,
    #[serde(default)]
    pub rating: Option<u8>,
}

/// Sort order of the discovery feed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoverSort {
    /// Most liked first
    Popular,
    /// Newest first
    #[default]
    Recent,
}

/// Filters of the discovery feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoverQuery {
    /// Case-insensitive text matched against name, description and purpose
    #[serde(default)]
    pub q: Option<String>,
    /// Category slug
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sort: DiscoverSort,
}
