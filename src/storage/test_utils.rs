//! Test utilities for storage initialization
//!
//! libSQL's `:memory:` mode gives every connection its own database, so
//! tests open a migrated file inside a temporary directory instead.

use crate::error::Result;
use crate::storage::libsql::{ConnectionMode, LibsqlStorage};
use crate::types::{ItemId, ItemType, Stack, StackId, StackItem, UserId};
use chrono::Utc;
use std::sync::Arc;
use tempfile::TempDir;

/// Migrated storage plus the directory that holds it (drop to clean up)
pub async fn create_test_storage() -> Result<(Arc<LibsqlStorage>, TempDir)> {
    let dir = TempDir::new()?;
    let path = dir.path().join("stackshare_test.db");
    let storage = LibsqlStorage::new_with_validation(
        ConnectionMode::Local(path.to_string_lossy().to_string()),
        true,
    )
    .await?;
    Ok((Arc::new(storage), dir))
}

pub fn sample_stack(owner: UserId, name: &str, is_public: bool) -> Stack {
    let now = Utc::now();
    Stack {
        id: StackId::new(),
        user_id: owner,
        name: name.to_string(),
        description: None,
        purpose: None,
        is_public,
        views: 0,
        likes: 0,
        original_stack_id: None,
        original_author: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_item(stack: StackId, name: &str) -> StackItem {
    StackItem {
        id: ItemId::new(),
        stack_id: stack,
        item_type: ItemType::Supplement,
        name: name.to_string(),
        description: None,
        dosage: Some("200mg".to_string()),
        frequency: Some("daily".to_string()),
        timing: Some("evening".to_string()),
        image_url: None,
        created_at: Utc::now(),
    }
}
