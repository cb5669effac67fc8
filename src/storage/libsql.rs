//! LibSQL storage backend implementation
//!
//! Stores profiles, stacks, logs and discussions in a local libSQL file, a
//! remote Turso database, or an embedded replica of one. The schema ships
//! inside the binary and is applied on open.

use crate::error::{Result, StackShareError};
use crate::storage::{ActivityRow, LogUpsert, StorageBackend};
use crate::types::{
    ActiveStack, Category, CategoryId, CommunityStats, DailyLog, DiscoverQuery, DiscoverSort,
    ItemFields, ItemId, ItemType, LogId, Post, PostId, PostReply, PostThread, ProfileSummary,
    Ratings, ReplyId, ReplyThread, Stack, StackCard, StackId, StackItem, StackLogSample,
    StackUpdate, StackWithRelations, UserId, UserProfile,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use libsql::{params, Builder, Connection, Database, TransactionBehavior, Value};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// How long a writer waits on a locked database file before giving up
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Schema migrations, applied in order and recorded in `_migrations_applied`
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "001_initial_schema.sql",
        include_str!("../../migrations/libsql/001_initial_schema.sql"),
    ),
    (
        "002_add_indexes.sql",
        include_str!("../../migrations/libsql/002_add_indexes.sql"),
    ),
    (
        "003_stack_saves.sql",
        include_str!("../../migrations/libsql/003_stack_saves.sql"),
    ),
];

const STACK_COLUMNS: &str = "s.id, s.user_id, s.name, s.description, s.purpose, s.is_public, \
     s.views, s.likes, s.original_stack_id, s.original_author, s.created_at, s.updated_at";

const ITEM_COLUMNS: &str =
    "id, stack_id, type, name, description, dosage, frequency, timing, image_url, created_at";

const LOG_COLUMNS: &str = "id, user_id, stack_id, date, mood, energy, focus, stress, \
     sleep_quality, notes, side_effects, items_taken, created_at, updated_at";

const PROFILE_COLUMNS: &str = "id, username, full_name, avatar_url, bio, created_at, updated_at";

const POST_COLUMNS: &str = "p.id, p.stack_id, p.user_id, p.content, p.rating, p.created_date, p.created_at";

const REPLY_COLUMNS: &str = "r.id, r.post_id, r.user_id, r.content, r.created_at";

/// Parse SQL file into individual statements, handling multi-line constructs like triggers
fn parse_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut depth: i32 = 0;

    for line in sql.lines() {
        let trimmed = line.trim();

        if current.is_empty() && (trimmed.is_empty() || trimmed.starts_with("--")) {
            continue;
        }

        if !current.is_empty() {
            current.push('\n');
        }
        current.push_str(line);

        let upper = trimmed.to_uppercase();
        if upper.starts_with("BEGIN") || upper.contains(" BEGIN") {
            depth += 1;
        }
        if upper.starts_with("END") {
            depth = depth.saturating_sub(1);
        }

        if trimmed.ends_with(';') && depth == 0 {
            statements.push(current.clone());
            current.clear();
        }
    }

    if !current.trim().is_empty() {
        statements.push(current);
    }

    statements
}

/// Fixed-width UTC timestamp so text ordering matches time ordering
fn fmt_ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StackShareError::Database(format!("Invalid timestamp '{}': {}", value, e)))
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| StackShareError::Database(format!("Invalid date '{}': {}", value, e)))
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn id_values<T: ToString>(ids: &[T]) -> Vec<Value> {
    ids.iter().map(|id| Value::Text(id.to_string())).collect()
}

/// Escape `%`, `_` and `\` for a LIKE pattern using `ESCAPE '\'`
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Map a UNIQUE violation onto `Conflict`, anything else onto `Database`
fn map_unique(err: libsql::Error, conflict: &str) -> StackShareError {
    if err.to_string().contains("UNIQUE constraint failed") {
        StackShareError::Conflict(conflict.to_string())
    } else {
        StackShareError::from(err)
    }
}

fn row_to_stack(row: &libsql::Row) -> Result<Stack> {
    let original_stack_id: Option<String> = row.get(8)?;
    Ok(Stack {
        id: StackId::from_string(&row.get::<String>(0)?)?,
        user_id: UserId::from_string(&row.get::<String>(1)?)?,
        name: row.get(2)?,
        description: row.get(3)?,
        purpose: row.get(4)?,
        is_public: row.get::<i64>(5)? != 0,
        views: row.get(6)?,
        likes: row.get(7)?,
        original_stack_id: original_stack_id
            .map(|s| StackId::from_string(&s))
            .transpose()?,
        original_author: row.get(9)?,
        created_at: parse_ts(&row.get::<String>(10)?)?,
        updated_at: parse_ts(&row.get::<String>(11)?)?,
    })
}

fn row_to_item(row: &libsql::Row) -> Result<StackItem> {
    Ok(StackItem {
        id: ItemId::from_string(&row.get::<String>(0)?)?,
        stack_id: StackId::from_string(&row.get::<String>(1)?)?,
        item_type: row.get::<String>(2)?.parse::<ItemType>()?,
        name: row.get(3)?,
        description: row.get(4)?,
        dosage: row.get(5)?,
        frequency: row.get(6)?,
        timing: row.get(7)?,
        image_url: row.get(8)?,
        created_at: parse_ts(&row.get::<String>(9)?)?,
    })
}

fn row_to_log(row: &libsql::Row) -> Result<DailyLog> {
    let stack_id: Option<String> = row.get(2)?;
    let items_taken: String = row.get(11)?;
    Ok(DailyLog {
        id: LogId::from_string(&row.get::<String>(0)?)?,
        user_id: UserId::from_string(&row.get::<String>(1)?)?,
        stack_id: stack_id.map(|s| StackId::from_string(&s)).transpose()?,
        date: parse_date(&row.get::<String>(3)?)?,
        ratings: Ratings {
            mood: row.get::<i64>(4)? as u8,
            energy: row.get::<i64>(5)? as u8,
            focus: row.get::<i64>(6)? as u8,
            stress: row.get::<i64>(7)? as u8,
            sleep_quality: row.get::<i64>(8)? as u8,
        },
        notes: row.get(9)?,
        side_effects: row.get(10)?,
        items_taken: serde_json::from_str(&items_taken)?,
        created_at: parse_ts(&row.get::<String>(12)?)?,
        updated_at: parse_ts(&row.get::<String>(13)?)?,
    })
}

fn row_to_profile(row: &libsql::Row) -> Result<UserProfile> {
    Ok(UserProfile {
        id: UserId::from_string(&row.get::<String>(0)?)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        avatar_url: row.get(3)?,
        bio: row.get(4)?,
        created_at: parse_ts(&row.get::<String>(5)?)?,
        updated_at: parse_ts(&row.get::<String>(6)?)?,
    })
}

fn row_to_post(row: &libsql::Row) -> Result<Post> {
    Ok(Post {
        id: PostId::from_string(&row.get::<String>(0)?)?,
        stack_id: StackId::from_string(&row.get::<String>(1)?)?,
        user_id: UserId::from_string(&row.get::<String>(2)?)?,
        content: row.get(3)?,
        rating: row.get::<Option<i64>>(4)?.map(|r| r as u8),
        created_date: parse_date(&row.get::<String>(5)?)?,
        created_at: parse_ts(&row.get::<String>(6)?)?,
    })
}

fn row_to_reply(row: &libsql::Row) -> Result<PostReply> {
    Ok(PostReply {
        id: ReplyId::from_string(&row.get::<String>(0)?)?,
        post_id: PostId::from_string(&row.get::<String>(1)?)?,
        user_id: UserId::from_string(&row.get::<String>(2)?)?,
        content: row.get(3)?,
        created_at: parse_ts(&row.get::<String>(4)?)?,
    })
}

/// LibSQL storage backend
pub struct LibsqlStorage {
    db: Database,
    /// Backed by a file on this machine (local or embedded replica)
    file_backed: bool,
}

/// Database connection mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Local file-based database
    Local(String),
    /// In-memory database (isolated per connection)
    InMemory,
    /// Remote database (Turso Cloud)
    Remote { url: String, token: String },
    /// Embedded replica with sync
    EmbeddedReplica {
        path: String,
        url: String,
        token: String,
    },
}

impl LibsqlStorage {
    /// Validate a database file before opening
    ///
    /// Returns `Ok(false)` when the file is missing and `must_exist` is false.
    fn validate_database_file(db_path: &str, must_exist: bool) -> Result<bool> {
        use std::fs;
        use std::path::Path;

        let path = Path::new(db_path);

        if !path.exists() {
            if must_exist {
                return Err(StackShareError::Database(format!(
                    "Database file not found at '{}'. Run 'stackshare init' first or check database.path.",
                    db_path
                )));
            }
            return Ok(false);
        }

        // SQLite files start with "SQLite format 3\0"; a zero-length file is a
        // database that was created but never written
        let bytes = fs::read(path).map_err(|e| {
            StackShareError::Database(format!("Cannot read database file at '{}': {}", db_path, e))
        })?;

        if bytes.is_empty() {
            return Ok(true);
        }

        if bytes.len() < 16 || &bytes[0..16] != b"SQLite format 3\0" {
            return Err(StackShareError::Database(format!(
                "Database file at '{}' is corrupted or not a SQLite database. Delete it and run 'stackshare init'.",
                db_path
            )));
        }

        debug!("Database file validation passed: {}", db_path);
        Ok(true)
    }

    /// Open (and, with `create_if_missing`, create) a database and migrate it
    pub async fn new_with_validation(mode: ConnectionMode, create_if_missing: bool) -> Result<Self> {
        info!(
            "Connecting to LibSQL database: {:?} (create_if_missing: {})",
            mode, create_if_missing
        );

        if let ConnectionMode::Local(path) | ConnectionMode::EmbeddedReplica { path, .. } = &mode {
            let exists = Self::validate_database_file(path, !create_if_missing)?;
            if create_if_missing && !exists {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            StackShareError::Database(format!(
                                "Failed to create database directory {}: {}",
                                parent.display(),
                                e
                            ))
                        })?;
                    }
                }
            }
        }

        let db = match &mode {
            ConnectionMode::Local(path) => Builder::new_local(path).build().await.map_err(|e| {
                StackShareError::Database(format!("Failed to create local database: {}", e))
            })?,
            ConnectionMode::InMemory => Builder::new_local(":memory:").build().await.map_err(|e| {
                StackShareError::Database(format!("Failed to create in-memory database: {}", e))
            })?,
            ConnectionMode::Remote { url, token } => Builder::new_remote(url.clone(), token.clone())
                .build()
                .await
                .map_err(|e| {
                    StackShareError::Database(format!("Failed to create remote database: {}", e))
                })?,
            ConnectionMode::EmbeddedReplica { path, url, token } => {
                Builder::new_remote_replica(path, url.clone(), token.clone())
                    .build()
                    .await
                    .map_err(|e| {
                        StackShareError::Database(format!("Failed to create embedded replica: {}", e))
                    })?
            }
        };

        info!("LibSQL database connection established");

        let file_backed = matches!(
            mode,
            ConnectionMode::Local(_) | ConnectionMode::EmbeddedReplica { .. }
        );
        let storage = Self { db, file_backed };
        if file_backed {
            storage.enable_wal().await;
        }
        storage.verify_database_health().await?;
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Open an existing database
    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        Self::new_with_validation(mode, false).await
    }

    /// Readers stop blocking the single writer in WAL mode
    async fn enable_wal(&self) {
        let conn = match self.get_conn().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!("Cannot enable WAL mode: {}", e);
                return;
            }
        };
        match conn.query("PRAGMA journal_mode=WAL", ()).await {
            Ok(_) => debug!("WAL journal mode enabled"),
            Err(e) => warn!("Failed to enable WAL mode: {}", e),
        }
    }

    /// Verify the database answers queries and accepts writes
    async fn verify_database_health(&self) -> Result<()> {
        let conn = self.get_conn().await?;

        conn.query("SELECT 1", params![]).await.map_err(|e| {
            StackShareError::Database(format!(
                "Database corruption detected or invalid database file: {}",
                e
            ))
        })?;

        let write_test = r#"
            CREATE TABLE IF NOT EXISTS _health_check (id INTEGER PRIMARY KEY);
            DROP TABLE IF EXISTS _health_check;
        "#;

        if let Err(e) = conn.execute_batch(write_test).await {
            let error_msg = e.to_string().to_lowercase();
            if error_msg.contains("readonly") || error_msg.contains("permission") {
                return Err(StackShareError::Database(format!(
                    "Database is read-only or lacks write permissions: {}",
                    e
                )));
            }
            return Err(StackShareError::Database(format!(
                "Database write test failed: {}",
                e
            )));
        }

        debug!("Database health check passed");
        Ok(())
    }

    /// Apply pending migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations...");

        let conn = self.get_conn().await?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations_applied (
                migration_name TEXT PRIMARY KEY,
                applied_at INTEGER NOT NULL
            )",
            params![],
        )
        .await
        .map_err(|e| {
            StackShareError::Migration(format!("Failed to create migrations table: {}", e))
        })?;

        for (name, sql) in MIGRATIONS {
            let mut rows = conn
                .query(
                    "SELECT COUNT(*) FROM _migrations_applied WHERE migration_name = ?",
                    params![*name],
                )
                .await?;

            let already_applied = match rows.next().await? {
                Some(row) => row.get::<i64>(0)?,
                None => 0,
            };

            if already_applied > 0 {
                debug!("Skipping already applied migration: {}", name);
                continue;
            }

            let statements = parse_sql_statements(sql);
            debug!("Parsed {} statements from {}", statements.len(), name);
            for (i, statement) in statements.iter().enumerate() {
                let statement = statement.trim();
                if statement.is_empty() {
                    continue;
                }
                conn.execute(statement, params![]).await.map_err(|e| {
                    StackShareError::Migration(format!(
                        "Failed to execute statement #{} in {}: {}",
                        i + 1,
                        name,
                        e
                    ))
                })?;
            }

            conn.execute(
                "INSERT INTO _migrations_applied (migration_name, applied_at) VALUES (?, ?)",
                params![*name, Utc::now().timestamp()],
            )
            .await
            .map_err(|e| StackShareError::Migration(format!("Failed to record migration: {}", e)))?;

            info!("Executed migration: {}", name);
        }

        info!("Database migrations completed");
        Ok(())
    }

    /// Get a connection with foreign key enforcement turned on
    async fn get_conn(&self) -> Result<Connection> {
        let conn = self
            .db
            .connect()
            .map_err(|e| StackShareError::Database(format!("Failed to get connection: {}", e)))?;
        conn.execute("PRAGMA foreign_keys = ON", ()).await?;
        if self.file_backed {
            conn.query(&format!("PRAGMA busy_timeout = {}", BUSY_TIMEOUT_MS), ())
                .await?;
        }
        Ok(conn)
    }

    async fn items_by_stack(
        conn: &Connection,
        stacks: &[StackId],
    ) -> Result<HashMap<StackId, Vec<StackItem>>> {
        let mut map: HashMap<StackId, Vec<StackItem>> = HashMap::new();
        if stacks.is_empty() {
            return Ok(map);
        }

        let sql = format!(
            "SELECT {} FROM stack_items WHERE stack_id IN ({}) ORDER BY created_at, id",
            ITEM_COLUMNS,
            placeholders(stacks.len())
        );
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(id_values(stacks)))
            .await?;
        while let Some(row) = rows.next().await? {
            let item = row_to_item(&row)?;
            map.entry(item.stack_id).or_default().push(item);
        }
        Ok(map)
    }

    async fn categories_by_stack(
        conn: &Connection,
        stacks: &[StackId],
    ) -> Result<HashMap<StackId, Vec<Category>>> {
        let mut map: HashMap<StackId, Vec<Category>> = HashMap::new();
        if stacks.is_empty() {
            return Ok(map);
        }

        let sql = format!(
            "SELECT sc.stack_id, c.id, c.name, c.slug
             FROM stack_categories sc
             JOIN categories c ON c.id = sc.category_id
             WHERE sc.stack_id IN ({})
             ORDER BY c.name",
            placeholders(stacks.len())
        );
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(id_values(stacks)))
            .await?;
        while let Some(row) = rows.next().await? {
            let stack_id = StackId::from_string(&row.get::<String>(0)?)?;
            map.entry(stack_id).or_default().push(Category {
                id: CategoryId::from_string(&row.get::<String>(1)?)?,
                name: row.get(2)?,
                slug: row.get(3)?,
            });
        }
        Ok(map)
    }

    async fn log_times_by_stack(
        conn: &Connection,
        stacks: &[StackId],
    ) -> Result<HashMap<StackId, Vec<DateTime<Utc>>>> {
        let mut map: HashMap<StackId, Vec<DateTime<Utc>>> = HashMap::new();
        if stacks.is_empty() {
            return Ok(map);
        }

        let sql = format!(
            "SELECT stack_id, created_at FROM daily_logs WHERE stack_id IN ({})",
            placeholders(stacks.len())
        );
        let mut rows = conn
            .query(&sql, libsql::params_from_iter(id_values(stacks)))
            .await?;
        while let Some(row) = rows.next().await? {
            let stack_id = StackId::from_string(&row.get::<String>(0)?)?;
            map.entry(stack_id)
                .or_default()
                .push(parse_ts(&row.get::<String>(1)?)?);
        }
        Ok(map)
    }

    /// Run a card query (stack columns followed by profile id, name, avatar)
    async fn query_cards(&self, sql: &str, values: Vec<Value>) -> Result<Vec<StackCard>> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query(sql, libsql::params_from_iter(values)).await?;

        let mut cards = Vec::new();
        while let Some(row) = rows.next().await? {
            let stack = row_to_stack(&row)?;
            let profile_id: Option<String> = row.get(12)?;
            let author = match profile_id {
                Some(_) => Some(ProfileSummary {
                    full_name: row.get(13)?,
                    avatar_url: row.get(14)?,
                }),
                None => None,
            };
            cards.push(StackCard {
                stack,
                author,
                categories: Vec::new(),
            });
        }

        let ids: Vec<StackId> = cards.iter().map(|c| c.stack.id).collect();
        let mut categories = Self::categories_by_stack(&conn, &ids).await?;
        for card in &mut cards {
            card.categories = categories.remove(&card.stack.id).unwrap_or_default();
        }

        Ok(cards)
    }

    fn card_select() -> String {
        format!(
            "SELECT {}, p.id, p.full_name, p.avatar_url
             FROM stacks s
             LEFT JOIN user_profiles p ON p.id = s.user_id
             WHERE s.is_public = 1",
            STACK_COLUMNS
        )
    }

    /// Insert or delete a (row, user) like pair; returns whether it now exists
    async fn toggle_pair(&self, table: &str, key_column: &str, key: String, user: UserId) -> Result<bool> {
        let conn = self.get_conn().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await?;

        let exists = {
            let sql = format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ? AND user_id = ?",
                table, key_column
            );
            let mut rows = tx.query(&sql, params![key.clone(), user.to_string()]).await?;
            match rows.next().await? {
                Some(row) => row.get::<i64>(0)? > 0,
                None => false,
            }
        };

        if exists {
            let sql = format!("DELETE FROM {} WHERE {} = ? AND user_id = ?", table, key_column);
            tx.execute(&sql, params![key, user.to_string()]).await?;
        } else {
            let sql = format!(
                "INSERT INTO {} ({}, user_id, created_at) VALUES (?, ?, ?)",
                table, key_column
            );
            tx.execute(&sql, params![key, user.to_string(), fmt_ts(Utc::now())])
                .await?;
        }

        tx.commit().await?;
        Ok(!exists)
    }

    async fn fetch_log(conn: &Connection, id: &str) -> Result<Option<DailyLog>> {
        let sql = format!("SELECT {} FROM daily_logs WHERE id = ?", LOG_COLUMNS);
        let mut rows = conn.query(&sql, params![id]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_log(&row)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl StorageBackend for LibsqlStorage {
    async fn get_profile(&self, user: UserId) -> Result<Option<UserProfile>> {
        debug!("Fetching profile: {}", user);
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM user_profiles WHERE id = ?", PROFILE_COLUMNS);
        let mut rows = conn.query(&sql, params![user.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_profile(&row)?)),
            None => Ok(None),
        }
    }

    async fn create_profile(&self, profile: &UserProfile) -> Result<()> {
        debug!("Creating profile {} ({})", profile.id, profile.username);
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO user_profiles (id, username, full_name, avatar_url, bio, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                profile.id.to_string(),
                profile.username.clone(),
                profile.full_name.clone(),
                profile.avatar_url.clone(),
                profile.bio.clone(),
                fmt_ts(profile.created_at),
                fmt_ts(profile.updated_at)
            ],
        )
        .await
        .map_err(|e| map_unique(e, &format!("Username '{}' is taken", profile.username)))?;
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query("SELECT id, name, slug FROM categories ORDER BY name", params![])
            .await?;

        let mut categories = Vec::new();
        while let Some(row) = rows.next().await? {
            categories.push(Category {
                id: CategoryId::from_string(&row.get::<String>(0)?)?,
                name: row.get(1)?,
                slug: row.get(2)?,
            });
        }
        Ok(categories)
    }

    async fn set_stack_categories(&self, stack: StackId, categories: &[CategoryId]) -> Result<()> {
        debug!("Setting {} categories on stack {}", categories.len(), stack);
        let conn = self.get_conn().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await?;

        tx.execute(
            "DELETE FROM stack_categories WHERE stack_id = ?",
            params![stack.to_string()],
        )
        .await?;
        for category in categories {
            tx.execute(
                "INSERT OR IGNORE INTO stack_categories (stack_id, category_id) VALUES (?, ?)",
                params![stack.to_string(), category.to_string()],
            )
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn stack_categories(&self, stack: StackId) -> Result<Vec<Category>> {
        let conn = self.get_conn().await?;
        let mut map = Self::categories_by_stack(&conn, &[stack]).await?;
        Ok(map.remove(&stack).unwrap_or_default())
    }

    async fn insert_stack(&self, stack: &Stack) -> Result<()> {
        debug!("Inserting stack {} for user {}", stack.id, stack.user_id);
        let conn = self.get_conn().await?;
        insert_stack_row(&conn, stack).await
    }

    async fn get_stack(&self, id: StackId) -> Result<Option<Stack>> {
        debug!("Fetching stack: {}", id);
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM stacks s WHERE s.id = ?", STACK_COLUMNS);
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_stack(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_stack(&self, id: StackId, update: &StackUpdate, at: DateTime<Utc>) -> Result<()> {
        debug!("Updating stack: {}", id);
        let conn = self.get_conn().await?;
        let changed = conn
            .execute(
                "UPDATE stacks SET name = ?, description = ?, purpose = ?, is_public = ?, updated_at = ?
                 WHERE id = ?",
                params![
                    update.name.clone(),
                    update.description.clone(),
                    update.purpose.clone(),
                    update.is_public as i64,
                    fmt_ts(at),
                    id.to_string()
                ],
            )
            .await?;
        if changed == 0 {
            return Err(StackShareError::NotFound(format!("Stack {}", id)));
        }
        Ok(())
    }

    async fn delete_stack(&self, id: StackId) -> Result<()> {
        debug!("Deleting stack: {}", id);
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM stacks WHERE id = ?", params![id.to_string()])
            .await?;
        Ok(())
    }

    async fn list_user_stacks(&self, user: UserId) -> Result<Vec<StackWithRelations>> {
        debug!("Listing stacks of user: {}", user);
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM stacks s WHERE s.user_id = ? ORDER BY s.created_at DESC",
            STACK_COLUMNS
        );
        let mut rows = conn.query(&sql, params![user.to_string()]).await?;

        let mut stacks = Vec::new();
        while let Some(row) = rows.next().await? {
            stacks.push(row_to_stack(&row)?);
        }

        let ids: Vec<StackId> = stacks.iter().map(|s| s.id).collect();
        let mut items = Self::items_by_stack(&conn, &ids).await?;
        let mut categories = Self::categories_by_stack(&conn, &ids).await?;
        let mut log_times = Self::log_times_by_stack(&conn, &ids).await?;

        Ok(stacks
            .into_iter()
            .map(|stack| StackWithRelations {
                items: items.remove(&stack.id).unwrap_or_default(),
                categories: categories.remove(&stack.id).unwrap_or_default(),
                log_times: log_times.remove(&stack.id).unwrap_or_default(),
                stack,
            })
            .collect())
    }

    async fn increment_views(&self, id: StackId) -> Result<()> {
        let conn = self.get_conn().await?;
        conn.execute(
            "UPDATE stacks SET views = views + 1 WHERE id = ?",
            params![id.to_string()],
        )
        .await?;
        Ok(())
    }

    async fn stack_counts(&self, id: StackId) -> Result<(i64, i64)> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT
                    (SELECT COUNT(*) FROM stack_posts WHERE stack_id = ?1),
                    (SELECT COUNT(*) FROM stacks WHERE original_stack_id = ?1)",
                params![id.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok((row.get(0)?, row.get(1)?)),
            None => Ok((0, 0)),
        }
    }

    async fn discover_stacks(&self, query: &DiscoverQuery, limit: usize) -> Result<Vec<StackCard>> {
        debug!("Discover query: {:?}", query);
        let mut sql = Self::card_select();
        let mut values: Vec<Value> = Vec::new();

        if let Some(term) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            let pattern = format!("%{}%", escape_like(&term.to_lowercase()));
            sql.push_str(
                " AND (LOWER(s.name) LIKE ? ESCAPE '\\'
                   OR LOWER(COALESCE(s.description, '')) LIKE ? ESCAPE '\\'
                   OR LOWER(COALESCE(s.purpose, '')) LIKE ? ESCAPE '\\')",
            );
            for _ in 0..3 {
                values.push(Value::Text(pattern.clone()));
            }
        }

        if let Some(slug) = query.category.as_deref().filter(|c| !c.is_empty()) {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM stack_categories sc
                   JOIN categories c ON c.id = sc.category_id
                   WHERE sc.stack_id = s.id AND c.slug = ?)",
            );
            values.push(Value::Text(slug.to_string()));
        }

        sql.push_str(match query.sort {
            DiscoverSort::Popular => " ORDER BY s.likes DESC, s.created_at DESC",
            DiscoverSort::Recent => " ORDER BY s.created_at DESC",
        });
        sql.push_str(" LIMIT ?");
        values.push(Value::Integer(limit as i64));

        self.query_cards(&sql, values).await
    }

    async fn newest_public_stacks(&self, limit: usize) -> Result<Vec<StackCard>> {
        let sql = format!("{} ORDER BY s.created_at DESC LIMIT ?", Self::card_select());
        self.query_cards(&sql, vec![Value::Integer(limit as i64)]).await
    }

    async fn trending_stacks(&self, limit: usize) -> Result<Vec<StackCard>> {
        let sql = format!(
            "{} ORDER BY s.views DESC, s.created_at DESC LIMIT ?",
            Self::card_select()
        );
        self.query_cards(&sql, vec![Value::Integer(limit as i64)]).await
    }

    async fn fork_stack(&self, source: StackId, fork: &Stack) -> Result<()> {
        debug!("Forking stack {} into {}", source, fork.id);
        let conn = self.get_conn().await?;

        let sql = format!(
            "SELECT {} FROM stack_items WHERE stack_id = ? ORDER BY created_at, id",
            ITEM_COLUMNS
        );
        let mut items = Vec::new();
        {
            let mut rows = conn.query(&sql, params![source.to_string()]).await?;
            while let Some(row) = rows.next().await? {
                items.push(row_to_item(&row)?);
            }
        }

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await?;
        insert_stack_row(&tx, fork).await?;

        // Images stay with the source stack so deleting a forked item never
        // removes a file the source still references
        for item in items {
            let copy = StackItem {
                id: ItemId::new(),
                stack_id: fork.id,
                image_url: None,
                created_at: fork.created_at,
                ..item
            };
            insert_item_row(&tx, &copy).await?;
        }

        tx.execute(
            "INSERT INTO stack_categories (stack_id, category_id)
             SELECT ?, category_id FROM stack_categories WHERE stack_id = ?",
            params![fork.id.to_string(), source.to_string()],
        )
        .await?;

        tx.commit().await?;
        info!("Forked stack {} into {}", source, fork.id);
        Ok(())
    }

    async fn toggle_stack_like(&self, stack: StackId, user: UserId) -> Result<bool> {
        let liked = self
            .toggle_pair("stack_likes", "stack_id", stack.to_string(), user)
            .await?;

        let conn = self.get_conn().await?;
        conn.execute(
            "UPDATE stacks SET likes = (SELECT COUNT(*) FROM stack_likes WHERE stack_id = ?1)
             WHERE id = ?1",
            params![stack.to_string()],
        )
        .await?;

        debug!("Stack {} like by {}: {}", stack, user, liked);
        Ok(liked)
    }

    async fn has_liked_stack(&self, stack: StackId, user: UserId) -> Result<bool> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM stack_likes WHERE stack_id = ? AND user_id = ?",
                params![stack.to_string(), user.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? > 0),
            None => Ok(false),
        }
    }

    async fn toggle_stack_save(&self, stack: StackId, user: UserId) -> Result<bool> {
        let saved = self
            .toggle_pair("stack_saves", "stack_id", stack.to_string(), user)
            .await?;
        debug!("Stack {} save by {}: {}", stack, user, saved);
        Ok(saved)
    }

    async fn has_saved_stack(&self, stack: StackId, user: UserId) -> Result<bool> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM stack_saves WHERE stack_id = ? AND user_id = ?",
                params![stack.to_string(), user.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? > 0),
            None => Ok(false),
        }
    }

    async fn saved_stacks(&self, user: UserId) -> Result<Vec<StackCard>> {
        let sql = format!(
            "{} AND s.id IN (SELECT stack_id FROM stack_saves WHERE user_id = ?)
             ORDER BY (SELECT created_at FROM stack_saves WHERE stack_id = s.id AND user_id = ?) DESC",
            Self::card_select()
        );
        let user = Value::Text(user.to_string());
        self.query_cards(&sql, vec![user.clone(), user]).await
    }

    async fn insert_item(&self, item: &StackItem) -> Result<()> {
        debug!("Inserting item {} into stack {}", item.id, item.stack_id);
        let conn = self.get_conn().await?;
        insert_item_row(&conn, item).await
    }

    async fn get_item(&self, id: ItemId) -> Result<Option<StackItem>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM stack_items WHERE id = ?", ITEM_COLUMNS);
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_item(&row)?)),
            None => Ok(None),
        }
    }

    async fn update_item(&self, id: ItemId, fields: &ItemFields) -> Result<()> {
        debug!("Updating item: {}", id);
        let conn = self.get_conn().await?;
        let changed = conn
            .execute(
                "UPDATE stack_items
                 SET type = ?, name = ?, description = ?, dosage = ?, frequency = ?, timing = ?
                 WHERE id = ?",
                params![
                    fields.item_type.as_str(),
                    fields.name.clone(),
                    fields.description.clone(),
                    fields.dosage.clone(),
                    fields.frequency.clone(),
                    fields.timing.clone(),
                    id.to_string()
                ],
            )
            .await?;
        if changed == 0 {
            return Err(StackShareError::NotFound(format!("Item {}", id)));
        }
        Ok(())
    }

    async fn delete_item(&self, id: ItemId) -> Result<()> {
        debug!("Deleting item: {}", id);
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM stack_items WHERE id = ?", params![id.to_string()])
            .await?;
        Ok(())
    }

    async fn list_items(&self, stack: StackId) -> Result<Vec<StackItem>> {
        let conn = self.get_conn().await?;
        let mut map = Self::items_by_stack(&conn, &[stack]).await?;
        Ok(map.remove(&stack).unwrap_or_default())
    }

    async fn upsert_log(&self, log: &LogUpsert, at: DateTime<Utc>) -> Result<DailyLog> {
        debug!(
            "Upserting log for user {} on {} (stack: {:?})",
            log.user_id, log.date, log.stack_id
        );
        let conn = self.get_conn().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await?;

        let user = log.user_id.to_string();
        let date = fmt_date(log.date);
        let stack = log.stack_id.map(|s| s.to_string());
        let items_taken = serde_json::to_string(&log.items_taken)?;
        let now = fmt_ts(at);

        let existing: Option<String> = {
            let mut rows = tx
                .query(
                    "SELECT id FROM daily_logs WHERE user_id = ? AND date = ? AND stack_id IS ?
                     ORDER BY created_at LIMIT 1",
                    params![user.clone(), date.clone(), stack.clone()],
                )
                .await?;
            match rows.next().await? {
                Some(row) => Some(row.get(0)?),
                None => None,
            }
        };

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE daily_logs
                     SET mood = ?, energy = ?, focus = ?, stress = ?, sleep_quality = ?,
                         notes = ?, side_effects = ?, items_taken = ?, updated_at = ?
                     WHERE id = ?",
                    params![
                        log.ratings.mood as i64,
                        log.ratings.energy as i64,
                        log.ratings.focus as i64,
                        log.ratings.stress as i64,
                        log.ratings.sleep_quality as i64,
                        log.notes.clone(),
                        log.side_effects.clone(),
                        items_taken,
                        now,
                        id.clone()
                    ],
                )
                .await?;
                id
            }
            None => {
                let id = LogId::new().to_string();
                tx.execute(
                    "INSERT INTO daily_logs (
                        id, user_id, stack_id, date, mood, energy, focus, stress, sleep_quality,
                        notes, side_effects, items_taken, created_at, updated_at
                     ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        id.clone(),
                        user,
                        stack,
                        date,
                        log.ratings.mood as i64,
                        log.ratings.energy as i64,
                        log.ratings.focus as i64,
                        log.ratings.stress as i64,
                        log.ratings.sleep_quality as i64,
                        log.notes.clone(),
                        log.side_effects.clone(),
                        items_taken,
                        now.clone(),
                        now
                    ],
                )
                .await?;
                id
            }
        };

        let saved = Self::fetch_log(&tx, &id).await?;
        tx.commit().await?;

        saved.ok_or_else(|| StackShareError::Database(format!("Log {} vanished after write", id)))
    }

    async fn get_log(&self, id: LogId) -> Result<Option<DailyLog>> {
        let conn = self.get_conn().await?;
        Self::fetch_log(&conn, &id.to_string()).await
    }

    async fn delete_log(&self, id: LogId) -> Result<()> {
        debug!("Deleting log: {}", id);
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM daily_logs WHERE id = ?", params![id.to_string()])
            .await?;
        Ok(())
    }

    async fn list_user_logs(&self, user: UserId) -> Result<Vec<DailyLog>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM daily_logs WHERE user_id = ? ORDER BY date DESC, created_at DESC",
            LOG_COLUMNS
        );
        let mut rows = conn.query(&sql, params![user.to_string()]).await?;

        let mut logs = Vec::new();
        while let Some(row) = rows.next().await? {
            logs.push(row_to_log(&row)?);
        }
        debug!("Loaded {} logs for user {}", logs.len(), user);
        Ok(logs)
    }

    async fn logs_on_date(&self, user: UserId, date: NaiveDate) -> Result<Vec<DailyLog>> {
        let conn = self.get_conn().await?;
        let sql = format!(
            "SELECT {} FROM daily_logs WHERE user_id = ? AND date = ? ORDER BY created_at",
            LOG_COLUMNS
        );
        let mut rows = conn
            .query(&sql, params![user.to_string(), fmt_date(date)])
            .await?;

        let mut logs = Vec::new();
        while let Some(row) = rows.next().await? {
            logs.push(row_to_log(&row)?);
        }
        Ok(logs)
    }

    async fn stack_log_samples(&self, stack: StackId, since: DateTime<Utc>) -> Result<Vec<StackLogSample>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT user_id, created_at, items_taken FROM daily_logs
                 WHERE stack_id = ? AND created_at >= ?
                 ORDER BY created_at",
                params![stack.to_string(), fmt_ts(since)],
            )
            .await?;

        let mut samples = Vec::new();
        while let Some(row) = rows.next().await? {
            let items_taken: Vec<ItemId> = serde_json::from_str(&row.get::<String>(2)?)?;
            samples.push(StackLogSample {
                user_id: UserId::from_string(&row.get::<String>(0)?)?,
                created_at: parse_ts(&row.get::<String>(1)?)?,
                items_taken: items_taken.len(),
            });
        }
        Ok(samples)
    }

    async fn recent_activity(&self, stack: Option<StackId>, limit: usize) -> Result<Vec<ActivityRow>> {
        let conn = self.get_conn().await?;
        let mut sql = String::from(
            "SELECT l.id, l.created_at, l.notes, p.full_name, s.name
             FROM daily_logs l
             JOIN stacks s ON s.id = l.stack_id
             LEFT JOIN user_profiles p ON p.id = l.user_id
             WHERE s.is_public = 1",
        );
        let mut values = Vec::new();
        if let Some(stack) = stack {
            sql.push_str(" AND l.stack_id = ?");
            values.push(Value::Text(stack.to_string()));
        }
        sql.push_str(" ORDER BY l.created_at DESC LIMIT ?");
        values.push(Value::Integer(limit as i64));

        let mut rows = conn.query(&sql, libsql::params_from_iter(values)).await?;
        let mut activity = Vec::new();
        while let Some(row) = rows.next().await? {
            activity.push(ActivityRow {
                log_id: LogId::from_string(&row.get::<String>(0)?)?,
                created_at: parse_ts(&row.get::<String>(1)?)?,
                notes: row.get(2)?,
                author: row.get(3)?,
                stack_name: row.get(4)?,
            });
        }
        Ok(activity)
    }

    async fn community_stats(&self) -> Result<CommunityStats> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT
                    (SELECT COUNT(*) FROM stacks WHERE is_public = 1),
                    (SELECT COUNT(*) FROM user_profiles),
                    (SELECT COUNT(*) FROM daily_logs)",
                params![],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(CommunityStats {
                stacks: row.get(0)?,
                users: row.get(1)?,
                logs: row.get(2)?,
            }),
            None => Ok(CommunityStats::default()),
        }
    }

    async fn get_active_stack(&self, user: UserId) -> Result<Option<ActiveStack>> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT user_id, stack_id, activated_at FROM active_stacks WHERE user_id = ?",
                params![user.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(ActiveStack {
                user_id: UserId::from_string(&row.get::<String>(0)?)?,
                stack_id: StackId::from_string(&row.get::<String>(1)?)?,
                activated_at: parse_ts(&row.get::<String>(2)?)?,
            })),
            None => Ok(None),
        }
    }

    async fn set_active_stack(&self, user: UserId, stack: StackId, at: DateTime<Utc>) -> Result<ActiveStack> {
        debug!("Activating stack {} for user {}", stack, user);
        let conn = self.get_conn().await?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await?;

        tx.execute(
            "DELETE FROM active_stacks WHERE user_id = ?",
            params![user.to_string()],
        )
        .await?;
        tx.execute(
            "INSERT INTO active_stacks (user_id, stack_id, activated_at) VALUES (?, ?, ?)",
            params![user.to_string(), stack.to_string(), fmt_ts(at)],
        )
        .await?;

        tx.commit().await?;

        self.get_active_stack(user)
            .await?
            .ok_or_else(|| StackShareError::Database("Active stack vanished after write".to_string()))
    }

    async fn clear_active_stack(&self, user: UserId) -> Result<bool> {
        let conn = self.get_conn().await?;
        let removed = conn
            .execute(
                "DELETE FROM active_stacks WHERE user_id = ?",
                params![user.to_string()],
            )
            .await?;
        Ok(removed > 0)
    }

    async fn insert_post(&self, post: &Post) -> Result<()> {
        debug!("Inserting post {} on stack {}", post.id, post.stack_id);
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO stack_posts (id, stack_id, user_id, content, rating, created_date, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                post.id.to_string(),
                post.stack_id.to_string(),
                post.user_id.to_string(),
                post.content.clone(),
                post.rating.map(|r| r as i64),
                fmt_date(post.created_date),
                fmt_ts(post.created_at)
            ],
        )
        .await
        .map_err(|e| map_unique(e, crate::services::community::DUPLICATE_REVIEW_MESSAGE))?;
        Ok(())
    }

    async fn get_post(&self, id: PostId) -> Result<Option<Post>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM stack_posts p WHERE p.id = ?", POST_COLUMNS);
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_post(&row)?)),
            None => Ok(None),
        }
    }

    async fn delete_post(&self, id: PostId) -> Result<()> {
        debug!("Deleting post: {}", id);
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM stack_posts WHERE id = ?", params![id.to_string()])
            .await?;
        Ok(())
    }

    async fn has_review_on(&self, stack: StackId, user: UserId, date: NaiveDate) -> Result<bool> {
        let conn = self.get_conn().await?;
        let mut rows = conn
            .query(
                "SELECT COUNT(*) FROM stack_posts
                 WHERE stack_id = ? AND user_id = ? AND created_date = ? AND rating IS NOT NULL",
                params![stack.to_string(), user.to_string(), fmt_date(date)],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(row.get::<i64>(0)? > 0),
            None => Ok(false),
        }
    }

    async fn list_post_threads(&self, stack: StackId, viewer: Option<UserId>) -> Result<Vec<PostThread>> {
        let conn = self.get_conn().await?;
        let viewer = match viewer {
            Some(v) => Value::Text(v.to_string()),
            None => Value::Null,
        };

        let sql = format!(
            "SELECT {},
                    COALESCE(pr.full_name, pr.username),
                    (SELECT COUNT(*) FROM post_likes pl WHERE pl.post_id = p.id),
                    EXISTS(SELECT 1 FROM post_likes pl WHERE pl.post_id = p.id AND pl.user_id = ?)
             FROM stack_posts p
             LEFT JOIN user_profiles pr ON pr.id = p.user_id
             WHERE p.stack_id = ?
             ORDER BY p.created_at DESC",
            POST_COLUMNS
        );
        let mut rows = conn
            .query(
                &sql,
                libsql::params_from_iter(vec![viewer.clone(), Value::Text(stack.to_string())]),
            )
            .await?;

        let mut threads = Vec::new();
        while let Some(row) = rows.next().await? {
            let author: Option<String> = row.get(7)?;
            threads.push(PostThread {
                post: row_to_post(&row)?,
                author: author.unwrap_or_else(|| "Anonymous".to_string()),
                like_count: row.get(8)?,
                liked: row.get::<i64>(9)? != 0,
                replies: Vec::new(),
            });
        }

        let sql = format!(
            "SELECT {},
                    COALESCE(pr.full_name, pr.username),
                    (SELECT COUNT(*) FROM reply_likes rl WHERE rl.reply_id = r.id),
                    EXISTS(SELECT 1 FROM reply_likes rl WHERE rl.reply_id = r.id AND rl.user_id = ?)
             FROM post_replies r
             JOIN stack_posts p ON p.id = r.post_id
             LEFT JOIN user_profiles pr ON pr.id = r.user_id
             WHERE p.stack_id = ?
             ORDER BY r.created_at",
            REPLY_COLUMNS
        );
        let mut rows = conn
            .query(
                &sql,
                libsql::params_from_iter(vec![viewer, Value::Text(stack.to_string())]),
            )
            .await?;

        let mut replies: HashMap<PostId, Vec<ReplyThread>> = HashMap::new();
        while let Some(row) = rows.next().await? {
            let reply = row_to_reply(&row)?;
            let author: Option<String> = row.get(5)?;
            replies.entry(reply.post_id).or_default().push(ReplyThread {
                reply,
                author: author.unwrap_or_else(|| "Anonymous".to_string()),
                like_count: row.get(6)?,
                liked: row.get::<i64>(7)? != 0,
            });
        }

        for thread in &mut threads {
            thread.replies = replies.remove(&thread.post.id).unwrap_or_default();
        }

        Ok(threads)
    }

    async fn insert_reply(&self, reply: &PostReply) -> Result<()> {
        debug!("Inserting reply {} on post {}", reply.id, reply.post_id);
        let conn = self.get_conn().await?;
        conn.execute(
            "INSERT INTO post_replies (id, post_id, user_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
            params![
                reply.id.to_string(),
                reply.post_id.to_string(),
                reply.user_id.to_string(),
                reply.content.clone(),
                fmt_ts(reply.created_at)
            ],
        )
        .await?;
        Ok(())
    }

    async fn get_reply(&self, id: ReplyId) -> Result<Option<PostReply>> {
        let conn = self.get_conn().await?;
        let sql = format!("SELECT {} FROM post_replies r WHERE r.id = ?", REPLY_COLUMNS);
        let mut rows = conn.query(&sql, params![id.to_string()]).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_reply(&row)?)),
            None => Ok(None),
        }
    }

    async fn delete_reply(&self, id: ReplyId) -> Result<()> {
        debug!("Deleting reply: {}", id);
        let conn = self.get_conn().await?;
        conn.execute("DELETE FROM post_replies WHERE id = ?", params![id.to_string()])
            .await?;
        Ok(())
    }

    async fn toggle_post_like(&self, post: PostId, user: UserId) -> Result<bool> {
        self.toggle_pair("post_likes", "post_id", post.to_string(), user)
            .await
    }

    async fn toggle_reply_like(&self, reply: ReplyId, user: UserId) -> Result<bool> {
        self.toggle_pair("reply_likes", "reply_id", reply.to_string(), user)
            .await
    }
}

async fn insert_stack_row(conn: &Connection, stack: &Stack) -> Result<()> {
    conn.execute(
        "INSERT INTO stacks (
            id, user_id, name, description, purpose, is_public, views, likes,
            original_stack_id, original_author, created_at, updated_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            stack.id.to_string(),
            stack.user_id.to_string(),
            stack.name.clone(),
            stack.description.clone(),
            stack.purpose.clone(),
            stack.is_public as i64,
            stack.views,
            stack.likes,
            stack.original_stack_id.map(|s| s.to_string()),
            stack.original_author.clone(),
            fmt_ts(stack.created_at),
            fmt_ts(stack.updated_at)
        ],
    )
    .await?;
    Ok(())
}

async fn insert_item_row(conn: &Connection, item: &StackItem) -> Result<()> {
    conn.execute(
        "INSERT INTO stack_items (
            id, stack_id, type, name, description, dosage, frequency, timing, image_url, created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            item.id.to_string(),
            item.stack_id.to_string(),
            item.item_type.as_str(),
            item.name.clone(),
            item.description.clone(),
            item.dosage.clone(),
            item.frequency.clone(),
            item.timing.clone(),
            item.image_url.clone(),
            fmt_ts(item.created_at)
        ],
    )
    .await?;
    Ok(())
}
