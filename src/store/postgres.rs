//! PostgreSQL document store for production use.
//!
//! Users and posts are one row each; follow sets and the denormalized post
//! list are `UUID[]` columns. Every update is a single
//! `UPDATE ... WHERE id = $1 [AND status = $2] RETURNING ...` statement, so a
//! filter miss applies nothing and concurrent writers never lose updates.
//!
//! ## Configuration
//!
//! All settings can be configured via environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (required)
//! - `DB_MAX_CONNECTIONS`: Maximum pool size (default: 10)
//! - `DB_MIN_CONNECTIONS`: Minimum idle connections (default: 2)
//! - `DB_CONNECT_TIMEOUT_SECS`: Connection timeout (default: 10)
//! - `DB_IDLE_TIMEOUT_SECS`: Idle connection timeout (default: 300)
//! - `DB_MAX_LIFETIME_SECS`: Max connection lifetime (default: 1800)

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Executor, Row};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

use crate::credentials::HashedPassword;
use crate::types::{Post, PostId, Role, Status, User, UserId};
use super::{PostFilter, PostStore, PostUpdate, StoreError, UserFilter, UserStore, UserUpdate};

/// Schema for the `users` and `posts` collections.
///
/// The partial index keeps titles unique among active posts only.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id            UUID PRIMARY KEY,
    first_name    TEXT NOT NULL,
    last_name     TEXT NOT NULL,
    email         TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL DEFAULT 'user' CHECK (role IN ('user', 'admin')),
    status        TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
    followers     UUID[] NOT NULL DEFAULT '{}',
    followings    UUID[] NOT NULL DEFAULT '{}',
    posts         UUID[] NOT NULL DEFAULT '{}',
    created_at    TIMESTAMPTZ NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL,
    CONSTRAINT users_no_self_follower CHECK (NOT (id = ANY (followers))),
    CONSTRAINT users_no_self_following CHECK (NOT (id = ANY (followings)))
);
CREATE UNIQUE INDEX IF NOT EXISTS users_email_key ON users (email);

CREATE TABLE IF NOT EXISTS posts (
    id          UUID PRIMARY KEY,
    title       TEXT NOT NULL,
    description TEXT NOT NULL,
    body        TEXT NOT NULL,
    image       TEXT NOT NULL,
    author      UUID NOT NULL REFERENCES users (id),
    status      TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'inactive')),
    created_at  TIMESTAMPTZ NOT NULL,
    updated_at  TIMESTAMPTZ NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS posts_active_title_key ON posts (title) WHERE status = 'active';
CREATE INDEX IF NOT EXISTS posts_author_idx ON posts (author);
"#;

const USER_COLUMNS: &str = "id, first_name, last_name, email, password_hash, role, status, \
                            followers, followings, posts, created_at, updated_at";

const POST_COLUMNS: &str = "id, title, description, body, image, author, status, created_at, updated_at";

/// Configuration for PostgreSQL connection pool.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL.
    pub database_url: String,
    /// Maximum connections in pool (default: 10).
    pub max_connections: u32,
    /// Minimum idle connections to keep warm (default: 2).
    pub min_connections: u32,
    /// Connection acquire timeout in seconds (default: 10).
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds (default: 300 = 5 min).
    pub idle_timeout_secs: u64,
    /// Maximum connection lifetime in seconds (default: 1800 = 30 min).
    pub max_lifetime_secs: u64,
}

impl PostgresConfig {
    /// Load configuration from environment variables with production defaults.
    pub fn from_env() -> Self {
        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/authorship".to_string()),
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            connect_timeout_secs: std::env::var("DB_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            idle_timeout_secs: std::env::var("DB_IDLE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            max_lifetime_secs: std::env::var("DB_MAX_LIFETIME_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1800),
        }
    }
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

/// Pool statistics for monitoring.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PoolStats {
    /// Current pool size.
    pub size: u32,
    /// Number of idle connections.
    pub idle: usize,
    /// Maximum pool size.
    pub max: u32,
}

/// Error type for PostgreSQL store setup.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Map a unique-violation constraint name to the field it protects.
fn constraint_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some("users_email_key") => "email",
        Some("posts_active_title_key") => "title",
        _ => "id",
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            // 23505 = unique_violation
            if db.code().as_deref() == Some("23505") {
                return Self::DuplicateKey(constraint_field(db.constraint()).to_string());
            }
        }
        Self::Backend(e.to_string())
    }
}

/// A value bound into a dynamically built UPDATE.
#[derive(Debug, Clone)]
enum Bind {
    Text(String),
    Id(Uuid),
    Time(DateTime<Utc>),
}

/// Builds `SET col = expr, ...` where several updates to one column compose.
///
/// Placeholder numbering starts after the WHERE-clause parameters.
#[derive(Debug)]
struct SetBuilder {
    columns: BTreeMap<&'static str, String>,
    binds: Vec<Bind>,
    first_placeholder: usize,
}

impl SetBuilder {
    fn new(first_placeholder: usize) -> Self {
        Self {
            columns: BTreeMap::new(),
            binds: Vec::new(),
            first_placeholder,
        }
    }

    /// Register a bind value and return its `$n` placeholder.
    fn bind(&mut self, value: Bind) -> String {
        self.binds.push(value);
        format!("${}", self.first_placeholder + self.binds.len() - 1)
    }

    /// Current expression for `column` (the column itself when untouched).
    fn current(&self, column: &'static str) -> String {
        self.columns
            .get(column)
            .cloned()
            .unwrap_or_else(|| column.to_string())
    }

    fn set(&mut self, column: &'static str, expr: String) {
        self.columns.insert(column, expr);
    }

    fn assign(&mut self, column: &'static str, value: Bind) {
        let placeholder = self.bind(value);
        self.set(column, placeholder);
    }

    /// Set-union `id` into an array column, never adding the row's own id.
    fn array_add(&mut self, column: &'static str, id: Uuid) {
        let current = self.current(column);
        let p = self.bind(Bind::Id(id));
        self.set(
            column,
            format!("CASE WHEN {p} = ANY ({current}) OR {p} = id THEN {current} ELSE array_append({current}, {p}) END"),
        );
    }

    /// Set-difference `id` out of an array column.
    fn array_remove(&mut self, column: &'static str, id: Uuid) {
        let current = self.current(column);
        let p = self.bind(Bind::Id(id));
        self.set(column, format!("array_remove({current}, {p})"));
    }

    fn clause(&self) -> String {
        self.columns
            .iter()
            .map(|(column, expr)| format!("{column} = {expr}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn bind_all<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    binds: &'q [Bind],
) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments> {
    for bind in binds {
        query = match bind {
            Bind::Text(v) => query.bind(v.as_str()),
            Bind::Id(v) => query.bind(*v),
            Bind::Time(v) => query.bind(*v),
        };
    }
    query
}

/// PostgreSQL document store.
///
/// Uses connection pooling with production-tuned settings.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new store with the given configuration.
    pub async fn new(config: PostgresConfig) -> Result<Self, PostgresError> {
        tracing::info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            connect_timeout_secs = config.connect_timeout_secs,
            idle_timeout_secs = config.idle_timeout_secs,
            max_lifetime_secs = config.max_lifetime_secs,
            "Initializing PostgreSQL connection pool"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store from environment variables.
    pub async fn from_env() -> Result<Self, PostgresError> {
        Self::new(PostgresConfig::from_env()).await
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if they do not exist.
    pub async fn migrate(&self) -> Result<(), PostgresError> {
        // Simple-query protocol: several statements in one round trip.
        self.pool.execute(SCHEMA).await?;
        tracing::info!("Schema ensured");
        Ok(())
    }

    /// Get the connection pool for health checks.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check if the database is reachable.
    pub async fn is_healthy(&self) -> bool {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    /// Get pool statistics for monitoring.
    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            size: self.pool.size(),
            idle: self.pool.num_idle(),
            max: self.pool.options().get_max_connections(),
        }
    }

    /// Parse a user from a database row.
    fn parse_user_row(row: &PgRow) -> Result<User, StoreError> {
        let role: String = row.try_get("role")?;
        let status: String = row.try_get("status")?;
        let followers: Vec<Uuid> = row.try_get("followers")?;
        let followings: Vec<Uuid> = row.try_get("followings")?;
        let posts: Vec<Uuid> = row.try_get("posts")?;
        let password_hash: String = row.try_get("password_hash")?;

        Ok(User {
            id: UserId::new(row.try_get("id")?),
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            email: row.try_get("email")?,
            password_hash: HashedPassword::from_phc(password_hash),
            role: Role::from_str(&role)
                .ok_or_else(|| StoreError::Backend(format!("unknown role in users row: {role}")))?,
            status: Status::from_str(&status)
                .ok_or_else(|| StoreError::Backend(format!("unknown status in users row: {status}")))?,
            followers: followers.into_iter().map(UserId::new).collect(),
            followings: followings.into_iter().map(UserId::new).collect(),
            posts: posts.into_iter().map(PostId::new).collect(),
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    /// Parse a post from a database row.
    fn parse_post_row(row: &PgRow) -> Result<Post, StoreError> {
        let status: String = row.try_get("status")?;

        Ok(Post {
            id: PostId::new(row.try_get("id")?),
            title: row.try_get("title")?,
            description: row.try_get("description")?,
            body: row.try_get("body")?,
            image: row.try_get("image")?,
            author: UserId::new(row.try_get("author")?),
            status: Status::from_str(&status)
                .ok_or_else(|| StoreError::Backend(format!("unknown status in posts row: {status}")))?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let followers: Vec<Uuid> = user.followers.iter().map(|id| id.as_uuid()).collect();
        let followings: Vec<Uuid> = user.followings.iter().map(|id| id.as_uuid()).collect();
        let posts: Vec<Uuid> = user.posts.iter().map(|id| id.as_uuid()).collect();

        let row = sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user.id.as_uuid())
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.email)
        .bind(user.password_hash.as_str())
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(&followers)
        .bind(&followings)
        .bind(&posts)
        .bind(user.created_at)
        .bind(user.updated_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(user_id = %user.id, "user inserted");
        Self::parse_user_row(&row)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::parse_user_row).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::parse_user_row).transpose()
    }

    async fn list_users(&self, status: Status) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE status = $1 ORDER BY created_at, id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_user_row).collect()
    }

    async fn update_user(
        &self,
        filter: UserFilter,
        updates: &[UserUpdate],
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        // $1 = id, $2 = required status (NULL matches any)
        let mut set = SetBuilder::new(3);
        for update in updates {
            match update {
                UserUpdate::SetFirstName(v) => set.assign("first_name", Bind::Text(v.clone())),
                UserUpdate::SetLastName(v) => set.assign("last_name", Bind::Text(v.clone())),
                UserUpdate::SetEmail(v) => set.assign("email", Bind::Text(v.clone())),
                UserUpdate::SetPasswordHash(v) => {
                    set.assign("password_hash", Bind::Text(v.as_str().to_string()))
                }
                UserUpdate::SetRole(v) => set.assign("role", Bind::Text(v.as_str().to_string())),
                UserUpdate::SetStatus(v) => set.assign("status", Bind::Text(v.as_str().to_string())),
                UserUpdate::AddFollower(id) => set.array_add("followers", id.as_uuid()),
                UserUpdate::RemoveFollower(id) => set.array_remove("followers", id.as_uuid()),
                UserUpdate::AddFollowing(id) => set.array_add("followings", id.as_uuid()),
                UserUpdate::RemoveFollowing(id) => set.array_remove("followings", id.as_uuid()),
                UserUpdate::AddPost(id) => set.array_add("posts", id.as_uuid()),
            }
        }
        set.assign("updated_at", Bind::Time(now));

        let sql = format!(
            "UPDATE users SET {} WHERE id = $1 AND ($2::TEXT IS NULL OR status = $2) RETURNING {USER_COLUMNS}",
            set.clause()
        );
        let query = sqlx::query(&sql)
            .bind(filter.id.as_uuid())
            .bind(filter.status.map(|s| s.as_str()));
        let row = bind_all(query, &set.binds).fetch_optional(&self.pool).await?;

        tracing::trace!(user_id = %filter.id, updates = updates.len(), matched = row.is_some(), "user update");
        row.as_ref().map(Self::parse_user_row).transpose()
    }
}

#[async_trait]
impl PostStore for PostgresStore {
    async fn insert_post(&self, post: Post) -> Result<Post, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO posts ({POST_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {POST_COLUMNS}"
        ))
        .bind(post.id.as_uuid())
        .bind(&post.title)
        .bind(&post.description)
        .bind(&post.body)
        .bind(&post.image)
        .bind(post.author.as_uuid())
        .bind(post.status.as_str())
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(post_id = %post.id, author = %post.author, "post inserted");
        Self::parse_post_row(&row)
    }

    async fn find_post(&self, id: PostId) -> Result<Option<Post>, StoreError> {
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::parse_post_row).transpose()
    }

    async fn list_posts(&self, status: Status) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE status = $1 ORDER BY created_at, id"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_post_row).collect()
    }

    async fn list_posts_by_author(&self, author: UserId, status: Status) -> Result<Vec<Post>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE author = $1 AND status = $2 ORDER BY created_at, id"
        ))
        .bind(author.as_uuid())
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::parse_post_row).collect()
    }

    async fn update_post(
        &self,
        filter: PostFilter,
        updates: &[PostUpdate],
        now: DateTime<Utc>,
    ) -> Result<Option<Post>, StoreError> {
        let mut set = SetBuilder::new(3);
        for update in updates {
            match update {
                PostUpdate::SetDescription(v) => set.assign("description", Bind::Text(v.clone())),
                PostUpdate::SetBody(v) => set.assign("body", Bind::Text(v.clone())),
                PostUpdate::SetImage(v) => set.assign("image", Bind::Text(v.clone())),
                PostUpdate::SetStatus(v) => set.assign("status", Bind::Text(v.as_str().to_string())),
            }
        }
        set.assign("updated_at", Bind::Time(now));

        let sql = format!(
            "UPDATE posts SET {} WHERE id = $1 AND ($2::TEXT IS NULL OR status = $2) RETURNING {POST_COLUMNS}",
            set.clause()
        );
        let query = sqlx::query(&sql)
            .bind(filter.id.as_uuid())
            .bind(filter.status.map(|s| s.as_str()));
        let row = bind_all(query, &set.binds).fetch_optional(&self.pool).await?;

        tracing::trace!(post_id = %filter.id, updates = updates.len(), matched = row.is_some(), "post update");
        row.as_ref().map(Self::parse_post_row).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_builder_composes_updates_to_one_column() {
        let mut set = SetBuilder::new(3);
        set.array_add("followers", Uuid::from_u128(1));
        set.array_remove("followers", Uuid::from_u128(2));
        set.assign("updated_at", Bind::Time(Utc::now()));

        let clause = set.clause();
        assert_eq!(clause.matches("followers =").count(), 1);
        assert!(clause.starts_with("followers = array_remove(CASE WHEN $3 = ANY (followers)"));
        assert!(clause.ends_with("updated_at = $5"));
        assert_eq!(set.binds.len(), 3);
    }

    #[test]
    fn test_constraint_field_mapping() {
        assert_eq!(constraint_field(Some("users_email_key")), "email");
        assert_eq!(constraint_field(Some("posts_active_title_key")), "title");
        assert_eq!(constraint_field(None), "id");
    }
}
