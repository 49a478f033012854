//! SQLite backend (embedded, no external dependencies)

use super::{Result, RetryPolicy, StorageError, UserRow, UserStore};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use user_types::User;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str, policy: &RetryPolicy) -> Result<Self> {
        tracing::info!("Opening SQLite database at: {}", database_url);

        let in_memory = is_in_memory(database_url);
        let mut options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        if !in_memory {
            if let Some(parent) = database_file(database_url).as_deref().and_then(Path::parent) {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| StorageError::Database(sqlx::Error::Io(e)))?;
            }
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        let pool = policy
            .run("open the SQLite database", || {
                let options = options.clone();
                async move {
                    let pool = pool_options(in_memory).connect_with(options).await?;
                    sqlx::query("SELECT 1").execute(&pool).await?;
                    Ok::<_, StorageError>(pool)
                }
            })
            .await?;

        tracing::info!("SQLite connection established");
        Ok(Self { pool })
    }

    /// Create the users table if it does not exist yet
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                sub VARCHAR(255) PRIMARY KEY
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn database_file(database_url: &str) -> Option<PathBuf> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))?;
    let path = path.split('?').next().unwrap_or(path);
    Some(PathBuf::from(path))
}

fn pool_options(in_memory: bool) -> SqlitePoolOptions {
    if in_memory {
        // An in-memory database lives only as long as its connection
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
    } else {
        SqlitePoolOptions::new().max_connections(5)
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn create_user(&self, user: &User) -> Result<String> {
        sqlx::query(
            r#"
            INSERT INTO users (sub) VALUES (?1)
            "#,
        )
        .bind(&user.sub)
        .execute(&self.pool)
        .await?;

        Ok(user.sub.clone())
    }

    async fn get_user(&self, sub: &str) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT sub FROM users WHERE sub = ?1
            "#,
        )
        .bind(sub)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::from).ok_or(StorageError::NotFound)
    }

    async fn get_users(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(
            r#"
            SELECT sub FROM users
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn update_user(&self, sub: &str, _users: &[User]) -> Result<User> {
        tracing::debug!("Rejecting update for user {}", sub);
        Err(StorageError::NotImplemented)
    }

    async fn delete_user(&self, sub: &str) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            DELETE FROM users WHERE sub = ?1 RETURNING sub
            "#,
        )
        .bind(sub)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::from).ok_or(StorageError::NotFound)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
