//! PostgreSQL backend

use super::{Result, RetryPolicy, StorageError, UserRow, UserStore};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use user_types::User;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str, policy: &RetryPolicy) -> Result<Self> {
        tracing::info!("Connecting to PostgreSQL...");

        let pool = policy
            .run("connect to PostgreSQL", || async move {
                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(Duration::from_secs(5))
                    .connect(database_url)
                    .await?;
                sqlx::query("SELECT 1").execute(&pool).await?;
                Ok::<_, StorageError>(pool)
            })
            .await?;

        tracing::info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create the users table if it does not exist yet
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS "users" (
                sub VARCHAR(255) PRIMARY KEY
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    async fn create_user(&self, user: &User) -> Result<String> {
        sqlx::query(
            r#"
            INSERT INTO "users" (sub) VALUES ($1)
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
            SELECT sub FROM "users" WHERE sub = $1
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
            SELECT sub FROM "users"
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
        // Single statement, so a concurrent delete of the same id sees NotFound
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            DELETE FROM "users" WHERE sub = $1 RETURNING sub
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
