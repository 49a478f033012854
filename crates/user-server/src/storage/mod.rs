//! Storage layer
//!
//! PostgreSQL is the deployed backend. SQLite (embedded) is used for local
//! runs and tests. Both sit behind [`UserStore`] and are picked by URL scheme.

pub mod postgres;
pub mod retry;
pub mod sqlite;

pub use postgres::PostgresStore;
pub use retry::RetryPolicy;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use user_types::User;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("database unreachable: {0}")]
    Connectivity(sqlx::Error),

    #[error("user not found")]
    NotFound,

    #[error("{0}")]
    ConstraintViolation(String),

    #[error("update user is not implemented")]
    NotImplemented,

    #[error(transparent)]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StorageError::ConstraintViolation(db.message().to_string())
            }
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => StorageError::Connectivity(e),
            sqlx::Error::RowNotFound => StorageError::NotFound,
            _ => StorageError::Database(e),
        }
    }
}

/// User store
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Insert a user, returning its `sub`.
    async fn create_user(&self, user: &User) -> Result<String>;
    async fn get_user(&self, sub: &str) -> Result<User>;
    /// All users, in no particular order.
    async fn get_users(&self) -> Result<Vec<User>>;
    /// Always fails with [`StorageError::NotImplemented`].
    async fn update_user(&self, sub: &str, users: &[User]) -> Result<User>;
    /// Delete a user, returning the record as it was before deletion.
    async fn delete_user(&self, sub: &str) -> Result<User>;
    async fn ping(&self) -> Result<()>;
}

/// Open the store named by `database_url` and make sure the schema exists.
///
/// `sqlite:` URLs open the embedded backend, everything else is handed to
/// PostgreSQL.
pub async fn connect(database_url: &str, policy: &RetryPolicy) -> Result<Arc<dyn UserStore>> {
    if database_url.starts_with("sqlite:") {
        let store = SqliteStore::connect(database_url, policy).await?;
        store.init().await?;
        Ok(Arc::new(store))
    } else {
        let store = PostgresStore::connect(database_url, policy).await?;
        store.init().await?;
        Ok(Arc::new(store))
    }
}

// Helper struct for sqlx query_as
#[derive(sqlx::FromRow)]
pub(crate) struct UserRow {
    sub: String,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User { sub: r.sub }
    }
}
