//! Server configuration, loaded from the environment

use crate::storage::RetryPolicy;
use ::config::{ConfigError, Environment};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
/// Passwordless, so a server requiring authentication rejects it. Deployments
/// set `DATABASE_URL` with credentials.
pub const DEFAULT_DATABASE_URL: &str =
    "postgres://postgres@postgres-user:5432/postgres?sslmode=disable";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// `BIND_ADDRESS`
    pub bind_address: String,
    /// `DATABASE_URL`, `postgres://...` or `sqlite:...`
    pub database_url: String,
    /// `DB_CONNECT_RETRIES`
    pub db_connect_retries: u32,
    /// `DB_RETRY_INTERVAL_SECS`
    pub db_retry_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_environment(Environment::default())
    }

    fn from_environment(env: Environment) -> Result<Self, ConfigError> {
        let config: Config = ::config::Config::builder()
            .set_default("bind_address", DEFAULT_BIND_ADDRESS)?
            .set_default("database_url", DEFAULT_DATABASE_URL)?
            .set_default("db_connect_retries", 5)?
            .set_default("db_retry_interval_secs", 5)?
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize()?;

        if config.db_connect_retries == 0 {
            return Err(ConfigError::Message(
                "DB_CONNECT_RETRIES must be at least 1".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.bind_address.parse()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.db_connect_retries,
            Duration::from_secs(self.db_retry_interval_secs),
        )
    }

    /// True when `DATABASE_URL` was not set and the passwordless default is used
    pub fn uses_default_database_url(&self) -> bool {
        self.database_url == DEFAULT_DATABASE_URL
    }

    /// Database URL with any password masked, for logging
    pub fn redacted_database_url(&self) -> String {
        let Some((scheme, rest)) = self.database_url.split_once("://") else {
            return self.database_url.clone();
        };
        let Some((credentials, host)) = rest.rsplit_once('@') else {
            return self.database_url.clone();
        };
        match credentials.split_once(':') {
            Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
            None => self.database_url.clone(),
        }
    }
}
