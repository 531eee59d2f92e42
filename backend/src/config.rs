use std::env;
use std::time::Duration;

use crate::services::{AssignmentPolicy, SelfReview};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,
    /// Maximum database connections in pool
    pub database_max_connections: u32,
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Deadline for one create/reassign/merge in milliseconds (0 disables)
    pub assignment_timeout_ms: u64,
    /// Postgres lock_timeout for row-lock waits in milliseconds (0 disables)
    pub lock_timeout_ms: u64,
    /// Fixed seed for reviewer selection; entropy when unset
    pub reviewer_selection_seed: Option<u64>,
    /// Whether the author may review their own pull request
    pub self_review: SelfReview,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url =
            lookup("DATABASE_URL").ok_or(ConfigError::MissingEnvVar("DATABASE_URL"))?;

        let database_max_connections = lookup("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("DATABASE_MAX_CONNECTIONS"))?;

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PORT"))?;

        let assignment_timeout_ms = lookup("ASSIGNMENT_TIMEOUT_MS")
            .unwrap_or_else(|| "5000".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("ASSIGNMENT_TIMEOUT_MS"))?;

        let lock_timeout_ms = lookup("LOCK_TIMEOUT_MS")
            .unwrap_or_else(|| "0".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("LOCK_TIMEOUT_MS"))?;

        let reviewer_selection_seed = lookup("REVIEWER_SELECTION_SEED")
            .map(|raw| raw.parse())
            .transpose()
            .map_err(|_| ConfigError::InvalidValue("REVIEWER_SELECTION_SEED"))?;

        let self_review = match lookup("SELF_REVIEW") {
            Some(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SELF_REVIEW"))?,
            None => SelfReview::default(),
        };

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            assignment_timeout_ms,
            lock_timeout_ms,
            reviewer_selection_seed,
            self_review,
        })
    }

    pub fn assignment_policy(&self) -> AssignmentPolicy {
        AssignmentPolicy {
            self_review: self.self_review,
            deadline: millis(self.assignment_timeout_ms),
        }
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        millis(self.lock_timeout_ms)
    }
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}
