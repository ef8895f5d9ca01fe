//! Runtime configuration from environment variables
//!
//! Loaded once at process start (`.env` supported via dotenvy in the CLI).
//! Malformed values are rejected instead of silently replaced with
//! defaults, so a typo in CACHE_TTL fails fast.

use std::env;

use crate::cache::DEFAULT_TTL_SECS;
use crate::stats::DEFAULT_TOP_USERS;
use crate::{Error, Result};

/// Default Redis endpoint for the stats cache.
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Resolved runtime configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// MySQL connection URL for the message store.
    pub database_url: String,
    /// Redis connection URL for the stats cache.
    pub redis_url: String,
    /// Cache TTL in seconds.
    pub cache_ttl_secs: u64,
    /// How many users `chat_stats` ranks.
    pub top_users_limit: u32,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: database_url_from_env()?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_REDIS_URL.to_string()),
            cache_ttl_secs: parse_u64("CACHE_TTL", env::var("CACHE_TTL").ok(), DEFAULT_TTL_SECS)?,
            top_users_limit: parse_u32(
                "TOP_USERS_LIMIT",
                env::var("TOP_USERS_LIMIT").ok(),
                DEFAULT_TOP_USERS,
            )?,
        })
    }
}

/// `DATABASE_URL` wins; otherwise the URL is assembled from `MYSQL_*` parts
/// with only the password being mandatory.
fn database_url_from_env() -> Result<String> {
    if let Ok(url) = env::var("DATABASE_URL") {
        return Ok(url);
    }

    let host = env::var("MYSQL_HOST").unwrap_or_else(|_| "localhost".to_string());
    let port = env::var("MYSQL_PORT").unwrap_or_else(|_| "3306".to_string());
    let db = env::var("MYSQL_DATABASE").unwrap_or_else(|_| "tg_chat_stats".to_string());
    let user = env::var("MYSQL_USER").unwrap_or_else(|_| "tg_chat_stats".to_string());
    let password = env::var("MYSQL_PASSWORD").map_err(|_| {
        Error::ConfigError("set DATABASE_URL or MYSQL_PASSWORD".to_string())
    })?;

    Ok(format!(
        "mysql://{}:{}@{}:{}/{}",
        user, password, host, port, db
    ))
}

fn parse_u64(name: &str, raw: Option<String>, default: u64) -> Result<u64> {
    match raw {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| Error::ConfigError(format!("invalid {}: {}", name, s))),
    }
}

fn parse_u32(name: &str, raw: Option<String>, default: u32) -> Result<u32> {
    match raw {
        None => Ok(default),
        Some(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| Error::ConfigError(format!("invalid {}: {}", name, s))),
    }
}
