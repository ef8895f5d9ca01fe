//! Redis-backed stats cache
//!
//! Every `set` goes through `SETEX`, so the TTL countdown restarts on
//! overwrite and Redis expires entries on its own. Connection faults
//! propagate to the caller; they are never downgraded to a cache miss.

use async_trait::async_trait;
use redis::AsyncCommands;

use crate::cache::{StatsCache, DEFAULT_TTL_SECS};
use crate::Result;

/// TTL cache on a Redis instance.
#[derive(Clone, Debug)]
pub struct RedisCache {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisCache {
    /// Connect to Redis with the default TTL.
    pub fn connect(redis_url: &str) -> Result<Self> {
        Self::with_ttl(redis_url, DEFAULT_TTL_SECS)
    }

    /// Connect to Redis with an explicit TTL in seconds.
    pub fn with_ttl(redis_url: &str, ttl_secs: u64) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client, ttl_secs })
    }

    /// Configured TTL in seconds.
    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl StatsCache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.set_ex(key, value, self.ttl_secs).await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
