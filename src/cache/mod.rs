//! Stats cache contract and key construction
//!
//! A pure TTL cache in front of the aggregation queries. Values are JSON
//! strings; a stored JSON `null` is a present entry (cached absence), so a
//! miss and a cached empty result stay distinguishable.

pub mod memory;
pub mod redis;

use async_trait::async_trait;

use crate::{Result, TimeFilter};

pub use self::memory::MemoryCache;
pub use self::redis::RedisCache;

/// Default time-to-live for cached stats, in seconds (20 minutes).
pub const DEFAULT_TTL_SECS: u64 = 1200;

/// Key-value cache with a fixed TTL applied on every `set`.
///
/// `get` returning `None` means "never stored or expired" — the two are
/// indistinguishable by design. Faults are faults: an unreachable cache
/// backend surfaces as an error, never as a miss.
#[async_trait]
pub trait StatsCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, resetting the TTL countdown. Last write wins.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Drop `key` early; no-op when absent.
    async fn del(&self, key: &str) -> Result<()>;
}

/// Deterministic cache keys: a stable prefix per query kind plus the full
/// ordered argument tuple. Identical logical arguments always produce the
/// same key; any differing argument produces a different key.
pub mod keys {
    use super::TimeFilter;

    pub fn chat_stats(chat_id: i64, filter: TimeFilter) -> String {
        format!("stats:{}:{}", chat_id, filter.as_str())
    }

    pub fn user_stats(chat_id: i64, telegram_user_id: i64, filter: TimeFilter) -> String {
        format!("user_stats:{}:{}:{}", chat_id, telegram_user_id, filter.as_str())
    }

    pub fn chat_activity(chat_id: i64, filter: TimeFilter) -> String {
        format!("activity:chat:{}:{}", chat_id, filter.as_str())
    }

    pub fn user_activity(chat_id: i64, telegram_user_id: i64, filter: TimeFilter) -> String {
        format!(
            "activity:user:{}:{}:{}",
            chat_id,
            telegram_user_id,
            filter.as_str()
        )
    }

    pub fn users_page(chat_id: i64, filter: TimeFilter, page_size: u32, offset: u32) -> String {
        format!(
            "users_page:{}:{}:{}:{}",
            chat_id,
            filter.as_str(),
            page_size,
            offset
        )
    }
}
