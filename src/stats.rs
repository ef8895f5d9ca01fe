//! Cached chat statistics service
//!
//! Composes the message store and the stats cache: every request is keyed
//! by its full argument tuple, answered from the cache when possible and
//! recomputed from the store otherwise. Inserting messages never evicts
//! anything; staleness is bounded only by the cache TTL.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cache::{keys, StatsCache};
use crate::metrics;
use crate::store::MessageStore;
use crate::types::{ChatStats, MostActiveWeekday, TopUser, UserProfile, UserStats};
use crate::{Error, Result, TimeFilter};

/// Default number of users in `ChatStats::top_users`.
pub const DEFAULT_TOP_USERS: u32 = 10;

/// Statistics front-end over an injected store and cache.
#[derive(Clone)]
pub struct StatsService {
    store: Arc<dyn MessageStore>,
    cache: Arc<dyn StatsCache>,
    top_limit: u32,
}

impl StatsService {
    pub fn new(store: Arc<dyn MessageStore>, cache: Arc<dyn StatsCache>) -> Self {
        Self {
            store,
            cache,
            top_limit: DEFAULT_TOP_USERS,
        }
    }

    /// Override how many users `chat_stats` ranks.
    pub fn with_top_limit(mut self, top_limit: u32) -> Self {
        self.top_limit = top_limit;
        self
    }

    /// Aggregated stats for a chat: top users, total messages, distinct users.
    pub async fn chat_stats(&self, chat_id: i64, filter: TimeFilter) -> Result<ChatStats> {
        let key = keys::chat_stats(chat_id, filter);
        if let Some(stats) = self.cached::<ChatStats>("chat_stats", &key).await? {
            return Ok(stats);
        }

        let start = Instant::now();
        let result = self.compute_chat_stats(chat_id, filter).await;
        metrics::record_query("chat_stats", start.elapsed(), result.is_ok());
        let stats = result?;

        self.store_cached(&key, &stats).await?;
        Ok(stats)
    }

    /// One user's message count and dense rank in a chat.
    ///
    /// A user the store has never seen yields count 0 / rank 0 with a bare
    /// profile; absence of data is not a fault.
    pub async fn user_stats(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        filter: TimeFilter,
    ) -> Result<UserStats> {
        let key = keys::user_stats(chat_id, telegram_user_id, filter);
        if let Some(stats) = self.cached::<UserStats>("user_stats", &key).await? {
            return Ok(stats);
        }

        let start = Instant::now();
        let result = self
            .compute_user_stats(chat_id, telegram_user_id, filter)
            .await;
        metrics::record_query("user_stats", start.elapsed(), result.is_ok());
        let stats = result?;

        self.store_cached(&key, &stats).await?;
        Ok(stats)
    }

    /// One page of the full per-chat ranking; ordering matches `chat_stats`.
    pub async fn users_page(
        &self,
        chat_id: i64,
        filter: TimeFilter,
        page_size: u32,
        offset: u32,
    ) -> Result<Vec<TopUser>> {
        if page_size == 0 {
            return Err(Error::InvalidArgument(
                "page_size must be at least 1".to_string(),
            ));
        }

        let key = keys::users_page(chat_id, filter, page_size, offset);
        if let Some(page) = self.cached::<Vec<TopUser>>("users_page", &key).await? {
            return Ok(page);
        }

        let start = Instant::now();
        let result = self
            .store
            .users_page(chat_id, filter, page_size, offset)
            .await;
        metrics::record_query("users_page", start.elapsed(), result.is_ok());
        let page = result?;

        self.store_cached(&key, &page).await?;
        Ok(page)
    }

    /// Busiest weekday of a chat; `None` for an empty scope.
    ///
    /// The absence result is cached too: a stored JSON `null` is a hit, so
    /// an empty chat does not hit the store on every call.
    pub async fn most_active_weekday_for_chat(
        &self,
        chat_id: i64,
        filter: TimeFilter,
    ) -> Result<Option<MostActiveWeekday>> {
        let key = keys::chat_activity(chat_id, filter);
        if let Some(cached) = self
            .cached::<Option<MostActiveWeekday>>("chat_activity", &key)
            .await?
        {
            return Ok(cached);
        }

        let start = Instant::now();
        let result = self.store.most_active_weekday_for_chat(chat_id, filter).await;
        metrics::record_query("chat_activity", start.elapsed(), result.is_ok());
        let weekday = result?;

        self.store_cached(&key, &weekday).await?;
        Ok(weekday)
    }

    /// Busiest weekday of one user in a chat; `None` for an empty scope.
    pub async fn most_active_weekday_for_user(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        filter: TimeFilter,
    ) -> Result<Option<MostActiveWeekday>> {
        let key = keys::user_activity(chat_id, telegram_user_id, filter);
        if let Some(cached) = self
            .cached::<Option<MostActiveWeekday>>("user_activity", &key)
            .await?
        {
            return Ok(cached);
        }

        let start = Instant::now();
        let result = self
            .store
            .most_active_weekday_for_user(chat_id, telegram_user_id, filter)
            .await;
        metrics::record_query("user_activity", start.elapsed(), result.is_ok());
        let weekday = result?;

        self.store_cached(&key, &weekday).await?;
        Ok(weekday)
    }

    /// Drop the cached chat stats entry before its TTL runs out.
    pub async fn evict_chat_stats(&self, chat_id: i64, filter: TimeFilter) -> Result<()> {
        self.cache.del(&keys::chat_stats(chat_id, filter)).await
    }

    /// Drop the cached user stats entry before its TTL runs out.
    pub async fn evict_user_stats(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        filter: TimeFilter,
    ) -> Result<()> {
        self.cache
            .del(&keys::user_stats(chat_id, telegram_user_id, filter))
            .await
    }

    async fn compute_chat_stats(&self, chat_id: i64, filter: TimeFilter) -> Result<ChatStats> {
        // Three independent reads; none mutates anything, so their relative
        // order does not matter. Each sees the store's own read isolation.
        let top_users = self.store.top_users(chat_id, filter, self.top_limit).await?;
        let total_messages = self.store.total_message_count(chat_id, filter).await?;
        let total_users = self.store.unique_user_count(chat_id, filter).await?;

        Ok(ChatStats {
            top_users,
            total_messages,
            total_users,
        })
    }

    async fn compute_user_stats(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        filter: TimeFilter,
    ) -> Result<UserStats> {
        let user = self
            .store
            .find_user(telegram_user_id)
            .await?
            .unwrap_or_else(|| UserProfile::unknown(telegram_user_id));

        let message_count = self
            .store
            .user_message_count(chat_id, telegram_user_id, filter)
            .await?;
        let rank = self
            .store
            .user_rank(chat_id, telegram_user_id, filter)
            .await?;

        Ok(UserStats {
            user,
            message_count,
            rank,
        })
    }

    /// Decode a cached JSON payload. A cache fault propagates here — it is
    /// deliberately not treated as a miss.
    async fn cached<T: DeserializeOwned>(
        &self,
        kind: &'static str,
        key: &str,
    ) -> Result<Option<T>> {
        match self.cache.get(key).await? {
            Some(raw) => {
                metrics::record_cache_lookup(kind, true);
                debug!(key, "stats cache hit");
                Ok(Some(serde_json::from_str(&raw)?))
            }
            None => {
                metrics::record_cache_lookup(kind, false);
                Ok(None)
            }
        }
    }

    async fn store_cached<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.cache.set(key, &raw).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::store::MemoryStore;
    use crate::types::{NewChat, NewUser};
    use async_trait::async_trait;
    use chrono::Utc;

    /// Cache that fails every operation; used to assert fault propagation.
    struct BrokenCache;

    #[async_trait]
    impl StatsCache for BrokenCache {
        async fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(Error::CacheError("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<()> {
            Err(Error::CacheError("connection refused".to_string()))
        }

        async fn del(&self, _key: &str) -> Result<()> {
            Err(Error::CacheError("connection refused".to_string()))
        }
    }

    async fn seeded_store() -> (Arc<MemoryStore>, i64) {
        let store = Arc::new(MemoryStore::new());
        let chat = store
            .upsert_chat(&NewChat {
                telegram_id: 500,
                title: Some("group".to_string()),
            })
            .await
            .unwrap();

        for (telegram_id, name, count) in [(11i64, "a", 5usize), (22, "b", 5), (33, "c", 2)] {
            let user_internal = store
                .upsert_user(&NewUser {
                    telegram_id,
                    username: Some(name.to_string()),
                    first_name: None,
                })
                .await
                .unwrap();
            for _ in 0..count {
                store.insert_message_at(chat, user_internal, Some("hi"), Utc::now());
            }
        }

        (store, chat)
    }

    fn service(store: Arc<MemoryStore>, cache: Arc<dyn StatsCache>) -> StatsService {
        StatsService::new(store, cache)
    }

    #[tokio::test]
    async fn chat_stats_scenario_with_ties() {
        let (store, chat) = seeded_store().await;
        let svc = service(store, Arc::new(MemoryCache::new()));

        let stats = svc.chat_stats(chat, TimeFilter::Today).await.unwrap();
        assert_eq!(stats.total_messages, 12);
        assert_eq!(stats.total_users, 3);

        let ids: Vec<i64> = stats.top_users.iter().map(|u| u.telegram_id).collect();
        assert_eq!(ids, vec![11, 22, 33]);

        let a = svc.user_stats(chat, 11, TimeFilter::Today).await.unwrap();
        let b = svc.user_stats(chat, 22, TimeFilter::Today).await.unwrap();
        let c = svc.user_stats(chat, 33, TimeFilter::Today).await.unwrap();
        assert_eq!(a.rank, 1);
        assert_eq!(b.rank, 1);
        assert_eq!(c.rank, 3);
        assert_eq!(c.message_count, 2);
    }

    #[tokio::test]
    async fn chat_stats_prefers_cached_value() {
        let (store, chat) = seeded_store().await;
        let cache = Arc::new(MemoryCache::new());

        let canned = ChatStats {
            top_users: vec![],
            total_messages: 99,
            total_users: 7,
        };
        cache
            .set(
                &keys::chat_stats(chat, TimeFilter::All),
                &serde_json::to_string(&canned).unwrap(),
            )
            .await
            .unwrap();

        let svc = service(store, cache);
        let stats = svc.chat_stats(chat, TimeFilter::All).await.unwrap();

        // The canned value wins: the store was never consulted.
        assert_eq!(stats, canned);
    }

    #[tokio::test]
    async fn stale_cache_entry_survives_new_writes_until_ttl() {
        let (store, chat) = seeded_store().await;
        let svc = service(store.clone(), Arc::new(MemoryCache::new()));

        let before = svc.chat_stats(chat, TimeFilter::All).await.unwrap();
        store.insert_message_at(chat, 1, Some("late"), Utc::now());
        let after = svc.chat_stats(chat, TimeFilter::All).await.unwrap();

        // No invalidation on write; staleness is bounded only by the TTL.
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn unknown_user_yields_zero_stats_not_error() {
        let (store, chat) = seeded_store().await;
        let svc = service(store, Arc::new(MemoryCache::new()));

        let stats = svc.user_stats(chat, 999, TimeFilter::All).await.unwrap();
        assert_eq!(stats.message_count, 0);
        assert_eq!(stats.rank, 0);
        assert_eq!(stats.user, UserProfile::unknown(999));
    }

    #[tokio::test]
    async fn cache_fault_is_not_a_miss() {
        let (store, chat) = seeded_store().await;
        let svc = service(store, Arc::new(BrokenCache));

        let err = svc.chat_stats(chat, TimeFilter::All).await.unwrap_err();
        assert!(matches!(err, Error::CacheError(_)));
    }

    #[tokio::test]
    async fn weekday_absence_is_cached() {
        let store = Arc::new(MemoryStore::new());
        let cache = Arc::new(MemoryCache::new());
        let svc = service(store.clone(), cache);

        // Empty scope: absence, not a zero-count day.
        let first = svc
            .most_active_weekday_for_chat(1, TimeFilter::All)
            .await
            .unwrap();
        assert!(first.is_none());

        // New data arrives, but the cached absence is still a hit.
        store.insert_message_at(1, 1, Some("hi"), Utc::now());
        let second = svc
            .most_active_weekday_for_chat(1, TimeFilter::All)
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn users_page_rejects_zero_page_size() {
        let (store, chat) = seeded_store().await;
        let svc = service(store, Arc::new(MemoryCache::new()));

        let err = svc
            .users_page(chat, TimeFilter::All, 0, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn users_page_matches_chat_stats_ordering() {
        let (store, chat) = seeded_store().await;
        let svc = service(store, Arc::new(MemoryCache::new()));

        let stats = svc.chat_stats(chat, TimeFilter::All).await.unwrap();
        let mut paged = svc.users_page(chat, TimeFilter::All, 2, 0).await.unwrap();
        paged.extend(svc.users_page(chat, TimeFilter::All, 2, 2).await.unwrap());

        assert_eq!(paged, stats.top_users);
    }

    #[tokio::test]
    async fn evict_forces_recompute() {
        let (store, chat) = seeded_store().await;
        let svc = service(store.clone(), Arc::new(MemoryCache::new()));

        let before = svc.chat_stats(chat, TimeFilter::All).await.unwrap();
        store.insert_message_at(chat, 1, Some("late"), Utc::now());

        svc.evict_chat_stats(chat, TimeFilter::All).await.unwrap();
        let after = svc.chat_stats(chat, TimeFilter::All).await.unwrap();

        assert_eq!(after.total_messages, before.total_messages + 1);
    }

    #[tokio::test]
    async fn top_limit_bounds_chat_stats() {
        let (store, chat) = seeded_store().await;
        let svc = service(store, Arc::new(MemoryCache::new())).with_top_limit(2);

        let stats = svc.chat_stats(chat, TimeFilter::All).await.unwrap();
        assert_eq!(stats.top_users.len(), 2);
        // Totals still cover the whole scope, not just the listed users.
        assert_eq!(stats.total_users, 3);
    }
}
