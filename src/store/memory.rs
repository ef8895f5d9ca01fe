//! In-memory message store
//!
//! A store twin used by tests and local development. Implements the same
//! aggregation contract as the MySQL store over plain vectors, so the two
//! must stay behaviorally interchangeable.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};

use crate::store::MessageStore;
use crate::types::{
    MostActiveWeekday, NewChat, NewMessage, NewUser, RecentMessage, TopUser, UserProfile,
};
use crate::{Result, TimeFilter};

#[derive(Debug, Clone)]
struct StoredUser {
    id: i64,
    telegram_id: i64,
    username: Option<String>,
    first_name: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredChat {
    id: i64,
    #[allow(dead_code)]
    telegram_id: i64,
    #[allow(dead_code)]
    title: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    chat_id: i64,
    user_id: i64,
    text: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    users: Vec<StoredUser>,
    chats: Vec<StoredChat>,
    messages: Vec<StoredMessage>,
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: append a message with an explicit timestamp, bypassing
    /// the store-assigned clock.
    pub fn insert_message_at(
        &self,
        chat_id: i64,
        user_id: i64,
        text: Option<&str>,
        created_at: DateTime<Utc>,
    ) {
        let mut inner = self.inner.lock().expect("memory store poisoned");
        inner.messages.push(StoredMessage {
            chat_id,
            user_id,
            text: text.map(|t| t.to_string()),
            created_at,
        });
    }

    fn ranking(inner: &Inner, chat_id: i64, filter: TimeFilter) -> Vec<TopUser> {
        let since = filter.since(Utc::now());

        let mut counts: HashMap<i64, u64> = HashMap::new();
        for message in in_scope(&inner.messages, chat_id, since) {
            *counts.entry(message.user_id).or_insert(0) += 1;
        }

        let mut ranking: Vec<TopUser> = counts
            .into_iter()
            .filter_map(|(user_id, count)| {
                let user = inner.users.iter().find(|u| u.id == user_id)?;
                Some(TopUser {
                    telegram_id: user.telegram_id,
                    username: user.username.clone(),
                    first_name: user.first_name.clone(),
                    message_count: count,
                })
            })
            .collect();

        ranking.sort_by(|a, b| {
            b.message_count
                .cmp(&a.message_count)
                .then(a.telegram_id.cmp(&b.telegram_id))
        });
        ranking
    }

    fn weekday_of(counts: &HashMap<u8, u64>) -> Option<MostActiveWeekday> {
        counts
            .iter()
            .map(|(dow, count)| (*dow, *count))
            // Max by count; lowest weekday index wins ties.
            .min_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)))
            .map(|(dow, message_count)| MostActiveWeekday {
                dow,
                message_count,
            })
    }
}

fn in_scope<'a>(
    messages: &'a [StoredMessage],
    chat_id: i64,
    since: Option<DateTime<Utc>>,
) -> impl Iterator<Item = &'a StoredMessage> {
    messages.iter().filter(move |m| {
        m.chat_id == chat_id && since.map(|s| m.created_at >= s).unwrap_or(true)
    })
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn upsert_user(&self, user: &NewUser) -> Result<i64> {
        let mut inner = self.inner.lock().expect("memory store poisoned");

        if let Some(existing) = inner
            .users
            .iter_mut()
            .find(|u| u.telegram_id == user.telegram_id)
        {
            existing.username = user.username.clone();
            existing.first_name = user.first_name.clone();
            return Ok(existing.id);
        }

        let id = inner.users.len() as i64 + 1;
        inner.users.push(StoredUser {
            id,
            telegram_id: user.telegram_id,
            username: user.username.clone(),
            first_name: user.first_name.clone(),
        });
        Ok(id)
    }

    async fn upsert_chat(&self, chat: &NewChat) -> Result<i64> {
        let mut inner = self.inner.lock().expect("memory store poisoned");

        if let Some(existing) = inner
            .chats
            .iter_mut()
            .find(|c| c.telegram_id == chat.telegram_id)
        {
            existing.title = chat.title.clone();
            return Ok(existing.id);
        }

        let id = inner.chats.len() as i64 + 1;
        inner.chats.push(StoredChat {
            id,
            telegram_id: chat.telegram_id,
            title: chat.title.clone(),
        });
        Ok(id)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<()> {
        self.insert_message_at(
            message.chat_id,
            message.user_id,
            message.text.as_deref(),
            Utc::now(),
        );
        Ok(())
    }

    async fn find_user(&self, telegram_id: i64) -> Result<Option<UserProfile>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        Ok(inner
            .users
            .iter()
            .find(|u| u.telegram_id == telegram_id)
            .map(|u| UserProfile {
                telegram_id: u.telegram_id,
                username: u.username.clone(),
                first_name: u.first_name.clone(),
            }))
    }

    async fn top_users(
        &self,
        chat_id: i64,
        filter: TimeFilter,
        limit: u32,
    ) -> Result<Vec<TopUser>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let mut ranking = Self::ranking(&inner, chat_id, filter);
        ranking.truncate(limit as usize);
        Ok(ranking)
    }

    async fn users_page(
        &self,
        chat_id: i64,
        filter: TimeFilter,
        page_size: u32,
        offset: u32,
    ) -> Result<Vec<TopUser>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let ranking = Self::ranking(&inner, chat_id, filter);
        Ok(ranking
            .into_iter()
            .skip(offset as usize)
            .take(page_size as usize)
            .collect())
    }

    async fn total_message_count(&self, chat_id: i64, filter: TimeFilter) -> Result<u64> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let since = filter.since(Utc::now());
        Ok(in_scope(&inner.messages, chat_id, since).count() as u64)
    }

    async fn unique_user_count(&self, chat_id: i64, filter: TimeFilter) -> Result<u64> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let since = filter.since(Utc::now());
        let users: std::collections::HashSet<i64> = in_scope(&inner.messages, chat_id, since)
            .map(|m| m.user_id)
            .collect();
        Ok(users.len() as u64)
    }

    async fn user_message_count(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        filter: TimeFilter,
    ) -> Result<u64> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let Some(user_id) = inner
            .users
            .iter()
            .find(|u| u.telegram_id == telegram_user_id)
            .map(|u| u.id)
        else {
            return Ok(0);
        };

        let since = filter.since(Utc::now());
        Ok(in_scope(&inner.messages, chat_id, since)
            .filter(|m| m.user_id == user_id)
            .count() as u64)
    }

    async fn user_rank(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        filter: TimeFilter,
    ) -> Result<u64> {
        let own_count = self
            .user_message_count(chat_id, telegram_user_id, filter)
            .await?;
        if own_count == 0 {
            return Ok(0);
        }

        let inner = self.inner.lock().expect("memory store poisoned");
        let ranking = Self::ranking(&inner, chat_id, filter);
        let higher = ranking
            .iter()
            .filter(|u| u.message_count > own_count)
            .count() as u64;
        Ok(higher + 1)
    }

    async fn most_active_weekday_for_chat(
        &self,
        chat_id: i64,
        filter: TimeFilter,
    ) -> Result<Option<MostActiveWeekday>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let since = filter.since(Utc::now());

        let mut counts: HashMap<u8, u64> = HashMap::new();
        for message in in_scope(&inner.messages, chat_id, since) {
            let dow = message.created_at.weekday().num_days_from_sunday() as u8;
            *counts.entry(dow).or_insert(0) += 1;
        }

        Ok(Self::weekday_of(&counts))
    }

    async fn most_active_weekday_for_user(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        filter: TimeFilter,
    ) -> Result<Option<MostActiveWeekday>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let Some(user_id) = inner
            .users
            .iter()
            .find(|u| u.telegram_id == telegram_user_id)
            .map(|u| u.id)
        else {
            return Ok(None);
        };

        let since = filter.since(Utc::now());
        let mut counts: HashMap<u8, u64> = HashMap::new();
        for message in
            in_scope(&inner.messages, chat_id, since).filter(|m| m.user_id == user_id)
        {
            let dow = message.created_at.weekday().num_days_from_sunday() as u8;
            *counts.entry(dow).or_insert(0) += 1;
        }

        Ok(Self::weekday_of(&counts))
    }

    async fn recent_messages_by_user(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        limit: u32,
    ) -> Result<Vec<RecentMessage>> {
        let inner = self.inner.lock().expect("memory store poisoned");
        let Some(user_id) = inner
            .users
            .iter()
            .find(|u| u.telegram_id == telegram_user_id)
            .map(|u| u.id)
        else {
            return Ok(Vec::new());
        };

        let mut messages: Vec<RecentMessage> = inner
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id && m.user_id == user_id)
            .filter_map(|m| {
                m.text.as_ref().map(|text| RecentMessage {
                    text: text.clone(),
                    created_at: m.created_at,
                })
            })
            .collect();

        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        messages.truncate(limit as usize);
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    async fn seed_user(store: &MemoryStore, telegram_id: i64, username: &str) -> i64 {
        store
            .upsert_user(&NewUser {
                telegram_id,
                username: Some(username.to_string()),
                first_name: None,
            })
            .await
            .unwrap()
    }

    async fn seed_chat(store: &MemoryStore, telegram_id: i64) -> i64 {
        store
            .upsert_chat(&NewChat {
                telegram_id,
                title: Some("test chat".to_string()),
            })
            .await
            .unwrap()
    }

    fn insert_n(store: &MemoryStore, chat: i64, user: i64, n: usize, at: DateTime<Utc>) {
        for i in 0..n {
            store.insert_message_at(chat, user, Some("msg"), at + Duration::seconds(i as i64));
        }
    }

    #[tokio::test]
    async fn empty_scope_returns_zeros() {
        let store = MemoryStore::new();

        assert_eq!(store.total_message_count(1, TimeFilter::All).await.unwrap(), 0);
        assert_eq!(store.unique_user_count(1, TimeFilter::All).await.unwrap(), 0);
        assert!(store.top_users(1, TimeFilter::All, 10).await.unwrap().is_empty());
        assert!(store
            .most_active_weekday_for_chat(1, TimeFilter::All)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn unknown_user_is_zero_not_error() {
        let store = MemoryStore::new();
        seed_chat(&store, 100).await;

        assert_eq!(
            store.user_message_count(1, 999, TimeFilter::All).await.unwrap(),
            0
        );
        assert_eq!(store.user_rank(1, 999, TimeFilter::All).await.unwrap(), 0);
        assert!(store
            .recent_messages_by_user(1, 999, 10)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn tied_users_share_dense_rank() {
        let store = MemoryStore::new();
        let chat = seed_chat(&store, 100).await;
        let a = seed_user(&store, 11, "a").await;
        let b = seed_user(&store, 22, "b").await;
        let c = seed_user(&store, 33, "c").await;

        let now = Utc::now();
        insert_n(&store, chat, a, 5, now);
        insert_n(&store, chat, b, 5, now);
        insert_n(&store, chat, c, 2, now);

        let top = store.top_users(chat, TimeFilter::Today, 10).await.unwrap();
        let ids: Vec<i64> = top.iter().map(|u| u.telegram_id).collect();
        assert_eq!(ids, vec![11, 22, 33]);

        assert_eq!(store.user_rank(chat, 11, TimeFilter::Today).await.unwrap(), 1);
        assert_eq!(store.user_rank(chat, 22, TimeFilter::Today).await.unwrap(), 1);
        assert_eq!(store.user_rank(chat, 33, TimeFilter::Today).await.unwrap(), 3);

        assert_eq!(store.unique_user_count(chat, TimeFilter::Today).await.unwrap(), 3);
        assert_eq!(
            store.total_message_count(chat, TimeFilter::Today).await.unwrap(),
            12
        );
    }

    #[tokio::test]
    async fn rank_is_within_unique_user_count() {
        let store = MemoryStore::new();
        let chat = seed_chat(&store, 100).await;
        for (telegram_id, count) in [(1i64, 4usize), (2, 3), (3, 3), (4, 1)] {
            let user = seed_user(&store, telegram_id, &format!("u{}", telegram_id)).await;
            insert_n(&store, chat, user, count, Utc::now());
        }

        let unique = store.unique_user_count(chat, TimeFilter::All).await.unwrap();
        for telegram_id in [1i64, 2, 3, 4] {
            let rank = store.user_rank(chat, telegram_id, TimeFilter::All).await.unwrap();
            assert!(rank >= 1 && rank <= unique, "rank {} out of range", rank);
        }
        assert_eq!(store.user_rank(chat, 2, TimeFilter::All).await.unwrap(), 2);
        assert_eq!(store.user_rank(chat, 3, TimeFilter::All).await.unwrap(), 2);
        assert_eq!(store.user_rank(chat, 4, TimeFilter::All).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn pagination_concatenates_to_full_ranking() {
        let store = MemoryStore::new();
        let chat = seed_chat(&store, 100).await;
        for telegram_id in 1..=7i64 {
            let user = seed_user(&store, telegram_id, &format!("u{}", telegram_id)).await;
            insert_n(&store, chat, user, telegram_id as usize, Utc::now());
        }

        let full = store.top_users(chat, TimeFilter::All, 100).await.unwrap();
        let mut paged = Vec::new();
        for page in 0..4 {
            let chunk = store
                .users_page(chat, TimeFilter::All, 2, page * 2)
                .await
                .unwrap();
            paged.extend(chunk);
        }

        assert_eq!(paged, full);
    }

    #[tokio::test]
    async fn top_users_is_idempotent_without_writes() {
        let store = MemoryStore::new();
        let chat = seed_chat(&store, 100).await;
        let user = seed_user(&store, 5, "u5").await;
        insert_n(&store, chat, user, 3, Utc::now());

        let first = store.top_users(chat, TimeFilter::All, 10).await.unwrap();
        let second = store.top_users(chat, TimeFilter::All, 10).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn narrower_window_never_counts_more() {
        let store = MemoryStore::new();
        let chat = seed_chat(&store, 100).await;
        let user = seed_user(&store, 5, "u5").await;

        let now = Utc::now();
        insert_n(&store, chat, user, 2, now);
        // Outside "today" (and possibly "week"), inside "month".
        insert_n(&store, chat, user, 3, now - Duration::days(10));

        let today = store.total_message_count(chat, TimeFilter::Today).await.unwrap();
        let week = store.total_message_count(chat, TimeFilter::Week).await.unwrap();
        let month = store.total_message_count(chat, TimeFilter::Month).await.unwrap();
        let all = store.total_message_count(chat, TimeFilter::All).await.unwrap();

        assert!(today <= week);
        assert!(week <= month);
        assert!(month <= all);
        assert_eq!(all, 5);
        assert_eq!(week, 2);
    }

    #[tokio::test]
    async fn weekday_tie_picks_lowest_index() {
        let store = MemoryStore::new();
        let chat = seed_chat(&store, 100).await;
        let user = seed_user(&store, 5, "u5").await;

        // A Wednesday and a Monday, one message each: Monday (1) must win.
        let monday = Utc.with_ymd_and_hms(2025, 6, 9, 12, 0, 0).unwrap();
        let wednesday = Utc.with_ymd_and_hms(2025, 6, 11, 12, 0, 0).unwrap();
        store.insert_message_at(chat, user, Some("a"), wednesday);
        store.insert_message_at(chat, user, Some("b"), monday);

        let weekday = store
            .most_active_weekday_for_chat(chat, TimeFilter::All)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(weekday.dow, 1);
        assert_eq!(weekday.message_count, 1);
    }

    #[tokio::test]
    async fn weekday_for_user_ignores_other_users() {
        let store = MemoryStore::new();
        let chat = seed_chat(&store, 100).await;
        let a = seed_user(&store, 11, "a").await;
        let b = seed_user(&store, 22, "b").await;

        let sunday = Utc.with_ymd_and_hms(2025, 6, 8, 10, 0, 0).unwrap();
        let friday = Utc.with_ymd_and_hms(2025, 6, 13, 10, 0, 0).unwrap();
        store.insert_message_at(chat, a, Some("a1"), sunday);
        insert_n(&store, chat, b, 4, friday);

        let weekday = store
            .most_active_weekday_for_user(chat, 11, TimeFilter::All)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(weekday.dow, 0);
        assert_eq!(weekday.message_count, 1);
    }

    #[tokio::test]
    async fn recent_messages_skip_null_text_and_order_desc() {
        let store = MemoryStore::new();
        let chat = seed_chat(&store, 100).await;
        let user = seed_user(&store, 5, "u5").await;

        let base = Utc.with_ymd_and_hms(2025, 6, 10, 12, 0, 0).unwrap();
        store.insert_message_at(chat, user, Some("first"), base);
        store.insert_message_at(chat, user, None, base + Duration::minutes(1));
        store.insert_message_at(chat, user, Some("second"), base + Duration::minutes(2));

        let messages = store.recent_messages_by_user(chat, 5, 10).await.unwrap();
        let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["second", "first"]);
    }

    #[tokio::test]
    async fn recent_messages_respect_limit() {
        let store = MemoryStore::new();
        let chat = seed_chat(&store, 100).await;
        let user = seed_user(&store, 5, "u5").await;
        insert_n(&store, chat, user, 10, Utc::now());

        let messages = store.recent_messages_by_user(chat, 5, 3).await.unwrap();
        assert_eq!(messages.len(), 3);
    }

    #[tokio::test]
    async fn upsert_user_is_last_write_wins() {
        let store = MemoryStore::new();
        let first_id = seed_user(&store, 7, "old_name").await;
        let second_id = store
            .upsert_user(&NewUser {
                telegram_id: 7,
                username: Some("new_name".to_string()),
                first_name: Some("Seven".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(first_id, second_id);
        let profile = store.find_user(7).await.unwrap().unwrap();
        assert_eq!(profile.username.as_deref(), Some("new_name"));
        assert_eq!(profile.first_name.as_deref(), Some("Seven"));
    }

    #[tokio::test]
    async fn messages_in_other_chats_do_not_leak() {
        let store = MemoryStore::new();
        let chat_a = seed_chat(&store, 100).await;
        let chat_b = seed_chat(&store, 200).await;
        let user = seed_user(&store, 5, "u5").await;

        insert_n(&store, chat_a, user, 3, Utc::now());
        insert_n(&store, chat_b, user, 1, Utc::now());

        assert_eq!(
            store.total_message_count(chat_a, TimeFilter::All).await.unwrap(),
            3
        );
        assert_eq!(
            store.user_message_count(chat_b, 5, TimeFilter::All).await.unwrap(),
            1
        );
    }
}
