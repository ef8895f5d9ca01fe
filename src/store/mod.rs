//! Message store contract and implementations
//!
//! The store is an injected dependency: the stats service and analyzer are
//! written against the `MessageStore` trait so tests can substitute the
//! in-memory store for MySQL without touching process-wide state.

pub mod memory;
pub mod mysql;

use async_trait::async_trait;

use crate::types::{
    MostActiveWeekday, NewChat, NewMessage, NewUser, RecentMessage, TopUser, UserProfile,
};
use crate::{Result, TimeFilter};

pub use memory::MemoryStore;
pub use mysql::MySqlStore;

/// Read and write operations over the message log.
///
/// Reads are set aggregations scoped by (chat[, user], filter). Absence of
/// data is empty/zero results, never an error. All ranking output is
/// ordered by message count descending with ascending `telegram_id` as the
/// tie-break, so pagination is stable between calls.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Insert or update a user by platform id; returns the internal id.
    async fn upsert_user(&self, user: &NewUser) -> Result<i64>;

    /// Insert or update a chat by platform id; returns the internal id.
    async fn upsert_chat(&self, chat: &NewChat) -> Result<i64>;

    /// Append a message. `created_at` is assigned by the store; messages are
    /// immutable after this point.
    async fn insert_message(&self, message: &NewMessage) -> Result<()>;

    /// Look up a user's display profile by platform id.
    async fn find_user(&self, telegram_id: i64) -> Result<Option<UserProfile>>;

    /// Top users by message count in scope, bounded to `limit` rows.
    async fn top_users(&self, chat_id: i64, filter: TimeFilter, limit: u32)
        -> Result<Vec<TopUser>>;

    /// One page of the full ranking; concatenating pages reproduces
    /// `top_users` ordering (modulo concurrent writes).
    async fn users_page(
        &self,
        chat_id: i64,
        filter: TimeFilter,
        page_size: u32,
        offset: u32,
    ) -> Result<Vec<TopUser>>;

    /// Count of all messages in scope.
    async fn total_message_count(&self, chat_id: i64, filter: TimeFilter) -> Result<u64>;

    /// Count of distinct users with at least one message in scope.
    async fn unique_user_count(&self, chat_id: i64, filter: TimeFilter) -> Result<u64>;

    /// One user's message count in scope.
    async fn user_message_count(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        filter: TimeFilter,
    ) -> Result<u64>;

    /// 1-based dense rank (ties share rank), or 0 when the user has no
    /// qualifying messages.
    async fn user_rank(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        filter: TimeFilter,
    ) -> Result<u64>;

    /// Busiest weekday of the chat, or `None` for an empty scope.
    /// Ties resolve to the lowest weekday index.
    async fn most_active_weekday_for_chat(
        &self,
        chat_id: i64,
        filter: TimeFilter,
    ) -> Result<Option<MostActiveWeekday>>;

    /// Busiest weekday of one user in the chat, or `None` for an empty scope.
    async fn most_active_weekday_for_user(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        filter: TimeFilter,
    ) -> Result<Option<MostActiveWeekday>>;

    /// The user's latest messages with non-null text, most recent first.
    async fn recent_messages_by_user(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        limit: u32,
    ) -> Result<Vec<RecentMessage>>;
}
