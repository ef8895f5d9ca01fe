//! Data types for chat statistics
//!
//! Derived statistics are pure functions of the message set restricted by
//! (chat[, user], filter). Everything here is serializable because cached
//! values travel through Redis as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Display names of weekdays, indexed 0 = Sunday .. 6 = Saturday.
const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// User identity and display info as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Telegram user id.
    pub telegram_id: i64,
    /// Username (if set).
    pub username: Option<String>,
    /// First name (if set).
    pub first_name: Option<String>,
}

impl UserProfile {
    /// Profile for a user the store has never seen; only the platform id is known.
    pub fn unknown(telegram_id: i64) -> Self {
        Self {
            telegram_id,
            username: None,
            first_name: None,
        }
    }

    /// Best display label: @username, then first name, then the raw id.
    pub fn display_name(&self) -> String {
        if let Some(username) = &self.username {
            format!("@{}", username)
        } else if let Some(first_name) = &self.first_name {
            first_name.clone()
        } else {
            format!("id:{}", self.telegram_id)
        }
    }
}

/// One row of a ranking: a user and their message count in scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUser {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub message_count: u64,
}

/// Aggregated statistics for a chat within a time filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatStats {
    /// Top users by message count, count descending, telegram_id ascending on ties.
    pub top_users: Vec<TopUser>,
    /// Total messages in scope.
    pub total_messages: u64,
    /// Distinct users with at least one message in scope.
    pub total_users: u64,
}

/// One user's statistics within a chat and time filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub user: UserProfile,
    pub message_count: u64,
    /// Dense rank among active users; 0 when the user has no messages in scope.
    pub rank: u64,
}

/// The busiest weekday of a scope and its message count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MostActiveWeekday {
    /// Day of week, 0 = Sunday .. 6 = Saturday.
    pub dow: u8,
    pub message_count: u64,
}

impl MostActiveWeekday {
    /// English weekday name for display.
    pub fn weekday_name(&self) -> &'static str {
        WEEKDAY_NAMES[self.dow as usize % 7]
    }
}

/// A message text with its timestamp, as consumed by the style analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentMessage {
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Incoming user data for upsert (last write wins on display fields).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub telegram_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

/// Incoming chat data for upsert.
#[derive(Debug, Clone)]
pub struct NewChat {
    pub telegram_id: i64,
    pub title: Option<String>,
}

/// A message to persist. `created_at` is assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    /// Internal chat id returned by `upsert_chat`.
    pub chat_id: i64,
    /// Internal user id returned by `upsert_user`.
    pub user_id: i64,
    pub text: Option<String>,
}
