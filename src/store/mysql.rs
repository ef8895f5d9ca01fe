//! MySQL-backed message store
//!
//! Tables:
//! - `users` (telegram_id unique, display fields last-write-wins)
//! - `chats` (telegram_id unique, title)
//! - `messages` (chat_id, user_id, nullable text, created_at set by MySQL)
//!
//! All statistics queries are single-statement aggregations; consistency
//! relies on the server's read isolation, no locks are taken here.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use mysql_async::{prelude::*, Pool, Row};
use tracing::info;

use crate::store::MessageStore;
use crate::types::{
    MostActiveWeekday, NewChat, NewMessage, NewUser, RecentMessage, TopUser, UserProfile,
};
use crate::{Result, TimeFilter};

/// MySQL datetime format used for bind parameters.
const MYSQL_DATETIME: &str = "%Y-%m-%d %H:%M:%S";

/// Message store on top of a `mysql_async` connection pool.
#[derive(Clone)]
pub struct MySqlStore {
    pool: Pool,
}

/// Render a timestamp the way MySQL expects it in a bind parameter.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(MYSQL_DATETIME).to_string()
}

/// Optional `created_at` predicate for the given filter, evaluated at call
/// time so "today" always means the current UTC day.
fn scope_clause(filter: TimeFilter) -> (&'static str, Option<String>) {
    match filter.since(Utc::now()) {
        Some(ts) => (" AND m.created_at >= ?", Some(format_ts(ts))),
        None => ("", None),
    }
}

impl MySqlStore {
    /// Connect to MySQL using a connection URL.
    pub fn connect(database_url: &str) -> Self {
        Self {
            pool: Pool::new(database_url),
        }
    }

    /// Wrap an existing pool (shared with other components).
    pub fn with_pool(pool: Pool) -> Self {
        Self { pool }
    }

    /// Create the schema if it does not exist yet.
    pub async fn init_schema(&self) -> Result<()> {
        let mut conn = self.pool.get_conn().await?;

        conn.query_drop(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                telegram_id BIGINT NOT NULL UNIQUE,
                username VARCHAR(255),
                first_name VARCHAR(255)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
            "#,
        )
        .await?;

        conn.query_drop(
            r#"
            CREATE TABLE IF NOT EXISTS chats (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                telegram_id BIGINT NOT NULL UNIQUE,
                title VARCHAR(255)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
            "#,
        )
        .await?;

        conn.query_drop(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                chat_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                text TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                INDEX idx_chat_created (chat_id, created_at),
                INDEX idx_chat_user (chat_id, user_id),
                CONSTRAINT fk_messages_chat FOREIGN KEY (chat_id) REFERENCES chats(id),
                CONSTRAINT fk_messages_user FOREIGN KEY (user_id) REFERENCES users(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
            "#,
        )
        .await?;

        info!("Message store schema initialized");
        Ok(())
    }

    /// Close the pool. Call once before process exit.
    pub async fn disconnect(self) -> Result<()> {
        self.pool.disconnect().await?;
        Ok(())
    }

    async fn internal_id(&self, table: &str, telegram_id: i64) -> Result<Option<i64>> {
        let mut conn = self.pool.get_conn().await?;
        let sql = format!("SELECT id FROM {} WHERE telegram_id = ?", table);
        let id = conn.exec_first::<i64, _, _>(sql, (telegram_id,)).await?;
        Ok(id)
    }
}

#[async_trait]
impl MessageStore for MySqlStore {
    async fn upsert_user(&self, user: &NewUser) -> Result<i64> {
        let mut conn = self.pool.get_conn().await?;

        conn.exec_drop(
            r#"
            INSERT INTO users (telegram_id, username, first_name)
            VALUES (?, ?, ?)
            ON DUPLICATE KEY UPDATE
            username = VALUES(username),
            first_name = VALUES(first_name)
            "#,
            (user.telegram_id, &user.username, &user.first_name),
        )
        .await?;
        drop(conn);

        self.internal_id("users", user.telegram_id).await?.ok_or_else(|| {
            crate::Error::MySqlError(format!("user {} missing after upsert", user.telegram_id))
        })
    }

    async fn upsert_chat(&self, chat: &NewChat) -> Result<i64> {
        let mut conn = self.pool.get_conn().await?;

        conn.exec_drop(
            r#"
            INSERT INTO chats (telegram_id, title)
            VALUES (?, ?)
            ON DUPLICATE KEY UPDATE
            title = VALUES(title)
            "#,
            (chat.telegram_id, &chat.title),
        )
        .await?;
        drop(conn);

        self.internal_id("chats", chat.telegram_id).await?.ok_or_else(|| {
            crate::Error::MySqlError(format!("chat {} missing after upsert", chat.telegram_id))
        })
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<()> {
        let mut conn = self.pool.get_conn().await?;

        conn.exec_drop(
            "INSERT INTO messages (chat_id, user_id, text) VALUES (?, ?, ?)",
            (message.chat_id, message.user_id, &message.text),
        )
        .await?;

        Ok(())
    }

    async fn find_user(&self, telegram_id: i64) -> Result<Option<UserProfile>> {
        let mut conn = self.pool.get_conn().await?;

        let row: Option<Row> = conn
            .exec_first(
                "SELECT telegram_id, username, first_name FROM users WHERE telegram_id = ?",
                (telegram_id,),
            )
            .await?;

        Ok(row.map(|row| UserProfile {
            telegram_id: row.get("telegram_id").unwrap_or(telegram_id),
            username: row.get("username"),
            first_name: row.get("first_name"),
        }))
    }

    async fn top_users(
        &self,
        chat_id: i64,
        filter: TimeFilter,
        limit: u32,
    ) -> Result<Vec<TopUser>> {
        self.users_page(chat_id, filter, limit, 0).await
    }

    async fn users_page(
        &self,
        chat_id: i64,
        filter: TimeFilter,
        page_size: u32,
        offset: u32,
    ) -> Result<Vec<TopUser>> {
        let mut conn = self.pool.get_conn().await?;

        let (clause, since) = scope_clause(filter);
        let sql = format!(
            r#"
            SELECT u.telegram_id, u.username, u.first_name, COUNT(*) AS cnt
            FROM messages m
            JOIN users u ON u.id = m.user_id
            WHERE m.chat_id = ?{}
            GROUP BY u.id, u.telegram_id, u.username, u.first_name
            ORDER BY cnt DESC, u.telegram_id ASC
            LIMIT ? OFFSET ?
            "#,
            clause
        );

        let mut params: Vec<mysql_async::Value> = vec![chat_id.into()];
        if let Some(since) = since {
            params.push(since.into());
        }
        params.push(page_size.into());
        params.push(offset.into());

        let rows: Vec<Row> = conn.exec(&sql, params).await?;

        let users = rows
            .into_iter()
            .filter_map(|row| {
                let telegram_id: i64 = row.get("telegram_id")?;
                let username: Option<String> = row.get("username");
                let first_name: Option<String> = row.get("first_name");
                let cnt: i64 = row.get("cnt")?;

                Some(TopUser {
                    telegram_id,
                    username,
                    first_name,
                    message_count: cnt.max(0) as u64,
                })
            })
            .collect();

        Ok(users)
    }

    async fn total_message_count(&self, chat_id: i64, filter: TimeFilter) -> Result<u64> {
        let mut conn = self.pool.get_conn().await?;

        let (clause, since) = scope_clause(filter);
        let sql = format!(
            "SELECT COUNT(*) FROM messages m WHERE m.chat_id = ?{}",
            clause
        );

        let mut params: Vec<mysql_async::Value> = vec![chat_id.into()];
        if let Some(since) = since {
            params.push(since.into());
        }

        let count = conn.exec_first::<i64, _, _>(&sql, params).await?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    async fn unique_user_count(&self, chat_id: i64, filter: TimeFilter) -> Result<u64> {
        let mut conn = self.pool.get_conn().await?;

        let (clause, since) = scope_clause(filter);
        let sql = format!(
            "SELECT COUNT(DISTINCT m.user_id) FROM messages m WHERE m.chat_id = ?{}",
            clause
        );

        let mut params: Vec<mysql_async::Value> = vec![chat_id.into()];
        if let Some(since) = since {
            params.push(since.into());
        }

        let count = conn.exec_first::<i64, _, _>(&sql, params).await?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    async fn user_message_count(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        filter: TimeFilter,
    ) -> Result<u64> {
        let mut conn = self.pool.get_conn().await?;

        let (clause, since) = scope_clause(filter);
        let sql = format!(
            r#"
            SELECT COUNT(*)
            FROM messages m
            JOIN users u ON u.id = m.user_id
            WHERE m.chat_id = ? AND u.telegram_id = ?{}
            "#,
            clause
        );

        let mut params: Vec<mysql_async::Value> = vec![chat_id.into(), telegram_user_id.into()];
        if let Some(since) = since {
            params.push(since.into());
        }

        let count = conn.exec_first::<i64, _, _>(&sql, params).await?;
        Ok(count.unwrap_or(0).max(0) as u64)
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

        let mut conn = self.pool.get_conn().await?;

        // Dense rank = 1 + number of users with strictly more messages.
        let (clause, since) = scope_clause(filter);
        let sql = format!(
            r#"
            SELECT COUNT(*)
            FROM (
                SELECT m.user_id, COUNT(*) AS cnt
                FROM messages m
                WHERE m.chat_id = ?{}
                GROUP BY m.user_id
            ) ranked
            WHERE ranked.cnt > ?
            "#,
            clause
        );

        let mut params: Vec<mysql_async::Value> = vec![chat_id.into()];
        if let Some(since) = since {
            params.push(since.into());
        }
        params.push(own_count.into());

        let higher = conn.exec_first::<i64, _, _>(&sql, params).await?;
        Ok(higher.unwrap_or(0).max(0) as u64 + 1)
    }

    async fn most_active_weekday_for_chat(
        &self,
        chat_id: i64,
        filter: TimeFilter,
    ) -> Result<Option<MostActiveWeekday>> {
        let mut conn = self.pool.get_conn().await?;

        let (clause, since) = scope_clause(filter);
        // DAYOFWEEK is 1 = Sunday .. 7 = Saturday; shift to 0-based.
        let sql = format!(
            r#"
            SELECT DAYOFWEEK(m.created_at) - 1 AS dow, COUNT(*) AS cnt
            FROM messages m
            WHERE m.chat_id = ?{}
            GROUP BY dow
            ORDER BY cnt DESC, dow ASC
            LIMIT 1
            "#,
            clause
        );

        let mut params: Vec<mysql_async::Value> = vec![chat_id.into()];
        if let Some(since) = since {
            params.push(since.into());
        }

        let row = conn.exec_first::<(i64, i64), _, _>(&sql, params).await?;
        Ok(row.map(|(dow, cnt)| MostActiveWeekday {
            dow: dow.clamp(0, 6) as u8,
            message_count: cnt.max(0) as u64,
        }))
    }

    async fn most_active_weekday_for_user(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        filter: TimeFilter,
    ) -> Result<Option<MostActiveWeekday>> {
        let mut conn = self.pool.get_conn().await?;

        let (clause, since) = scope_clause(filter);
        let sql = format!(
            r#"
            SELECT DAYOFWEEK(m.created_at) - 1 AS dow, COUNT(*) AS cnt
            FROM messages m
            JOIN users u ON u.id = m.user_id
            WHERE m.chat_id = ? AND u.telegram_id = ?{}
            GROUP BY dow
            ORDER BY cnt DESC, dow ASC
            LIMIT 1
            "#,
            clause
        );

        let mut params: Vec<mysql_async::Value> = vec![chat_id.into(), telegram_user_id.into()];
        if let Some(since) = since {
            params.push(since.into());
        }

        let row = conn.exec_first::<(i64, i64), _, _>(&sql, params).await?;
        Ok(row.map(|(dow, cnt)| MostActiveWeekday {
            dow: dow.clamp(0, 6) as u8,
            message_count: cnt.max(0) as u64,
        }))
    }

    async fn recent_messages_by_user(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        limit: u32,
    ) -> Result<Vec<RecentMessage>> {
        let mut conn = self.pool.get_conn().await?;

        let sql = r#"
            SELECT m.text, m.created_at
            FROM messages m
            JOIN users u ON u.id = m.user_id
            WHERE m.chat_id = ? AND u.telegram_id = ? AND m.text IS NOT NULL
            ORDER BY m.created_at DESC
            LIMIT ?
        "#;

        let rows: Vec<Row> = conn
            .exec(sql, (chat_id, telegram_user_id, limit))
            .await?;

        let messages = rows
            .into_iter()
            .filter_map(|row| {
                let text: String = row.get("text")?;
                let created_naive: NaiveDateTime = row.get("created_at")?;

                Some(RecentMessage {
                    text,
                    created_at: Utc.from_utc_datetime(&created_naive),
                })
            })
            .collect();

        Ok(messages)
    }
}
