//! Communication-style analysis
//!
//! Reads a user's recent messages from the store, builds an analysis prompt
//! and forwards it to a text-generation backend. The backend is opaque: any
//! `TextGenerator` will do, the shipped one is the Gemini client.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::store::MessageStore;
use crate::types::RecentMessage;
use crate::{Error, Result};

/// How many recent messages are fed to the model by default.
pub const DEFAULT_MESSAGE_LIMIT: u32 = 80;

/// Fewer messages than this and the report would be noise.
pub const MIN_MESSAGES: usize = 5;

/// Opaque text-completion backend: one prompt in, free text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Finished style report.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleReport {
    /// Free-text analysis as returned by the model.
    pub analysis: String,
    /// How many messages went into the prompt.
    pub messages_used: usize,
}

/// Builds style reports for chat users.
pub struct StyleAnalyzer {
    store: Arc<dyn MessageStore>,
    generator: Arc<dyn TextGenerator>,
    message_limit: u32,
}

impl StyleAnalyzer {
    pub fn new(store: Arc<dyn MessageStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            store,
            generator,
            message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }

    /// Override the default message limit.
    pub fn with_message_limit(mut self, message_limit: u32) -> Self {
        self.message_limit = message_limit;
        self
    }

    /// Analyze a user's communication style from their recent messages in a
    /// chat. Fails with `NotEnoughMessages` below [`MIN_MESSAGES`].
    pub async fn analyze_user(
        &self,
        chat_id: i64,
        telegram_user_id: i64,
        username: &str,
    ) -> Result<StyleReport> {
        let messages = self
            .store
            .recent_messages_by_user(chat_id, telegram_user_id, self.message_limit)
            .await?;

        if messages.len() < MIN_MESSAGES {
            return Err(Error::NotEnoughMessages {
                have: messages.len(),
                need: MIN_MESSAGES,
            });
        }

        info!(
            chat_id,
            telegram_user_id,
            messages = messages.len(),
            "Building style report"
        );

        let prompt = build_prompt(username, &messages);
        let analysis = self.generator.generate(&prompt).await?;

        Ok(StyleReport {
            analysis,
            messages_used: messages.len(),
        })
    }
}

/// Render the analysis prompt: numbered `[timestamp] text` lines under the
/// fixed instruction block.
fn build_prompt(username: &str, messages: &[RecentMessage]) -> String {
    let lines: Vec<String> = messages
        .iter()
        .enumerate()
        .map(|(i, m)| {
            format!(
                "{}. [{}] {}",
                i + 1,
                m.created_at.format("%Y-%m-%d %H:%M"),
                m.text
            )
        })
        .collect();

    format!(
        r#"
Ниже приведены сообщения пользователя {username} из чата.
Каждое сообщение имеет формат:

[YYYY-MM-DD HH:MM] текст сообщения

Проанализируй:
1. Общий стиль общения
2. Эмоциональный тон
3. Темы, которые чаще всего обсуждает
4. Уровень токсичности / агрессии
5. Активность по времени суток:
   - в какие часы он наиболее активен
   - скорее "сова" или "жаворонок"
   - есть ли ночная активность
6. Сделай краткий психологический портрет.

Сообщения:
{}
"#,
        lines.join("\n"),
        username = username,
    )
}
