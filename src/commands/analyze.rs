//! `analyze` and `recent` commands: style report and the raw messages
//! feeding it.

use std::sync::Arc;

use crate::analyze::{StyleAnalyzer, DEFAULT_MESSAGE_LIMIT};
use crate::store::MessageStore;
use crate::types::UserProfile;
use crate::{Config, GeminiClient, MySqlStore, Result};

/// `analyze` command: build a communication-style report for a user.
pub async fn run(
    config: &Config,
    chat_id: i64,
    user_id: i64,
    limit: Option<u32>,
    model: Option<String>,
) -> Result<()> {
    let store = Arc::new(MySqlStore::connect(&config.database_url));

    let username = store
        .find_user(user_id)
        .await?
        .unwrap_or_else(|| UserProfile::unknown(user_id))
        .display_name();

    let mut client = GeminiClient::from_env()?;
    if let Some(model) = model.as_deref() {
        client = client.with_model(model);
    }

    let analyzer = StyleAnalyzer::new(store, Arc::new(client))
        .with_message_limit(limit.unwrap_or(DEFAULT_MESSAGE_LIMIT));

    let report = analyzer.analyze_user(chat_id, user_id, &username).await?;

    println!(
        "=== Style report for {} ({} messages) ===\n",
        username, report.messages_used
    );
    println!("{}", report.analysis);

    Ok(())
}

/// `recent` command: print the user's latest non-empty messages.
pub async fn recent(config: &Config, chat_id: i64, user_id: i64, limit: u32) -> Result<()> {
    let store = MySqlStore::connect(&config.database_url);

    let messages = store.recent_messages_by_user(chat_id, user_id, limit).await?;
    if messages.is_empty() {
        println!("No messages found");
        return Ok(());
    }

    for message in &messages {
        println!(
            "[{}] {}",
            message.created_at.format("%Y-%m-%d %H:%M"),
            message.text
        );
    }

    Ok(())
}
