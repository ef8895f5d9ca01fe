//! Statistics commands: chat summary, per-user stats, paginated listing,
//! most active weekday.

use crate::types::TopUser;
use crate::{Config, Result, TimeFilter};

/// `stats` command: chat totals plus the top-senders table.
pub async fn chat(config: &Config, chat_id: i64, filter: &str) -> Result<()> {
    let filter: TimeFilter = filter.parse()?;
    let (service, _store) = super::build_service(config)?;

    let stats = service.chat_stats(chat_id, filter).await?;

    println!("=== Chat {} Statistics ({}) ===\n", chat_id, filter);
    println!("Total messages: {}", stats.total_messages);
    println!("Unique participants: {}", stats.total_users);

    println!("\n=== Top {} Senders ===\n", stats.top_users.len());
    print_ranking(&stats.top_users, 0);

    Ok(())
}

/// `user` command: one user's count and rank.
pub async fn user(config: &Config, chat_id: i64, user_id: i64, filter: &str) -> Result<()> {
    let filter: TimeFilter = filter.parse()?;
    let (service, _store) = super::build_service(config)?;

    let stats = service.user_stats(chat_id, user_id, filter).await?;

    println!(
        "=== {} in chat {} ({}) ===\n",
        stats.user.display_name(),
        chat_id,
        filter
    );
    if stats.rank == 0 {
        println!("No messages in this period");
    } else {
        println!("Messages: {}", stats.message_count);
        println!("Rank: #{}", stats.rank);
    }

    Ok(())
}

/// `users` command: one page of the full ranking.
pub async fn users(
    config: &Config,
    chat_id: i64,
    filter: &str,
    page_size: u32,
    offset: u32,
) -> Result<()> {
    let filter: TimeFilter = filter.parse()?;
    let (service, _store) = super::build_service(config)?;

    let page = service.users_page(chat_id, filter, page_size, offset).await?;

    println!(
        "=== Chat {} users ({}), rows {}-{} ===\n",
        chat_id,
        filter,
        offset + 1,
        offset + page.len() as u32
    );
    print_ranking(&page, offset);

    Ok(())
}

/// `weekday` command: busiest weekday for a chat or for one user.
pub async fn weekday(
    config: &Config,
    chat_id: i64,
    user_id: Option<i64>,
    filter: &str,
) -> Result<()> {
    let filter: TimeFilter = filter.parse()?;
    let (service, _store) = super::build_service(config)?;

    let weekday = match user_id {
        Some(user_id) => {
            service
                .most_active_weekday_for_user(chat_id, user_id, filter)
                .await?
        }
        None => service.most_active_weekday_for_chat(chat_id, filter).await?,
    };

    match weekday {
        Some(day) => println!(
            "Most active weekday: {} ({} messages)",
            day.weekday_name(),
            day.message_count
        ),
        None => println!("No messages in this period"),
    }

    Ok(())
}

fn print_ranking(users: &[TopUser], offset: u32) {
    println!("{:<4} {:<25} {:>8}", "#", "Name", "Messages");
    println!("{}", "-".repeat(40));

    for (i, user) in users.iter().enumerate() {
        let name = user
            .username
            .as_ref()
            .map(|u| format!("@{}", u))
            .or_else(|| user.first_name.clone())
            .unwrap_or_else(|| format!("id:{}", user.telegram_id));
        println!(
            "{:<4} {:<25} {:>8}",
            offset as usize + i + 1,
            truncate(&name, 24),
            user.message_count
        );
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        format!("{}...", s.chars().take(max_len - 3).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_short_string_unchanged() {
        assert_eq!(truncate("alice", 24), "alice");
    }

    #[test]
    fn test_truncate_long_string() {
        let long = "a".repeat(30);
        let cut = truncate(&long, 10);
        assert_eq!(cut.chars().count(), 10);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_truncate_multibyte_names() {
        let name = "Пользователь_с_длинным_именем";
        let cut = truncate(name, 10);
        assert_eq!(cut.chars().count(), 10);
    }
}
