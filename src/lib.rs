//! Telegram Group Chat Statistics Library
//!
//! This library provides tools to:
//! - Persist group chat messages, users and chats in MySQL
//! - Aggregate per-chat and per-user statistics (top users, ranks, activity)
//! - Memoize statistics in Redis with a bounded TTL
//! - Generate communication-style reports from a user's recent messages (Gemini)
//! - Expose Prometheus metrics for cache and query behavior

pub mod analyze;
pub mod cache;
pub mod config;
pub mod error;
pub mod filter;
pub mod integrations;
pub mod metrics;
pub mod stats;
pub mod store;
pub mod types;

// Re-export common types
pub use analyze::{StyleAnalyzer, StyleReport, TextGenerator};
pub use cache::{MemoryCache, RedisCache, StatsCache};
pub use config::Config;
pub use error::{Error, Result};
pub use filter::TimeFilter;
pub use integrations::GeminiClient;
pub use stats::StatsService;
pub use store::{MemoryStore, MessageStore, MySqlStore};
pub use types::{ChatStats, MostActiveWeekday, TopUser, UserProfile, UserStats};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
