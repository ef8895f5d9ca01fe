//! Chat statistics CLI - main entry point

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use tg_chat_stats::{commands, metrics, Config};
use tracing::warn;

#[derive(Parser)]
#[command(name = "tg_chat_stats")]
#[command(about = "Telegram group chat statistics & style analysis", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the MySQL schema
    InitDb,

    /// Show chat statistics: totals and top senders
    Stats {
        /// Internal chat id
        chat_id: i64,

        /// Time filter: today, week, month or all
        #[arg(short, long, default_value = "all")]
        filter: String,
    },

    /// Show one user's message count and rank
    User {
        /// Internal chat id
        chat_id: i64,

        /// Telegram user id
        user_id: i64,

        /// Time filter: today, week, month or all
        #[arg(short, long, default_value = "all")]
        filter: String,
    },

    /// List ranked users page by page
    Users {
        /// Internal chat id
        chat_id: i64,

        /// Time filter: today, week, month or all
        #[arg(short, long, default_value = "all")]
        filter: String,

        /// Rows per page
        #[arg(long, default_value = "10")]
        page_size: u32,

        /// Rows to skip
        #[arg(long, default_value = "0")]
        offset: u32,
    },

    /// Show the most active weekday of a chat or user
    Weekday {
        /// Internal chat id
        chat_id: i64,

        /// Restrict to one Telegram user id
        #[arg(short, long)]
        user: Option<i64>,

        /// Time filter: today, week, month or all
        #[arg(short, long, default_value = "all")]
        filter: String,
    },

    /// Generate a communication-style report for a user
    Analyze {
        /// Internal chat id
        chat_id: i64,

        /// Telegram user id
        user_id: i64,

        /// Maximum number of recent messages to analyze
        #[arg(short, long)]
        limit: Option<u32>,

        /// Gemini model override
        #[arg(short, long)]
        model: Option<String>,
    },

    /// Print a user's recent messages
    Recent {
        /// Internal chat id
        chat_id: i64,

        /// Telegram user id
        user_id: i64,

        /// Maximum number of messages
        #[arg(short, long, default_value = "20")]
        limit: u32,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::InitDb => "init_db",
            Commands::Stats { .. } => "stats",
            Commands::User { .. } => "user",
            Commands::Users { .. } => "users",
            Commands::Weekday { .. } => "weekday",
            Commands::Analyze { .. } => "analyze",
            Commands::Recent { .. } => "recent",
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("tg_chat_stats=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    let command_name = cli.command.name();
    let start = Instant::now();

    let result = execute_command(cli.command).await;

    metrics::record_command(command_name, start.elapsed(), result.is_ok());

    result
}

async fn execute_command(command: Commands) -> anyhow::Result<()> {
    let config = Config::from_env()?;

    match command {
        Commands::InitDb => {
            commands::init_db::run(&config).await?;
        }
        Commands::Stats { chat_id, filter } => {
            commands::stats::chat(&config, chat_id, &filter).await?;
        }
        Commands::User {
            chat_id,
            user_id,
            filter,
        } => {
            commands::stats::user(&config, chat_id, user_id, &filter).await?;
        }
        Commands::Users {
            chat_id,
            filter,
            page_size,
            offset,
        } => {
            commands::stats::users(&config, chat_id, &filter, page_size, offset).await?;
        }
        Commands::Weekday {
            chat_id,
            user,
            filter,
        } => {
            commands::stats::weekday(&config, chat_id, user, &filter).await?;
        }
        Commands::Analyze {
            chat_id,
            user_id,
            limit,
            model,
        } => {
            commands::analyze::run(&config, chat_id, user_id, limit, model).await?;
        }
        Commands::Recent {
            chat_id,
            user_id,
            limit,
        } => {
            commands::analyze::recent(&config, chat_id, user_id, limit).await?;
        }
    }

    Ok(())
}

// Commands are in src/commands/ directory
