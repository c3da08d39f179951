// This is the entry point of the XP bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (level table, command routing, handlers)
// - `infra/` = Implementations of core traits (Redis, in-memory)
// - `telegram/` = Telegram-specific adapters (update loop, outbox)
// - `config/` = Startup configuration
//
// This file's job is to:
// 1. Parse flags and set up logging
// 2. Load configuration
// 3. Pick a score store and wire the services (dependency injection)
// 4. Stream messages until Ctrl+C

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "config/bot_config.rs"]
mod config;
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "telegram/telegram_layer.rs"]
mod telegram;

use crate::config::BotConfig;
use crate::core::leveling::{ChatKeys, LevelTable, LevelingService, ScoreStore};
use crate::core::responses::BotContext;
use crate::infra::leveling::{InMemoryScoreStore, RedisScoreStore};
use crate::telegram::{update_listener, TelegramOutbox};
use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use teloxide::Bot;
use tracing_subscriber::EnvFilter;

/// Telegram bot that keeps an XP leaderboard per chat
#[derive(Parser, Debug)]
#[command(name = "xp_bot")]
struct Args {
    /// Path to the config file (.toml or .json)
    #[arg(long)]
    conf: PathBuf,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogEncoding::Console)]
    log_encoding: LogEncoding,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogEncoding {
    Console,
    Json,
}

fn init_tracing(encoding: LogEncoding, level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match encoding {
        LogEncoding::Console => builder.init(),
        LogEncoding::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_encoding, &args.log_level);

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = BotConfig::load(&args.conf)
        .with_context(|| format!("Failed to load config from {}", args.conf.display()))?;
    let levels = config.level_table()?;

    tracing::info!(
        levels = levels.len(),
        admins = config.admins.len(),
        "Config loaded"
    );

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // The store type is chosen at runtime, so everything above it is
    // generic and wired in `run`.

    let keys = ChatKeys::new(config.key_prefix.clone());

    if config.uses_memory_store() {
        tracing::warn!("Using the in-memory store, scores are lost on exit");
        run(InMemoryScoreStore::with_keys(keys), levels, config).await
    } else {
        let store = RedisScoreStore::connect(&config.redis_url, keys)
            .await
            .context("Failed to connect to Redis")?;
        run(store, levels, config).await
    }
}

async fn run<S>(store: S, levels: LevelTable, config: BotConfig) -> anyhow::Result<()>
where
    S: ScoreStore + 'static,
{
    let leveling = LevelingService::new(store, levels)
        .with_timeout(config.store_timeout())
        .with_cooldown(config.xp_cooldown());

    leveling
        .ping()
        .await
        .context("Score store is not reachable")?;
    tracing::info!("Score store reachable");

    let bot = Bot::new(&config.bot_token);

    let ctx = Arc::new(BotContext {
        leveling,
        outbox: TelegramOutbox::new(bot.clone()),
        admins: config.admin_set(),
        not_an_admin: config.not_an_admin.clone(),
        ranks_shown: config.ranks_shown,
    });

    update_listener::run(bot, ctx).await;
    Ok(())
}
