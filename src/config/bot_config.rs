// Bot configuration - read once at startup, immutable afterwards.
//
// The file (TOML or JSON, picked by extension) holds the level table and the
// admin list. Secrets can come from the environment instead:
// XPBOT_BOT_TOKEN and XPBOT_REDIS_URL override the file.

use crate::core::commands::strip_mention;
use crate::core::leveling::{Level, LevelTable, LevelTableError};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_BOT_TOKEN: &str = "XPBOT_BOT_TOKEN";
pub const ENV_REDIS_URL: &str = "XPBOT_REDIS_URL";

/// Store URL scheme selecting the in-memory store.
pub const MEMORY_STORE_URL: &str = "memory://";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported config format {0:?} (use .toml or .json)")]
    UnsupportedFormat(PathBuf),

    #[error("Missing bot_token (set it in the config or XPBOT_BOT_TOKEN)")]
    MissingBotToken,

    #[error("Missing redis_url (set it in the config or XPBOT_REDIS_URL)")]
    MissingRedisUrl,

    #[error(transparent)]
    Levels(#[from] LevelTableError),

    #[error("ranks_shown must be at least 1")]
    InvalidRanksShown,

    #[error("store_timeout_ms must be at least 1")]
    InvalidTimeout,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub redis_url: String,
    #[serde(default)]
    pub levels: Vec<Level>,
    #[serde(default)]
    pub admins: Vec<String>,
    #[serde(default = "default_not_an_admin")]
    pub not_an_admin: String,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    #[serde(default = "default_ranks_shown")]
    pub ranks_shown: usize,
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// 0 disables the passive XP cooldown.
    #[serde(default)]
    pub xp_cooldown_secs: u64,
}

fn default_not_an_admin() -> String {
    "You are not an admin.".to_string()
}

fn default_key_prefix() -> String {
    "XPBOT_".to_string()
}

fn default_ranks_shown() -> usize {
    10
}

fn default_store_timeout_ms() -> u64 {
    3000
}

impl BotConfig {
    /// Read, apply environment overrides, validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let mut config = Self::parse(path, &content)?;
        config.apply_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    fn parse(path: &Path, content: &str) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Environment wins over the file. Empty variables are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup(ENV_BOT_TOKEN).filter(|v| !v.is_empty()) {
            self.bot_token = token;
        }
        if let Some(url) = lookup(ENV_REDIS_URL).filter(|v| !v.is_empty()) {
            self.redis_url = url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::MissingBotToken);
        }
        if self.redis_url.trim().is_empty() {
            return Err(ConfigError::MissingRedisUrl);
        }
        self.level_table()?;
        if self.ranks_shown == 0 {
            return Err(ConfigError::InvalidRanksShown);
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    pub fn level_table(&self) -> Result<LevelTable, LevelTableError> {
        LevelTable::new(self.levels.clone())
    }

    /// Admin usernames with any leading `@` removed.
    pub fn admin_set(&self) -> HashSet<String> {
        self.admins
            .iter()
            .map(|name| strip_mention(name.trim()).to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn xp_cooldown(&self) -> Duration {
        Duration::from_secs(self.xp_cooldown_secs)
    }

    pub fn uses_memory_store(&self) -> bool {
        self.redis_url.starts_with(MEMORY_STORE_URL)
    }
}
