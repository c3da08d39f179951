// Storage port for per-chat scores.
// The core defines WHAT it needs from a sorted-set store; infra provides HOW.

use async_trait::async_trait;
use thiserror::Error;

/// A user's position inside one chat's leaderboard, read in one round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standing {
    pub xp: i64,
    /// 1-based, descending by XP.
    pub rank: u64,
    /// Number of scored participants in the chat.
    pub total: u64,
}

/// One leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreEntry {
    pub username: String,
    pub xp: i64,
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("Score store error: {0}")]
    Backend(String),
}

/// Builds the sorted-set key for a chat, e.g. `XPBOT_-100123`.
#[derive(Debug, Clone)]
pub struct ChatKeys {
    prefix: String,
}

impl ChatKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn key(&self, chat_id: i64) -> String {
        format!("{}{}", self.prefix, chat_id)
    }
}

impl Default for ChatKeys {
    fn default() -> Self {
        Self::new("XPBOT_")
    }
}

/// Sorted-set operations the leveling service relies on.
///
/// Implementations must make `increment` atomic per key and must serve
/// `standing` from one consistent snapshot (pipeline/transaction), so that
/// rank and total never come from different leaderboard states.
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Add `delta` (may be negative) to the user's score, creating it at
    /// `delta` when absent. Returns the new score.
    async fn increment(&self, chat_id: i64, username: &str, delta: i64)
        -> Result<i64, ScoreError>;

    /// Score, rank and chat size together. `None` when the user has no score.
    async fn standing(&self, chat_id: i64, username: &str)
        -> Result<Option<Standing>, ScoreError>;

    /// Up to `n + 1` entries (inclusive range `0..=n`), highest first.
    async fn top(&self, chat_id: i64, n: usize) -> Result<Vec<ScoreEntry>, ScoreError>;

    /// Health check run before accepting traffic.
    async fn ping(&self) -> Result<(), ScoreError>;
}
