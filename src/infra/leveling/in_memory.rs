// This file provides an IN-MEMORY implementation of ScoreStore.
//
// It mirrors the sorted-set behavior of the Redis store closely enough for
// tests and local runs (`memory://`): descending score order, ties ordered by
// descending member name, 1-based reverse rank.

use crate::core::leveling::{ChatKeys, ScoreEntry, ScoreError, ScoreStore, Standing};
use async_trait::async_trait;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::HashMap;

/// In-memory implementation of ScoreStore.
///
/// **DashMap:**
/// One shard lock per chat key. Holding the entry while mutating a chat's
/// set makes every increment atomic, and holding a read guard makes
/// `standing` a consistent snapshot.
pub struct InMemoryScoreStore {
    keys: ChatKeys,
    /// Maps chat key -> (username -> score)
    sets: DashMap<String, HashMap<String, i64>>,
}

impl InMemoryScoreStore {
    pub fn new() -> Self {
        Self::with_keys(ChatKeys::default())
    }

    pub fn with_keys(keys: ChatKeys) -> Self {
        Self {
            keys,
            sets: DashMap::new(),
        }
    }
}

impl Default for InMemoryScoreStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Leaderboard order: higher score first, then reverse member order.
fn leaderboard_order(a: (&str, i64), b: (&str, i64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| b.0.cmp(a.0))
}

#[async_trait]
impl ScoreStore for InMemoryScoreStore {
    async fn increment(
        &self,
        chat_id: i64,
        username: &str,
        delta: i64,
    ) -> Result<i64, ScoreError> {
        let mut set = self.sets.entry(self.keys.key(chat_id)).or_default();
        let score = set.entry(username.to_string()).or_insert(0);
        *score = score.saturating_add(delta);
        Ok(*score)
    }

    async fn standing(
        &self,
        chat_id: i64,
        username: &str,
    ) -> Result<Option<Standing>, ScoreError> {
        let Some(set) = self.sets.get(&self.keys.key(chat_id)) else {
            return Ok(None);
        };
        let Some(&xp) = set.get(username) else {
            return Ok(None);
        };

        let ahead = set
            .iter()
            .filter(|(name, score)| {
                leaderboard_order((name.as_str(), **score), (username, xp)) == Ordering::Less
            })
            .count();

        Ok(Some(Standing {
            xp,
            rank: ahead as u64 + 1,
            total: set.len() as u64,
        }))
    }

    async fn top(&self, chat_id: i64, n: usize) -> Result<Vec<ScoreEntry>, ScoreError> {
        let Some(set) = self.sets.get(&self.keys.key(chat_id)) else {
            return Ok(Vec::new());
        };

        let mut entries: Vec<ScoreEntry> = set
            .iter()
            .map(|(username, xp)| ScoreEntry {
                username: username.clone(),
                xp: *xp,
            })
            .collect();
        entries.sort_by(|a, b| {
            leaderboard_order((a.username.as_str(), a.xp), (b.username.as_str(), b.xp))
        });
        // Inclusive range, like ZREVRANGE 0 n.
        entries.truncate(n.saturating_add(1));

        Ok(entries)
    }

    async fn ping(&self) -> Result<(), ScoreError> {
        Ok(())
    }
}
