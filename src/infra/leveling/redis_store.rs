// Redis implementation of ScoreStore.
// One sorted set per chat; members are usernames, scores are XP.

use crate::core::leveling::{ChatKeys, ScoreEntry, ScoreError, ScoreStore, Standing};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

impl From<redis::RedisError> for ScoreError {
    fn from(e: redis::RedisError) -> Self {
        ScoreError::Backend(e.to_string())
    }
}

/// Sorted-set score store backed by Redis.
///
/// `ConnectionManager` multiplexes one connection and reconnects on its own,
/// so each call just clones the handle.
pub struct RedisScoreStore {
    keys: ChatKeys,
    conn: ConnectionManager,
}

impl RedisScoreStore {
    pub async fn connect(url: &str, keys: ChatKeys) -> Result<Self, ScoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { keys, conn })
    }
}

#[async_trait]
impl ScoreStore for RedisScoreStore {
    async fn increment(
        &self,
        chat_id: i64,
        username: &str,
        delta: i64,
    ) -> Result<i64, ScoreError> {
        let mut conn = self.conn.clone();
        // ZINCRBY replies with the score as a float string.
        let score: f64 = conn.zincr(self.keys.key(chat_id), username, delta).await?;
        Ok(score as i64)
    }

    async fn standing(
        &self,
        chat_id: i64,
        username: &str,
    ) -> Result<Option<Standing>, ScoreError> {
        let mut conn = self.conn.clone();
        let key = self.keys.key(chat_id);

        // MULTI/EXEC so the three reads see the same leaderboard.
        let (score, rank, total): (Option<f64>, Option<u64>, u64) = redis::pipe()
            .atomic()
            .zscore(&key, username)
            .zrevrank(&key, username)
            .zcard(&key)
            .query_async(&mut conn)
            .await?;

        Ok(match (score, rank) {
            (Some(xp), Some(rank)) => Some(Standing {
                xp: xp as i64,
                rank: rank + 1,
                total,
            }),
            _ => None,
        })
    }

    async fn top(&self, chat_id: i64, n: usize) -> Result<Vec<ScoreEntry>, ScoreError> {
        let mut conn = self.conn.clone();
        let stop = isize::try_from(n).unwrap_or(isize::MAX);

        let rows: Vec<(String, f64)> = conn
            .zrevrange_withscores(self.keys.key(chat_id), 0, stop)
            .await?;

        Ok(rows
            .into_iter()
            .map(|(username, xp)| ScoreEntry {
                username,
                xp: xp as i64,
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), ScoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
