// This is the leveling service - the business logic sitting between the
// response handlers and the score store.
// Notice how this module has NO Telegram-specific code. It works with
// primitive types (i64 chat IDs, usernames) so any chat frontend can drive it.

use super::level_table::{Level, LevelTable};
use super::score_store::{ScoreEntry, ScoreError, ScoreStore, Standing};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default bound on every store call.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

// ============================================================================
// DOMAIN MODELS
// ============================================================================

/// Returned when a passive increment moved the user into another level.
/// The handlers use it to announce the new standing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelUpEvent {
    pub chat_id: i64,
    pub username: String,
    pub old_level: u32,
    pub new_level: u32,
    pub total_xp: i64,
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum LevelingError {
    #[error("User is on cooldown. Time remaining: {0:?}")]
    OnCooldown(Duration),

    #[error(transparent)]
    Storage(#[from] ScoreError),

    #[error("Score store call timed out after {0:?}")]
    Timeout(Duration),
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// The main service for leveling operations.
///
/// **Generic over S: ScoreStore**
/// Redis in production, the in-memory store in tests. The service only sees
/// the trait.
pub struct LevelingService<S: ScoreStore> {
    store: S,
    levels: LevelTable,
    /// Upper bound for each store round trip.
    timeout: Duration,
    /// Minimum gap between two passive XP gains of the same user in the same
    /// chat. Zero disables the check.
    cooldown: Duration,
    last_gain: DashMap<(i64, String), Instant>,
}

impl<S: ScoreStore> LevelingService<S> {
    pub fn new(store: S, levels: LevelTable) -> Self {
        Self {
            store,
            levels,
            timeout: DEFAULT_STORE_TIMEOUT,
            cooldown: Duration::ZERO,
            last_gain: DashMap::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn levels(&self) -> &LevelTable {
        &self.levels
    }

    pub fn resolve_level(&self, xp: i64) -> &Level {
        self.levels.resolve(xp)
    }

    /// Run one store call under the configured timeout.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, ScoreError>>,
    ) -> Result<T, LevelingError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(LevelingError::Timeout(self.timeout)),
        }
    }

    fn check_cooldown(&self, chat_id: i64, username: &str) -> Result<(), LevelingError> {
        if self.cooldown.is_zero() {
            return Ok(());
        }

        let now = Instant::now();
        match self.last_gain.entry((chat_id, username.to_string())) {
            Entry::Occupied(mut last) => {
                let elapsed = now.duration_since(*last.get());
                if elapsed < self.cooldown {
                    return Err(LevelingError::OnCooldown(self.cooldown - elapsed));
                }
                last.insert(now);
            }
            Entry::Vacant(slot) => {
                slot.insert(now);
            }
        }

        Ok(())
    }

    /// Passive +1 for a message.
    ///
    /// **Returns:**
    /// - `Ok(Some(LevelUpEvent))` if the increment crossed a level boundary
    /// - `Ok(None)` if XP was awarded without a level change
    /// - `Err(LevelingError::OnCooldown)` if the cooldown is active
    ///
    /// The old level is derived from the post-increment score, so the check is
    /// consistent for this increment only. Concurrent increments of the same
    /// user may each report a change.
    pub async fn record_message(
        &self,
        chat_id: i64,
        username: &str,
    ) -> Result<Option<LevelUpEvent>, LevelingError> {
        const INCREMENT: i64 = 1;

        self.check_cooldown(chat_id, username)?;

        let new_xp = self
            .bounded(self.store.increment(chat_id, username, INCREMENT))
            .await?;
        let old_xp = new_xp - INCREMENT;

        let old_level = self.levels.resolve(old_xp);
        let new_level = self.levels.resolve(new_xp);

        if std::ptr::eq(old_level, new_level) {
            return Ok(None);
        }

        Ok(Some(LevelUpEvent {
            chat_id,
            username: username.to_string(),
            old_level: old_level.level,
            new_level: new_level.level,
            total_xp: new_xp,
        }))
    }

    /// Admin grant. `delta` may be negative. Returns the new score.
    pub async fn grant_xp(
        &self,
        chat_id: i64,
        username: &str,
        delta: i64,
    ) -> Result<i64, LevelingError> {
        self.bounded(self.store.increment(chat_id, username, delta))
            .await
    }

    /// Score, rank and total for one user; `None` when unscored.
    pub async fn standing(
        &self,
        chat_id: i64,
        username: &str,
    ) -> Result<Option<Standing>, LevelingError> {
        self.bounded(self.store.standing(chat_id, username)).await
    }

    /// The top `shown` entries of a chat, highest first.
    pub async fn leaderboard(
        &self,
        chat_id: i64,
        shown: usize,
    ) -> Result<Vec<ScoreEntry>, LevelingError> {
        let mut entries = self.bounded(self.store.top(chat_id, shown)).await?;
        // The store range is inclusive and returns one extra row.
        entries.truncate(shown);
        Ok(entries)
    }

    pub async fn ping(&self) -> Result<(), LevelingError> {
        self.bounded(self.store.ping()).await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::leveling::level_table::tests::level;
    use crate::infra::leveling::InMemoryScoreStore;
    use async_trait::async_trait;

    fn make_service() -> LevelingService<InMemoryScoreStore> {
        let levels = LevelTable::new(vec![level(1, 0), level(2, 50), level(3, 150)]).unwrap();
        LevelingService::new(InMemoryScoreStore::new(), levels)
    }

    struct StalledStore;

    #[async_trait]
    impl ScoreStore for StalledStore {
        async fn increment(&self, _: i64, _: &str, _: i64) -> Result<i64, ScoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(0)
        }

        async fn standing(&self, _: i64, _: &str) -> Result<Option<Standing>, ScoreError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(None)
        }

        async fn top(&self, _: i64, _: usize) -> Result<Vec<ScoreEntry>, ScoreError> {
            Err(ScoreError::Backend("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<(), ScoreError> {
            Err(ScoreError::Backend("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn record_message_reports_level_change_once() {
        let service = make_service();
        let mut events = Vec::new();

        for _ in 0..100 {
            if let Some(event) = service.record_message(1, "dave").await.unwrap() {
                events.push(event);
            }
        }

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].total_xp, 50);
        assert_eq!(events[0].old_level, 2);
        assert_eq!(events[0].new_level, 3);

        let standing = service.standing(1, "dave").await.unwrap().unwrap();
        assert_eq!(standing.xp, 100);
    }

    #[tokio::test]
    async fn grant_can_remove_xp() {
        let service = make_service();

        service.grant_xp(1, "bob", 20).await.unwrap();
        let score = service.grant_xp(1, "bob", -50).await.unwrap();

        assert_eq!(score, -30);
        assert_eq!(service.resolve_level(score).level, 1);
    }

    #[tokio::test]
    async fn standing_of_unscored_user_is_none() {
        let service = make_service();
        service.grant_xp(1, "alice", 5).await.unwrap();

        assert!(service.standing(1, "nobody").await.unwrap().is_none());
        assert!(service.standing(2, "alice").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn leaderboard_is_truncated_to_requested_size() {
        let service = make_service();
        for i in 0..15 {
            service.grant_xp(9, &format!("user{:02}", i), i).await.unwrap();
        }

        let board = service.leaderboard(9, 10).await.unwrap();
        assert_eq!(board.len(), 10);
        assert_eq!(board[0].username, "user14");
        assert_eq!(board[9].username, "user05");

        assert!(service.leaderboard(10, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cooldown_blocks_rapid_passive_gains() {
        let service = make_service().with_cooldown(Duration::from_secs(60));

        assert!(service.record_message(1, "eve").await.is_ok());
        let second = service.record_message(1, "eve").await;
        assert!(matches!(second, Err(LevelingError::OnCooldown(_))));

        // Other chats and users have their own windows.
        assert!(service.record_message(2, "eve").await.is_ok());
        assert!(service.record_message(1, "frank").await.is_ok());

        let standing = service.standing(1, "eve").await.unwrap().unwrap();
        assert_eq!(standing.xp, 1);
    }

    #[tokio::test]
    async fn store_calls_are_bounded_by_timeout() {
        let levels = LevelTable::new(vec![level(1, 0)]).unwrap();
        let service = LevelingService::new(StalledStore, levels)
            .with_timeout(Duration::from_millis(20));

        let result = service.record_message(1, "slow").await;
        assert!(matches!(result, Err(LevelingError::Timeout(_))));

        let result = service.standing(1, "slow").await;
        assert!(matches!(result, Err(LevelingError::Timeout(_))));
    }

    #[tokio::test]
    async fn backend_failures_surface_as_storage_errors() {
        let levels = LevelTable::new(vec![level(1, 0)]).unwrap();
        let service = LevelingService::new(StalledStore, levels);

        let err = service.leaderboard(1, 10).await.unwrap_err();
        assert!(matches!(err, LevelingError::Storage(_)));
        assert!(err.to_string().contains("connection refused"));
        assert!(service.ping().await.is_err());
    }
}
