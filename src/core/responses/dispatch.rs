// Per-message dispatch.
//
// Each inbound message becomes up to two independent units of work: the
// command unit (if the text is a command) and the passive XP unit (if the
// sender is known and the chat is a group). Units run concurrently with no ordering guarantee and
// fail independently.

use super::outbox::{ChatOutbox, InboundMessage};
use super::response_handlers::{handle_command, handle_passive_xp, BotContext, HandlerError};
use crate::core::commands::{classify, BotCommand};
use crate::core::leveling::ScoreStore;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Command,
    PassiveXp,
}

#[derive(Debug)]
pub enum UnitOutcome {
    Done(UnitKind),
    Failed(UnitKind, HandlerError),
    Panicked(String),
}

/// The spawned units of one message.
pub struct MessageUnits {
    chat_id: i64,
    units: JoinSet<(UnitKind, Result<(), HandlerError>)>,
}

impl MessageUnits {
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Wait for every unit and collect what happened.
    pub async fn join(mut self) -> Vec<UnitOutcome> {
        let mut outcomes = Vec::with_capacity(self.units.len());
        while let Some(joined) = self.units.join_next().await {
            outcomes.push(match joined {
                Ok((kind, Ok(()))) => UnitOutcome::Done(kind),
                Ok((kind, Err(err))) => UnitOutcome::Failed(kind, err),
                Err(join_err) => UnitOutcome::Panicked(join_err.to_string()),
            });
        }
        outcomes
    }

    /// Let the units run on their own; failures are logged, never returned.
    pub fn detach(self) {
        let chat_id = self.chat_id;
        tokio::spawn(async move {
            for outcome in self.join().await {
                match outcome {
                    UnitOutcome::Done(kind) => {
                        debug!(chat_id, unit = ?kind, "Message handler finished");
                    }
                    UnitOutcome::Failed(kind, err) => {
                        error!(chat_id, unit = ?kind, error = %err, "Message handler failed");
                    }
                    UnitOutcome::Panicked(reason) => {
                        error!(chat_id, reason = %reason, "Message handler panicked");
                    }
                }
            }
        });
    }
}

/// Classify a message and spawn its units.
pub fn dispatch<S, O>(ctx: Arc<BotContext<S, O>>, message: InboundMessage) -> MessageUnits
where
    S: ScoreStore + 'static,
    O: ChatOutbox + 'static,
{
    let mut units = JoinSet::new();
    let message = Arc::new(message);
    let command = classify(&message.text);

    if command != BotCommand::NotACommand {
        debug!(chat_id = message.chat_id, ?command, "Command recognized");
        let ctx = Arc::clone(&ctx);
        let message = Arc::clone(&message);
        units.spawn(async move {
            let result = handle_command(&ctx, &message, command).await;
            (UnitKind::Command, result)
        });
    }

    let passive_sender = message.sender.clone().filter(|_| message.is_group);
    if let Some(sender) = passive_sender {
        let ctx = Arc::clone(&ctx);
        let chat_id = message.chat_id;
        units.spawn(async move {
            let result = handle_passive_xp(&ctx, chat_id, &sender).await;
            (UnitKind::PassiveXp, result)
        });
    }

    MessageUnits {
        chat_id: message.chat_id,
        units,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::leveling::level_table::tests::level;
    use crate::core::leveling::{LevelTable, LevelingService, ScoreError, ScoreEntry, Standing};
    use crate::core::responses::outbox::testing::RecordingOutbox;
    use crate::infra::leveling::InMemoryScoreStore;
    use async_trait::async_trait;
    use std::collections::HashSet;

    const CHAT: i64 = 77;

    fn make_ctx<S: ScoreStore>(store: S) -> Arc<BotContext<S, RecordingOutbox>> {
        let levels = LevelTable::new(vec![level(1, 0), level(2, 50), level(3, 150)]).unwrap();
        Arc::new(BotContext {
            leveling: LevelingService::new(store, levels),
            outbox: RecordingOutbox::default(),
            admins: HashSet::from(["root".to_string()]),
            not_an_admin: "no".to_string(),
            ranks_shown: 10,
        })
    }

    fn msg(sender: Option<&str>, text: &str, message_id: i32) -> InboundMessage {
        InboundMessage {
            chat_id: CHAT,
            sender: sender.map(str::to_string),
            text: text.to_string(),
            message_id,
            is_group: true,
        }
    }

    struct BrokenStore;

    #[async_trait]
    impl ScoreStore for BrokenStore {
        async fn increment(&self, _: i64, _: &str, _: i64) -> Result<i64, ScoreError> {
            Err(ScoreError::Backend("READONLY".to_string()))
        }

        async fn standing(&self, _: i64, _: &str) -> Result<Option<Standing>, ScoreError> {
            Err(ScoreError::Backend("READONLY".to_string()))
        }

        async fn top(&self, _: i64, _: usize) -> Result<Vec<ScoreEntry>, ScoreError> {
            Ok(Vec::new())
        }

        async fn ping(&self) -> Result<(), ScoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn hundred_messages_yield_one_announcement() {
        let ctx = make_ctx(InMemoryScoreStore::new());

        for id in 1..=100 {
            let outcomes = dispatch(Arc::clone(&ctx), msg(Some("dave"), "hello", id))
                .join()
                .await;
            assert!(matches!(
                outcomes.as_slice(),
                [UnitOutcome::Done(UnitKind::PassiveXp)]
            ));
        }

        let standing = ctx.leveling.standing(CHAT, "dave").await.unwrap().unwrap();
        assert_eq!(standing.xp, 100);
        assert_eq!(ctx.leveling.resolve_level(standing.xp).xp, 150);

        let sent = ctx.outbox.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_to, None);
        assert!(sent[0].text.starts_with("dave has 50 XP"));
    }

    #[tokio::test]
    async fn commands_also_earn_passive_xp() {
        let ctx = make_ctx(InMemoryScoreStore::new());

        let units = dispatch(Arc::clone(&ctx), msg(Some("amy"), "/ranks", 1));
        assert_eq!(units.len(), 2);
        let outcomes = units.join().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, UnitOutcome::Done(_))));

        let standing = ctx.leveling.standing(CHAT, "amy").await.unwrap().unwrap();
        assert_eq!(standing.xp, 1);
    }

    #[tokio::test]
    async fn anonymous_messages_earn_nothing() {
        let ctx = make_ctx(InMemoryScoreStore::new());

        let units = dispatch(Arc::clone(&ctx), msg(None, "hi", 1));
        assert_eq!(units.len(), 0);
        assert!(units.join().await.is_empty());
        assert!(ctx.leveling.leaderboard(CHAT, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unit_failures_are_isolated() {
        let ctx = make_ctx(BrokenStore);

        let outcomes = dispatch(Arc::clone(&ctx), msg(Some("amy"), "/ranks", 1))
            .join()
            .await;

        let failed = outcomes
            .iter()
            .filter(|o| matches!(o, UnitOutcome::Failed(UnitKind::PassiveXp, _)))
            .count();
        let done = outcomes
            .iter()
            .filter(|o| matches!(o, UnitOutcome::Done(UnitKind::Command)))
            .count();
        assert_eq!((failed, done), (1, 1));
        assert!(ctx.outbox.sent().is_empty());
    }

    #[tokio::test]
    async fn xp_query_for_other_user_replies_to_trigger() {
        let ctx = make_ctx(InMemoryScoreStore::new());
        ctx.leveling.grant_xp(CHAT, "bob", 20).await.unwrap();

        dispatch(Arc::clone(&ctx), msg(Some("amy"), "/xp @bob", 9))
            .join()
            .await;

        let sent = ctx.outbox.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].text.starts_with("bob has 20 XP"));
        assert_eq!(sent[0].reply_to, Some(9));
    }

    #[tokio::test]
    async fn detached_units_still_run() {
        let ctx = make_ctx(InMemoryScoreStore::new());

        dispatch(Arc::clone(&ctx), msg(Some("lee"), "hey", 1)).detach();

        for _ in 0..100 {
            if ctx.leveling.standing(CHAT, "lee").await.unwrap().is_some() {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("detached passive XP unit never ran");
    }

    #[tokio::test]
    async fn private_chats_earn_no_xp() {
        let ctx = make_ctx(InMemoryScoreStore::new());
        let private = InboundMessage {
            is_group: false,
            ..msg(Some("dm_user"), "hello", 1)
        };

        let units = dispatch(Arc::clone(&ctx), private);
        assert_eq!(units.len(), 0);
        units.join().await;

        let ranks = InboundMessage {
            is_group: false,
            ..msg(Some("dm_user"), "/ranks", 2)
        };
        let outcomes = dispatch(Arc::clone(&ctx), ranks).join().await;
        assert!(matches!(
            outcomes.as_slice(),
            [UnitOutcome::Done(UnitKind::Command)]
        ));

        assert!(ctx.leveling.standing(CHAT, "dm_user").await.unwrap().is_none());
        let sent = ctx.outbox.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "Please add me to a group.");
    }
}
