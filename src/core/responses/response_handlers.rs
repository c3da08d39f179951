// Response handlers - the observable behaviors of the bot.
//
// **Notice the pattern:**
// 1. Read/write scores through the leveling service
// 2. Consult the level table
// 3. Hand a formatted message to the outbox
//
// Every handler takes the shared `BotContext` by reference. Nothing here is
// global or mutable after startup.

use super::outbox::{ChatOutbox, InboundMessage, OutboundMessage, OutboxError};
use crate::core::commands::{BotCommand, GrantProblem};
use crate::core::leveling::{LevelTable, LevelingError, LevelingService, ScoreEntry, ScoreStore};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info};

pub const GIVE_XP_USAGE: &str = "Usage: `/givexp @username 123`";

pub const PRIVATE_CHAT_XP: &str = "Sorry, you can't gain XP in private chats.";

pub const ADD_TO_GROUP: &str = "Please add me to a group.";

pub const HELP_TEXT: &str = "I track how much everyone talks here. Every message earns 1 XP.\n\
    \n\
    <b>Commands</b>\n\
    /xp - your XP, level and rank\n\
    /xp @user - someone else's XP\n\
    /ranks - the top of the leaderboard\n\
    /givexp @user 123 - give or take XP (admins only)";

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Leveling(#[from] LevelingError),

    #[error(transparent)]
    Outbox(#[from] OutboxError),
}

/// Everything a handler needs, built once at startup and shared read-only.
pub struct BotContext<S: ScoreStore, O: ChatOutbox> {
    pub leveling: LevelingService<S>,
    pub outbox: O,
    /// Usernames allowed to run `/givexp`, without the leading `@`.
    pub admins: HashSet<String>,
    pub not_an_admin: String,
    /// Rows shown by `/ranks`.
    pub ranks_shown: usize,
}

impl<S: ScoreStore, O: ChatOutbox> BotContext<S, O> {
    pub fn is_admin(&self, username: &str) -> bool {
        self.admins.contains(username)
    }
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Route a classified command to its handler.
pub async fn handle_command<S: ScoreStore, O: ChatOutbox>(
    ctx: &BotContext<S, O>,
    message: &InboundMessage,
    command: BotCommand,
) -> Result<(), HandlerError> {
    if !message.is_group {
        return handle_private_command(ctx, message, command).await;
    }

    match command {
        BotCommand::NotACommand => Ok(()),
        BotCommand::XpQuery { target } => handle_xp_query(ctx, message, target).await,
        BotCommand::GiveXp { target, amount } => {
            handle_give_xp(ctx, message, Ok((target, amount))).await
        }
        BotCommand::MalformedGiveXp(problem) => handle_give_xp(ctx, message, Err(problem)).await,
        BotCommand::Ranks => handle_ranks(ctx, message.chat_id).await,
        BotCommand::Help => handle_help(ctx, message).await,
    }
}

/// Private chats have no leaderboard. Only help is answered normally.
async fn handle_private_command<S: ScoreStore, O: ChatOutbox>(
    ctx: &BotContext<S, O>,
    message: &InboundMessage,
    command: BotCommand,
) -> Result<(), HandlerError> {
    let reply = match command {
        BotCommand::NotACommand => return Ok(()),
        BotCommand::Help => return handle_help(ctx, message).await,
        BotCommand::XpQuery { .. } => {
            OutboundMessage::html(message.chat_id, PRIVATE_CHAT_XP)
                .reply_to(Some(message.message_id))
        }
        BotCommand::GiveXp { .. } | BotCommand::MalformedGiveXp(_) | BotCommand::Ranks => {
            OutboundMessage::html(message.chat_id, ADD_TO_GROUP)
        }
    };

    debug!(chat_id = message.chat_id, "Command refused in private chat");
    ctx.outbox.send(reply).await?;
    Ok(())
}

/// `/xp [username]`
pub async fn handle_xp_query<S: ScoreStore, O: ChatOutbox>(
    ctx: &BotContext<S, O>,
    message: &InboundMessage,
    target: Option<String>,
) -> Result<(), HandlerError> {
    let Some(username) = target.or_else(|| message.sender.clone()) else {
        debug!(chat_id = message.chat_id, "XP query without target or sender");
        return Ok(());
    };

    announce_xp(ctx, message.chat_id, &username, Some(message.message_id)).await
}

/// `/givexp <username> <amount>`
///
/// Authorization comes first: a non-admin is refused whatever the arguments.
/// A wrong token count gets the usage hint, an unparseable amount is dropped
/// without a reply.
pub async fn handle_give_xp<S: ScoreStore, O: ChatOutbox>(
    ctx: &BotContext<S, O>,
    message: &InboundMessage,
    grant: Result<(String, i64), GrantProblem>,
) -> Result<(), HandlerError> {
    let from_admin = message
        .sender
        .as_deref()
        .is_some_and(|sender| ctx.is_admin(sender));

    if !from_admin {
        info!(
            chat_id = message.chat_id,
            sender = ?message.sender,
            "Refused /givexp from non-admin"
        );
        let denial = OutboundMessage::markdown(message.chat_id, ctx.not_an_admin.clone())
            .reply_to(Some(message.message_id));
        ctx.outbox.send(denial).await?;
        return Ok(());
    }

    let (username, amount) = match grant {
        Ok(parsed) => parsed,
        Err(GrantProblem::WrongArity) => {
            let usage = OutboundMessage::markdown(message.chat_id, GIVE_XP_USAGE)
                .reply_to(Some(message.message_id));
            ctx.outbox.send(usage).await?;
            return Ok(());
        }
        Err(GrantProblem::BadAmount { raw }) => {
            debug!(chat_id = message.chat_id, amount = %raw, "Ignoring /givexp with bad amount");
            return Ok(());
        }
    };

    let new_xp = ctx
        .leveling
        .grant_xp(message.chat_id, &username, amount)
        .await?;
    info!(
        chat_id = message.chat_id,
        admin = ?message.sender,
        username = %username,
        amount,
        new_xp,
        "Granted XP"
    );

    announce_xp(ctx, message.chat_id, &username, Some(message.message_id)).await
}

/// `/ranks` - posted fresh, not as a reply.
pub async fn handle_ranks<S: ScoreStore, O: ChatOutbox>(
    ctx: &BotContext<S, O>,
    chat_id: i64,
) -> Result<(), HandlerError> {
    let entries = ctx.leveling.leaderboard(chat_id, ctx.ranks_shown).await?;
    if entries.is_empty() {
        debug!(chat_id, "Leaderboard is empty");
        return Ok(());
    }

    let text = format_leaderboard(ctx.leveling.levels(), &entries);
    ctx.outbox.send(OutboundMessage::html(chat_id, text)).await?;
    Ok(())
}

/// `/help` and `/start`
pub async fn handle_help<S: ScoreStore, O: ChatOutbox>(
    ctx: &BotContext<S, O>,
    message: &InboundMessage,
) -> Result<(), HandlerError> {
    let help = OutboundMessage::html(message.chat_id, HELP_TEXT).reply_to(Some(message.message_id));
    ctx.outbox.send(help).await?;
    Ok(())
}

// ============================================================================
// PASSIVE XP
// ============================================================================

/// +1 XP for the sender; announce when the level changed.
pub async fn handle_passive_xp<S: ScoreStore, O: ChatOutbox>(
    ctx: &BotContext<S, O>,
    chat_id: i64,
    username: &str,
) -> Result<(), HandlerError> {
    let level_up = match ctx.leveling.record_message(chat_id, username).await {
        Ok(level_up) => level_up,
        Err(LevelingError::OnCooldown(remaining)) => {
            debug!(chat_id, username, ?remaining, "Passive XP on cooldown");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    if let Some(event) = level_up {
        info!(
            chat_id = event.chat_id,
            username = %event.username,
            old_level = event.old_level,
            new_level = event.new_level,
            total_xp = event.total_xp,
            "User leveled up"
        );
        announce_xp(ctx, chat_id, username, None).await?;
    }

    Ok(())
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Post the user's XP card. Silent when the user has no score.
pub async fn announce_xp<S: ScoreStore, O: ChatOutbox>(
    ctx: &BotContext<S, O>,
    chat_id: i64,
    username: &str,
    reply_to: Option<i32>,
) -> Result<(), HandlerError> {
    let Some(standing) = ctx.leveling.standing(chat_id, username).await? else {
        debug!(chat_id, username, "No score yet, nothing to announce");
        return Ok(());
    };

    let level = ctx.leveling.resolve_level(standing.xp);
    let text = level.format_title(
        &escape_html(username),
        standing.xp,
        standing.rank,
        standing.total,
    );

    ctx.outbox
        .send(OutboundMessage::html(chat_id, text).reply_to(reply_to))
        .await?;
    Ok(())
}

pub fn format_leaderboard(levels: &LevelTable, entries: &[ScoreEntry]) -> String {
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            format!(
                "{} <b>{}</b> \u{2013}\u{2060} {} ({} XP)",
                rank_glyph(i + 1),
                escape_html(&entry.username),
                levels.resolve(entry.xp).title,
                entry.xp
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn rank_glyph(rank: usize) -> String {
    match rank {
        1 => "🥇".to_string(),
        2 => "🥈".to_string(),
        3 => "🥉".to_string(),
        n => format!("#{}", n),
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
