// Long-poll update loop. Translates teloxide messages into core inbound
// messages and hands them to the dispatcher.

use super::telegram_outbox::TelegramOutbox;
use crate::core::leveling::ScoreStore;
use crate::core::responses::{dispatch, BotContext, InboundMessage};
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, info};

/// Extract the fields the core cares about.
///
/// Non-text messages (stickers, captioned photos) still earn XP, but only a
/// real text is ever classified, so their text is empty.
pub fn to_inbound(msg: &Message) -> InboundMessage {
    InboundMessage {
        chat_id: msg.chat.id.0,
        sender: msg.from.as_ref().and_then(|user| user.username.clone()),
        text: msg.text().unwrap_or_default().to_string(),
        message_id: msg.id.0,
        is_group: !msg.chat.is_private(),
    }
}

/// Run until Ctrl+C. Every message is dispatched and its units detached, so
/// a slow store call never holds up the next update.
pub async fn run<S>(bot: Bot, ctx: Arc<BotContext<S, TelegramOutbox>>)
where
    S: ScoreStore + 'static,
{
    let handler = Update::filter_message().endpoint(move |msg: Message| {
        let ctx = Arc::clone(&ctx);
        async move {
            let inbound = to_inbound(&msg);
            debug!(
                chat_id = inbound.chat_id,
                sender = ?inbound.sender,
                message_id = inbound.message_id,
                "Message received"
            );
            dispatch(ctx, inbound).detach();
            respond(())
        }
    });

    info!("Streaming messages");

    Dispatcher::builder(bot, handler)
        .default_handler(|upd| async move {
            debug!(update_id = ?upd.id, "Ignoring non-message update");
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("No more updates");
}
