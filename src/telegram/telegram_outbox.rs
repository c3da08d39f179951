// Telegram implementation of the outbound chat port.

use crate::core::responses::{ChatOutbox, OutboundMessage, OutboxError, TextFormat};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{LinkPreviewOptions, MessageId, ParseMode, ReplyParameters};

pub struct TelegramOutbox {
    bot: Bot,
}

impl TelegramOutbox {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[allow(deprecated)] // Legacy Markdown: admin-configured texts are not MarkdownV2-escaped.
fn parse_mode(format: TextFormat) -> ParseMode {
    match format {
        TextFormat::Html => ParseMode::Html,
        TextFormat::Markdown => ParseMode::Markdown,
    }
}

fn no_link_preview() -> LinkPreviewOptions {
    LinkPreviewOptions {
        is_disabled: true,
        url: None,
        prefer_small_media: false,
        prefer_large_media: false,
        show_above_text: false,
    }
}

#[async_trait]
impl ChatOutbox for TelegramOutbox {
    async fn send(&self, message: OutboundMessage) -> Result<(), OutboxError> {
        let chat_id = message.chat_id;

        let mut request = self
            .bot
            .send_message(ChatId(chat_id), message.text)
            .parse_mode(parse_mode(message.format));

        if message.suppress_link_preview {
            request = request.link_preview_options(no_link_preview());
        }

        if let Some(msg_id) = message.reply_to {
            request = request.reply_parameters(ReplyParameters::new(MessageId(msg_id)));
        }

        request.await.map_err(|e| OutboxError::Send {
            chat_id,
            reason: e.to_string(),
        })?;

        Ok(())
    }
}
