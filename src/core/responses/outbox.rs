// Chat transport ports. Inbound messages arrive as plain data; outbound
// messages leave through the `ChatOutbox` trait so handlers never touch a
// platform SDK directly.

use async_trait::async_trait;
use thiserror::Error;

/// One message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    /// `None` when the sender has no username; such messages earn no XP.
    pub sender: Option<String>,
    pub text: String,
    pub message_id: i32,
    /// `false` for private chats, where XP is not tracked.
    pub is_group: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Html,
    Markdown,
}

/// One message to post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: i64,
    pub text: String,
    /// Thread the reply under this message, or post fresh when `None`.
    pub reply_to: Option<i32>,
    pub format: TextFormat,
    pub suppress_link_preview: bool,
}

impl OutboundMessage {
    /// HTML message without link previews, the bot's default shape.
    pub fn html(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            reply_to: None,
            format: TextFormat::Html,
            suppress_link_preview: true,
        }
    }

    pub fn markdown(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            format: TextFormat::Markdown,
            ..Self::html(chat_id, text)
        }
    }

    pub fn reply_to(mut self, message_id: Option<i32>) -> Self {
        self.reply_to = message_id;
        self
    }
}

#[derive(Debug, Error)]
pub enum OutboxError {
    #[error("Failed to send message to chat {chat_id}: {reason}")]
    Send { chat_id: i64, reason: String },
}

#[async_trait]
pub trait ChatOutbox: Send + Sync {
    async fn send(&self, message: OutboundMessage) -> Result<(), OutboxError>;
}
