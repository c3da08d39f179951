// Response handlers, the outbound chat port, and per-message dispatch.

pub mod dispatch;
pub mod outbox;
pub mod response_handlers;

pub use dispatch::dispatch;
pub use outbox::{ChatOutbox, InboundMessage, OutboundMessage, OutboxError, TextFormat};
pub use response_handlers::BotContext;
