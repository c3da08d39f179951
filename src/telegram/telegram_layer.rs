// Telegram layer - transport adapters for the core.

pub mod telegram_outbox;
pub mod update_listener;

pub use telegram_outbox::TelegramOutbox;
