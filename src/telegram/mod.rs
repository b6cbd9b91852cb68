//! Telegram client wrapper module.
//!
//! Wraps the grammers client behind the small [`Conversation`] surface
//! that command handlers use, and sends the startup notification.

mod client;
mod conversation;
mod notifier;

pub use client::{TelegramBot, TelegramConversation, TelegramError};
pub use conversation::{Conversation, MessageRef, UserInfo, respond_in_place};
pub use grammers_client::message::Message;
pub use notifier::{StartupChannel, notify_startup, startup_message};
