//! The chat surface a command handler talks to.

use async_trait::async_trait;

use super::TelegramError;

/// Identifies a message that can be edited later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i32);

/// Minimal view of a Telegram user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: i64,
    pub first_name: String,
}

impl UserInfo {
    /// Deep link opening the user's profile.
    pub fn profile_link(&self) -> String {
        format!("tg://user?id={}", self.id)
    }
}

/// One inbound message and the chat it arrived in.
#[async_trait]
pub trait Conversation: Send + Sync {
    /// The message that triggered the command.
    fn trigger(&self) -> MessageRef;

    /// Whether the triggering message was sent by this account.
    fn is_outgoing(&self) -> bool;

    /// Sender of the triggering message, if known without a network call.
    fn sender_id(&self) -> Option<i64>;

    /// Resolves the sender of the triggering message.
    async fn sender(&self) -> Result<UserInfo, TelegramError>;

    /// Replies to the triggering message.
    async fn reply(&self, text: &str) -> Result<MessageRef, TelegramError>;

    /// Edits a message previously sent or received in this conversation.
    async fn edit(&self, message: MessageRef, text: &str) -> Result<(), TelegramError>;

    /// Fetches the identity of the logged-in account.
    async fn whoami(&self) -> Result<UserInfo, TelegramError>;
}

/// Writes `text` where the user will see it fastest: over the trigger when
/// it is our own message, as a reply otherwise.
pub async fn respond_in_place(
    conversation: &dyn Conversation,
    text: &str,
) -> Result<MessageRef, TelegramError> {
    if conversation.is_outgoing() {
        let trigger = conversation.trigger();
        conversation.edit(trigger, text).await?;
        Ok(trigger)
    } else {
        conversation.reply(text).await
    }
}
