//! One-shot startup notification.

use async_trait::async_trait;
use tracing::{error, info};

use super::conversation::UserInfo;
use super::{TelegramBot, TelegramError};

/// The two client calls the startup notification needs.
#[async_trait]
pub trait StartupChannel: Send + Sync {
    async fn whoami(&self) -> Result<UserInfo, TelegramError>;

    async fn send_to_chat(&self, chat_id: i64, text: &str) -> Result<(), TelegramError>;
}

#[async_trait]
impl StartupChannel for TelegramBot {
    async fn whoami(&self) -> Result<UserInfo, TelegramError> {
        TelegramBot::whoami(self).await
    }

    async fn send_to_chat(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        TelegramBot::send_to_chat(self, chat_id, text).await
    }
}

/// Builds the startup announcement for the given account.
pub fn startup_message(me: &UserInfo) -> String {
    format!(
        "🚀 Prince-X Userbot Activated!\n\n\
         👑 User: {} ({})\n\
         📅 System Status: Operational",
        me.first_name,
        me.profile_link()
    )
}

/// Announces the start in the log channel. Never fails: problems are
/// logged and swallowed.
pub async fn notify_startup(bot: &dyn StartupChannel, log_channel: i64) {
    if log_channel == 0 {
        info!("Skipping startup message - LOG_CHANNEL not set");
        return;
    }

    let result = async {
        let me = bot.whoami().await?;
        bot.send_to_chat(log_channel, &startup_message(&me)).await
    }
    .await;

    match result {
        Ok(()) => info!("Startup message sent to {}", log_channel),
        Err(e) => error!("Startup message error: {}", e),
    }
}
