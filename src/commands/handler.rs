//! Command handler implementation.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::router::CommandRouter;
use super::types::{BotCommand, CommandResult, Delivery};
use crate::config::BotConfig;
use crate::lifecycle::{LifecycleMessage, RestartRequest};
use crate::services::{CompletionBackend, CompletionError, SystemReport, Uptime};
use crate::telegram::{Conversation, respond_in_place};

/// Placeholder card shown by `.gencard`. The number fails the Luhn check.
pub const FAKE_CARD: &str = "💳 Fake Card Generated!\n\n\
     Card: 0000 0000 0000 0001\n\
     Exp: 12/25\n\
     CVV: 123\n\n\
     📧 Temp Email: temp@princex.invalid";

/// Routes messages to commands and executes them.
pub struct CommandHandler {
    router: CommandRouter,

    config: Arc<BotConfig>,

    completion: Arc<dyn CompletionBackend>,

    uptime: Uptime,

    /// Channel to the lifecycle owner for restarts.
    lifecycle: mpsc::Sender<LifecycleMessage>,
}

impl CommandHandler {
    /// Creates a new command handler.
    ///
    /// # Errors
    ///
    /// Returns an error if the command prefix produces an invalid pattern.
    pub fn new(
        config: Arc<BotConfig>,
        completion: Arc<dyn CompletionBackend>,
        uptime: Uptime,
        lifecycle: mpsc::Sender<LifecycleMessage>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            router: CommandRouter::new(&config.command_prefix)?,
            config,
            completion,
            uptime,
            lifecycle,
        })
    }

    /// Tries to parse, execute and deliver a command from a message.
    ///
    /// Returns `None` if the message is not a command or its sender is not
    /// allowed to run commands.
    pub async fn try_handle(
        &self,
        conversation: &dyn Conversation,
        message_text: &str,
    ) -> Option<CommandResult> {
        let command = self.router.route(message_text)?;

        if !self.is_allowed(conversation) {
            debug!(
                "Ignoring {} from unauthorized sender {:?}",
                command,
                conversation.sender_id()
            );
            return None;
        }

        debug!("Handling command: {}", command);
        let result = self.execute(command, conversation).await;
        info!(
            "Command result: success={}, restart={}",
            result.success, result.restart
        );

        self.deliver(conversation, &result).await;
        if result.restart {
            self.request_restart().await;
        }

        Some(result)
    }

    /// Outgoing messages are the owner typing; others need an allow-listed sender.
    fn is_allowed(&self, conversation: &dyn Conversation) -> bool {
        conversation.is_outgoing()
            || conversation
                .sender_id()
                .is_some_and(|id| self.config.admins.permits(id))
    }

    /// Executes a parsed command.
    async fn execute(&self, command: BotCommand, conversation: &dyn Conversation) -> CommandResult {
        match command {
            BotCommand::Ping => handle_ping(conversation).await,
            BotCommand::SysInfo => self.handle_sysinfo(conversation).await,
            BotCommand::Restart => handle_restart(),
            BotCommand::Hello => handle_hello(conversation).await,
            BotCommand::Ask(question) => self.handle_ask(conversation, &question).await,
            BotCommand::GenCard => CommandResult::success(FAKE_CARD),
            BotCommand::Conn => self.handle_conn(conversation).await,
            BotCommand::Help => CommandResult::success(self.router.help()),
        }
    }

    async fn deliver(&self, conversation: &dyn Conversation, result: &CommandResult) {
        let sent = match result.delivery {
            Delivery::Reply => conversation.reply(&result.message).await.map(|_| ()),
            Delivery::Edit(target) => conversation.edit(target, &result.message).await,
        };
        if let Err(e) = sent {
            warn!("Failed to deliver command result: {}", e);
        }
    }

    async fn request_restart(&self) {
        match RestartRequest::current() {
            Ok(request) => {
                if self
                    .lifecycle
                    .send(LifecycleMessage::Restart(request))
                    .await
                    .is_err()
                {
                    error!("Lifecycle channel closed, cannot restart");
                }
            }
            Err(e) => error!("Cannot determine executable for restart: {}", e),
        }
    }

    async fn handle_sysinfo(&self, conversation: &dyn Conversation) -> CommandResult {
        let start = Instant::now();
        let placeholder = conversation.reply("📊 Collecting system data...").await;
        let response_ms = elapsed_ms(start);
        let placeholder = placeholder
            .inspect_err(|e| warn!("Failed to send placeholder: {}", e))
            .ok();

        let report = SystemReport::collect(&self.uptime).await;
        CommandResult::success(report.render(response_ms)).in_place_of(placeholder)
    }

    async fn handle_ask(&self, conversation: &dyn Conversation, question: &str) -> CommandResult {
        if question.is_empty() {
            return CommandResult::error(format!(
                "❌ Usage: {}ask <question>",
                self.router.prefix()
            ));
        }

        let placeholder = conversation
            .reply("💭 Thinking...")
            .await
            .inspect_err(|e| warn!("Failed to send placeholder: {}", e))
            .ok();

        let result = match self.completion.complete(question).await {
            Ok(answer) => CommandResult::success(format!("🤖 Prince-X AI\n\n{answer}")),
            Err(CompletionError::Status(status)) => {
                warn!("Completion API returned {}", status);
                CommandResult::error(format!("❌ API Error: {}", status.as_u16()))
            }
            Err(e) => {
                warn!("Completion failed: {}", e);
                CommandResult::error(format!("❌ Error: {e}"))
            }
        };
        result.in_place_of(placeholder)
    }

    async fn handle_conn(&self, conversation: &dyn Conversation) -> CommandResult {
        let start = Instant::now();
        let me = conversation.whoami().await;
        let round_trip = elapsed_ms(start);
        let profile = self.config.connection;

        let (success, status) = match me {
            Ok(me) => (true, format!("✅ Connected as {} ({})", me.first_name, me.id)),
            Err(e) => (false, format!("❌ {e}")),
        };
        let message = format!(
            "🔌 Connection Check\n\n\
             Status: {status}\n\
             Round Trip: {round_trip:.2}ms\n\
             Mode: {}\n\
             Port: {}",
            profile.mode, profile.port
        );

        if success {
            CommandResult::success(message)
        } else {
            CommandResult::error(message)
        }
    }
}

async fn handle_ping(conversation: &dyn Conversation) -> CommandResult {
    let start = Instant::now();
    match respond_in_place(conversation, "🏓 Pong!").await {
        Ok(target) => {
            let ms = elapsed_ms(start);
            CommandResult::success(format!("🏓 Pong!\n{ms:.2}ms")).in_place_of(Some(target))
        }
        Err(e) => CommandResult::error(format!("❌ Error: {e}")),
    }
}

fn handle_restart() -> CommandResult {
    CommandResult::restart("🔄 Restarting Prince-X Userbot...")
}

async fn handle_hello(conversation: &dyn Conversation) -> CommandResult {
    match conversation.sender().await {
        Ok(user) => CommandResult::success(format!(
            "👋 Hello {} ({})! How can I assist you today?",
            user.first_name,
            user.profile_link()
        )),
        Err(e) => CommandResult::error(format!("❌ Error: {e}")),
    }
}

/// Milliseconds since `start`, as a float for two-decimal display.
fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}
