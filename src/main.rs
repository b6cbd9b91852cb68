//! Prince-X Userbot - Main Entry Point
//!
//! Logs in with a string session and answers dot-prefixed commands.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use prince_x_userbot::commands::CommandHandler;
use prince_x_userbot::config::BotConfig;
use prince_x_userbot::lifecycle::LifecycleMessage;
use prince_x_userbot::services::{OpenAiClient, Uptime};
use prince_x_userbot::telegram::{Message, TelegramBot, TelegramConversation, notify_startup};

/// Telegram userbot answering dot-prefixed commands.
#[derive(Parser, Debug)]
#[command(name = "prince_x")]
#[command(about = "Telegram userbot answering dot-prefixed commands")]
#[command(version)]
struct Args {
    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let uptime = Uptime::start();
    let args = Args::parse();

    // Initialize logging
    init_logging(&args.log_level);

    // Load environment variables
    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    // Nothing touches the network before this passes
    let config = match BotConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(config, uptime).await {
        Ok(LifecycleMessage::Shutdown) => ExitCode::SUCCESS,
        Ok(LifecycleMessage::Restart(request)) => {
            let err = request.exec();
            error!("Restart failed: {}", err);
            ExitCode::FAILURE
        }
        Err(e) => {
            error!("Fatal error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Connects, announces the start and dispatches commands until a
/// lifecycle message arrives.
async fn run(config: Arc<BotConfig>, uptime: Uptime) -> Result<LifecycleMessage> {
    let bot = TelegramBot::connect(&config)
        .await
        .context("Failed to connect to Telegram")?;
    let bot = Arc::new(bot);
    info!("Prince-X Client Started");

    let assistant = match config.credentials.bot_token.as_deref() {
        Some(token) => match TelegramBot::connect_assistant(&config, token).await {
            Ok(assistant) => {
                info!("Assistant Bot Started");
                Some(assistant)
            }
            Err(e) => {
                warn!("Assistant bot failed to start: {}", e);
                None
            }
        },
        None => None,
    };

    notify_startup(&*bot, config.log_channel).await;
    info!("Startup process completed");

    let completion =
        OpenAiClient::new(config.ai.clone()).context("Failed to build the completion client")?;
    let (lifecycle_tx, mut lifecycle_rx) = mpsc::channel::<LifecycleMessage>(4);
    let handler = CommandHandler::new(
        Arc::clone(&config),
        Arc::new(completion),
        uptime,
        lifecycle_tx,
    )
    .context("Invalid COMMAND_PREFIX")?;
    let handler = Arc::new(handler);

    let mut incoming = bot
        .take_incoming()
        .await
        .context("Update stream already taken")?;

    info!(
        "Listening for commands with prefix '{}' ({} admins configured). Use Ctrl+C to stop.",
        config.command_prefix,
        config.admins.len()
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let outcome = loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Received Ctrl+C, shutting down...");
                break Ok(LifecycleMessage::Shutdown);
            }
            Some(message) = lifecycle_rx.recv() => break Ok(message),
            message = incoming.recv() => match message {
                Some(message) => dispatch(&bot, &handler, message),
                None => break Err(anyhow!("Update stream closed")),
            },
        }
    };

    // Cleanup
    if let Some(assistant) = assistant {
        assistant.disconnect();
    }
    bot.disconnect();

    outcome
}

/// Runs one message on its own task so slow commands do not block others.
fn dispatch(bot: &Arc<TelegramBot>, handler: &Arc<CommandHandler>, message: Message) {
    let bot = Arc::clone(bot);
    let handler = Arc::clone(handler);
    tokio::spawn(async move {
        let conversation = TelegramConversation::new(bot, message);
        let text = conversation.text().to_owned();
        handler.try_handle(&conversation, &text).await;
    });
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
