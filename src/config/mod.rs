//! Configuration module for the userbot.
//!
//! Handles loading and validation of the environment: Telegram
//! credentials, the admin allow-list, the connection profile and the
//! chat-completion settings.

mod session_string;
mod settings;

pub use session_string::{AUTH_KEY_LEN, SessionString, SessionStringError};
pub use settings::{
    AdminList, AiSettings, BotConfig, ConfigError, ConnectionProfile, Credentials, TransportMode,
};

/// Variables that must be present before anything touches the network.
pub const REQUIRED_ENV_VARS: &[&str] = &["API_ID", "API_HASH", "SESSION_STRING"];

/// Prefix used when `COMMAND_PREFIX` is not set.
pub const DEFAULT_COMMAND_PREFIX: &str = ".";

/// Port used when `TG_PORT` is missing or invalid.
pub const DEFAULT_TG_PORT: u16 = 443;
