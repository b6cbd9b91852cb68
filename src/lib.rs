//! Prince-X Userbot Library
//!
//! A Telegram userbot that answers dot-prefixed commands.
//!
//! This crate provides the core functionality for:
//! - Loading and validating configuration from the environment
//! - Connecting to Telegram via `MTProto` with a string session
//! - Routing chat messages to command handlers
//! - Restarting the process on request

pub mod commands;
pub mod config;
pub mod lifecycle;
pub mod services;
pub mod telegram;
