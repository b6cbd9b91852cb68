//! Command handling module.
//!
//! Matches dot-prefixed chat messages (`.ping`, `.sys`, `.ask <text>`, ...)
//! against an ordered pattern table and runs the first matching command.

mod handler;
mod router;
mod types;

pub use handler::{CommandHandler, FAKE_CARD};
pub use router::CommandRouter;
pub use types::{BotCommand, CommandKind, CommandResult, Delivery};
