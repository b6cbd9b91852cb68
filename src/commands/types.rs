//! Command types and definitions.

use std::fmt;

use crate::telegram::MessageRef;

/// Command keywords, in matching order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Ping,
    SysInfo,
    Restart,
    Hello,
    Ask,
    GenCard,
    Conn,
    Help,
}

impl CommandKind {
    /// All commands in the order the router tries them.
    pub const ALL: [Self; 8] = [
        Self::Ping,
        Self::SysInfo,
        Self::Restart,
        Self::Hello,
        Self::Ask,
        Self::GenCard,
        Self::Conn,
        Self::Help,
    ];

    /// Keyword typed after the prefix.
    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::SysInfo => "sys",
            Self::Restart => "restart",
            Self::Hello => "hello",
            Self::Ask => "ask",
            Self::GenCard => "gencard",
            Self::Conn => "conn",
            Self::Help => "help",
        }
    }

    /// Argument hint shown in help.
    #[must_use]
    pub const fn usage(self) -> &'static str {
        match self {
            Self::Ask => " <question>",
            _ => "",
        }
    }

    /// Returns the command description for help.
    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Ping => "Measure message edit latency",
            Self::SysInfo => "Show CPU, memory and uptime",
            Self::Restart => "Restart the userbot process",
            Self::Hello => "Greet the sender",
            Self::Ask => "Ask the AI a question",
            Self::GenCard => "Show a placeholder test card",
            Self::Conn => "Check the Telegram connection",
            Self::Help => "Show this help message",
        }
    }

    /// Whether the keyword may be followed by free text.
    #[must_use]
    pub const fn takes_argument(self) -> bool {
        matches!(self, Self::Ask)
    }
}

/// A parsed command with its argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Ping,
    SysInfo,
    Restart,
    Hello,
    /// Question text, possibly empty.
    Ask(String),
    GenCard,
    Conn,
    Help,
}

impl BotCommand {
    /// Builds a command of the given kind from its raw argument.
    #[must_use]
    pub fn new(kind: CommandKind, argument: &str) -> Self {
        match kind {
            CommandKind::Ping => Self::Ping,
            CommandKind::SysInfo => Self::SysInfo,
            CommandKind::Restart => Self::Restart,
            CommandKind::Hello => Self::Hello,
            CommandKind::Ask => Self::Ask(argument.trim().to_owned()),
            CommandKind::GenCard => Self::GenCard,
            CommandKind::Conn => Self::Conn,
            CommandKind::Help => Self::Help,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> CommandKind {
        match self {
            Self::Ping => CommandKind::Ping,
            Self::SysInfo => CommandKind::SysInfo,
            Self::Restart => CommandKind::Restart,
            Self::Hello => CommandKind::Hello,
            Self::Ask(_) => CommandKind::Ask,
            Self::GenCard => CommandKind::GenCard,
            Self::Conn => CommandKind::Conn,
            Self::Help => CommandKind::Help,
        }
    }
}

impl fmt::Display for BotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ask(question) if !question.is_empty() => {
                write!(f, "ask ({} chars)", question.chars().count())
            }
            _ => f.write_str(self.kind().keyword()),
        }
    }
}

/// Where the final text of a command goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// A new reply to the triggering message.
    Reply,
    /// An edit of a message already on screen.
    Edit(MessageRef),
}

/// Result of command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Whether the command was successful.
    pub success: bool,

    /// Response message to show the user.
    pub message: String,

    /// How the message reaches the chat.
    pub delivery: Delivery,

    /// Whether the process should restart once the message is out.
    pub restart: bool,
}

impl CommandResult {
    /// Creates a successful result.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            delivery: Delivery::Reply,
            restart: false,
        }
    }

    /// Creates an error result.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            delivery: Delivery::Reply,
            restart: false,
        }
    }

    /// Creates a successful result that restarts the process.
    #[must_use]
    pub fn restart(message: impl Into<String>) -> Self {
        Self {
            restart: true,
            ..Self::success(message)
        }
    }

    /// Delivers the result by editing `target`, or as a reply when the
    /// placeholder could not be sent.
    #[must_use]
    pub fn in_place_of(mut self, target: Option<MessageRef>) -> Self {
        self.delivery = target.map_or(Delivery::Reply, Delivery::Edit);
        self
    }
}
