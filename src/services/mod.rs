//! External collaborators used by command handlers.

mod completion;
mod system;

pub use completion::{CompletionBackend, CompletionError, OpenAiClient};
pub use system::{MemoryUsage, SystemReport, Uptime, format_uptime, runtime_version};
