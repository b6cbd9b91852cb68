//! Process lifecycle: restart and shutdown requests.
//!
//! Handlers never touch the process directly. They send a
//! [`LifecycleMessage`] to `main`, which disconnects cleanly and then
//! acts on it.

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::Command;

use tracing::info;

/// Messages that can be sent to the lifecycle owner.
#[derive(Debug, Clone)]
pub enum LifecycleMessage {
    /// Replace the process with a fresh copy of itself.
    Restart(RestartRequest),
    /// Stop the update loop and exit.
    Shutdown,
}

/// Executable and arguments to relaunch with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestartRequest {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl RestartRequest {
    /// Captures the running executable and its argument vector.
    ///
    /// # Errors
    ///
    /// Returns an error if the executable path cannot be determined.
    pub fn current() -> io::Result<Self> {
        Ok(Self {
            program: std::env::current_exe()?,
            args: std::env::args_os().skip(1).collect(),
        })
    }

    /// Builds the command that relaunches the process.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        command
    }

    /// Replaces the current process image. Only returns on failure.
    #[cfg(unix)]
    pub fn exec(&self) -> io::Error {
        use std::os::unix::process::CommandExt;

        info!("Restarting: {}", self.program.display());
        self.command().exec()
    }

    /// Spawns a fresh copy and exits. Only returns on failure.
    #[cfg(not(unix))]
    pub fn exec(&self) -> io::Error {
        info!("Restarting: {}", self.program.display());
        match self.command().spawn() {
            Ok(_) => std::process::exit(0),
            Err(e) => e,
        }
    }
}
