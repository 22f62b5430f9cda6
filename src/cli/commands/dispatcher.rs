//! Command dispatching.
//!
//! This module provides the core command infrastructure:
//! - [`Command`] trait for implementing commands
//! - [`CommandResult`] for uniform result reporting
//! - [`CommandDispatcher`] for routing CLI subcommands

use crate::cli::args::{Cli, Commands};
use crate::error::Result;
use crate::multistep::CancelToken;
use crate::secrets::LogMasker;
use crate::ui::UserInterface;

/// Exit code for a build stopped by SIGINT/SIGTERM.
pub const EXIT_CANCELLED: i32 = 130;

/// Exit code when the build file does not exist.
pub const EXIT_NOT_FOUND: i32 = 2;

/// Trait for command implementations.
///
/// Each CLI subcommand implements this trait to provide its execution logic.
pub trait Command {
    /// Execute the command, reporting through `ui`.
    fn execute(&self, ui: &dyn UserInterface) -> Result<CommandResult>;
}

/// Result of command execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandResult {
    /// Whether the command succeeded.
    pub success: bool,

    /// Exit code to use (0 for success, non-zero for failure).
    pub exit_code: i32,
}

impl CommandResult {
    /// Create a successful result.
    pub fn success() -> Self {
        Self {
            success: true,
            exit_code: 0,
        }
    }

    /// Create a failure result.
    pub fn failure(exit_code: i32) -> Self {
        Self {
            success: false,
            exit_code,
        }
    }
}

/// Dispatches CLI commands to their implementations.
pub struct CommandDispatcher {
    cancel: CancelToken,
    log_masker: LogMasker,
}

impl CommandDispatcher {
    /// Create a dispatcher whose builds stop when `cancel` fires.
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            log_masker: LogMasker::new(),
        }
    }

    /// Give builds the masker the log subscriber writes through.
    pub fn with_log_masker(mut self, log_masker: LogMasker) -> Self {
        self.log_masker = log_masker;
        self
    }

    /// Dispatch and execute a command.
    pub fn dispatch(&self, cli: &Cli, ui: &dyn UserInterface) -> Result<CommandResult> {
        match &cli.command {
            Commands::Build(args) => {
                let cmd = super::build::BuildCommand::new(args.clone(), self.cancel.clone())
                    .output_mode(cli.output_mode())
                    .no_color(cli.no_color)
                    .log_masker(self.log_masker.clone());
                cmd.execute(ui)
            }
            Commands::Validate(args) => {
                let cmd = super::validate::ValidateCommand::new(args.clone());
                cmd.execute(ui)
            }
            Commands::Inspect(args) => {
                let cmd = super::inspect::InspectCommand::new(args.clone());
                cmd.execute(ui)
            }
        }
    }
}
