//! Local command execution.

pub mod command;
pub mod platform;

pub use command::{
    execute, execute_streaming, shell_quote, CommandOptions, CommandResult, OutputLine,
};
pub use platform::is_elevated;
