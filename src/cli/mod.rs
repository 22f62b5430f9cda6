//! Command-line interface for Bakery.
//!
//! This module provides the CLI argument parsing using clap's derive macros
//! and command implementations.
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations

pub mod args;
pub mod commands;

pub use args::{parse_var, vars_map, BuildArgs, Cli, Commands, InspectArgs, ValidateArgs};
pub use commands::{
    Command, CommandDispatcher, CommandResult, EXIT_CANCELLED, EXIT_NOT_FOUND,
};
