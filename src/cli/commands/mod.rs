//! CLI command implementations.
//!
//! Each command implements the [`Command`] trait, which provides a uniform
//! interface for executing commands and reporting results.
//!
//! Commands are dispatched via [`CommandDispatcher`], which routes CLI
//! subcommands to their implementations.

pub mod build;
pub mod dispatcher;
pub mod inspect;
pub mod validate;

pub use dispatcher::{Command, CommandDispatcher, CommandResult, EXIT_CANCELLED, EXIT_NOT_FOUND};

use std::path::Path;

use crate::config::{load_config_file, BuildConfig, ValidationError};
use crate::error::{BakeryError, Result};
use crate::shell::is_elevated;
use crate::ui::UserInterface;

/// Load a build file; a missing file is reported and yields `None`.
pub(crate) fn load_build_file(path: &Path, ui: &dyn UserInterface) -> Result<Option<BuildConfig>> {
    match load_config_file(path) {
        Ok(config) => Ok(Some(config)),
        Err(BakeryError::ConfigNotFound { path }) => {
            ui.error(&format!("Build file not found: {}", path.display()));
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Print one error line per problem.
pub(crate) fn report_problems(ui: &dyn UserInterface, problems: &[ValidationError]) {
    for problem in problems {
        ui.error(&format!("{} [{}]", problem.message, problem.rule));
    }
}

/// Warn when chroot provisioning will run unprivileged.
pub(crate) fn warn_if_unprivileged(ui: &dyn UserInterface, config: &BuildConfig) {
    if config.needs_root() && !is_elevated() {
        ui.warning(
            "Chroot provisioning needs root: run as root or set a command_wrapper such as 'sudo {{.Command}}'",
        );
    }
}
