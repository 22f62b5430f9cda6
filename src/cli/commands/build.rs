//! Build command implementation.
//!
//! The `bakery build` command runs a build file.

use std::sync::Arc;

use tracing::debug;

use crate::build::{output_masker, script_hook, Build};
use crate::cli::args::{vars_map, BuildArgs};
use crate::config::{check_references, validate_config};
use crate::error::{BakeryError, Result};
use crate::multistep::CancelToken;
use crate::secrets::LogMasker;
use crate::ui::{create_ui, OutputMode, SharedUi, UserInterface};

use super::dispatcher::{Command, CommandResult, EXIT_CANCELLED, EXIT_NOT_FOUND};
use super::{load_build_file, report_problems, warn_if_unprivileged};

/// The build command implementation.
pub struct BuildCommand {
    args: BuildArgs,
    cancel: CancelToken,
    mode: OutputMode,
    no_color: bool,
    build_ui: Option<SharedUi>,
    log_masker: LogMasker,
}

impl BuildCommand {
    /// Create a build command that stops when `cancel` fires.
    pub fn new(args: BuildArgs, cancel: CancelToken) -> Self {
        Self {
            args,
            cancel,
            mode: OutputMode::Normal,
            no_color: false,
            build_ui: None,
            log_masker: LogMasker::new(),
        }
    }

    /// Output mode of the build's console UI.
    pub fn output_mode(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Disable colors in the build's console UI.
    pub fn no_color(mut self, no_color: bool) -> Self {
        self.no_color = no_color;
        self
    }

    /// Mask the build's secrets in log output too.
    pub fn log_masker(mut self, log_masker: LogMasker) -> Self {
        self.log_masker = log_masker;
        self
    }

    /// Use `ui` for the build instead of a console UI.
    pub fn with_ui(mut self, ui: SharedUi) -> Self {
        self.build_ui = Some(ui);
        self
    }

    /// Get the command arguments.
    pub fn args(&self) -> &BuildArgs {
        &self.args
    }
}

impl Command for BuildCommand {
    fn execute(&self, ui: &dyn UserInterface) -> Result<CommandResult> {
        let Some(config) = load_build_file(&self.args.file, ui)? else {
            return Ok(CommandResult::failure(EXIT_NOT_FOUND));
        };

        let name = config.display_name().to_string();
        let masker = output_masker(&config);
        self.log_masker.replace(masker.clone());
        let build_ui = match &self.build_ui {
            Some(shared) => shared.clone(),
            None => create_ui(self.mode, masker, Some(&name), self.no_color),
        };

        let hook = Arc::new(script_hook(&config));
        let build = Build::from_config(config, build_ui.clone(), hook)
            .with_vars(vars_map(&self.args.vars))
            .debug(self.args.debug_pause);

        let mut problems = validate_config(build.config());
        problems.extend(check_references(
            build.config(),
            &build.interpolation_context(),
        ));
        if !problems.is_empty() {
            report_problems(ui, &problems);
            return Ok(CommandResult::failure(1));
        }
        warn_if_unprivileged(ui, build.config());

        debug!(
            "Running {} with debug pause {}",
            self.args.file.display(),
            build.is_debug()
        );
        match build.run(&self.cancel) {
            Ok(artifact) => {
                build_ui.say(&format!("Build '{}' finished.", name));
                if let Some(artifact) = artifact {
                    build_ui.message(&artifact.to_string());
                }
                Ok(CommandResult::success())
            }
            Err(BakeryError::Cancelled) => {
                build_ui.error(&format!("Build '{}' cancelled.", name));
                Ok(CommandResult::failure(EXIT_CANCELLED))
            }
            Err(BakeryError::BuildFailed { message }) => {
                build_ui.error(&format!("Build '{}' errored: {}", name, message));
                Ok(CommandResult::failure(1))
            }
            Err(e) => Err(e),
        }
    }
}
