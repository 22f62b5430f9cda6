//! Validate command implementation.
//!
//! The `bakery validate` command checks a build file without running it.

use crate::build::interpolation_context;
use crate::cli::args::{vars_map, ValidateArgs};
use crate::config::{check_references, validate_config, StepConfig};
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, EXIT_NOT_FOUND};
use super::{load_build_file, report_problems, warn_if_unprivileged};

/// The validate command implementation.
pub struct ValidateCommand {
    args: ValidateArgs,
}

impl ValidateCommand {
    /// Create a new validate command.
    pub fn new(args: ValidateArgs) -> Self {
        Self { args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &ValidateArgs {
        &self.args
    }
}

impl Command for ValidateCommand {
    fn execute(&self, ui: &dyn UserInterface) -> Result<CommandResult> {
        let Some(config) = load_build_file(&self.args.file, ui)? else {
            return Ok(CommandResult::failure(EXIT_NOT_FOUND));
        };

        let context = interpolation_context(&config, &vars_map(&self.args.vars));
        let mut problems = validate_config(&config);
        problems.extend(check_references(&config, &context));

        let provisions = config
            .steps
            .iter()
            .any(|s| matches!(s, StepConfig::Provision(_)));
        if provisions && config.provisioners.is_empty() {
            ui.warning("A provision step is present but 'provisioners' is empty");
        }
        warn_if_unprivileged(ui, &config);

        if problems.is_empty() {
            ui.say(&format!(
                "The build file {} is valid.",
                self.args.file.display()
            ));
            Ok(CommandResult::success())
        } else {
            report_problems(ui, &problems);
            ui.say(&format!(
                "The build file {} has {} problem(s).",
                self.args.file.display(),
                problems.len()
            ));
            Ok(CommandResult::failure(1))
        }
    }
}
