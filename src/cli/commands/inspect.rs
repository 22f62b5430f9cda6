//! Inspect command implementation.
//!
//! The `bakery inspect` command prints the steps a build file would run,
//! in order, with the commands each one runs.

use crate::cli::args::InspectArgs;
use crate::config::{BuildConfig, StepConfig};
use crate::error::Result;
use crate::ui::UserInterface;

use super::dispatcher::{Command, CommandResult, EXIT_NOT_FOUND};
use super::load_build_file;

/// The inspect command implementation.
pub struct InspectCommand {
    args: InspectArgs,
}

impl InspectCommand {
    /// Create a new inspect command.
    pub fn new(args: InspectArgs) -> Self {
        Self { args }
    }

    /// Get the command arguments.
    pub fn args(&self) -> &InspectArgs {
        &self.args
    }
}

/// Detail lines for one step.
fn step_details(step: &StepConfig) -> Vec<String> {
    let mut lines = Vec::new();
    match step {
        StepConfig::Shell(s) => {
            lines.extend(s.run.iter().map(|c| format!("run: {}", c)));
            lines.extend(s.cleanup.iter().map(|c| format!("cleanup: {}", c)));
        }
        StepConfig::WaitFor(s) => {
            lines.push(format!("refresh: {}", s.refresh));
            lines.push(format!(
                "until: {} (pending: {})",
                s.target,
                s.pending.join(", ")
            ));
        }
        StepConfig::LocalCommands(s) => {
            lines.extend(s.commands.iter().map(|c| format!("run: {}", c)));
        }
        StepConfig::Provision(s) => match &s.chroot {
            Some(root) => lines.push(format!("chroot: {}", root)),
            None => lines.push("local".to_string()),
        },
        StepConfig::RecordImage(s) => {
            lines.push(format!("image: {} in {}", s.image_id, s.region));
        }
    }
    if let Some(output) = step.output() {
        lines.push(format!("output: {}", output));
    }
    lines
}

fn show(config: &BuildConfig, ui: &dyn UserInterface) {
    ui.say(&format!(
        "Build '{}' ({})",
        config.display_name(),
        config.builder_id
    ));

    if let Some(wrapper) = &config.command_wrapper {
        ui.message(&format!("Command wrapper: {}", wrapper));
    }
    let polling = config.polling_config();
    ui.message(&format!(
        "Polling: every {:?}, {} attempts, timeout {}",
        polling.delay,
        polling
            .max_attempts
            .map_or("unlimited".to_string(), |n| n.to_string()),
        polling
            .timeout
            .map_or("none".to_string(), |t| format!("{:?}", t)),
    ));

    ui.message("Steps:");
    for (index, step) in config.steps.iter().enumerate() {
        ui.message(&format!("  {}. {} ({})", index + 1, step.name(), step.kind()));
        for detail in step_details(step) {
            ui.message(&format!("       {}", detail));
        }
    }

    if !config.provisioners.is_empty() {
        ui.message("Provisioners:");
        for provisioner in &config.provisioners {
            ui.message(&format!("  - {}", provisioner));
        }
    }
}

impl Command for InspectCommand {
    fn execute(&self, ui: &dyn UserInterface) -> Result<CommandResult> {
        let Some(config) = load_build_file(&self.args.file, ui)? else {
            return Ok(CommandResult::failure(EXIT_NOT_FOUND));
        };
        show(&config, ui);
        Ok(CommandResult::success())
    }
}
