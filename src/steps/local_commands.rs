//! Fixed lists of local commands run between other steps.

use std::collections::HashMap;

use super::{describe_failure, fail, run_local, LocalCommand};
use crate::error::BakeryError;
use crate::multistep::{CancelToken, StateBag, Step, StepAction};

/// Runs user hook commands, such as pre-mount and post-mount commands.
///
/// Each command is interpolated and wrapped, then run in order. The first
/// non-zero exit halts the build. Nothing is undone in cleanup.
#[derive(Debug, Clone)]
pub struct StepLocalCommands {
    label: String,
    commands: Vec<String>,
    env: HashMap<String, String>,
}

impl StepLocalCommands {
    /// Create a step; `label` names it in output ("pre-mount commands").
    pub fn new<I, S>(label: impl Into<String>, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            commands: commands.into_iter().map(Into::into).collect(),
            env: HashMap::new(),
        }
    }

    /// Extra environment for every command.
    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// The commands, unresolved.
    pub fn commands(&self) -> &[String] {
        &self.commands
    }
}

impl Step for StepLocalCommands {
    fn name(&self) -> &str {
        &self.label
    }

    fn run(&mut self, cancel: &CancelToken, state: &StateBag) -> StepAction {
        if self.commands.is_empty() {
            return StepAction::Continue;
        }

        let ui = state.ui();
        if let Some(ui) = &ui {
            ui.say(&format!("Running {}...", self.label));
        }

        for command in &self.commands {
            let how = LocalCommand {
                env: Some(&self.env),
                cancel: Some(cancel),
                ..Default::default()
            };
            match run_local(command, state, how) {
                Ok((wrapped, result)) => {
                    if let Some(ui) = &ui {
                        ui.message(&format!("Executed: {}", wrapped));
                    }
                    if !result.success {
                        return fail(
                            state,
                            BakeryError::StepExecutionError {
                                step: self.label.clone(),
                                message: describe_failure(&wrapped, &result),
                            },
                        );
                    }
                }
                Err(err) => return fail(state, err),
            }
        }

        StepAction::Continue
    }
}
