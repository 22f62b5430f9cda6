//! Build-file `shell` step.

use std::collections::HashMap;
use std::time::Duration;

use tracing::{debug, warn};

use super::{describe_failure, fail, run_local, LocalCommand};
use crate::error::{BakeryError, Result};
use crate::multistep::{CancelToken, StateBag, Step, StepAction};

/// Runs a list of commands, with optional cleanup commands.
///
/// Commands run in order; the first non-zero exit halts the build. When
/// `output` is set, the trimmed stdout of the last command is stored under
/// that key for later `${output}` references.
///
/// `cleanup` commands run only if `run` got as far as starting a command.
/// They are not cancellable and all of them run even if one fails.
///
/// # Example
///
/// ```
/// use bakery::multistep::{BuildOutcome, CancelToken, Runner, StateBag};
/// use bakery::steps::StepShell;
///
/// let step = StepShell::new("device")
///     .run_commands(["echo xvdf"])
///     .output("device");
///
/// let state = StateBag::new();
/// let report = Runner::new(vec![Box::new(step)]).run(&CancelToken::new(), &state);
///
/// assert!(BuildOutcome::from_state(&state, report.state).is_success());
/// assert_eq!(state.get::<String>("device").unwrap(), "xvdf");
/// ```
#[derive(Debug, Clone, Default)]
pub struct StepShell {
    name: String,
    run: Vec<String>,
    cleanup: Vec<String>,
    output: Option<String>,
    env: HashMap<String, String>,
    timeout: Option<Duration>,
    started: bool,
}

impl StepShell {
    /// Create a step with no commands.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Commands to run.
    pub fn run_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run = commands.into_iter().map(Into::into).collect();
        self
    }

    /// Commands to undo the run commands.
    pub fn cleanup_commands<I, S>(mut self, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cleanup = commands.into_iter().map(Into::into).collect();
        self
    }

    /// Store the last command's stdout under `key`.
    pub fn output(mut self, key: impl Into<String>) -> Self {
        self.output = Some(key.into());
        self
    }

    /// Extra environment for every command.
    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    /// Per-command timeout.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn run_all(&mut self, cancel: &CancelToken, state: &StateBag) -> Result<Option<String>> {
        let mut last_stdout = None;
        for command in &self.run {
            self.started = true;
            let how = LocalCommand {
                env: Some(&self.env),
                timeout: self.timeout,
                cancel: Some(cancel),
            };
            let (wrapped, result) = run_local(command, state, how)?;
            if !result.success {
                return Err(BakeryError::StepExecutionError {
                    step: self.name.clone(),
                    message: describe_failure(&wrapped, &result),
                });
            }
            last_stdout = Some(result.stdout);
        }
        Ok(last_stdout)
    }
}

impl Step for StepShell {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, cancel: &CancelToken, state: &StateBag) -> StepAction {
        if let Some(ui) = state.ui() {
            ui.say(&format!("Running {}...", self.name));
        }

        match self.run_all(cancel, state) {
            Ok(stdout) => {
                if let (Some(key), Some(stdout)) = (&self.output, stdout) {
                    let value = stdout.trim().to_string();
                    debug!("Storing output of '{}' under '{}'", self.name, key);
                    state.put(key.clone(), value);
                }
                StepAction::Continue
            }
            Err(err) => fail(state, err),
        }
    }

    fn cleanup(&mut self, state: &StateBag) -> Result<()> {
        if !self.started || self.cleanup.is_empty() {
            return Ok(());
        }

        if let Some(ui) = state.ui() {
            ui.say(&format!("Cleaning up {}...", self.name));
        }

        let mut failures = Vec::new();
        for command in &self.cleanup {
            let how = LocalCommand {
                env: Some(&self.env),
                timeout: self.timeout,
                cancel: None,
            };
            match run_local(command, state, how) {
                Ok((_, result)) if result.success => {}
                Ok((wrapped, result)) => failures.push(describe_failure(&wrapped, &result)),
                Err(err) => failures.push(err.to_string()),
            }
        }

        if failures.is_empty() {
            return Ok(());
        }
        for failure in &failures {
            warn!("{}", failure);
        }
        Err(BakeryError::StepExecutionError {
            step: self.name.clone(),
            message: failures.join("; "),
        })
    }
}
