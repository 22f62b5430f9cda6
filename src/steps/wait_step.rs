//! Build-file `wait_for` step.

use std::collections::HashMap;

use super::{describe_failure, fail, run_local, LocalCommand};
use crate::error::BakeryError;
use crate::multistep::{CancelToken, StateBag, Step, StepAction};
use crate::wait::{PollingConfig, StateChangeConf};

/// Polls a local command until it prints the target state.
///
/// The first line of the command's trimmed stdout is the state label. Every
/// label must be the target or one of `pending`; anything else fails the
/// step at once. When `output` is set the full trimmed stdout of the final
/// poll is stored under that key.
///
/// # Example
///
/// ```
/// use bakery::multistep::{CancelToken, StateBag, Step, StepAction};
/// use bakery::steps::StepWaitFor;
/// use bakery::wait::PollingConfig;
/// use std::time::Duration;
///
/// let mut step = StepWaitFor::new("volume", "echo available", ["creating"], "available")
///     .polling(PollingConfig::default().with_delay(Duration::from_millis(1)));
///
/// let state = StateBag::new();
/// assert_eq!(step.run(&CancelToken::new(), &state), StepAction::Continue);
/// ```
#[derive(Debug, Clone)]
pub struct StepWaitFor {
    name: String,
    refresh: String,
    conf: StateChangeConf,
    output: Option<String>,
    env: HashMap<String, String>,
}

impl StepWaitFor {
    /// Create a wait with default polling.
    pub fn new<I, S>(
        name: impl Into<String>,
        refresh: impl Into<String>,
        pending: I,
        target: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            refresh: refresh.into(),
            conf: StateChangeConf::new(pending, target),
            output: None,
            env: HashMap::new(),
        }
    }

    /// Replace the polling configuration.
    pub fn polling(mut self, polling: PollingConfig) -> Self {
        self.conf = self.conf.with_polling(polling);
        self
    }

    /// Store the final stdout under `key`.
    pub fn output(mut self, key: impl Into<String>) -> Self {
        self.output = Some(key.into());
        self
    }

    /// Extra environment for the refresh command.
    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }
}

impl Step for StepWaitFor {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&mut self, cancel: &CancelToken, state: &StateBag) -> StepAction {
        if let Some(ui) = state.ui() {
            ui.say(&format!(
                "Waiting for {} to become {}...",
                self.name, self.conf.target
            ));
        }

        let name = &self.name;
        let refresh = &self.refresh;
        let env = &self.env;
        let result = self.conf.wait(cancel, || {
            let how = LocalCommand {
                env: Some(env),
                cancel: Some(cancel),
                ..Default::default()
            };
            let (wrapped, result) = run_local(refresh, state, how)?;
            if !result.success {
                return Err(BakeryError::StepExecutionError {
                    step: name.clone(),
                    message: describe_failure(&wrapped, &result),
                });
            }
            let observation = result.stdout.trim().to_string();
            let label = observation.lines().next().unwrap_or("").trim().to_string();
            Ok((observation, label))
        });

        match result {
            Ok(observation) => {
                if let Some(key) = &self.output {
                    state.put(key.clone(), observation);
                }
                StepAction::Continue
            }
            Err(err) => fail(state, err.into()),
        }
    }
}
