//! Ordered step execution with reverse-order cleanup.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use tracing::{debug, info, warn};

use super::cancel::CancelToken;
use super::state::{StateBag, STATE_CANCELLED, STATE_HALTED};
use super::step::{halt_with, Step, StepAction};
use crate::error::{BakeryError, Result};
use crate::ui::SharedUi;

/// Where a debug pause happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseLocation {
    /// Before a step's `run`.
    BeforeRun,
    /// Before a step's `cleanup`.
    BeforeCleanup,
}

impl fmt::Display for PauseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PauseLocation::BeforeRun => write!(f, "run"),
            PauseLocation::BeforeCleanup => write!(f, "cleanup"),
        }
    }
}

/// Callback invoked at every debug pause with the location and step name.
pub type PauseFn = Box<dyn FnMut(PauseLocation, &str, &CancelToken) + Send>;

/// Where the runner ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Steps are still being run.
    Running,
    /// Every step ran and returned `Continue`.
    Completed,
    /// A step returned `Halt`.
    Halted,
    /// Cancellation was observed before all steps ran.
    Cancelled,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Halted => "halted",
            RunState::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// What happened during one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Terminal runner state.
    pub state: RunState,
    /// Names of steps whose `run` was invoked, in order.
    pub ran: Vec<String>,
    /// Names of steps whose `cleanup` was attempted, in order.
    pub cleaned: Vec<String>,
    /// Cleanup failures as (step, message).
    pub cleanup_errors: Vec<(String, String)>,
}

/// Overall result of a build, derived from the state bag after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// No error was recorded and the run was not cancelled.
    Succeeded,
    /// A step recorded this error.
    Failed(String),
    /// The build was cancelled.
    Cancelled,
}

impl BuildOutcome {
    /// Derive the outcome: a recorded error wins, then cancellation.
    pub fn from_state(state: &StateBag, run_state: RunState) -> Self {
        if let Some(err) = state.error() {
            BuildOutcome::Failed(err.message)
        } else if run_state == RunState::Cancelled || state.is_cancelled() {
            BuildOutcome::Cancelled
        } else {
            BuildOutcome::Succeeded
        }
    }

    /// Whether the build succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, BuildOutcome::Succeeded)
    }

    /// Convert into a `Result`, keeping cancellation distinct from failure.
    pub fn into_result(self) -> Result<()> {
        match self {
            BuildOutcome::Succeeded => Ok(()),
            BuildOutcome::Failed(message) => Err(BakeryError::BuildFailed { message }),
            BuildOutcome::Cancelled => Err(BakeryError::Cancelled),
        }
    }
}

/// Runs an ordered list of steps against one state bag.
///
/// Steps run one at a time in list order. Forward progress stops at the first
/// `Halt` or when cancellation is observed between steps. Every step whose
/// `run` was invoked then gets exactly one `cleanup`, in reverse order; a
/// failing cleanup is reported and the loop carries on. A panic in `run`
/// halts the build like a recorded error.
///
/// # Example
///
/// ```
/// use bakery::multistep::{BuildOutcome, CancelToken, Runner, StateBag, Step, StepAction};
///
/// struct Hello;
///
/// impl Step for Hello {
///     fn name(&self) -> &str {
///         "hello"
///     }
///
///     fn run(&mut self, _cancel: &CancelToken, state: &StateBag) -> StepAction {
///         state.put("greeting", "hi".to_string());
///         StepAction::Continue
///     }
/// }
///
/// let state = StateBag::new();
/// let report = Runner::new(vec![Box::new(Hello)]).run(&CancelToken::new(), &state);
///
/// assert_eq!(report.ran, vec!["hello"]);
/// assert!(BuildOutcome::from_state(&state, report.state).is_success());
/// ```
pub struct Runner {
    steps: Vec<Box<dyn Step>>,
    ui: Option<SharedUi>,
    pause: Option<PauseFn>,
}

impl Runner {
    /// Create a runner over `steps`.
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self {
            steps,
            ui: None,
            pause: None,
        }
    }

    /// Report cleanup failures to `ui` instead of the bag's UI.
    pub fn with_ui(mut self, ui: SharedUi) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Pause before every run and every cleanup.
    pub fn debug(
        mut self,
        pause: impl FnMut(PauseLocation, &str, &CancelToken) + Send + 'static,
    ) -> Self {
        self.pause = Some(Box::new(pause));
        self
    }

    /// Number of steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether there are no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Names of the steps, in run order.
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    /// Run every step, then clean up the ones that ran.
    ///
    /// Consumes the runner so no step can be run twice.
    pub fn run(mut self, cancel: &CancelToken, state: &StateBag) -> RunReport {
        let total = self.steps.len();
        let mut ran: Vec<usize> = Vec::with_capacity(total);
        let mut run_state = RunState::Running;

        for index in 0..total {
            if cancel.is_cancelled() {
                run_state = RunState::Cancelled;
                break;
            }

            let name = self.steps[index].name().to_string();

            if let Some(pause) = self.pause.as_mut() {
                pause(PauseLocation::BeforeRun, &name, cancel);
                if cancel.is_cancelled() {
                    run_state = RunState::Cancelled;
                    break;
                }
            }

            debug!("Running step {}/{}: {}", index + 1, total, name);
            let started = Instant::now();
            let step = &mut self.steps[index];
            let action = match panic::catch_unwind(AssertUnwindSafe(|| step.run(cancel, state))) {
                Ok(action) => action,
                Err(payload) => halt_with(
                    state,
                    format!("Step '{}' panicked: {}", name, panic_message(payload.as_ref())),
                ),
            };

            // Recorded before looking at the action so a step that halts
            // or panics half way still gets its cleanup.
            ran.push(index);
            debug!("Step '{}' finished in {:?}", name, started.elapsed());

            if action == StepAction::Halt {
                if cancel.is_cancelled() {
                    run_state = RunState::Cancelled;
                } else {
                    warn!("Step '{}' halted the build", name);
                    run_state = RunState::Halted;
                }
                break;
            }
        }

        match run_state {
            RunState::Running => run_state = RunState::Completed,
            RunState::Cancelled => {
                info!("Build cancelled after {} of {} steps", ran.len(), total);
                state.put(STATE_CANCELLED, true);
            }
            RunState::Halted => state.put(STATE_HALTED, true),
            RunState::Completed => {}
        }

        let (cleaned, cleanup_errors) = self.cleanup(&ran, cancel, state);

        RunReport {
            state: run_state,
            ran: ran
                .iter()
                .map(|&i| self.steps[i].name().to_string())
                .collect(),
            cleaned,
            cleanup_errors,
        }
    }

    fn cleanup(
        &mut self,
        ran: &[usize],
        cancel: &CancelToken,
        state: &StateBag,
    ) -> (Vec<String>, Vec<(String, String)>) {
        let ui = self.ui.clone().or_else(|| state.ui());
        let mut cleaned = Vec::with_capacity(ran.len());
        let mut errors = Vec::new();

        for &index in ran.iter().rev() {
            let name = self.steps[index].name().to_string();

            if let Some(pause) = self.pause.as_mut() {
                pause(PauseLocation::BeforeCleanup, &name, cancel);
            }

            debug!("Cleaning up step: {}", name);
            let step = &mut self.steps[index];
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| step.cleanup(state)));
            cleaned.push(name.clone());

            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err.to_string(),
                Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
            };

            warn!("Cleanup of step '{}' failed: {}", name, message);
            if let Some(ui) = &ui {
                ui.error(&format!("Error cleaning up '{}': {}", name, message));
            }
            errors.push((name, message));
        }

        (cleaned, errors)
    }
}

impl fmt::Debug for Runner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runner")
            .field("steps", &self.step_names())
            .field("debug", &self.pause.is_some())
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
