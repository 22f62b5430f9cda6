//! The step contract.

use std::fmt::Display;

use tracing::debug;

use super::cancel::CancelToken;
use super::state::StateBag;
use crate::error::Result;

/// What the runner should do after a step's `run` returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// Proceed to the next step.
    Continue,
    /// Stop forward progress; cleanup still runs.
    Halt,
}

/// One unit of build work.
///
/// A step remembers whatever it created in `run` (a volume id, a mount path)
/// so that `cleanup` frees exactly that and nothing else. `cleanup` must be a
/// no-op when `run` exited before creating anything.
///
/// # Example
///
/// ```
/// use bakery::multistep::{CancelToken, StateBag, Step, StepAction};
///
/// #[derive(Default)]
/// struct CreateVolume {
///     volume_id: Option<String>,
/// }
///
/// impl Step for CreateVolume {
///     fn name(&self) -> &str {
///         "create_volume"
///     }
///
///     fn run(&mut self, _cancel: &CancelToken, state: &StateBag) -> StepAction {
///         let id = "vol-0123".to_string();
///         state.put("volume_id", id.clone());
///         self.volume_id = Some(id);
///         StepAction::Continue
///     }
///
///     fn cleanup(&mut self, _state: &StateBag) -> bakery::Result<()> {
///         if let Some(id) = self.volume_id.take() {
///             // delete the volume here
///             let _ = id;
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Step: Send {
    /// Name used in logs, pauses and cleanup reports.
    fn name(&self) -> &str;

    /// Do the work. Failures are recorded in the state bag (see [`halt_with`]).
    fn run(&mut self, cancel: &CancelToken, state: &StateBag) -> StepAction;

    /// Undo what `run` created.
    ///
    /// Errors are reported but never stop the cleanup of other steps.
    fn cleanup(&mut self, _state: &StateBag) -> Result<()> {
        Ok(())
    }
}

/// Record `error` as the build's failure, show it, and halt.
pub fn halt_with(state: &StateBag, error: impl Display) -> StepAction {
    let message = error.to_string();
    debug!("Halting build: {}", message);
    if let Some(ui) = state.ui() {
        ui.error(&message);
    }
    state.put_error(message);
    StepAction::Halt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multistep::state::STATE_UI;
    use crate::ui::{MockUI, SharedUi};
    use std::sync::Arc;

    #[test]
    fn halt_with_records_error_and_reports() {
        let state = StateBag::new();
        let ui = Arc::new(MockUI::new());
        state.put(STATE_UI, ui.clone() as SharedUi);

        let action = halt_with(&state, "attach failed");

        assert_eq!(action, StepAction::Halt);
        assert_eq!(state.error().unwrap().message, "attach failed");
        assert!(ui.has_error("attach failed"));
    }

    #[test]
    fn halt_with_works_without_ui() {
        let state = StateBag::new();
        assert_eq!(halt_with(&state, "boom"), StepAction::Halt);
        assert_eq!(state.error().unwrap().message, "boom");
    }

    struct Noop;

    impl Step for Noop {
        fn name(&self) -> &str {
            "noop"
        }

        fn run(&mut self, _cancel: &CancelToken, _state: &StateBag) -> StepAction {
            StepAction::Continue
        }
    }

    #[test]
    fn default_cleanup_is_ok() {
        let mut step = Noop;
        assert!(step.cleanup(&StateBag::new()).is_ok());
    }
}
