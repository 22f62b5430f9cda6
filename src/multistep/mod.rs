//! Multistep build orchestration.
//!
//! A build is an ordered list of [`Step`]s run by a [`Runner`] against one
//! [`StateBag`]:
//!
//! - [`StateBag`] - shared key/value state, the only channel between steps
//! - [`Step`] - a unit of work with `run` and `cleanup`
//! - [`Runner`] - runs steps in order, stops on halt or cancellation, and
//!   cleans up every step that ran in reverse order
//! - [`CancelToken`] - the shared cancellation signal
//! - [`BuildOutcome`] - success, failure or cancellation, read from the bag

pub mod cancel;
pub mod runner;
pub mod state;
pub mod step;

pub use cancel::CancelToken;
pub use runner::{BuildOutcome, PauseFn, PauseLocation, RunReport, RunState, Runner};
pub use state::{
    StateBag, StepError, STATE_BUILD_NAME, STATE_CANCELLED, STATE_COMMUNICATOR, STATE_CONFIG,
    STATE_ERROR, STATE_GENERATED_DATA, STATE_HALTED, STATE_HOOK, STATE_IMAGES,
    STATE_INTERPOLATION, STATE_UI, STATE_WRAPPED_COMMAND,
};
pub use step::{halt_with, Step, StepAction};
