//! Polling and retry helpers used inside steps.
//!
//! - [`StateChangeConf`] / [`wait_for_state`] - poll until a resource reaches
//!   a target state
//! - [`PollingConfig`] - delay, attempt cap and timeout for a wait
//! - [`RetryConfig`] - bounded retries with exponential backoff

pub mod polling;
pub mod retry;
pub mod state_change;

use std::time::Duration;

use thiserror::Error;

use crate::error::BakeryError;

pub use polling::{PollingConfig, DEFAULT_POLL_DELAY, DEFAULT_POLL_TIMEOUT};
pub use retry::RetryConfig;
pub use state_change::{wait_for_state, StateChangeConf};

/// Why a state-change wait ended without reaching its target.
#[derive(Debug, Error)]
pub enum WaitError {
    /// The refresh operation failed. Not retried.
    #[error(transparent)]
    Refresh(Box<BakeryError>),

    /// Cancellation was observed between polls.
    #[error("interrupted while waiting for state '{target}'")]
    Interrupted { target: String },

    /// The resource reported a state that is neither pending nor the target.
    #[error("unexpected state '{state}', wanted target '{target}'")]
    UnexpectedState { state: String, target: String },

    /// The attempt cap was reached.
    #[error("gave up waiting for state '{target}' after {attempts} attempts")]
    MaxAttempts { attempts: u32, target: String },

    /// The timeout elapsed.
    #[error("timed out after {elapsed:?} waiting for state '{target}'")]
    Timeout { elapsed: Duration, target: String },
}

impl WaitError {
    /// Whether the wait ended because of cancellation.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, WaitError::Interrupted { .. })
    }
}
