//! Waiting for a remote resource to reach a target state.

use std::time::Instant;

use tracing::{debug, trace};

use super::polling::PollingConfig;
use super::WaitError;
use crate::error::Result;
use crate::multistep::CancelToken;

/// Which states are acceptable while waiting, and which one ends the wait.
///
/// Any state outside `pending` and `target` fails the wait immediately, so a
/// provider that passes through extra transient states must list them.
///
/// # Example
///
/// ```
/// use bakery::multistep::CancelToken;
/// use bakery::wait::{PollingConfig, StateChangeConf};
/// use std::time::Duration;
///
/// let mut states = vec!["creating", "creating", "available"].into_iter();
/// let conf = StateChangeConf::new(["creating"], "available")
///     .with_polling(PollingConfig::default().with_delay(Duration::from_millis(1)));
///
/// let volume = conf
///     .wait(&CancelToken::new(), || {
///         let state = states.next().unwrap_or("error");
///         Ok(("vol-0123", state.to_string()))
///     })
///     .unwrap();
/// assert_eq!(volume, "vol-0123");
/// ```
#[derive(Debug, Clone)]
pub struct StateChangeConf {
    /// States that are normal but not done.
    pub pending: Vec<String>,
    /// The state that ends the wait successfully.
    pub target: String,
    /// Delay, attempt cap and timeout.
    pub polling: PollingConfig,
}

impl StateChangeConf {
    /// Create a conf with default polling.
    pub fn new<I, S>(pending: I, target: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into(),
            polling: PollingConfig::default(),
        }
    }

    /// Replace the polling configuration.
    pub fn with_polling(mut self, polling: PollingConfig) -> Self {
        self.polling = polling;
        self
    }

    /// Poll `refresh` until the target state is reached.
    ///
    /// See [`wait_for_state`].
    pub fn wait<T, F>(&self, cancel: &CancelToken, refresh: F) -> std::result::Result<T, WaitError>
    where
        F: FnMut() -> Result<(T, String)>,
    {
        wait_for_state(self, cancel, refresh)
    }
}

/// Poll `refresh` until it reports `conf.target`.
///
/// Each iteration:
/// 1. refresh; an error ends the wait with [`WaitError::Refresh`], unretried
/// 2. the target state ends the wait with the last observation
/// 3. a cancelled token ends the wait with [`WaitError::Interrupted`]
/// 4. a state outside `pending` ends it with [`WaitError::UnexpectedState`]
/// 5. the attempt cap or timeout ends it with [`WaitError::MaxAttempts`] /
///    [`WaitError::Timeout`]
/// 6. otherwise sleep `delay` (woken early by cancellation) and repeat
pub fn wait_for_state<T, F>(
    conf: &StateChangeConf,
    cancel: &CancelToken,
    mut refresh: F,
) -> std::result::Result<T, WaitError>
where
    F: FnMut() -> Result<(T, String)>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        let (observation, state) = refresh().map_err(|e| WaitError::Refresh(Box::new(e)))?;
        trace!(
            "Waiting for state to become '{}' (attempt {}), currently '{}'",
            conf.target,
            attempts,
            state
        );

        if state == conf.target {
            debug!("Reached state '{}' after {} attempts", state, attempts);
            return Ok(observation);
        }

        if cancel.is_cancelled() {
            return Err(WaitError::Interrupted {
                target: conf.target.clone(),
            });
        }

        if !conf.pending.iter().any(|p| *p == state) {
            return Err(WaitError::UnexpectedState {
                state,
                target: conf.target.clone(),
            });
        }

        if let Some(max) = conf.polling.max_attempts {
            if attempts >= max {
                return Err(WaitError::MaxAttempts {
                    attempts,
                    target: conf.target.clone(),
                });
            }
        }

        if let Some(timeout) = conf.polling.timeout {
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(WaitError::Timeout {
                    elapsed,
                    target: conf.target.clone(),
                });
            }
        }

        // A cancellation during the sleep is reported after the next refresh.
        cancel.sleep(conf.polling.delay);
    }
}
