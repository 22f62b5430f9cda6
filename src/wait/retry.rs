//! Step-local retries with exponential backoff.

use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::debug;

use crate::error::{BakeryError, Result};
use crate::multistep::CancelToken;

/// How many times to try an operation and how long to wait in between.
///
/// # Example
///
/// ```
/// use bakery::multistep::CancelToken;
/// use bakery::wait::RetryConfig;
/// use std::time::Duration;
///
/// let retry = RetryConfig {
///     tries: 3,
///     initial_backoff: Duration::from_millis(1),
///     ..Default::default()
/// };
///
/// let value = retry
///     .run(&CancelToken::new(), |attempt| {
///         if attempt < 2 {
///             Err(bakery::BakeryError::StepExecutionError {
///                 step: "attach".into(),
///                 message: "attachment not visible yet".into(),
///             })
///         } else {
///             Ok(attempt)
///         }
///     })
///     .unwrap();
/// assert_eq!(value, 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first (`0` = until success or cancel).
    pub tries: u32,
    /// Delay after the first failure.
    pub initial_backoff: Duration,
    /// Longest delay between attempts.
    pub max_backoff: Duration,
    /// Growth factor between delays.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            tries: 11,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_backoff,
            initial_interval: self.initial_backoff,
            randomization_factor: 0.0,
            multiplier: self.multiplier,
            max_interval: self.max_backoff,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    /// Run `op` until it succeeds or the attempts run out.
    ///
    /// `op` receives the 1-based attempt number.
    pub fn run<T, F>(&self, cancel: &CancelToken, op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        self.run_if(cancel, |_| true, op)
    }

    /// Like [`run`](Self::run), but only retry errors `should_retry` accepts.
    ///
    /// # Errors
    ///
    /// The last error from `op`, or `Cancelled` if cancellation interrupts a
    /// delay.
    pub fn run_if<T, F, P>(&self, cancel: &CancelToken, should_retry: P, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
        P: Fn(&BakeryError) -> bool,
    {
        let mut backoff = self.backoff();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            let err = match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let exhausted = self.tries != 0 && attempt >= self.tries;
            if exhausted || !should_retry(&err) {
                return Err(err);
            }

            let delay = backoff.next_backoff().unwrap_or(self.max_backoff);
            debug!(
                "Attempt {} failed, retrying in {:?}: {}",
                attempt, delay, err
            );
            if cancel.sleep(delay) {
                return Err(BakeryError::Cancelled);
            }
        }
    }
}
