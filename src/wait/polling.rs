//! Polling configuration for state-change waits.

use std::time::Duration;

/// Default delay between refreshes.
pub const DEFAULT_POLL_DELAY: Duration = Duration::from_secs(2);

/// Default upper bound on a single wait.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// How often and how long to poll.
///
/// Every wait is bounded by default: a provider that never leaves a pending
/// state fails the build after [`DEFAULT_POLL_TIMEOUT`] instead of hanging
/// until someone cancels it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollingConfig {
    /// Sleep between refreshes.
    pub delay: Duration,
    /// Give up after this many refreshes (`None` = no cap).
    pub max_attempts: Option<u32>,
    /// Give up once this much time has passed (`None` = wait until cancelled).
    pub timeout: Option<Duration>,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_POLL_DELAY,
            max_attempts: None,
            timeout: Some(DEFAULT_POLL_TIMEOUT),
        }
    }
}

impl PollingConfig {
    /// Set the delay between refreshes.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Cap the number of refreshes.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Set or clear the overall timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Apply per-step overrides on top of these settings.
    pub fn overridden_by(
        self,
        delay: Option<Duration>,
        max_attempts: Option<u32>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            delay: delay.unwrap_or(self.delay),
            max_attempts: max_attempts.or(self.max_attempts),
            timeout: timeout.or(self.timeout),
        }
    }
}
