//! Retry decisions for the refresh loop.
//!
//! The loop in [`crate::RefreshTask::run`] asks a [`RetryPolicy`] what to do
//! after every failed attempt. Returning `None` ends the chain.

use std::time::Duration;

use crate::{KeepAliveError, RefreshOptions};

/// Decides whether, and after how long, a failed attempt is retried.
pub trait RetryPolicy: Send + Sync {
    /// `attempt` is the 1-based number of the attempt that just failed.
    fn next_delay(&self, attempt: usize, failure: &KeepAliveError) -> Option<Duration>;
}

/// Immediate retry on non-success statuses, fixed delay on everything else.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FixedDelayPolicy {
    pub retry_delay: Duration,
    pub max_attempts: Option<usize>,
    pub retry_on_client_error: bool,
}

impl Default for FixedDelayPolicy {
    fn default() -> Self {
        Self::from(&RefreshOptions::default())
    }
}

impl From<&RefreshOptions> for FixedDelayPolicy {
    fn from(options: &RefreshOptions) -> Self {
        Self {
            retry_delay: Duration::from_millis(options.retry_delay_ms),
            max_attempts: options.max_attempts,
            retry_on_client_error: options.retry_on_client_error,
        }
    }
}

impl RetryPolicy for FixedDelayPolicy {
    fn next_delay(&self, attempt: usize, failure: &KeepAliveError) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt >= max) {
            return None;
        }

        match failure {
            KeepAliveError::Http { .. } => {
                if failure.is_client_error() && !self.retry_on_client_error {
                    None
                } else {
                    Some(Duration::ZERO)
                }
            }
            KeepAliveError::Config(_) => None,
            KeepAliveError::Transport(_)
            | KeepAliveError::Timeout { .. }
            | KeepAliveError::Credential(_) => Some(self.retry_delay),
        }
    }
}
