//! Retry policy for responses carrying a transient server status.

use reqwest::StatusCode;
use std::time::Duration;

/// Maximum number of attempts per request, the first one included.
pub const MAX_ATTEMPTS: usize = 3;

/// Delay before the first retry; doubled before every following one.
pub const INITIAL_BACKOFF_MS: u64 = 500;

/// Statuses that indicate a temporary condition on the server side.
pub const TRANSIENT_STATUSES: [StatusCode; 3] = [
    StatusCode::BAD_GATEWAY,
    StatusCode::SERVICE_UNAVAILABLE,
    StatusCode::GATEWAY_TIMEOUT,
];

/// Decides which responses are retried and how long to wait in between.
///
/// Only responses that were actually received are subject to the policy.
/// Connection failures never reach it.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_attempts: usize,
    initial_backoff: Duration,
    transient: Vec<StatusCode>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
            transient: TRANSIENT_STATUSES.to_vec(),
        }
    }
}

impl RetryPolicy {
    /// `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(max_attempts: usize, initial_backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_backoff,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_transient_statuses(mut self, statuses: Vec<StatusCode>) -> Self {
        self.transient = statuses;
        self
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn is_transient(&self, status: StatusCode) -> bool {
        self.transient.contains(&status)
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let shift = u32::try_from(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let multiplier = 1u32.checked_shl(shift).unwrap_or(u32::MAX);
        self.initial_backoff
            .checked_mul(multiplier)
            .unwrap_or(Duration::MAX)
    }
}
