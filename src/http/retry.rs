//! Retry policy bounded by the key refresh deadline.

use std::time::{Duration, SystemTime};

use reqwest_retry::policies::ExponentialBackoff;
use reqwest_retry::{RetryDecision, RetryPolicy};
use tracing::debug;

const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(250);
const MAX_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Exponential backoff that never schedules a retry past a total budget.
///
/// The budget is measured from the start of the first attempt. A retry whose
/// backoff would end after it is dropped, and the last response is returned.
pub struct DeadlineBackoff {
    backoff: ExponentialBackoff,
    budget: Duration,
}

impl DeadlineBackoff {
    pub fn new(max_retries: u32, budget: Duration) -> Self {
        let backoff = ExponentialBackoff::builder()
            .retry_bounds(MIN_RETRY_INTERVAL, MAX_RETRY_INTERVAL)
            .build_with_max_retries(max_retries);
        Self { backoff, budget }
    }

    fn within_budget(&self, request_start_time: SystemTime, execute_after: SystemTime) -> bool {
        match request_start_time.checked_add(self.budget) {
            Some(deadline) => execute_after < deadline,
            None => true,
        }
    }
}

impl RetryPolicy for DeadlineBackoff {
    fn should_retry(&self, request_start_time: SystemTime, n_past_retries: u32) -> RetryDecision {
        match self.backoff.should_retry(request_start_time, n_past_retries) {
            RetryDecision::Retry { execute_after }
                if self.within_budget(request_start_time, execute_after) =>
            {
                RetryDecision::Retry { execute_after }
            }
            RetryDecision::Retry { .. } => {
                debug!(
                    "Not retrying key request: backoff would pass the {:?} deadline",
                    self.budget
                );
                RetryDecision::DoNotRetry
            }
            RetryDecision::DoNotRetry => RetryDecision::DoNotRetry,
        }
    }
}
