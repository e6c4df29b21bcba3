//! Retry-until-success polling for eventually consistent checks.
//!
//! The check runs once right away. After a failure it runs again on a fixed
//! cadence until it succeeds or the timeout passes, in which case the error
//! from the last attempt is returned unchanged. There is no backoff and no
//! jitter: checks are cheap, idempotent reads of cluster state.

use std::fmt::Display;
use std::thread;
use std::time::{Duration, Instant};

use meshprobe_common::config::DEFAULT_POLL_INTERVAL;
use tracing::{debug, info};

/// Smallest cadence the engine will tick at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// How long to keep polling, and how often.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total budget, measured from the end of the first attempt.
    pub timeout: Duration,
    /// Fixed delay between attempts.
    pub interval: Duration,
}

impl RetryPolicy {
    /// Poll every second for up to `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn tick(&self) -> Duration {
        self.interval.max(MIN_INTERVAL)
    }
}

/// Call `check` until it succeeds or `policy.timeout` elapses.
///
/// Returns the first success, or the error of the most recent attempt.
/// Ticks missed while a slow check was running collapse into one
/// immediate attempt.
pub fn retry_for<T, E, F>(policy: &RetryPolicy, mut check: F) -> Result<T, E>
where
    F: FnMut() -> Result<T, E>,
    E: Display,
{
    let mut last_err = match check() {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };

    let interval = policy.tick();
    let start = Instant::now();
    // An unrepresentable deadline means polling until success.
    let deadline = start.checked_add(policy.timeout);
    let mut tick: u32 = 1;
    let mut attempt: u32 = 1;
    debug!(attempt, error = %last_err, timeout_ms = policy.timeout.as_millis() as u64, "Check failed; polling");

    loop {
        let next = interval
            .checked_mul(tick)
            .and_then(|offset| start.checked_add(offset));
        if let Some(deadline) = deadline
            && next.is_none_or(|next| next >= deadline)
        {
            thread::sleep(deadline.saturating_duration_since(Instant::now()));
            info!(
                attempts = attempt,
                timeout_ms = policy.timeout.as_millis() as u64,
                error = %last_err,
                "Check did not succeed before timeout"
            );
            return Err(last_err);
        }
        if let Some(next) = next {
            thread::sleep(next.saturating_duration_since(Instant::now()));
        }

        attempt += 1;
        match check() {
            Ok(value) => {
                debug!(attempt, elapsed_ms = start.elapsed().as_millis() as u64, "Check succeeded");
                return Ok(value);
            }
            Err(err) => {
                debug!(attempt, error = %err, "Check failed");
                last_err = err;
            }
        }

        let elapsed_ticks = start.elapsed().as_nanos() / interval.as_nanos();
        let elapsed_ticks = u32::try_from(elapsed_ticks).unwrap_or(u32::MAX);
        tick = tick.saturating_add(1).max(elapsed_ticks);
    }
}
