//! Retry policy and backoff state.
//!
//! The delay after failure `n` is `base * multiplier^(n-1)`: with the default
//! policy that is 5s, 10s, 20s over three attempts.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use swapguard_core::{BoxFuture, SubmissionError};

/// Bounded exponential backoff policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included. Always >= 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier: multiplier.max(1),
        }
    }

    /// Delay served after the `attempt`-th failure (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.base_delay.saturating_mul(factor)
    }

    /// Full delay sequence for a request that fails every attempt.
    pub fn schedule(&self) -> Vec<Duration> {
        (1..=self.max_attempts).map(|a| self.delay_for(a)).collect()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5), 2)
    }
}

/// Backoff state for one submission call.
///
/// Created when the call starts, dropped when it returns. Never shared
/// between calls, so concurrent decisions back off independently.
#[derive(Debug, Clone)]
pub struct RetryState {
    pub attempt_count: u32,
    pub next_delay: Duration,
    pub last_error: Option<SubmissionError>,
    policy: RetryPolicy,
}

impl RetryState {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            attempt_count: 0,
            next_delay: policy.delay_for(1),
            last_error: None,
            policy,
        }
    }

    /// Start the next attempt; returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt_count += 1;
        self.next_delay = self.policy.delay_for(self.attempt_count);
        self.attempt_count
    }

    /// Record a retryable failure of the current attempt.
    pub fn record_failure(&mut self, error: SubmissionError) {
        self.last_error = Some(error);
    }

    /// Whether the attempt budget is spent.
    pub fn is_exhausted(&self) -> bool {
        self.attempt_count >= self.policy.max_attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts
    }
}

/// Trait for suspending the calling task, enabling testability.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()>;
}

/// Arc wrapper for Sleeper trait objects.
pub type DynSleeper = Arc<dyn Sleeper>;

/// Real sleeper backed by the tokio timer. Suspends only the calling task.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Sleeper that returns immediately and records requested delays.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'_, ()> {
        self.delays.lock().push(duration);
        Box::pin(async {})
    }
}
