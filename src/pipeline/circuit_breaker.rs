//! Circuit Breaker pattern implementation.
//!
//! Stops hammering a struggling upstream: after a run of consecutive
//! refresh failures the circuit opens and every refresh request
//! short-circuits immediately, without any network call, until the
//! cool-down elapses.
//!
//! The state is owned by the orchestrator and mutated between suspension
//! points on one cooperative timeline, so no locking is involved. The
//! cool-down reset is lazy: the first `check` past the stored deadline
//! closes the circuit again.

use chrono::{DateTime, Duration, Utc};

use crate::error::{AppError, Result};
use crate::models::CircuitConfig;

/// Circuit breaker for refresh attempts.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    /// Consecutive failures before the circuit opens
    threshold: u32,
    /// How long the circuit stays open once tripped
    open_duration: Duration,
    /// Current consecutive-failure count
    consecutive_failures: u32,
    /// Deadline until which attempts are short-circuited
    open_until: Option<DateTime<Utc>>,
}

impl CircuitBreaker {
    /// Create a circuit breaker from configuration.
    pub fn new(config: &CircuitConfig) -> Self {
        Self {
            threshold: config.max_consecutive_failures,
            open_duration: Duration::seconds(config.open_secs as i64),
            consecutive_failures: 0,
            open_until: None,
        }
    }

    /// Gate a refresh attempt: `Err(CircuitOpen)` while open, `Ok` when
    /// closed. Passing the stored deadline closes the circuit.
    pub fn check(&mut self) -> Result<()> {
        self.check_at(Utc::now())
    }

    /// Time-parameterized variant of [`check`](Self::check).
    pub fn check_at(&mut self, now: DateTime<Utc>) -> Result<()> {
        if let Some(open_until) = self.open_until {
            if now < open_until {
                let remaining_secs = (open_until - now).num_seconds().max(0);
                return Err(AppError::CircuitOpen {
                    remaining_minutes: (remaining_secs + 59) / 60,
                });
            }
            // Cool-down elapsed
            self.reset();
        }
        Ok(())
    }

    /// Record one refresh failure. Returns true if this failure tripped
    /// the circuit open.
    pub fn record_failure(&mut self) -> bool {
        self.record_failure_at(Utc::now())
    }

    /// Time-parameterized variant of [`record_failure`](Self::record_failure).
    pub fn record_failure_at(&mut self, now: DateTime<Utc>) -> bool {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.threshold && self.open_until.is_none() {
            self.open_until = Some(now + self.open_duration);
            return true;
        }
        false
    }

    /// Record a successful refresh: counter resets, circuit closes.
    pub fn record_success(&mut self) {
        self.reset();
    }

    /// Explicitly close the circuit and clear the failure counter.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.open_until = None;
    }

    /// Whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.is_open_at(Utc::now())
    }

    /// Time-parameterized variant of [`is_open`](Self::is_open).
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.open_until.is_some_and(|until| now < until)
    }

    /// Current consecutive-failure count.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}
