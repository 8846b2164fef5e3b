use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

const SECOND_WINDOW: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Second,
    Period,
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Second => f.write_str("per-second"),
            Self::Period => f.write_str("per-period"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    #[error("rate limit exceeded ({window} budget of {limit})")]
    Exceeded { window: Window, limit: u64 },
}

#[derive(Debug)]
struct Counters {
    second: u64,
    period: u64,
    last_reset: Instant,
}

/// Immediate-reject request budget.
///
/// The per-second counter resets once more than a second has passed since
/// the last reset; the period counter only grows.
#[derive(Debug)]
pub struct RateLimiter {
    per_second: u64,
    per_period: u64,
    counters: Mutex<Counters>,
}

impl RateLimiter {
    pub fn new(per_second: u64, per_period: u64) -> Self {
        Self {
            per_second,
            per_period,
            counters: Mutex::new(Counters {
                second: 0,
                period: 0,
                last_reset: Instant::now(),
            }),
        }
    }

    /// Admit `weight` units against both budgets or reject without
    /// consuming anything.
    pub fn check_and_consume(&self, weight: u64) -> Result<(), RateLimitError> {
        let mut c = self
            .counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let now = Instant::now();
        if now.duration_since(c.last_reset) > SECOND_WINDOW {
            c.second = 0;
            c.last_reset = now;
        }

        if c.second.saturating_add(weight) > self.per_second {
            tracing::warn!(weight, used = c.second, limit = self.per_second, "rate_limit.rejected.second");
            return Err(RateLimitError::Exceeded {
                window: Window::Second,
                limit: self.per_second,
            });
        }
        if c.period.saturating_add(weight) > self.per_period {
            tracing::warn!(weight, used = c.period, limit = self.per_period, "rate_limit.rejected.period");
            return Err(RateLimitError::Exceeded {
                window: Window::Period,
                limit: self.per_period,
            });
        }

        c.second += weight;
        c.period += weight;
        Ok(())
    }

    /// Units consumed in the current billing period.
    pub fn period_used(&self) -> u64 {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .period
    }
}
