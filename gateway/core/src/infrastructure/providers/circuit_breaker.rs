// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Circuit breaker for provider forwards
//
// Closed -> Open after `failure_threshold` consecutive failures; Open ->
// HalfOpen once `open_timeout` has elapsed; HalfOpen -> Closed after
// `success_threshold` successes, or straight back to Open on any failure.
// Upstream 5xx responses count as failures.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::domain::decision::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout: Duration::from_secs(30),
        }
    }
}

struct BreakerState {
    state: CircuitState,
    failures: u32,
    successes: u32,
    last_failure: Option<Instant>,
}

pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failures: 0,
                successes: 0,
                last_failure: None,
            }),
        }
    }

    /// Gate a call. Errors with [`GatewayError::CircuitOpen`] while the
    /// circuit is open and its timeout has not elapsed.
    pub fn try_acquire(&self) -> Result<(), GatewayError> {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::Open {
            let elapsed = inner
                .last_failure
                .map(|t| t.elapsed())
                .unwrap_or(Duration::ZERO);
            if elapsed > self.config.open_timeout {
                inner.state = CircuitState::HalfOpen;
                inner.successes = 0;
            } else {
                return Err(GatewayError::CircuitOpen);
            }
        }
        Ok(())
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.successes += 1;
            if inner.successes >= self.config.success_threshold {
                inner.state = CircuitState::Closed;
                inner.failures = 0;
            }
        } else {
            inner.failures = 0;
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.failures += 1;
        inner.last_failure = Some(Instant::now());

        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Open;
            return;
        }
        if inner.failures >= self.config.failure_threshold {
            inner.state = CircuitState::Open;
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(open_timeout: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            open_timeout,
        })
    }

    #[test]
    fn test_opens_after_threshold_failures() {
        let cb = breaker(Duration::from_secs(30));
        for _ in 0..2 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(matches!(cb.try_acquire(), Err(GatewayError::CircuitOpen)));
    }

    #[test]
    fn test_success_resets_failure_count_when_closed() {
        let cb = breaker(Duration::from_secs(30));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_after_timeout_then_closes_on_successes() {
        let cb = breaker(Duration::from_millis(0));
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(5));
        assert!(cb.try_acquire().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let cb = breaker(Duration::from_millis(0));
        for _ in 0..3 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(5));
        assert!(cb.try_acquire().is_ok());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }
}
