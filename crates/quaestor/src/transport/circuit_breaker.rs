/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Circuit breaker guarding the notification channel.
//!
//! State machine: `Closed -> Open` after N consecutive failures;
//! `Open -> HalfOpen` once the cooldown has elapsed since the last recorded
//! failure, permitting exactly one probe; `HalfOpen -> Closed` on success,
//! back to `Open` on failure.
//!
//! While open, [`CircuitBreaker::check`] fails immediately without touching
//! the network. Callers must treat that as a distinct, non-retryable-by-them
//! error rather than a timeout.
//!
//! State is process-local and resets on restart; it protects only the
//! best-effort notification path, never the authoritative outbox.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

use crate::error::TransportError;

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Healthy: all attempts are allowed through.
    Closed,
    /// Tripped: attempts are rejected until the cooldown expires.
    Open,
    /// Cooldown elapsed: one probe attempt is allowed.
    HalfOpen,
}

/// Configuration for circuit breaker behaviour.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before tripping to Open.
    pub failure_threshold: u32,
    /// Time to wait in Open before permitting a probe.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
}

/// Thread-safe circuit breaker.
///
/// Concurrent publishers share one breaker; the inner state sits behind a
/// mutex so racing success/failure records observe consistent transitions.
#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
            }),
        }
    }

    /// Whether an attempt may proceed.
    ///
    /// Open transitions to HalfOpen here once the cooldown has elapsed,
    /// permitting exactly one probe.
    pub fn check(&self) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => Ok(()),
            CircuitState::Open => {
                let cooldown_elapsed = inner
                    .last_failure_at
                    .map(|t| t.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if cooldown_elapsed {
                    inner.state = CircuitState::HalfOpen;
                    tracing::debug!("Circuit breaker half-open; permitting probe");
                    Ok(())
                } else {
                    Err(TransportError::CircuitOpen)
                }
            }
        }
    }

    /// Records a successful attempt, closing the circuit.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
    }

    /// Records a failed attempt.
    ///
    /// A HalfOpen probe failure re-trips immediately; otherwise the circuit
    /// trips once the consecutive failure count reaches the threshold.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.consecutive_failures += 1;
        inner.last_failure_at = Some(Instant::now());

        if inner.state == CircuitState::HalfOpen
            || inner.consecutive_failures >= self.config.failure_threshold
        {
            if inner.state != CircuitState::Open {
                tracing::warn!(
                    failures = inner.consecutive_failures,
                    "Circuit breaker opened"
                );
            }
            inner.state = CircuitState::Open;
        }
    }

    /// Current circuit state (without side effects).
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_breaker(threshold: u32, cooldown: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: threshold,
            cooldown,
        })
    }

    #[test]
    fn initial_state_is_closed() {
        let breaker = CircuitBreaker::default();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.check().is_ok());
    }

    #[test]
    fn stays_closed_below_threshold() {
        let breaker = make_breaker(5, Duration::from_secs(30));
        for _ in 0..4 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert!(breaker.check().is_ok());
    }

    #[test]
    fn five_consecutive_failures_open_the_circuit() {
        let breaker = make_breaker(5, Duration::from_secs(600));
        for _ in 0..5 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), CircuitState::Open);
        assert!(matches!(
            breaker.check(),
            Err(TransportError::CircuitOpen)
        ));
    }

    #[test]
    fn cooldown_elapse_permits_one_probe() {
        let breaker = make_breaker(1, Duration::ZERO);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        // Zero cooldown: the next check transitions to HalfOpen.
        assert!(breaker.check().is_ok());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn half_open_success_closes() {
        let breaker = make_breaker(1, Duration::ZERO);
        breaker.record_failure();
        let _ = breaker.check();
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_failure_retrips() {
        let breaker = make_breaker(5, Duration::ZERO);
        for _ in 0..5 {
            breaker.record_failure();
        }
        let _ = breaker.check(); // -> HalfOpen
        breaker.record_failure(); // probe failed
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[test]
    fn success_resets_consecutive_failures() {
        let breaker = make_breaker(3, Duration::from_secs(30));
        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        breaker.record_failure();
        // Still below threshold because the success reset the streak.
        assert_eq!(breaker.state(), CircuitState::Closed);
    }
}
