use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::breaker::config::CircuitBreakerConfig;

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls are admitted.
    Closed,
    /// The circuit is tripped, calls fail fast.
    Open,
    /// Recovery timeout elapsed, a single probe is admitted.
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Error returned when the breaker rejects a call.
#[derive(Debug, Clone, Error)]
pub enum BreakerError {
    /// The circuit is open; `retry_in` is the time until the next probe slot.
    #[error("circuit is open, next attempt in {retry_in:?}")]
    Open { retry_in: Duration },
}

/// Error returned by [`CircuitBreaker::call`].
#[derive(Debug, Error)]
pub enum BreakerCallError<E> {
    /// The breaker rejected the call; the operation was never invoked.
    #[error(transparent)]
    Rejected(BreakerError),
    /// The operation ran and failed; the failure was recorded first.
    #[error(transparent)]
    Inner(E),
}

/// Point-in-time snapshot of breaker state, shaped for a health endpoint.
///
/// Breaker state is tracked on the monotonic clock, which has no meaningful
/// absolute representation, so times are reported relative to the snapshot:
/// `last_failure_age` is now minus the last failure time, and `retry_in` is
/// the unelapsed remainder of the recovery timeout — the absolute
/// next-attempt time (last failure time plus recovery timeout) is now plus
/// `retry_in`.
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerStatus {
    pub state: CircuitState,
    pub failure_count: u32,
    /// Time since the most recent recorded failure, if any.
    pub last_failure_age: Option<Duration>,
    /// Time until the next probe is admitted. `None` unless the circuit is open.
    pub retry_in: Option<Duration>,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failure_count: u32,
    last_failure_at: Option<Instant>,
    /// At most one probe in flight while half-open.
    probe_in_flight: bool,
}

/// Consecutive-failure circuit breaker.
///
/// Shared state lives behind one mutex, held only for bookkeeping. Callers
/// bracket the guarded operation: [`try_acquire`](Self::try_acquire) before,
/// [`record_success`](Self::record_success) or
/// [`record_failure`](Self::record_failure) after. [`call`](Self::call) does
/// the bracketing for operations where every `Err` counts as a failure.
#[derive(Debug)]
pub struct CircuitBreaker {
    inner: Mutex<Inner>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    /// Creates a breaker from an explicit configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure_at: None,
                probe_in_flight: false,
            }),
            config,
        }
    }

    /// Creates a configuration builder.
    pub fn builder() -> crate::breaker::config::CircuitBreakerConfigBuilder {
        CircuitBreakerConfig::builder()
    }

    /// Asks the breaker for permission to make a call.
    ///
    /// Open circuit with the recovery timeout still running rejects
    /// immediately. Once the timeout elapses the circuit moves to half-open
    /// and admits exactly one probe; concurrent callers are rejected until
    /// the probe's outcome is recorded.
    pub fn try_acquire(&self) -> Result<(), BreakerError> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = inner
                    .last_failure_at
                    .map(|at| at.elapsed())
                    .unwrap_or(self.config.recovery_timeout);
                if elapsed >= self.config.recovery_timeout {
                    self.transition(&mut inner, CircuitState::HalfOpen);
                    inner.probe_in_flight = true;
                    Ok(())
                } else {
                    Err(BreakerError::Open {
                        retry_in: self.config.recovery_timeout - elapsed,
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(BreakerError::Open {
                        retry_in: Duration::ZERO,
                    })
                } else {
                    inner.probe_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    /// Records a successful call: the failure tally resets and the circuit
    /// closes from any prior state.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count = 0;
        inner.probe_in_flight = false;
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed);
        }
    }

    /// Records a failed call.
    ///
    /// The tally is incremented and, at `failure_threshold`, the circuit
    /// opens. A half-open probe failure increments from the preserved
    /// pre-open tally, so it reopens the circuit immediately.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.last_failure_at = Some(Instant::now());
        inner.probe_in_flight = false;
        if inner.failure_count >= self.config.failure_threshold
            && inner.state != CircuitState::Open
        {
            self.transition(&mut inner, CircuitState::Open);
        }
    }

    /// Runs `op` under the breaker, treating any `Err` as a failure.
    ///
    /// The original error is re-raised after bookkeeping. Callers that need
    /// finer failure classification (not every error is upstream
    /// unreliability) should bracket with `try_acquire`/`record_*` instead.
    pub async fn call<T, E, Fut>(&self, op: Fut) -> Result<T, BreakerCallError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        self.try_acquire().map_err(BreakerCallError::Rejected)?;
        match op.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(BreakerCallError::Inner(err))
            }
        }
    }

    /// Forces the breaker closed with a clean tally.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.failure_count = 0;
        inner.last_failure_at = None;
        inner.probe_in_flight = false;
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed);
        }
    }

    /// Returns the current circuit state.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// Returns a snapshot of the breaker for observability.
    pub fn status(&self) -> CircuitBreakerStatus {
        let inner = self.inner.lock().unwrap();
        let last_failure_age = inner.last_failure_at.map(|at| at.elapsed());
        let retry_in = match (inner.state, last_failure_age) {
            (CircuitState::Open, Some(age)) => {
                Some(self.config.recovery_timeout.saturating_sub(age))
            }
            (CircuitState::Open, None) => Some(Duration::ZERO),
            _ => None,
        };
        CircuitBreakerStatus {
            state: inner.state,
            failure_count: inner.failure_count,
            last_failure_age,
            retry_in,
        }
    }

    /// Seeds the breaker into an arbitrary state.
    ///
    /// Test seam: lets suites start from an open or half-open circuit without
    /// replaying real failures. An open circuit is stamped with a fresh
    /// failure time so the full recovery timeout applies.
    pub fn force_state(&self, state: CircuitState, failure_count: u32) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != state {
            self.transition(&mut inner, state);
        }
        inner.failure_count = failure_count;
        inner.probe_in_flight = false;
        inner.last_failure_at = match state {
            CircuitState::Closed => None,
            _ => Some(Instant::now()),
        };
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        tracing::info!(
            breaker = %self.config.name,
            from = %inner.state,
            to = %to,
            failure_count = inner.failure_count,
            "circuit state transition"
        );
        inner.state = to;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, recovery: Duration) -> CircuitBreaker {
        CircuitBreaker::builder()
            .failure_threshold(threshold)
            .recovery_timeout(recovery)
            .name("test")
            .build()
    }

    #[test]
    fn opens_after_threshold_consecutive_failures() {
        let cb = breaker(3, Duration::from_secs(60));
        for _ in 0..2 {
            cb.try_acquire().unwrap();
            cb.record_failure();
            assert_eq!(cb.state(), CircuitState::Closed);
        }
        cb.try_acquire().unwrap();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.try_acquire().is_err());
    }

    #[test]
    fn success_resets_the_tally() {
        let cb = breaker(3, Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        assert_eq!(cb.status().failure_count, 0);
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn half_open_admits_exactly_one_probe() {
        let cb = breaker(1, Duration::from_millis(10));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(15));

        assert!(cb.try_acquire().is_ok());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        // Second caller while the probe is in flight.
        assert!(cb.try_acquire().is_err());

        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.status().failure_count, 0);
    }

    #[test]
    fn probe_failure_reopens_with_preserved_tally() {
        let cb = breaker(2, Duration::from_millis(10));
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(15));
        assert!(cb.try_acquire().is_ok());
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.status().failure_count, 3);
    }

    #[test]
    fn reset_closes_from_open() {
        let cb = breaker(1, Duration::from_secs(60));
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.try_acquire().is_ok());
    }

    #[test]
    fn status_reports_retry_window_while_open() {
        let cb = breaker(1, Duration::from_secs(60));
        cb.record_failure();
        let status = cb.status();
        assert_eq!(status.state, CircuitState::Open);
        assert_eq!(status.failure_count, 1);
        assert!(status.retry_in.unwrap() <= Duration::from_secs(60));
        assert!(status.last_failure_age.is_some());
    }

    #[test]
    fn force_state_seeds_half_open() {
        let cb = breaker(5, Duration::from_secs(60));
        cb.force_state(CircuitState::HalfOpen, 5);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert!(cb.try_acquire().is_ok());
        assert!(cb.try_acquire().is_err());
    }

    #[tokio::test]
    async fn call_brackets_the_operation() {
        let cb = breaker(1, Duration::from_secs(60));
        let ok = cb.call(async { Ok::<_, &str>("value") }).await;
        assert!(ok.is_ok());

        let err = cb.call(async { Err::<(), _>("boom") }).await;
        assert!(matches!(err, Err(BreakerCallError::Inner("boom"))));
        assert_eq!(cb.state(), CircuitState::Open);

        // Fast-fail: the operation must never be polled.
        let invoked = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = std::sync::Arc::clone(&invoked);
        let rejected = cb
            .call(async move {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok::<(), &str>(())
            })
            .await;
        assert!(matches!(rejected, Err(BreakerCallError::Rejected(_))));
        assert!(!invoked.load(std::sync::atomic::Ordering::SeqCst));
    }
}
