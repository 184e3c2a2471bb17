//! Circuit breaker guarding the upstream metadata API.
//!
//! A three-state failure tracker: **Closed** admits every call, **Open**
//! fast-fails without touching the wire, **HalfOpen** admits exactly one
//! probe after the recovery timeout elapses.
//!
//! Unlike rate-based breakers, this one counts *consecutive* failures: any
//! success resets the tally, and `failure_threshold` consecutive failures
//! open the circuit. The lock around breaker state covers bookkeeping only;
//! callers bracket the guarded call with [`CircuitBreaker::try_acquire`] and
//! `record_*`, so no lock is ever held across network I/O.
//!
//! ```rust
//! use castgate::breaker::{CircuitBreaker, CircuitState};
//!
//! # async fn example() {
//! let breaker = CircuitBreaker::builder()
//!     .failure_threshold(5)
//!     .recovery_timeout(std::time::Duration::from_secs(60))
//!     .name("tmdb")
//!     .build();
//!
//! let outcome = breaker
//!     .call(async { Ok::<_, std::io::Error>("payload") })
//!     .await;
//! assert!(outcome.is_ok());
//! assert_eq!(breaker.state(), CircuitState::Closed);
//! # }
//! ```

mod circuit;
mod config;

pub use circuit::{BreakerCallError, BreakerError, CircuitBreaker, CircuitBreakerStatus, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
