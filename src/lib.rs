//! Resilient access to a rate-limited, occasionally-unreliable metadata API.
//!
//! `castgate` sits between application code and a remote metadata service and
//! guarantees that transient upstream trouble never surfaces as an exception:
//! callers get real data, or a structurally valid placeholder that is
//! explicitly marked as degraded.
//!
//! ## Components
//! - [`CircuitBreaker`]: three-state guard (Closed / Open / HalfOpen) that
//!   fast-fails while the upstream is misbehaving and probes for recovery.
//! - [`Throttler`]: priority-aware sliding-window admission gate with a single
//!   dispatcher, capping aggregate outbound rate independent of caller
//!   concurrency.
//! - [`CacheManager`]: fetch-or-compute over a pluggable [`CacheStore`] with
//!   named TTL policies and batched multi-get.
//! - [`ResilientClient`]: orchestrates throttle, breaker, bounded retry, and
//!   fallback synthesis around the HTTP call.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use castgate::{ClientConfig, ResilientClient};
//! use std::collections::HashMap;
//!
//! # async fn example() {
//! let client = ResilientClient::new(
//!     ClientConfig::builder()
//!         .base_url("https://api.example.com/3")
//!         .api_key("secret")
//!         .build(),
//! )
//! .expect("client construction");
//!
//! let mut params = HashMap::new();
//! params.insert("query".to_string(), "nicolas cage".to_string());
//!
//! // Real results, or a fallback-marked empty result set. Never an error.
//! let body = client.request("search/person", &params).await;
//! if castgate::is_fallback(&body) {
//!     // service degraded, not "no results"
//! }
//! # }
//! ```

pub mod breaker;
pub mod cache;
pub mod client;
pub mod error;
pub mod throttle;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStatus, CircuitState};
pub use cache::{keys, CacheManager, CacheStore, MemoryStore, Ttl, TtlPolicy};
pub use client::{is_fallback, ClientConfig, FallbackShape, ResilientClient};
pub use error::ApiError;
pub use throttle::{Priority, Throttler, ThrottlerConfig, ThrottlerStatus};
