//! Priority-aware sliding-window request throttler.
//!
//! Caps the aggregate outbound request rate independent of caller
//! concurrency. Producers enqueue jobs from any task; a single dispatcher
//! drains the queue, admitting at most `max_requests` jobs inside any rolling
//! `window`, always picking the highest-priority queued job (FIFO among
//! ties) at each dispatch decision. An admitted job runs to completion and
//! is never preempted mid-flight.
//!
//! Caller/dispatcher handoff is a `oneshot` channel: the caller blocks on the
//! receiver until the dispatcher has run the job and sent its output back. A
//! caller that abandons its wait does not stop the dispatcher; the output is
//! simply discarded.
//!
//! ```rust
//! use castgate::throttle::{Priority, Throttler, ThrottlerConfig};
//!
//! # async fn example() {
//! let throttler: Throttler<u32> = Throttler::new(
//!     ThrottlerConfig::builder()
//!         .max_requests(30)
//!         .window(std::time::Duration::from_secs(10))
//!         .build(),
//! );
//!
//! let answer = throttler
//!     .submit(Priority::High, async { 42 })
//!     .await
//!     .expect("dispatcher alive");
//! assert_eq!(answer, 42);
//! # }
//! ```

mod config;
mod dispatcher;

pub use config::{ThrottlerConfig, ThrottlerConfigBuilder};
pub use dispatcher::{Priority, ThrottleError, Throttler, ThrottlerStatus};
