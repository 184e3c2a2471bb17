//! Cache key derivation, TTL policies, pluggable store, and the fetch-or-compute manager.
//!
//! Keys are deterministic and versioned (`v1:{domain}:{subtype}:{identifier}`)
//! so equivalent lookups collapse to one entry and a version bump invalidates
//! everything at once. Every entry is stored with a finite TTL resolved from
//! an explicit duration, a named [`TtlPolicy`], or the manager default, in
//! that order.
//!
//! The store is a seam: [`CacheStore`] is object-safe and async, with
//! [`MemoryStore`] as the in-process implementation. Store failures never
//! propagate out of [`CacheManager`]; reads degrade to computing directly and
//! writes are logged and dropped.

pub mod keys;
mod manager;
mod policy;
mod store;

pub use manager::CacheManager;
pub use policy::{Ttl, TtlPolicy};
pub use store::{CacheStore, MemoryStore, StoreError};
