//! Pluggable key-value store seam and the in-memory implementation.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors from a cache store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// A key-value store holding JSON values with per-entry TTLs.
///
/// Implementations may be backed by anything addressable by string key; the
/// manager only requires that expired entries never come back from `get`.
/// All shared state must be safe under concurrent readers and writers.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Reads one key. Expired or missing entries yield `None`.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Reads many keys in one batched operation. Missing keys are simply
    /// absent from the result map.
    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Value>, StoreError>;

    /// Writes one entry with a finite TTL.
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), StoreError>;

    /// Removes one key, reporting whether it was present.
    async fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Removes every entry.
    async fn clear(&self) -> Result<(), StoreError>;

    /// Number of live (unexpired) entries.
    async fn len(&self) -> Result<usize, StoreError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// In-process fallback store: one mutex over an unpartitioned map.
///
/// Expired entries are dropped lazily on read and swept by
/// [`purge_expired`](Self::purge_expired).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sweeps every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.is_expired(Instant::now()) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Value>, StoreError> {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        let mut found = HashMap::new();
        for key in keys {
            match entries.get(key) {
                Some(entry) if entry.is_expired(now) => {
                    entries.remove(key);
                }
                Some(entry) => {
                    found.insert(key.clone(), entry.value.clone());
                }
                None => {}
            }
        }
        Ok(found)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }

    async fn len(&self) -> Result<usize, StoreError> {
        self.purge_expired();
        Ok(self.entries.lock().unwrap().len())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
