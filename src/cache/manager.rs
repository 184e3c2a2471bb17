use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use crate::cache::keys;
use crate::cache::policy::{Ttl, TtlPolicy};
use crate::cache::store::CacheStore;

/// Fetch-or-compute over a pluggable store with named TTL policies.
///
/// Store failures never escape: a failed read degrades to computing the
/// value directly, a failed write is logged and the computed value returned
/// anyway. The store instance is injected once at startup and shared.
#[derive(Clone)]
pub struct CacheManager {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
}

impl CacheManager {
    /// Creates a manager with the default TTL of 300 seconds.
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            default_ttl: Duration::from_secs(300),
        }
    }

    /// Overrides the fallback TTL used when neither an explicit duration nor
    /// a named policy is given.
    pub fn with_default_ttl(mut self, default_ttl: Duration) -> Self {
        self.default_ttl = default_ttl;
        self
    }

    /// Returns the cached value for `key`, or computes, stores, and returns
    /// it. `compute` is not invoked on a hit.
    pub async fn fetch<F, Fut>(&self, key: &str, ttl: impl Into<Ttl>, compute: F) -> Value
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Value>,
    {
        match self.store.get(key).await {
            Ok(Some(value)) => {
                tracing::trace!(key, "cache hit");
                return value;
            }
            Ok(None) => {}
            Err(err) => {
                // Degrade to no-cache: compute directly, skip the store.
                tracing::warn!(key, error = %err, "cache read failed, computing directly");
                return compute().await;
            }
        }

        let value = compute().await;
        let ttl = ttl.into().resolve(self.default_ttl);
        if let Err(err) = self.store.set(key, value.clone(), ttl).await {
            tracing::warn!(key, error = %err, "cache write failed, returning computed value");
        }
        value
    }

    /// Batched fetch-or-compute: one store read partitions `keys` into hits
    /// and misses, `compute` is invoked only with the miss keys, and
    /// computed entries are stored individually. Returns the full key→value
    /// map; keys the miss block did not produce are absent.
    ///
    /// If the batched read fails, `compute` receives the full key set.
    pub async fn fetch_multi<F, Fut>(
        &self,
        keys: &[String],
        ttl: impl Into<Ttl>,
        compute: F,
    ) -> HashMap<String, Value>
    where
        F: FnOnce(Vec<String>) -> Fut,
        Fut: Future<Output = HashMap<String, Value>>,
    {
        let ttl = ttl.into().resolve(self.default_ttl);

        let mut results = match self.store.get_multi(keys).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(error = %err, "batched cache read failed, computing full set");
                return compute(keys.to_vec()).await;
            }
        };

        let missing: Vec<String> = keys
            .iter()
            .filter(|key| !results.contains_key(*key))
            .cloned()
            .collect();
        tracing::trace!(
            hits = results.len(),
            misses = missing.len(),
            "batched cache fetch"
        );

        if !missing.is_empty() {
            for (key, value) in compute(missing).await {
                if let Err(err) = self.store.set(&key, value.clone(), ttl).await {
                    tracing::warn!(key = %key, error = %err, "cache write failed");
                }
                results.insert(key, value);
            }
        }
        results
    }

    /// Plain read. Misses and store errors both yield `None` (errors logged).
    pub async fn get(&self, key: &str) -> Option<Value> {
        match self.store.get(key).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key, error = %err, "cache read failed");
                None
            }
        }
    }

    /// Batched read. A store error yields an empty map (logged).
    pub async fn get_multi(&self, keys: &[String]) -> HashMap<String, Value> {
        match self.store.get_multi(keys).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(error = %err, "batched cache read failed");
                HashMap::new()
            }
        }
    }

    /// Unconditional write under the resolved TTL. Failures are logged.
    pub async fn set(&self, key: &str, value: Value, ttl: impl Into<Ttl>) {
        let ttl = ttl.into().resolve(self.default_ttl);
        if let Err(err) = self.store.set(key, value, ttl).await {
            tracing::warn!(key, error = %err, "cache write failed");
        }
    }

    /// Removes one key. Failures are logged and reported as "not present".
    pub async fn delete(&self, key: &str) -> bool {
        match self.store.delete(key).await {
            Ok(was_present) => was_present,
            Err(err) => {
                tracing::warn!(key, error = %err, "cache delete failed");
                false
            }
        }
    }

    /// Set/get round trip on the probe key. `false` on any store error.
    /// Liveness only; this never gates traffic.
    pub async fn healthy(&self) -> bool {
        let key = keys::health_probe();
        let probe = json!({"ok": true});
        let ttl = TtlPolicy::HealthCheck.duration();
        match self.store.set(&key, probe.clone(), ttl).await {
            Ok(()) => matches!(self.store.get(&key).await, Ok(Some(value)) if value == probe),
            Err(_) => false,
        }
    }

    // Convenience bindings pairing a derived key with its TTL policy.

    /// Fetch-or-compute an actor profile (30 minute TTL).
    pub async fn cache_actor_profile<F, Fut>(&self, id: u64, compute: F) -> Value
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Value>,
    {
        self.fetch(&keys::actor_profile(id), TtlPolicy::ActorProfile, compute)
            .await
    }

    /// Fetch-or-compute an actor's filmography (10 minute TTL).
    pub async fn cache_actor_movies<F, Fut>(&self, id: u64, compute: F) -> Value
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Value>,
    {
        self.fetch(&keys::actor_movies(id), TtlPolicy::ActorMovies, compute)
            .await
    }

    /// Fetch-or-compute an actor's display name (30 minute TTL).
    pub async fn cache_actor_name<F, Fut>(&self, id: u64, compute: F) -> Value
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Value>,
    {
        self.fetch(&keys::actor_name(id), TtlPolicy::ActorName, compute)
            .await
    }

    /// Fetch-or-compute search results (5 minute TTL). Equivalent queries
    /// share one entry.
    pub async fn cache_search<F, Fut>(&self, query: &str, compute: F) -> Value
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Value>,
    {
        self.fetch(&keys::search(query), TtlPolicy::SearchResults, compute)
            .await
    }

    /// Fetch-or-compute an actor comparison (15 minute TTL). Symmetric in
    /// the pair.
    pub async fn cache_comparison<F, Fut>(&self, a: u64, b: u64, compute: F) -> Value
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Value>,
    {
        self.fetch(
            &keys::comparison(a, b),
            TtlPolicy::ActorComparison,
            compute,
        )
        .await
    }

    /// Fetch-or-compute movie details (1 hour TTL).
    pub async fn cache_movie_details<F, Fut>(&self, id: u64, compute: F) -> Value
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Value>,
    {
        self.fetch(&keys::movie_details(id), TtlPolicy::MovieDetails, compute)
            .await
    }

    /// Batched actor-profile fetch: the miss block receives the actor ids
    /// whose profiles were not cached and returns an id→profile map.
    pub async fn batch_actor_profiles<F, Fut>(
        &self,
        ids: &[u64],
        compute: F,
    ) -> HashMap<u64, Value>
    where
        F: FnOnce(Vec<u64>) -> Fut,
        Fut: Future<Output = HashMap<u64, Value>>,
    {
        let keyed: Vec<(u64, String)> = ids
            .iter()
            .map(|id| (*id, keys::actor_profile(*id)))
            .collect();
        let key_list: Vec<String> = keyed.iter().map(|(_, key)| key.clone()).collect();

        let by_key = self
            .fetch_multi(&key_list, TtlPolicy::ActorProfile, |missing| async move {
                let missing_ids: Vec<u64> = missing
                    .iter()
                    .filter_map(|key| key.rsplit(':').next()?.parse().ok())
                    .collect();
                compute(missing_ids)
                    .await
                    .into_iter()
                    .map(|(id, profile)| (keys::actor_profile(id), profile))
                    .collect()
            })
            .await;

        keyed
            .into_iter()
            .filter_map(|(id, key)| by_key.get(&key).map(|value| (id, value.clone())))
            .collect()
    }
}
