//! Resilient client: throttle, circuit breaker, bounded retry, fallback.
//!
//! [`ResilientClient::request`] never raises for transient upstream failure
//! classes. The pipeline per request: classify the endpoint's fallback shape,
//! check credentials, submit the guarded call to the throttler (blocks until
//! admitted), and inside the dispatched job bracket each HTTP attempt with
//! the circuit breaker, retrying retryable failures with exponential backoff.
//! Any terminal failure synthesizes a fallback-marked placeholder.

mod config;
mod fallback;

pub use config::{ClientConfig, ClientConfigBuilder};
pub use fallback::{is_fallback, FallbackShape};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;

use crate::breaker::{BreakerError, CircuitBreaker, CircuitBreakerStatus, CircuitState};
use crate::error::ApiError;
use crate::throttle::{Priority, ThrottleError, Throttler, ThrottlerStatus};

/// Shared between the client handle and the throttled jobs it dispatches.
struct ClientInner {
    http: reqwest::Client,
    config: ClientConfig,
    breaker: CircuitBreaker,
}

/// Mediates all calls to the upstream metadata API.
///
/// Cheap to clone via the `Arc`s inside; one instance per upstream is
/// constructed at startup and shared.
pub struct ResilientClient {
    inner: Arc<ClientInner>,
    throttler: Arc<Throttler<Result<Value, ApiError>>>,
}

impl Clone for ResilientClient {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            throttler: Arc::clone(&self.throttler),
        }
    }
}

impl ResilientClient {
    /// Builds the client, its HTTP transport, breaker, and throttler.
    ///
    /// Must be called from within a tokio runtime (the throttler spawns its
    /// dispatcher task).
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .build()
            .map_err(ApiError::Transport)?;
        let breaker = CircuitBreaker::new(config.breaker.clone());
        let throttler = Arc::new(Throttler::new(config.throttler.clone()));
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                breaker,
            }),
            throttler,
        })
    }

    /// Fetches `endpoint` at default (low) priority. Never returns an error
    /// for transient failure classes; the caller gets real data or a
    /// fallback-marked placeholder.
    pub async fn request(&self, endpoint: &str, params: &HashMap<String, String>) -> Value {
        self.request_with_priority(endpoint, params, Priority::Low)
            .await
    }

    /// [`request`](Self::request) at an explicit priority.
    pub async fn request_with_priority(
        &self,
        endpoint: &str,
        params: &HashMap<String, String>,
        priority: Priority,
    ) -> Value {
        let shape = FallbackShape::resolve(endpoint);
        match self
            .try_request_with_priority(endpoint, params, priority)
            .await
        {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(
                    endpoint,
                    error = %err,
                    error_kind = err.kind(),
                    circuit = %self.inner.breaker.state(),
                    shape = ?shape,
                    "synthesizing fallback response"
                );
                shape.synthesize()
            }
        }
    }

    /// The raising variant of [`request`](Self::request), for callers that
    /// want the error taxonomy instead of fallback synthesis.
    pub async fn try_request(
        &self,
        endpoint: &str,
        params: &HashMap<String, String>,
    ) -> Result<Value, ApiError> {
        self.try_request_with_priority(endpoint, params, Priority::Low)
            .await
    }

    /// [`try_request`](Self::try_request) at an explicit priority.
    pub async fn try_request_with_priority(
        &self,
        endpoint: &str,
        params: &HashMap<String, String>,
        priority: Priority,
    ) -> Result<Value, ApiError> {
        // No throttle slot is burned on a misconfigured client.
        if self.inner.config.credentials().is_none() {
            return Err(ApiError::Config);
        }

        tracing::debug!(endpoint, ?priority, "dispatching upstream request");

        let inner = Arc::clone(&self.inner);
        let endpoint = endpoint.to_string();
        let params = params.clone();
        let job = async move { inner.execute_with_retries(&endpoint, &params).await };

        match self.throttler.submit(priority, job).await {
            Ok(outcome) => outcome,
            Err(ThrottleError::Closed) => Err(ApiError::ThrottlerClosed),
        }
    }

    /// Whether the client can usefully serve traffic: credentials are
    /// present and the circuit is not open.
    pub fn healthy(&self) -> bool {
        self.inner.config.credentials().is_some()
            && self.inner.breaker.state() != CircuitState::Open
    }

    /// Breaker snapshot for a health endpoint.
    pub fn circuit_status(&self) -> CircuitBreakerStatus {
        self.inner.breaker.status()
    }

    /// Throttler snapshot for a health endpoint.
    pub fn throttler_status(&self) -> ThrottlerStatus {
        self.throttler.status()
    }

    /// The breaker guarding this client. Exposed so operators can
    /// [`reset`](CircuitBreaker::reset) it and suites can seed state via
    /// [`force_state`](CircuitBreaker::force_state).
    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.inner.breaker
    }
}

impl ClientInner {
    /// One admitted request: breaker-bracketed attempts with bounded retry.
    ///
    /// Runs under dispatch control, so the backoff sleeps here hold the
    /// dispatcher; that is intentional, the throttler serializes outbound
    /// work.
    async fn execute_with_retries(
        &self,
        endpoint: &str,
        params: &HashMap<String, String>,
    ) -> Result<Value, ApiError> {
        let mut attempt: u32 = 0;
        let mut rate_limit_retried = false;
        loop {
            self.breaker
                .try_acquire()
                .map_err(|BreakerError::Open { retry_in }| ApiError::CircuitOpen { retry_in })?;

            let outcome = self.http_call(endpoint, params).await;
            match &outcome {
                Ok(_) => self.breaker.record_success(),
                Err(err) if err.counts_toward_breaker() => self.breaker.record_failure(),
                // Any HTTP response proves the upstream reachable, even an
                // unhappy one: the consecutive-failure tally resets.
                Err(_) => self.breaker.record_success(),
            }

            let err = match outcome {
                Ok(value) => {
                    tracing::debug!(endpoint, attempt, "upstream request succeeded");
                    return Ok(value);
                }
                Err(err) => err,
            };

            match err {
                ApiError::RateLimited { retry_after } if !rate_limit_retried => {
                    rate_limit_retried = true;
                    let delay = retry_after
                        .unwrap_or(self.config.retry_base_delay)
                        .min(self.config.retry_max_delay);
                    tracing::warn!(
                        endpoint,
                        delay_ms = delay.as_millis() as u64,
                        "rate limited, honoring retry-after hint"
                    );
                    sleep(delay).await;
                }
                err if err.is_retryable() && attempt < self.config.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    attempt += 1;
                    tracing::warn!(
                        endpoint,
                        attempt,
                        error = %err,
                        error_kind = err.kind(),
                        delay_ms = delay.as_millis() as u64,
                        "transient failure, retrying"
                    );
                    sleep(delay).await;
                }
                err => {
                    tracing::warn!(
                        endpoint,
                        attempt,
                        error = %err,
                        error_kind = err.kind(),
                        circuit = %self.breaker.state(),
                        "upstream request failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    /// One wire attempt: bounded GET, status classification, JSON parse.
    async fn http_call(
        &self,
        endpoint: &str,
        params: &HashMap<String, String>,
    ) -> Result<Value, ApiError> {
        let url = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        let mut request = self.http.get(&url).query(params);
        if let Some(key) = self.config.credentials() {
            request = request.query(&[("api_key", key)]);
        }

        let response = request.send().await.map_err(ApiError::from)?;
        let status = response.status().as_u16();

        if (200..300).contains(&status) {
            let body = response.text().await.map_err(ApiError::from)?;
            return serde_json::from_str(&body).map_err(ApiError::MalformedResponse);
        }

        Err(match status {
            401 => ApiError::AuthFailed,
            404 => ApiError::NotFound,
            429 => ApiError::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            },
            400..=499 => ApiError::HttpClient { status },
            _ => ApiError::HttpServer { status },
        })
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.config
            .retry_base_delay
            .saturating_mul(factor)
            .min(self.config.retry_max_delay)
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
