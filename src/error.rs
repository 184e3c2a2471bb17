//! Failure taxonomy for upstream calls.
//!
//! Every way an upstream request can go wrong maps to exactly one
//! [`ApiError`] variant, and each variant carries a fixed policy: whether it
//! is retried, and whether it counts toward the circuit breaker's
//! consecutive-failure tally. A missing resource is not upstream
//! unreliability, so 4xx responses (other than 429) never trip the breaker.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to the upstream metadata API.
///
/// These never escape [`ResilientClient::request`](crate::ResilientClient::request);
/// the client converges every variant to fallback synthesis. They are visible
/// through [`ResilientClient::try_request`](crate::ResilientClient::try_request)
/// for callers that want the raw taxonomy.
#[derive(Debug, Error)]
pub enum ApiError {
    /// API credentials are missing or blank.
    #[error("missing or blank API credentials")]
    Config,

    /// The connect or read timeout elapsed.
    #[error("request timed out")]
    Timeout,

    /// DNS failure, connection refused, or other I/O-level trouble.
    #[error("transport failure: {0}")]
    Transport(#[source] reqwest::Error),

    /// A 4xx response other than 401/404/429.
    #[error("upstream rejected the request: HTTP {status}")]
    HttpClient { status: u16 },

    /// A 5xx response.
    #[error("upstream server error: HTTP {status}")]
    HttpServer { status: u16 },

    /// HTTP 429, optionally carrying the upstream's `Retry-After` hint.
    #[error("rate limited by upstream")]
    RateLimited { retry_after: Option<Duration> },

    /// HTTP 404.
    #[error("resource not found")]
    NotFound,

    /// HTTP 401.
    #[error("authentication rejected by upstream")]
    AuthFailed,

    /// A 2xx response whose body did not parse as JSON.
    #[error("malformed response body: {0}")]
    MalformedResponse(#[source] serde_json::Error),

    /// The circuit breaker is open; the wire was never touched.
    #[error("circuit open, next attempt in {retry_in:?}")]
    CircuitOpen { retry_in: Duration },

    /// The throttler's dispatcher is gone. Converges to fallback like the rest.
    #[error("throttler dispatcher terminated")]
    ThrottlerClosed,
}

impl ApiError {
    /// Whether this failure class is retried with backoff.
    ///
    /// 429 is handled separately: retried exactly once, honoring the
    /// `Retry-After` hint.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::Timeout | ApiError::Transport(_) | ApiError::HttpServer { .. }
        )
    }

    /// Whether this failure feeds the circuit breaker's failure counter.
    ///
    /// Only signals of upstream unreliability count: timeouts, transport
    /// failures, and 5xx. A 429 is backpressure, not breakage, and is
    /// excluded here.
    pub fn counts_toward_breaker(&self) -> bool {
        matches!(
            self,
            ApiError::Timeout | ApiError::Transport(_) | ApiError::HttpServer { .. }
        )
    }

    /// Short stable label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Config => "config",
            ApiError::Timeout => "timeout",
            ApiError::Transport(_) => "transport",
            ApiError::HttpClient { .. } => "http_client",
            ApiError::HttpServer { .. } => "http_server",
            ApiError::RateLimited { .. } => "rate_limited",
            ApiError::NotFound => "not_found",
            ApiError::AuthFailed => "auth_failed",
            ApiError::MalformedResponse(_) => "malformed_response",
            ApiError::CircuitOpen { .. } => "circuit_open",
            ApiError::ThrottlerClosed => "throttler_closed",
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Transport(err)
        }
    }
}
