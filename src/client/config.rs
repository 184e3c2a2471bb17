use std::time::Duration;

use crate::breaker::CircuitBreakerConfig;
use crate::throttle::ThrottlerConfig;

/// Configuration for [`ResilientClient`](crate::ResilientClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub(crate) base_url: String,
    pub(crate) api_key: Option<String>,
    pub(crate) connect_timeout: Duration,
    pub(crate) read_timeout: Duration,
    pub(crate) max_retries: u32,
    pub(crate) retry_base_delay: Duration,
    pub(crate) retry_max_delay: Duration,
    pub(crate) breaker: CircuitBreakerConfig,
    pub(crate) throttler: ThrottlerConfig,
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    pub(crate) fn credentials(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    base_url: String,
    api_key: Option<String>,
    connect_timeout: Duration,
    read_timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    retry_max_delay: Duration,
    breaker: CircuitBreakerConfig,
    throttler: ThrottlerConfig,
}

impl ClientConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - connect/read timeouts: 5 seconds each
    /// - max_retries: 3
    /// - retry backoff: 500ms base, doubling per attempt, capped at 8s
    /// - breaker: 5 consecutive failures, 60s recovery
    /// - throttler: 30 requests per rolling 10s window
    pub fn new() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(8),
            breaker: CircuitBreakerConfig::default(),
            throttler: ThrottlerConfig::default(),
        }
    }

    /// Sets the upstream base URL. Required.
    pub fn base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the API key. A missing or blank key never raises; requests
    /// synthesize fallbacks instead.
    pub fn api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the connect timeout.
    ///
    /// Default: 5 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read timeout.
    ///
    /// Default: 5 seconds
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Sets the retry budget for timeouts, transport failures, and 5xx.
    ///
    /// Default: 3
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base backoff delay; attempt `n` waits `base * 2^n`.
    ///
    /// Default: 500ms
    pub fn retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    /// Caps the backoff delay (and any honored `Retry-After` hint).
    ///
    /// Default: 8 seconds
    pub fn retry_max_delay(mut self, delay: Duration) -> Self {
        self.retry_max_delay = delay;
        self
    }

    /// Replaces the circuit breaker configuration.
    pub fn breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Replaces the throttler configuration.
    pub fn throttler(mut self, throttler: ThrottlerConfig) -> Self {
        self.throttler = throttler;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ClientConfig {
        ClientConfig {
            base_url: self.base_url,
            api_key: self.api_key,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            max_retries: self.max_retries,
            retry_base_delay: self.retry_base_delay,
            retry_max_delay: self.retry_max_delay,
            breaker: self.breaker,
            throttler: self.throttler,
        }
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
