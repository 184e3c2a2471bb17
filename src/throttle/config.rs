use std::time::Duration;

/// Configuration for the request throttler.
#[derive(Debug, Clone)]
pub struct ThrottlerConfig {
    pub(crate) window: Duration,
    pub(crate) max_requests: usize,
    pub(crate) name: String,
}

impl ThrottlerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ThrottlerConfigBuilder {
        ThrottlerConfigBuilder::new()
    }
}

impl Default for ThrottlerConfig {
    fn default() -> Self {
        ThrottlerConfigBuilder::new().build()
    }
}

/// Builder for [`ThrottlerConfig`].
#[derive(Debug, Clone)]
pub struct ThrottlerConfigBuilder {
    window: Duration,
    max_requests: usize,
    name: String,
}

impl ThrottlerConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - window: 10 seconds
    /// - max_requests: 30
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            window: Duration::from_secs(10),
            max_requests: 30,
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the rolling window over which admissions are counted.
    ///
    /// Default: 10 seconds
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Sets the maximum number of admissions inside one rolling window.
    ///
    /// Default: 30
    pub fn max_requests(mut self, max_requests: usize) -> Self {
        self.max_requests = max_requests.max(1);
        self
    }

    /// Sets the name for this throttler instance (used in log fields).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ThrottlerConfig {
        ThrottlerConfig {
            window: self.window,
            max_requests: self.max_requests,
            name: self.name,
        }
    }
}

impl Default for ThrottlerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
