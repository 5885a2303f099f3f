use std::time::Duration;

use crate::errors::OpperError;

/// Default API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.opper.ai";

/// Configuration for the HTTP client.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// API key sent as `X-OPPER-API-KEY`.
    pub api_key: String,
    /// Base URL of the API.
    ///
    /// Useful for self-hosted deployments or local test servers.
    pub base_url: String,
    /// Timeout for establishing a connection.
    ///
    /// There is deliberately no whole-request timeout here: streaming
    /// responses stay open for as long as the server keeps writing.
    pub connect_timeout: Duration,
    /// Capacity of the hand-off queue between stream producers and consumers.
    pub stream_buffer_capacity: usize,
}

impl ClientConfig {
    /// Creates a config with defaults and the provided API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            stream_buffer_capacity: 64,
        }
    }

    /// Builds a config from `OPPER_API_KEY` and the optional `OPPER_BASE_URL`.
    pub fn from_env() -> Result<Self, OpperError> {
        let api_key = std::env::var("OPPER_API_KEY").unwrap_or_default();
        if api_key.trim().is_empty() {
            return Err(OpperError::Config(
                "OPPER_API_KEY environment variable not set".into(),
            ));
        }
        let mut config = Self::new(api_key);
        if let Ok(base_url) = std::env::var("OPPER_BASE_URL")
            && !base_url.trim().is_empty()
        {
            config = config.base_url(base_url);
        }
        Ok(config)
    }

    /// Overrides the API base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Overrides the stream hand-off queue capacity.
    pub fn stream_buffer_capacity(mut self, capacity: usize) -> Self {
        self.stream_buffer_capacity = capacity;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), OpperError> {
        if self.api_key.trim().is_empty() {
            return Err(OpperError::Config("api key must not be empty".into()));
        }
        let base = self.base_url.trim();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(OpperError::Config(format!(
                "base url must start with http:// or https:// (got {base:?})"
            )));
        }
        if self.stream_buffer_capacity == 0 {
            return Err(OpperError::Config(
                "stream_buffer_capacity must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
