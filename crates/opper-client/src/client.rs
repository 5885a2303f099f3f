use std::sync::Arc;

use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::OpperError;
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

const DEFAULT_STREAM_BUFFER: usize = 64;

pub(crate) struct ClientInner {
    transport: Arc<dyn Transport>,
    stream_buffer_capacity: usize,
}

/// Entry point for calling functions, chatting and reading traces.
///
/// Cheap to clone; clones share the underlying HTTP connection pool.
#[derive(Clone)]
pub struct Client {
    pub(crate) inner: Arc<ClientInner>,
}

impl Client {
    /// Creates a client that talks to the API described by `config`.
    pub fn new(config: ClientConfig) -> Result<Self, OpperError> {
        Self::builder().config(config).build()
    }

    /// Creates a client from `OPPER_API_KEY` / `OPPER_BASE_URL`.
    pub fn from_env() -> Result<Self, OpperError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    pub(crate) fn stream_buffer_capacity(&self) -> usize {
        self.inner.stream_buffer_capacity
    }

    /// Sends a request and turns any non-2xx status into an error.
    pub(crate) async fn send(&self, request: HttpRequest) -> Result<HttpResponse, OpperError> {
        let method = request.method.clone();
        let path = request.path.clone();
        let response = self.inner.transport.send(request).await?;
        debug!(method = %method, path = %path, status = response.status, "api response");
        response.error_for_status().await
    }
}

/// Builder for a [`Client`] with either a config or a custom transport.
#[derive(Default)]
pub struct ClientBuilder {
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn Transport>>,
}

impl ClientBuilder {
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses `transport` instead of building a [`ReqwestTransport`].
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn build(self) -> Result<Client, OpperError> {
        let stream_buffer_capacity = self
            .config
            .as_ref()
            .map(|c| c.stream_buffer_capacity)
            .unwrap_or(DEFAULT_STREAM_BUFFER);
        let transport: Arc<dyn Transport> = match (self.transport, self.config) {
            (Some(transport), _) => transport,
            (None, Some(config)) => Arc::new(ReqwestTransport::new(config)?),
            (None, None) => {
                return Err(OpperError::Config(
                    "client needs a config or a transport".to_string(),
                ));
            }
        };
        Ok(Client {
            inner: Arc::new(ClientInner {
                transport,
                stream_buffer_capacity,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{FakeTransport, Reply};

    #[test]
    fn build_requires_config_or_transport() {
        let result = Client::builder().build();
        assert!(matches!(
            result,
            Err(OpperError::Config(message)) if message.contains("transport")
        ));
    }

    #[test]
    fn build_rejects_invalid_config() {
        let result = Client::new(ClientConfig::new(""));
        assert!(matches!(result, Err(OpperError::Config(_))));
    }

    #[tokio::test]
    async fn send_maps_error_statuses() {
        let transport = Arc::new(FakeTransport::new(vec![Ok(Reply::status(
            429,
            r#"{"error":{"message":"slow down"}}"#,
        ))]));
        let client = Client::builder()
            .transport(transport)
            .build()
            .expect("client");
        let result = client.send(HttpRequest::get("/v1/traces")).await;
        assert!(matches!(result, Err(OpperError::RateLimited)));
    }
}
