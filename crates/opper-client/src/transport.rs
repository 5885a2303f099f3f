use std::pin::Pin;

use futures::StreamExt as _;
use tracing::debug;

use crate::config::ClientConfig;
use crate::errors::OpperError;

/// Boxed response body: chunks of bytes as they arrive from the server.
pub type ByteStream =
    Pin<Box<dyn futures::Stream<Item = Result<bytes::Bytes, OpperError>> + Send + 'static>>;

/// An outgoing API request, relative to the configured base URL.
#[derive(Clone, Debug, PartialEq)]
pub struct HttpRequest {
    pub method: reqwest::Method,
    /// Path plus optional query string, e.g. `/v1/traces?limit=10`.
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl HttpRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: reqwest::Method::GET,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: reqwest::Method::POST,
            path: path.into(),
            body: Some(body),
        }
    }
}

/// Response with the status line already read and the body still open.
pub struct HttpResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Reads the whole body into a string.
    pub async fn text(mut self) -> Result<String, OpperError> {
        let mut buf = Vec::new();
        while let Some(chunk) = self.body.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Reads the whole body and deserializes it as JSON.
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> Result<T, OpperError> {
        let text = self.text().await?;
        serde_json::from_str(&text).map_err(|e| OpperError::Decode(e.to_string()))
    }

    /// Returns `self` on 2xx, otherwise drains the body into an error.
    pub async fn error_for_status(self) -> Result<Self, OpperError> {
        if self.is_success() {
            return Ok(self);
        }
        let status = self.status;
        let body = self
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(OpperError::from_status(status, &body))
    }
}

/// HTTP capability used by the client.
///
/// The production implementation is [`ReqwestTransport`]; tests plug in
/// fakes that count requests or replay canned bodies.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, OpperError>;
}

/// `reqwest`-backed transport that authenticates with `X-OPPER-API-KEY`.
pub struct ReqwestTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl ReqwestTransport {
    pub fn new(config: ClientConfig) -> Result<Self, OpperError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| OpperError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, OpperError> {
        let url = self.config.url(&request.path);
        debug!(method = %request.method, url = %url, "sending request");

        let mut http_req = self
            .client
            .request(request.method, &url)
            .header("X-OPPER-API-KEY", &self.config.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(body) = request.body.as_ref() {
            http_req = http_req.json(body);
        }

        let response = http_req.send().await.map_err(|e| map_send_error(&url, &e))?;
        let status = response.status().as_u16();
        debug!(url = %url, status, "response headers received");

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| OpperError::StreamRead(e.to_string())));
        Ok(HttpResponse {
            status,
            body: Box::pin(body),
        })
    }
}

fn map_send_error(url: &str, err: &reqwest::Error) -> OpperError {
    if err.is_connect() {
        OpperError::connection_refused(format!("could not connect to {url}"))
    } else if err.is_timeout() {
        OpperError::transport(format!("request to {url} timed out"))
    } else {
        OpperError::transport(format!("request to {url} failed: {err}"))
    }
}
