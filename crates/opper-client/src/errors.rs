/// Errors returned by the client API.
///
/// Malformed SSE lines never show up here: the stream decoder drops them and
/// keeps going.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OpperError {
    /// A required field was missing before any request was sent.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Invalid client configuration (missing API key, bad base URL, ...).
    #[error("config error: {0}")]
    Config(String),
    /// Connection, DNS or TLS failure.
    #[error("{}", transport_message(.message, .connection_refused))]
    Transport {
        message: String,
        connection_refused: bool,
    },
    /// The server answered with HTTP 429.
    #[error("rate limit error: please retry in a few seconds")]
    RateLimited,
    /// Any other non-2xx response.
    #[error("request failed with status {status}: {message}")]
    Request { status: u16, message: String },
    /// A complete (non-streaming) response body could not be decoded.
    #[error("error parsing response: {0}")]
    Decode(String),
    /// The connection broke while a stream was being read.
    #[error("error reading stream: {0}")]
    StreamRead(String),
    /// The operation was aborted by the caller.
    #[error("cancelled")]
    Cancelled,
    /// The operation did not finish before its deadline.
    #[error("operation timed out after {0}s")]
    Timeout(u64),
}

fn transport_message(message: &str, connection_refused: &bool) -> String {
    if *connection_refused {
        format!("connection failed: {message}. Is the server running?")
    } else {
        format!("network error: {message}")
    }
}

impl OpperError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            connection_refused: false,
        }
    }

    /// Creates a transport error for a refused or unreachable connection.
    pub fn connection_refused(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            connection_refused: true,
        }
    }

    /// Returns true for errors a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Transport { .. })
    }

    /// Builds the error for a non-2xx response from its status and raw body.
    ///
    /// The structured envelope `{"error":{"type":..,"message":..}}` is tried
    /// first; the raw body text is used when it does not parse.
    pub fn from_status(status: u16, body: &str) -> Self {
        if status == 429 {
            return Self::RateLimited;
        }
        Self::Request {
            status,
            message: error_message_from_body(body),
        }
    }
}

#[derive(serde::Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorDetail>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<serde_json::Value>,
}

#[derive(serde::Deserialize)]
struct ErrorDetail {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

pub(crate) fn error_message_from_body(body: &str) -> String {
    let trimmed = body.trim();
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(trimmed) {
        if let Some(detail) = envelope.error {
            match (detail.kind, detail.message) {
                (Some(kind), Some(message)) => return format!("{kind}: {message}"),
                (None, Some(message)) => return message,
                (Some(kind), None) => return kind,
                (None, None) => {}
            }
        }
        if let Some(message) = envelope.message {
            return message;
        }
        match envelope.detail {
            Some(serde_json::Value::String(detail)) => return detail,
            Some(detail) if !detail.is_null() => return detail.to_string(),
            _ => {}
        }
    }
    if trimmed.is_empty() {
        "<empty body>".to_string()
    } else {
        trimmed.to_string()
    }
}
