use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::Client;
use crate::errors::OpperError;
use crate::stream::TokenStream;
use crate::transport::HttpRequest;

/// One chat message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat turn addressed to a function by its path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatRequest {
    pub function_path: String,
    pub messages: Vec<Message>,
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    messages: &'a [Message],
}

impl ChatRequest {
    /// Single user message to `function_path`.
    pub fn new(function_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            function_path: function_path.into(),
            messages: vec![Message::user(message)],
        }
    }

    fn path(&self) -> Result<String, OpperError> {
        let function_path = self.function_path.trim().trim_matches('/');
        if function_path.is_empty() {
            return Err(OpperError::validation("function path is required"));
        }
        if self.messages.iter().all(|m| m.content.trim().is_empty()) {
            return Err(OpperError::validation("message is required"));
        }
        Ok(format!("/v1/chat/{function_path}?stream=true"))
    }
}

impl Client {
    /// Sends a chat turn and streams the reply.
    pub async fn chat(&self, request: ChatRequest) -> Result<TokenStream, OpperError> {
        let path = request.path()?;
        let request_id = uuid::Uuid::new_v4();
        debug!(request_id = %request_id, path = %path, "starting chat");

        let body = serde_json::to_value(ChatPayload {
            messages: &request.messages,
        })
        .map_err(|e| OpperError::Decode(e.to_string()))?;
        let response = self.send(HttpRequest::post(path, body)).await?;
        Ok(TokenStream::spawn(
            request_id,
            response.body,
            self.stream_buffer_capacity(),
        ))
    }
}
