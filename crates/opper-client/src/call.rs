use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::Client;
use crate::errors::OpperError;
use crate::stream::TokenStream;
use crate::transport::HttpRequest;

/// Body of `POST /v1/call`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CallRequest {
    pub name: String,
    pub instructions: String,
    pub input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

impl CallRequest {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            input: input.into(),
            model: None,
            tags: BTreeMap::new(),
            stream: false,
        }
    }

    /// Overrides the model the function runs on.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn tags(mut self, tags: impl IntoIterator<Item = (String, String)>) -> Self {
        self.tags.extend(tags);
        self
    }

    /// Requests an incremental `text/event-stream` response.
    pub fn stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    fn validate(&self) -> Result<(), OpperError> {
        for (field, value) in [
            ("name", &self.name),
            ("instructions", &self.instructions),
            ("input", &self.input),
        ] {
            if value.trim().is_empty() {
                return Err(OpperError::validation(format!("{field} is required")));
            }
        }
        Ok(())
    }
}

/// Result of [`Client::call`]; exactly one delivery mode per call.
pub enum CallResponse {
    /// Whole reply of a non-streaming call.
    Complete { message: String },
    /// Tokens of a streaming call, in server order.
    Streaming(TokenStream),
}

impl CallResponse {
    /// Returns the full reply text, reading the stream to the end if needed.
    pub async fn into_text(self) -> Result<String, OpperError> {
        match self {
            Self::Complete { message } => Ok(message),
            Self::Streaming(stream) => stream.collect_text().await,
        }
    }
}

#[derive(Deserialize)]
struct CallReply {
    #[serde(default)]
    message: String,
}

impl Client {
    /// Runs a function. Streaming calls issue a single request and hand back
    /// the open body as a [`TokenStream`].
    pub async fn call(&self, request: CallRequest) -> Result<CallResponse, OpperError> {
        request.validate()?;
        let request_id = uuid::Uuid::new_v4();
        let stream = request.stream;
        debug!(request_id = %request_id, name = %request.name, stream, "calling function");

        let body = serde_json::to_value(&request).map_err(|e| OpperError::Decode(e.to_string()))?;
        let response = self.send(HttpRequest::post("/v1/call", body)).await?;
        if stream {
            return Ok(CallResponse::Streaming(TokenStream::spawn(
                request_id,
                response.body,
                self.stream_buffer_capacity(),
            )));
        }
        let reply: CallReply = response.json().await?;
        debug!(request_id = %request_id, len = reply.message.len(), "call complete");
        Ok(CallResponse::Complete {
            message: reply.message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{FakeTransport, Reply};
    use std::sync::Arc;

    fn client(replies: Vec<Result<Reply, OpperError>>) -> (Client, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::new(replies));
        let client = Client::builder()
            .transport(transport.clone())
            .build()
            .expect("client");
        (client, transport)
    }

    #[tokio::test]
    async fn empty_fields_fail_before_any_request() {
        let (client, transport) = client(vec![Ok(Reply::ok(r#"{"message":"x"}"#))]);
        for request in [
            CallRequest::new("fn", "do it", ""),
            CallRequest::new("", "do it", "in"),
            CallRequest::new("fn", "  ", "in").stream(true),
        ] {
            assert!(matches!(
                client.call(request).await,
                Err(OpperError::Validation(_))
            ));
        }
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn non_streaming_call_returns_complete_message() {
        let (client, transport) = client(vec![Ok(Reply::ok(
            r#"{"message":"hello there","json_payload":null}"#,
        ))]);
        let response = client
            .call(CallRequest::new("greeter", "greet", "bob").model("gpt-4o"))
            .await
            .expect("call");
        match response {
            CallResponse::Complete { message } => assert_eq!(message, "hello there"),
            CallResponse::Streaming(_) => panic!("expected a complete response"),
        }

        let sent = transport.last_request().expect("request");
        assert_eq!(sent.path, "/v1/call");
        assert_eq!(
            sent.body,
            Some(serde_json::json!({
                "name": "greeter",
                "instructions": "greet",
                "input": "bob",
                "model": "gpt-4o",
            }))
        );
    }

    #[tokio::test]
    async fn streaming_call_uses_one_request_and_yields_tokens() {
        let (client, transport) = client(vec![Ok(Reply::chunks(vec![
            Ok(bytes::Bytes::from_static(b"data: {\"delta\":\"Hel\"}\n\n")),
            Ok(bytes::Bytes::from_static(b"data: {\"delta\":\"lo\"}\n")),
        ]))]);
        let response = client
            .call(
                CallRequest::new("fn", "say hi", "now")
                    .stream(true)
                    .tag("env", "test"),
            )
            .await
            .expect("call");
        let CallResponse::Streaming(mut stream) = response else {
            panic!("expected a stream");
        };
        assert_eq!(stream.next_token().await.as_deref(), Some("Hel"));
        assert_eq!(stream.next_token().await.as_deref(), Some("lo"));
        assert_eq!(stream.finish().await.map(|s| s.tokens), Ok(2));

        assert_eq!(transport.calls(), 1);
        let body = transport.last_request().and_then(|r| r.body).expect("body");
        assert_eq!(body["stream"], serde_json::json!(true));
        assert_eq!(body["tags"], serde_json::json!({"env": "test"}));
    }

    #[tokio::test]
    async fn aborting_a_stream_on_an_open_body_ends_it_as_cancelled() {
        let (client, _) = client(vec![Ok(Reply::chunks(vec![Ok(bytes::Bytes::from_static(
            b"data: {\"delta\":\"first\"}\n",
        ))])
        .hanging())]);
        let response = client
            .call(CallRequest::new("fn", "say hi", "now").stream(true))
            .await
            .expect("call");
        let CallResponse::Streaming(mut stream) = response else {
            panic!("expected a stream");
        };
        assert_eq!(stream.next_token().await.as_deref(), Some("first"));

        stream.abort_handle().abort();
        let ended = tokio::time::timeout(std::time::Duration::from_secs(2), async move {
            let next = stream.next_token().await;
            (next, stream.finish().await)
        })
        .await
        .expect("abort ends a stream whose body never closes");
        assert_eq!(ended, (None, Err(OpperError::Cancelled)));
    }

    #[tokio::test]
    async fn server_error_envelope_is_surfaced() {
        let (client, _) = client(vec![Ok(Reply::status(
            500,
            r#"{"type":"x","error":{"type":"internal","message":"boom"}}"#,
        ))]);
        let err = match client.call(CallRequest::new("f", "i", "x")).await {
            Ok(_) => panic!("500 should fail"),
            Err(err) => err,
        };
        let text = err.to_string();
        assert!(text.contains("internal") && text.contains("boom"), "{text}");
    }

    #[tokio::test]
    async fn into_text_collects_either_mode() {
        let (client, _) = client(vec![
            Ok(Reply::ok(r#"{"message":"whole"}"#)),
            Ok(Reply::ok("{\"delta\":\"pie\"}\n{\"delta\":\"ces\"}")),
        ]);
        let whole = client
            .call(CallRequest::new("f", "i", "x"))
            .await
            .expect("call");
        assert_eq!(whole.into_text().await.expect("text"), "whole");
        let streamed = client
            .call(CallRequest::new("f", "i", "x").stream(true))
            .await
            .expect("call");
        assert_eq!(streamed.into_text().await.expect("text"), "pieces");
    }
}
