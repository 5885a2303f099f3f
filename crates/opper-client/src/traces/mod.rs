//! Trace retrieval, span-tree reconstruction and live watchers.

mod tree;
mod types;
mod watch;

pub use tree::{SpanNode, SpanTree, TreeLine};
pub use types::{ProjectRef, Score, Span, Trace, TraceListResponse};
pub use watch::{WATCH_LIST_LIMIT, WatchConfig, WatchEvent, WatchState, WatchStream};

use tracing::debug;

use crate::client::Client;
use crate::errors::OpperError;
use crate::transport::HttpRequest;

impl Client {
    /// Lists the most recent traces, newest first. A `limit` of 0 leaves the
    /// page size to the server.
    pub async fn list_traces(&self, limit: usize) -> Result<Vec<Trace>, OpperError> {
        let path = if limit > 0 {
            format!("/v1/traces?limit={limit}")
        } else {
            "/v1/traces".to_string()
        };
        let page: TraceListResponse = self.send(HttpRequest::get(path)).await?.json().await?;
        debug!(count = page.traces.len(), "traces listed");
        Ok(page.traces)
    }

    /// Fetches one trace with all of its spans.
    pub async fn get_trace(&self, trace_id: &str) -> Result<Trace, OpperError> {
        let trace_id = trace_id.trim();
        if trace_id.is_empty() {
            return Err(OpperError::validation("trace id is required"));
        }
        let trace: Trace = self
            .send(HttpRequest::get(format!("/v1/traces/{trace_id}")))
            .await?
            .json()
            .await?;
        debug!(trace_id, spans = trace.spans.len(), "trace fetched");
        Ok(trace)
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
    async fn list_traces_reads_page_and_sets_limit() {
        let (client, transport) = client(vec![Ok(Reply::ok(
            r#"{"traces":[{"uuid":"t2","name":"b","scores":[{"score":80},{"score":90}]},{"uuid":"t1","name":"a","scores":null}],"cursor":null}"#,
        ))]);
        let traces = client.list_traces(5).await.expect("traces");
        assert_eq!(traces.len(), 2);
        assert_eq!(traces[0].average_score(), Some(85.0));
        assert_eq!(traces[1].average_score(), None);
        assert_eq!(
            transport.last_request().map(|r| r.path),
            Some("/v1/traces?limit=5".to_string())
        );
    }

    #[tokio::test]
    async fn zero_limit_omits_query() {
        let (client, transport) = client(vec![Ok(Reply::ok(r#"{"traces":[]}"#))]);
        assert!(client.list_traces(0).await.expect("traces").is_empty());
        assert_eq!(
            transport.last_request().map(|r| r.path),
            Some("/v1/traces".to_string())
        );
    }

    #[tokio::test]
    async fn get_trace_decodes_spans() {
        let (client, _) = client(vec![Ok(Reply::ok(
            r#"{"uuid":"t1","name":"run","spans":[
                {"uuid":"s1","parent_uuid":null,"name":"root","duration_ms":1200.5},
                {"uuid":"s2","parent_uuid":"s1","name":null,"score":75}
            ]}"#,
        ))]);
        let trace = client.get_trace("t1").await.expect("trace");
        assert_eq!(trace.spans.len(), 2);
        assert_eq!(trace.spans[1].name, "");
        assert_eq!(trace.spans[1].parent_uuid.as_deref(), Some("s1"));
        assert_eq!(trace.spans[0].duration_ms, Some(1200.5));
    }

    #[tokio::test]
    async fn get_trace_requires_an_id() {
        let (client, transport) = client(vec![Ok(Reply::ok("{}"))]);
        assert!(matches!(
            client.get_trace("  ").await,
            Err(OpperError::Validation(_))
        ));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn not_found_and_bad_json_are_distinct_errors() {
        let (client, _) = client(vec![
            Ok(Reply::status(404, r#"{"error":{"type":"NotFound","message":"no such trace"}}"#)),
            Ok(Reply::ok("<html>")),
        ]);
        assert_eq!(
            client.get_trace("x").await,
            Err(OpperError::Request {
                status: 404,
                message: "NotFound: no such trace".into()
            })
        );
        assert!(matches!(
            client.get_trace("x").await,
            Err(OpperError::Decode(_))
        ));
    }
}
