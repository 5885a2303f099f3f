use futures::StreamExt as _;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::abort::{AbortHandle, AbortSignal};
use crate::errors::OpperError;
use crate::sse::{LineDecoder, parse_delta};
use crate::transport::ByteStream;

/// Final outcome of a stream that ended without a read error.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSummary {
    pub request_id: uuid::Uuid,
    /// Number of tokens handed to the consumer.
    pub tokens: u64,
}

/// Lazy, single-consumer sequence of text deltas decoded from an open
/// response body.
///
/// Tokens arrive in server order through a bounded queue fed by a background
/// task. The queue closes when the body ends, breaks, or the stream is
/// aborted. A broken connection is reported once through [`finish`]; tokens
/// already delivered stay valid.
///
/// Dropping the stream aborts the producer, which releases the body.
///
/// [`finish`]: TokenStream::finish
pub struct TokenStream {
    request_id: uuid::Uuid,
    rx: mpsc::Receiver<String>,
    outcome_rx: Option<oneshot::Receiver<Result<StreamSummary, OpperError>>>,
    abort_handle: AbortHandle,
}

impl TokenStream {
    /// Starts the producer task for `body` and returns the consumer side.
    pub fn spawn(request_id: uuid::Uuid, body: ByteStream, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let abort_handle = AbortHandle::new();
        tokio::spawn(produce_tokens(
            request_id,
            body,
            tx,
            outcome_tx,
            abort_handle.signal(),
        ));
        Self {
            request_id,
            rx,
            outcome_rx: Some(outcome_rx),
            abort_handle,
        }
    }

    /// Identifier used in logs for the request behind this stream.
    pub fn request_id(&self) -> uuid::Uuid {
        self.request_id
    }

    /// Returns a handle that stops the producer.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next token. Returns `None` once the stream has ended.
    pub async fn next_token(&mut self) -> Option<String> {
        self.rx.recv().await
    }

    /// Drains any remaining tokens and returns how the stream ended.
    pub async fn finish(mut self) -> Result<StreamSummary, OpperError> {
        while self.rx.recv().await.is_some() {}
        let Some(outcome_rx) = self.outcome_rx.take() else {
            return Err(OpperError::Cancelled);
        };
        outcome_rx.await.unwrap_or(Err(OpperError::Cancelled))
    }

    /// Reads the stream to the end and returns the concatenated text.
    pub async fn collect_text(mut self) -> Result<String, OpperError> {
        let mut text = String::new();
        while let Some(token) = self.next_token().await {
            text.push_str(&token);
        }
        self.finish().await?;
        Ok(text)
    }
}

impl Drop for TokenStream {
    fn drop(&mut self) {
        self.abort_handle.abort();
    }
}

async fn produce_tokens(
    request_id: uuid::Uuid,
    mut body: ByteStream,
    tx: mpsc::Sender<String>,
    outcome_tx: oneshot::Sender<Result<StreamSummary, OpperError>>,
    mut abort: AbortSignal,
) {
    let mut decoder = LineDecoder::default();
    let mut tokens = 0_u64;

    let outcome = loop {
        let next = tokio::select! {
            biased;
            _ = abort.aborted() => break Err(OpperError::Cancelled),
            next = body.next() => next,
        };
        let ended = next.is_none();
        let lines = match next {
            Some(Ok(chunk)) => decoder.push_chunk(&chunk),
            Some(Err(err)) => {
                warn!(request_id = %request_id, tokens, error = %err, "stream read failed");
                break Err(err);
            }
            None => decoder.finish().into_iter().collect(),
        };

        let mut delivered = true;
        for token in lines.iter().filter_map(|line| parse_delta(line)) {
            let sent = tokio::select! {
                biased;
                _ = abort.aborted() => false,
                sent = tx.send(token) => sent.is_ok(),
            };
            if !sent {
                delivered = false;
                break;
            }
            tokens += 1;
        }
        if !delivered {
            debug!(request_id = %request_id, tokens, "stream consumer went away or aborted");
            break Err(OpperError::Cancelled);
        }
        if ended {
            break Ok(StreamSummary { request_id, tokens });
        }
    };

    // Release the connection before reporting so a consumer blocked in
    // `finish` never observes an open body.
    drop(body);
    drop(tx);
    debug!(request_id = %request_id, tokens, ok = outcome.is_ok(), "stream closed");
    let _ = outcome_tx.send(outcome);
}
