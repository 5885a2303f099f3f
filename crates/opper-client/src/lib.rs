//! Async client for the Opper function-calling API.
//!
//! Covers the parts of the API with real protocol work: streamed `call` and
//! `chat` replies decoded from server-sent events, and trace inspection with
//! span-tree reconstruction and polling watchers.
//!
//! # Streaming a call
//!
//! ```no_run
//! use opper_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), OpperError> {
//! let client = Client::from_env()?;
//!
//! let request = CallRequest::new("greeter", "Greet the user briefly.", "Ada").stream(true);
//! if let CallResponse::Streaming(mut tokens) = client.call(request).await? {
//!     while let Some(token) = tokens.next_token().await {
//!         print!("{token}");
//!     }
//!     tokens.finish().await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Rendering a trace
//!
//! ```no_run
//! use opper_client::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), OpperError> {
//! let client = Client::from_env()?;
//! let trace = client.get_trace("3f1c...").await?;
//! for line in SpanTree::build(&trace.spans).walk() {
//!     if let TreeLine::Span { depth, span } = line {
//!         println!("{}{}", "    ".repeat(depth), span.name);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

/// Cancellation handle shared by streams and watchers.
pub mod abort;
/// `POST /v1/call` request and response types.
pub mod call;
/// `POST /v1/chat/{path}` request types.
pub mod chat;
/// Client entry point and builder.
pub mod client;
/// Client configuration.
pub mod config;
/// Public error type.
pub mod errors;
/// Common imports for typical usage.
pub mod prelude;
/// Server-sent-event line decoding.
pub mod sse;
/// Token stream fed by a background decoder task.
pub mod stream;
/// Trace types, span trees and live watchers.
pub mod traces;
/// HTTP transport seam.
pub mod transport;

pub use abort::{AbortHandle, AbortSignal};
pub use call::{CallRequest, CallResponse};
pub use chat::{ChatRequest, Message};
pub use client::{Client, ClientBuilder};
pub use config::{ClientConfig, DEFAULT_BASE_URL};
pub use errors::OpperError;
pub use stream::{StreamSummary, TokenStream};
pub use traces::{
    ProjectRef, Score, Span, SpanNode, SpanTree, Trace, TreeLine, WatchConfig, WatchEvent,
    WatchState, WatchStream,
};
pub use transport::{ByteStream, HttpRequest, HttpResponse, ReqwestTransport, Transport};
