//! Common imports for typical client usage.
pub use crate::{
    AbortHandle, CallRequest, CallResponse, ChatRequest, Client, ClientConfig, OpperError, Span,
    SpanTree, TokenStream, Trace, TreeLine, WatchConfig, WatchEvent, WatchStream,
};
