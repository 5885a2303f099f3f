//! Command handlers. Each one talks to the API through [`Client`] and writes
//! results to stdout; errors bubble up to `main` as [`CliError`].

mod call;
mod chat;
mod traces;

use std::future::Future;
use std::time::Duration;

use opper_client::{AbortHandle, Client, OpperError};
use tokio::io::{AsyncRead, AsyncReadExt as _};

use crate::cli::{Command, FunctionsCommand, TracesCommand};

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Api(#[from] OpperError),
    #[error("error reading from stdin: {0}")]
    Stdin(#[from] std::io::Error),
    #[error("{0}")]
    Usage(String),
}

/// What a command needs besides its arguments.
pub struct Context {
    pub client: Client,
    /// Fired on Ctrl-C.
    pub interrupt: AbortHandle,
    /// Deadline for non-live commands.
    pub timeout: Duration,
}

pub async fn run(command: Command, ctx: &Context) -> Result<(), CliError> {
    match command {
        Command::Call {
            name,
            instructions,
            input,
            model,
            tags,
            no_stream,
        } => {
            let args = call::CallArgs {
                name,
                instructions,
                input,
                model,
                tags,
                stream: !no_stream,
            };
            with_deadline(ctx, call::run(&ctx.client, args)).await
        }
        Command::Functions {
            command: FunctionsCommand::Chat { name, message },
        } => with_deadline(ctx, chat::run(&ctx.client, name, message)).await,
        Command::Traces {
            command: TracesCommand::List { live: false, limit },
        } => with_deadline(ctx, traces::list(&ctx.client, limit.unwrap_or(0))).await,
        Command::Traces {
            command: TracesCommand::List { live: true, limit },
        } => traces::list_live(ctx, limit).await,
        Command::Traces {
            command: TracesCommand::Get {
                trace_id,
                live: false,
            },
        } => with_deadline(ctx, traces::get(&ctx.client, &trace_id)).await,
        Command::Traces {
            command: TracesCommand::Get {
                trace_id,
                live: true,
            },
        } => traces::get_live(ctx, &trace_id).await,
    }
}

/// Runs `fut` under the command timeout, stopping early on Ctrl-C.
///
/// Dropping the future on either path drops any open response body, which
/// closes its connection.
async fn with_deadline<T, F>(ctx: &Context, fut: F) -> Result<T, CliError>
where
    F: Future<Output = Result<T, CliError>>,
{
    let mut interrupt = ctx.interrupt.signal();
    tokio::select! {
        biased;
        _ = interrupt.aborted() => Err(OpperError::Cancelled.into()),
        result = tokio::time::timeout(ctx.timeout, fut) => match result {
            Ok(result) => result,
            Err(_) => Err(OpperError::Timeout(ctx.timeout.as_secs()).into()),
        },
    }
}

/// Returns `arg` when given, otherwise everything on stdin.
///
/// The read is async so that a surrounding [`with_deadline`] can still give
/// up on Ctrl-C or timeout while stdin stays open.
async fn arg_or_stdin(arg: Option<String>) -> Result<String, CliError> {
    match arg {
        Some(arg) => Ok(arg),
        None => read_all(tokio::io::stdin()).await,
    }
}

async fn read_all<R: AsyncRead + Unpin>(mut reader: R) -> Result<String, CliError> {
    let mut buf = String::new();
    reader.read_to_string(&mut buf).await?;
    Ok(buf.trim_end_matches(['\n', '\r']).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use opper_client::ClientConfig;

    fn ctx(timeout: Duration) -> Context {
        Context {
            client: Client::new(ClientConfig::new("k").base_url("http://127.0.0.1:9"))
                .expect("client"),
            interrupt: AbortHandle::new(),
            timeout,
        }
    }

    #[tokio::test]
    async fn deadline_turns_into_timeout_error() {
        let ctx = ctx(Duration::from_millis(10));
        let result = with_deadline(&ctx, async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(CliError::Api(OpperError::Timeout(_)))));
    }

    #[tokio::test]
    async fn interrupt_cancels_a_running_command() {
        let ctx = ctx(Duration::from_secs(5));
        ctx.interrupt.abort();
        let result: Result<(), CliError> = with_deadline(&ctx, std::future::pending()).await;
        assert!(matches!(result, Err(CliError::Api(OpperError::Cancelled))));
    }

    #[tokio::test]
    async fn explicit_argument_skips_stdin() {
        assert_eq!(arg_or_stdin(Some("given".into())).await.expect("arg"), "given");
    }

    #[tokio::test]
    async fn piped_input_loses_trailing_newlines_only() {
        let text = read_all(&b"  line one\nline two\r\n\n"[..]).await.expect("read");
        assert_eq!(text, "  line one\nline two");
    }

    #[tokio::test]
    async fn open_input_that_never_ends_still_times_out() {
        let ctx = ctx(Duration::from_millis(10));
        let (_writer, reader) = tokio::io::duplex(64);
        let result = with_deadline(&ctx, read_all(reader)).await;
        assert!(matches!(result, Err(CliError::Api(OpperError::Timeout(_)))));
    }

    #[tokio::test]
    async fn interrupt_stops_waiting_on_open_input() {
        let ctx = ctx(Duration::from_secs(5));
        let (_writer, reader) = tokio::io::duplex(64);
        let interrupt = ctx.interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            interrupt.abort();
        });
        let result = with_deadline(&ctx, read_all(reader)).await;
        assert!(matches!(result, Err(CliError::Api(OpperError::Cancelled))));
    }
}
