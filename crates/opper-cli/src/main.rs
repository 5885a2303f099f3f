//! `opper`: call functions, chat, and inspect traces from the terminal.

mod cli;
mod commands;
mod observability;
mod render;
mod settings;

use std::process::ExitCode;

use clap::Parser as _;
use opper_client::{AbortHandle, Client, OpperError};

use crate::cli::Cli;
use crate::commands::{CliError, Context};
use crate::settings::Settings;

fn main() -> ExitCode {
    let dotenv = settings::load_dotenv();
    observability::init_observability();
    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };
    let result = runtime.block_on(run(cli));
    // A stdin read abandoned on Ctrl-C or timeout sits on a blocking thread
    // that a plain drop would wait for.
    runtime.shutdown_background();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let settings = Settings::resolve(&cli)?;
    let client = Client::new(settings.client_config())?;

    let interrupt = AbortHandle::new();
    let on_ctrl_c = interrupt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("interrupt received");
            on_ctrl_c.abort();
        }
    });

    let live = cli.command.is_live();
    let ctx = Context {
        client,
        interrupt,
        timeout: settings.timeout,
    };
    match commands::run(cli.command, &ctx).await {
        // Ctrl-C is the normal way out of a live view.
        Err(CliError::Api(OpperError::Cancelled)) if live => Ok(()),
        other => other,
    }
}
