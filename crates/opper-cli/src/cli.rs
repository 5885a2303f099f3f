use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "opper")]
#[command(about = "Call functions and inspect traces on the Opper platform", long_about = None)]
#[command(version)]
pub struct Cli {
    /// API base URL (default: OPPER_BASE_URL or https://api.opper.ai).
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Timeout in seconds for non-live commands (default: OPPER_TIMEOUT_SECS or 60).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Call a function. Input is read from stdin when omitted.
    Call {
        name: String,
        instructions: String,
        input: Option<String>,

        #[arg(long)]
        model: Option<String>,

        /// Tags in the form key1=value1,key2=value2.
        #[arg(long)]
        tags: Option<String>,

        /// Wait for the whole reply instead of streaming tokens.
        #[arg(long)]
        no_stream: bool,
    },

    /// Work with functions.
    Functions {
        #[command(subcommand)]
        command: FunctionsCommand,
    },

    /// Inspect traces.
    Traces {
        #[command(subcommand)]
        command: TracesCommand,
    },
}

#[derive(Debug, Subcommand)]
pub enum FunctionsCommand {
    /// Chat with a function. The message is read from stdin when omitted.
    Chat {
        name: String,
        message: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum TracesCommand {
    /// List recent traces.
    List {
        /// Keep polling and print new traces as they arrive.
        #[arg(long)]
        live: bool,

        #[arg(long)]
        limit: Option<usize>,
    },

    /// Show a trace and its span tree.
    Get {
        trace_id: String,

        /// Keep polling and redraw when new spans arrive.
        #[arg(long)]
        live: bool,
    },
}

impl Command {
    /// Live commands run until interrupted and ignore the command timeout.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            Command::Traces {
                command: TracesCommand::List { live: true, .. }
                    | TracesCommand::Get { live: true, .. }
            }
        )
    }
}
