use opper_client::{ChatRequest, Client};

use super::call::print_stream;
use super::{CliError, arg_or_stdin};

pub async fn run(client: &Client, name: String, message: Vec<String>) -> Result<(), CliError> {
    let message = if message.is_empty() {
        arg_or_stdin(None).await?
    } else {
        message.join(" ")
    };
    let tokens = client.chat(ChatRequest::new(name, message)).await?;
    print_stream(tokens).await
}
