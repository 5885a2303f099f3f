use std::collections::BTreeMap;
use std::io::Write as _;

use opper_client::{CallRequest, CallResponse, Client, TokenStream};

use super::{CliError, arg_or_stdin};

pub struct CallArgs {
    pub name: String,
    pub instructions: String,
    pub input: Option<String>,
    pub model: Option<String>,
    pub tags: Option<String>,
    pub stream: bool,
}

pub async fn run(client: &Client, args: CallArgs) -> Result<(), CliError> {
    let input = arg_or_stdin(args.input).await?;
    let mut request = CallRequest::new(args.name, args.instructions, input)
        .tags(parse_tags(args.tags.as_deref().unwrap_or_default())?)
        .stream(args.stream);
    if let Some(model) = args.model {
        request = request.model(model);
    }

    match client.call(request).await? {
        CallResponse::Complete { message } => println!("{message}"),
        CallResponse::Streaming(tokens) => print_stream(tokens).await?,
    }
    Ok(())
}

/// Prints tokens as they arrive. A stream error after partial output is
/// still returned; the printed text stays.
pub(super) async fn print_stream(mut tokens: TokenStream) -> Result<(), CliError> {
    let mut stdout = std::io::stdout();
    while let Some(token) = tokens.next_token().await {
        print!("{token}");
        let _ = stdout.flush();
    }
    println!();
    let summary = tokens.finish().await?;
    tracing::debug!(request_id = %summary.request_id, tokens = summary.tokens, "stream printed");
    Ok(())
}

/// Parses `key1=value1,key2=value2`.
fn parse_tags(raw: &str) -> Result<BTreeMap<String, String>, CliError> {
    let mut tags = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(CliError::Usage(format!(
                "invalid tag {pair:?}: expected key=value"
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::Usage(format!("invalid tag {pair:?}: empty key")));
        }
        tags.insert(key.to_string(), value.trim().to_string());
    }
    Ok(tags)
}
