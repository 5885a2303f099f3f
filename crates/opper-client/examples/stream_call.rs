use std::io::Write as _;

use opper_client::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), OpperError> {
    let client = Client::from_env()?;

    let request = CallRequest::new(
        "demo/haiku",
        "Write a haiku about the given topic.",
        "autumn rain",
    )
    .tag("source", "example")
    .stream(true);

    let CallResponse::Streaming(mut tokens) = client.call(request).await? else {
        return Ok(());
    };
    let mut stdout = std::io::stdout();
    while let Some(token) = tokens.next_token().await {
        print!("{token}");
        let _ = stdout.flush();
    }
    let summary = tokens.finish().await?;
    println!();
    eprintln!("received {} tokens", summary.tokens);
    Ok(())
}
