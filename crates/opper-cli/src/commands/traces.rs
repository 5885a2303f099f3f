use std::collections::HashSet;
use std::io::Write as _;

use opper_client::traces::WATCH_LIST_LIMIT;
use opper_client::{Client, WatchConfig, WatchEvent};

use super::{CliError, Context, with_deadline};
use crate::render;

pub async fn list(client: &Client, limit: usize) -> Result<(), CliError> {
    let traces = client.list_traces(limit).await?;
    println!("\n{}", render::trace_table(&traces));
    Ok(())
}

pub async fn get(client: &Client, trace_id: &str) -> Result<(), CliError> {
    let trace = client.get_trace(trace_id).await?;
    print!("{}", render::trace_detail(&trace));
    Ok(())
}

/// Prints the most recent traces, then appends new ones until Ctrl-C.
pub async fn list_live(ctx: &Context, limit: Option<usize>) -> Result<(), CliError> {
    let limit = limit.unwrap_or(WATCH_LIST_LIMIT);
    let traces = with_deadline(ctx, async {
        ctx.client.list_traces(limit).await.map_err(CliError::from)
    })
    .await?;
    print!("\n{}", render::trace_table(&traces));
    flush();

    let seen: HashSet<String> = traces.into_iter().map(|t| t.uuid).collect();
    let mut events = ctx
        .client
        .watch_traces(seen, &ctx.interrupt, live_list_config(limit));
    while let Some(event) = events.next_event().await {
        match event {
            WatchEvent::NewItem(trace) => {
                print!("{}", render::trace_row(&trace));
                flush();
            }
            WatchEvent::FetchError(err) => eprintln!("error: {err}"),
            WatchEvent::Updated(_) => {}
        }
    }
    Ok(())
}

/// Shows a trace and redraws it whenever new spans appear, until Ctrl-C.
pub async fn get_live(ctx: &Context, trace_id: &str) -> Result<(), CliError> {
    let trace = with_deadline(ctx, async {
        ctx.client.get_trace(trace_id).await.map_err(CliError::from)
    })
    .await?;
    redraw(&render::trace_detail(&trace));

    let mut events = ctx.client.watch_trace(
        trace_id,
        trace.spans.len(),
        &ctx.interrupt,
        WatchConfig::default(),
    );
    while let Some(event) = events.next_event().await {
        match event {
            WatchEvent::Updated(trace) => redraw(&render::trace_detail(&trace)),
            WatchEvent::FetchError(err) => eprintln!("error: {err}"),
            WatchEvent::NewItem(_) => {}
        }
    }
    Ok(())
}

/// Polls in batches of the size the table was filled with; a larger batch
/// would report older, never-shown traces as arrivals.
fn live_list_config(limit: usize) -> WatchConfig {
    WatchConfig {
        list_limit: limit,
        ..WatchConfig::default()
    }
}

fn redraw(text: &str) {
    print!("{}{text}", render::CLEAR_SCREEN);
    flush();
}

fn flush() {
    let _ = std::io::stdout().flush();
}
