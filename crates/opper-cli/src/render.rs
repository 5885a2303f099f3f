//! Plain-text rendering of traces and span trees.
//!
//! Every function returns a `String` so commands decide where output goes.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use opper_client::{Span, SpanTree, Trace, TreeLine};

const TABLE_RULE_WIDTH: usize = 125;
const TREE_PREFIX_WIDTH: usize = 12;
const UUID_WIDTH: usize = 48;
const NAME_WIDTH: usize = 40;
const SCORE_WIDTH: usize = 8;
const DURATION_WIDTH: usize = 12;
const TIME_WIDTH: usize = 24;
const INDENT: &str = "    ";

/// ANSI sequence that moves the cursor home and clears the screen.
pub const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";

/// Shortens `s` to at most `max` characters, ending in `...` when cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}

fn percent(score: Option<f64>) -> String {
    score.map(|s| format!("{s:.0}%")).unwrap_or_default()
}

fn timestamp(time: Option<DateTime<Utc>>) -> String {
    time.map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default()
}

fn flatten(text: &str) -> String {
    text.replace('\n', " ")
}

pub fn trace_table_header() -> String {
    format!(
        "{:<36}  {:<20}  {:<10}  {:<8}  {:<17}  {:<20}  {}\n{}\n",
        "UUID",
        "NAME",
        "STATUS",
        "SCORE",
        "DURATION",
        "PROJECT",
        "START TIME",
        "─".repeat(TABLE_RULE_WIDTH)
    )
}

pub fn trace_row(trace: &Trace) -> String {
    format!(
        "{:<36}  {:<20}  {:<10}  {:<8}  {:<15.2}ms  {:<20}  {}\n",
        trace.uuid,
        truncate(&trace.name, 20),
        trace.status,
        percent(trace.average_score()),
        trace.duration_ms.unwrap_or_default(),
        truncate(trace.project_name(), 20),
        timestamp(trace.start_time),
    )
}

/// Table of `traces` (given newest first, as the API returns them) printed
/// oldest first.
pub fn trace_table(traces: &[Trace]) -> String {
    let mut out = trace_table_header();
    for trace in traces.iter().rev() {
        out.push_str(&trace_row(trace));
    }
    out
}

/// Header block for one trace followed by its span tree.
pub fn trace_detail(trace: &Trace) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nTrace: {}", trace.uuid);
    let _ = writeln!(out, "Name: {}", trace.name);
    let _ = writeln!(out, "Status: {}", trace.status);
    let _ = writeln!(out, "Project: {}", trace.project_name());
    let _ = writeln!(out, "Duration: {:.2}ms", trace.duration_ms.unwrap_or_default());
    let _ = writeln!(out, "Start Time: {}", timestamp(trace.start_time));
    let _ = writeln!(out, "End Time: {}", timestamp(trace.end_time));
    if let Some(input) = trace.input.as_deref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "Input: {input}");
    }
    if let Some(output) = trace.output.as_deref() {
        let _ = writeln!(out, "Output: {output}");
    }
    if let Some(score) = trace.average_score() {
        let _ = writeln!(out, "Score: {score:.0}%");
    }
    if !trace.spans.is_empty() {
        out.push_str("\nSpans:\n");
        out.push_str(&span_tree(&SpanTree::build(&trace.spans)));
    }
    out
}

/// Column header plus one block per span, indented four spaces per level.
pub fn span_tree(tree: &SpanTree<'_>) -> String {
    let prefix = " ".repeat(TREE_PREFIX_WIDTH);
    let mut out = format!(
        "{prefix}{:<uw$}  {:<nw$}  {:>sw$}  {:>dw$}  START TIME\n",
        "UUID",
        "NAME",
        "SCORE",
        "DURATION",
        uw = UUID_WIDTH,
        nw = NAME_WIDTH,
        sw = SCORE_WIDTH,
        dw = DURATION_WIDTH,
    );
    let rule = UUID_WIDTH + NAME_WIDTH + SCORE_WIDTH + DURATION_WIDTH + TIME_WIDTH + 8;
    let _ = writeln!(out, "{prefix}{}", "─".repeat(rule));

    for line in tree.walk() {
        match line {
            TreeLine::Separator => out.push('\n'),
            TreeLine::Span { depth, span } => push_span(&mut out, depth, span),
        }
    }
    out
}

fn push_span(out: &mut String, depth: usize, span: &Span) {
    let indent = INDENT.repeat(depth);
    let uuid_width = UUID_WIDTH.saturating_sub(indent.len()).max(8);
    let seconds = span.duration_ms.unwrap_or_default() / 1000.0;
    let _ = writeln!(
        out,
        "{indent}{:<uuid_width$}  {:<nw$}  {:>sw$}  {:>dw$.3}s  {}",
        truncate(&span.uuid, uuid_width),
        truncate(&span.name, NAME_WIDTH),
        percent(span.score),
        seconds,
        timestamp(span.start_time),
        nw = NAME_WIDTH,
        sw = SCORE_WIDTH,
        dw = DURATION_WIDTH - 1,
    );
    if let Some(input) = span.input.as_deref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "{indent}    Input: {}", flatten(input));
    }
    if let Some(output) = span.output.as_deref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "{indent}    Output: {}", flatten(output));
    }
}
