//! Line-oriented decoding of `text/event-stream` bodies.
//!
//! The API frames each event as one line, either `data: {json}` or bare
//! `{json}`. Every JSON object carries the text fragment under `delta`
//! (older chat endpoints use `content`). Anything else on the wire,
//! including keep-alive comments and `[DONE]` markers, is dropped.

use tracing::trace;

/// Splits arbitrary byte chunks into complete `\n`-terminated lines.
#[derive(Default)]
pub(crate) struct LineDecoder {
    buf: Vec<u8>,
}

impl LineDecoder {
    /// Appends a chunk and returns every line it completed, without the
    /// trailing `\n` / `\r\n`.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(idx) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=idx).collect();
            lines.push(decode_line(&line[..idx]));
        }
        lines
    }

    /// Returns the unterminated remainder once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buf);
        Some(decode_line(&rest))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// Extracts the text delta from one line, or `None` if the line carries no
/// usable token.
pub fn parse_delta(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let payload = match line.strip_prefix("data:") {
        Some(rest) => rest.trim_start(),
        None => line,
    };
    let value: serde_json::Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            trace!(error = %err, len = payload.len(), "dropping undecodable stream line");
            return None;
        }
    };
    let text = ["delta", "content"]
        .iter()
        .find_map(|key| value.get(key).and_then(|v| v.as_str()))?;
    if text.is_empty() {
        return None;
    }
    Some(text.to_string())
}
