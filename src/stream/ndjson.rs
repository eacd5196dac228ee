//! Newline-delimited JSON framing for the agent runtime's `stream-json` output.
//!
//! Lines may be split across arbitrary byte chunks; partial tails are
//! buffered until their terminating newline (or end of input) arrives.

use bytes::{Bytes, BytesMut};
use futures_util::Stream;
use memchr::memchr;

use crate::error::ChunkifyError;
use crate::protocol::agent::AgentEvent;

/// Decode one line into an [`AgentEvent`], failing on malformed JSON.
///
/// A trailing `\r` is tolerated.
pub fn decode_agent_line_strict(line: &[u8]) -> Result<AgentEvent, ChunkifyError> {
    let line = trim_line(line);
    serde_json::from_slice(line).map_err(|err| ChunkifyError::Decode(err.to_string()))
}

/// Decode one line, skipping blank and malformed lines.
#[must_use]
pub fn decode_agent_line(line: &[u8]) -> Option<AgentEvent> {
    let trimmed = trim_line(line);
    if trimmed.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    match decode_agent_line_strict(trimmed) {
        Ok(event) => Some(event),
        Err(err) => {
            tracing::warn!(
                error = %err,
                line_len = trimmed.len(),
                "skipping malformed agent event line"
            );
            None
        }
    }
}

#[inline]
fn trim_line(line: &[u8]) -> &[u8] {
    match line {
        [rest @ .., b'\r'] => rest,
        _ => line,
    }
}

/// Incremental line splitter over byte chunks.
#[derive(Debug, Default)]
pub struct LineSplitter {
    buffer: BytesMut,
    scan_from: usize,
}

impl LineSplitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Next complete line, without its `\n`.
    pub fn next_line(&mut self) -> Option<Bytes> {
        let rel = memchr(b'\n', &self.buffer[self.scan_from..])?;
        let end = self.scan_from + rel;
        let mut line = self.buffer.split_to(end + 1);
        line.truncate(end);
        self.scan_from = 0;
        Some(line.freeze())
    }

    /// Take whatever unterminated tail is left at end of input.
    pub fn finish(&mut self) -> Option<Bytes> {
        self.scan_from = 0;
        if self.buffer.is_empty() {
            return None;
        }
        Some(self.buffer.split().freeze())
    }

    #[must_use]
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }

    fn mark_scanned(&mut self) {
        self.scan_from = self.buffer.len();
    }
}

/// Turn a byte stream of NDJSON into a stream of [`AgentEvent`]s.
///
/// Malformed lines are skipped. A source error ends the stream after it
/// is yielded.
pub fn agent_event_stream<S, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<AgentEvent, ChunkifyError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ChunkifyError> + Send + 'static,
{
    use futures_util::StreamExt;

    futures_util::stream::unfold(
        (Box::pin(byte_stream), LineSplitter::new(), false),
        |(mut stream, mut splitter, mut done)| async move {
            loop {
                while let Some(line) = splitter.next_line() {
                    if let Some(event) = decode_agent_line(&line) {
                        return Some((Ok(event), (stream, splitter, done)));
                    }
                }
                if done {
                    let tail = splitter.finish()?;
                    if let Some(event) = decode_agent_line(&tail) {
                        return Some((Ok(event), (stream, splitter, done)));
                    }
                    return None;
                }
                splitter.mark_scanned();

                match stream.as_mut().next().await {
                    Some(Ok(bytes)) => splitter.feed(&bytes),
                    Some(Err(err)) => {
                        splitter.finish();
                        return Some((Err(err.into()), (stream, splitter, true)));
                    }
                    None => done = true,
                }
            }
        },
    )
}
