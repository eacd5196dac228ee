//! Wire encoding of [`OutputChunk`]s as SSE frames or NDJSON lines.
use bytes::Bytes;
use futures_util::Stream;

use crate::config::OutputFormat;
use crate::error::ChunkifyError;
use crate::protocol::chunk::OutputChunk;

const DONE_FRAME: &str = "data: [DONE]\n\n";
const DONE_LINE: &str = "[DONE]\n";

/// Format a data-only SSE frame.
#[must_use]
pub fn sse_frame(json: &str) -> String {
    let mut out = String::with_capacity(8 + json.len());
    out.push_str("data: ");
    out.push_str(json);
    out.push_str("\n\n");
    out
}

/// Encode a chunk as one SSE frame.
pub fn encode_sse_chunk(chunk: &OutputChunk) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(chunk)?;
    Ok(sse_frame(&json))
}

/// Encode a chunk as one NDJSON line.
pub fn encode_ndjson_chunk(chunk: &OutputChunk) -> Result<String, serde_json::Error> {
    let mut out = serde_json::to_string(chunk)?;
    out.push('\n');
    Ok(out)
}

/// Encode a chunk in the given output format.
pub fn encode_chunk(
    format: OutputFormat,
    chunk: &OutputChunk,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Sse => encode_sse_chunk(chunk),
        OutputFormat::Ndjson => encode_ndjson_chunk(chunk),
    }
}

/// The end-of-stream marker in the given output format.
#[must_use]
pub fn done_marker(format: OutputFormat) -> &'static str {
    match format {
        OutputFormat::Sse => DONE_FRAME,
        OutputFormat::Ndjson => DONE_LINE,
    }
}

/// Encode a chunk stream into wire bytes, appending the `[DONE]` marker
/// when requested and the source ended cleanly.
pub fn encoded_chunk_stream<S>(
    chunks: S,
    format: OutputFormat,
    emit_done_marker: bool,
) -> impl Stream<Item = Result<Bytes, ChunkifyError>> + Send
where
    S: Stream<Item = Result<OutputChunk, ChunkifyError>> + Send + 'static,
{
    use futures_util::StreamExt;

    futures_util::stream::unfold(
        (Box::pin(chunks), false),
        move |(mut stream, mut done)| async move {
            if done {
                return None;
            }
            match stream.as_mut().next().await {
                Some(Ok(chunk)) => {
                    let encoded = encode_chunk(format, &chunk)
                        .map(Bytes::from)
                        .map_err(ChunkifyError::from);
                    Some((encoded, (stream, done)))
                }
                Some(Err(err)) => {
                    done = true;
                    Some((Err(err), (stream, done)))
                }
                None => {
                    done = true;
                    if emit_done_marker {
                        let marker = Bytes::from_static(done_marker(format).as_bytes());
                        Some((Ok(marker), (stream, done)))
                    } else {
                        None
                    }
                }
            }
        },
    )
}
