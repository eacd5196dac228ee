use bytes::Bytes;
use chunkify::config::{CancelPolicy, OutputFormat, RuntimeProvider};
use chunkify::error::ChunkifyError;
use chunkify::protocol::chunk::OutputChunk;
use chunkify::stream::{agent_event_stream, chunk_stream, encoded_chunk_stream};
use chunkify::stream::{ChunkTransformer, TransformOptions};
use futures_util::StreamExt;
use std::convert::Infallible;

const SESSION: &str = concat!(
    "{\"type\":\"system\",\"subtype\":\"init\",\"session_id\":\"sess-7\",\"model\":\"claude-x\",\"mcp_servers\":[{\"name\":\"github\",\"status\":\"failed\"}]}\n",
    "{\"type\":\"stream_event\",\"event\":{\"type\":\"message_start\",\"message\":{}}}\n",
    "{\"type\":\"stream_event\",\"event\":{\"type\":\"content_block_start\",\"index\":0,\"content_block\":{\"type\":\"text\",\"text\":\"\"}}}\n",
    "{\"type\":\"stream_event\",\"event\":{\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"Hi\"}}}\n",
    "{\"type\":\"stream_event\",\"event\":{\"type\":\"content_block_stop\",\"index\":0}}\n",
    "{\"type\":\"result\",\"subtype\":\"success\",\"usage\":{\"input_tokens\":3,\"output_tokens\":1}}\n",
);

fn split_source(input: &'static str, chunk_len: usize) -> Vec<Result<Bytes, Infallible>> {
    input
        .as_bytes()
        .chunks(chunk_len)
        .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
        .collect()
}

fn options(cancel_policy: CancelPolicy) -> TransformOptions {
    TransformOptions {
        provider: RuntimeProvider::Vertex,
        cancel_policy,
    }
}

async fn collect_chunks(
    input: &'static str,
    chunk_len: usize,
    policy: CancelPolicy,
) -> Vec<OutputChunk> {
    let events = agent_event_stream(futures_util::stream::iter(split_source(input, chunk_len)));
    chunk_stream(events, ChunkTransformer::new(options(policy)))
        .map(|chunk| chunk.expect("chunk"))
        .collect()
        .await
}

#[tokio::test]
async fn test_chunking_of_input_does_not_change_output() {
    let whole = collect_chunks(SESSION, SESSION.len(), CancelPolicy::LeaveOpen).await;
    let tiny = collect_chunks(SESSION, 7, CancelPolicy::LeaveOpen).await;

    let kinds: Vec<_> = whole.iter().map(OutputChunk::kind).collect();
    assert_eq!(
        kinds,
        vec![
            "start",
            "start-step",
            "session-init",
            "text-start",
            "text-delta",
            "text-end",
            "message-metadata",
            "finish-step",
            "finish"
        ]
    );
    assert_eq!(whole.len(), tiny.len());
    for (a, b) in whole.iter().zip(&tiny) {
        assert_eq!(a.kind(), b.kind());
        assert_eq!(a.block_id(), b.block_id());
    }
}

#[tokio::test]
async fn test_metadata_carries_provider_label() {
    let chunks = collect_chunks(SESSION, 64, CancelPolicy::LeaveOpen).await;
    match chunks.last() {
        Some(OutputChunk::Finish { message_metadata }) => {
            assert_eq!(message_metadata.provider, "vertex");
            assert_eq!(message_metadata.session_id.as_deref(), Some("sess-7"));
            assert_eq!(message_metadata.total_tokens, Some(4));
        }
        other => panic!("Expected Finish, got {other:?}"),
    }
}

#[tokio::test]
async fn test_truncated_session_flushes_under_flush_policy() {
    let truncated = concat!(
        "{\"type\":\"stream_event\",\"event\":{\"type\":\"content_block_delta\",\"index\":0,\"delta\":{\"type\":\"text_delta\",\"text\":\"partial\"}}}\n",
        "{\"type\":\"stream_event\",\"event\":{\"type\":\"content_bl",
    );
    let chunks = collect_chunks(truncated, 16, CancelPolicy::Flush).await;
    let kinds: Vec<_> = chunks.iter().map(OutputChunk::kind).collect();
    assert_eq!(
        kinds,
        vec!["start", "start-step", "text-start", "text-delta", "text-end", "abort"]
    );
}

#[tokio::test]
async fn test_sse_encoding_end_to_end() {
    let events = agent_event_stream(futures_util::stream::iter(split_source(SESSION, 32)));
    let chunks = chunk_stream(events, ChunkTransformer::new(options(CancelPolicy::LeaveOpen)));
    let frames: Vec<Result<Bytes, ChunkifyError>> =
        encoded_chunk_stream(chunks, OutputFormat::Sse, true).collect().await;

    assert_eq!(frames.len(), 10);
    let frames: Vec<String> = frames
        .into_iter()
        .map(|frame| String::from_utf8(frame.expect("frame").to_vec()).expect("utf8"))
        .collect();
    assert!(frames.iter().all(|frame| frame.starts_with("data: ") && frame.ends_with("\n\n")));
    assert!(frames[2].contains("\"mcpServers\":[{\"name\":\"github\",\"status\":\"failed\"}]"));
    assert_eq!(frames[9], "data: [DONE]\n\n");
}
