use std::time::Instant;

use crate::config::{CancelPolicy, RuntimeProvider, TransformConfig};
use crate::protocol::agent::classify::{classify, EventKind};
use crate::protocol::agent::AgentEvent;
use crate::protocol::chunk::{MessageMetadata, OutputChunk};
use crate::stream::session::{BlockKind, SessionState};
use crate::util::duration_millis;

/// Construction-time options for a [`ChunkTransformer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformOptions {
    pub provider: RuntimeProvider,
    pub cancel_policy: CancelPolicy,
}

impl From<&TransformConfig> for TransformOptions {
    fn from(config: &TransformConfig) -> Self {
        Self {
            provider: config.provider,
            cancel_policy: config.cancel_policy,
        }
    }
}

/// Converts agent runtime events into the UI chunk stream.
///
/// One transformer owns the [`SessionState`] of exactly one conversation
/// stream. Each call to [`ChunkTransformer::push_event_into`] consumes one
/// event and appends zero or more chunks in their final order:
/// 1. Lifecycle `start`/`start-step` on the very first event.
/// 2. Closing of blocks the event supersedes (text, then tool, then thinking).
/// 3. Chunks for the event itself.
pub struct ChunkTransformer {
    pub(super) session: SessionState,
    pub(super) options: TransformOptions,
    message_id: String,
}

impl ChunkTransformer {
    #[must_use]
    pub fn new(options: TransformOptions) -> Self {
        Self::with_message_id(options, uuid::Uuid::new_v4().to_string())
    }

    /// Create a transformer whose `start` chunk carries a fixed message id.
    #[must_use]
    pub fn with_message_id(options: TransformOptions, message_id: String) -> Self {
        Self {
            session: SessionState::new(),
            options,
            message_id,
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    #[must_use]
    pub fn options(&self) -> TransformOptions {
        self.options
    }

    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.session.finished
    }

    /// Process one event and return the chunks it produced.
    pub fn push_event(&mut self, event: AgentEvent) -> Vec<OutputChunk> {
        let mut out = Vec::with_capacity(4);
        self.push_event_into(event, &mut out);
        out
    }

    /// Process one event, appending its chunks to `out`.
    pub fn push_event_into(&mut self, event: AgentEvent, out: &mut Vec<OutputChunk>) {
        if self.session.finished {
            tracing::debug!("ignoring agent event after stream finished");
            return;
        }
        self.ensure_started(out);

        let classified = classify(event);
        self.session.apply_scope(classified.scope);

        match classified.kind {
            EventKind::TurnStart => self.start_turn(out),
            EventKind::TextStart { index, text } => {
                self.session.record_block(index, BlockKind::Text);
                self.open_text(out);
                if !text.is_empty() {
                    self.append_text(text, out);
                }
            }
            EventKind::TextDelta { text, .. } => self.append_text(text, out),
            EventKind::ToolStart { index, id, name } => {
                self.session.record_block(index, BlockKind::ToolUse);
                self.open_tool(id, name, out);
            }
            EventKind::ToolInputDelta { fragment, .. } => {
                self.append_tool_input(fragment, out);
            }
            EventKind::ThinkingStart { index, text } => {
                self.session.record_block(index, BlockKind::Thinking);
                self.open_thinking(out);
                if !text.is_empty() {
                    self.append_thinking(&text, out);
                }
            }
            EventKind::ThinkingDelta { text, .. } => self.append_thinking(&text, out),
            EventKind::BlockStop { index } => self.stop_block(index, out),
            EventKind::AssistantMessage(blocks) => self.handle_assistant_message(blocks, out),
            EventKind::ToolResults(results) => {
                self.close_tool(out);
                for result in results {
                    self.emit_tool_result(result, out);
                }
            }
            EventKind::SessionInit(init) => self.session_init(init, out),
            EventKind::Compacting => self.compaction_start(out),
            EventKind::CompactBoundary(metadata) => self.compaction_boundary(metadata, out),
            EventKind::Result(result) => self.finalize(&result, out),
            EventKind::Ignored => {}
        }
    }

    /// Close every open block and emit an `abort` chunk.
    ///
    /// Used when the event source ends before its terminal result. Does
    /// nothing on a session that never started or already finished.
    pub fn abort_into(&mut self, out: &mut Vec<OutputChunk>) {
        if !self.session.started || self.session.finished {
            return;
        }
        self.close_open_blocks(out);
        self.close_pending_compaction(out);
        let mut metadata = self.base_metadata();
        metadata.aborted = true;
        tracing::debug!(
            duration_ms = metadata.duration_ms,
            "agent stream aborted before result"
        );
        out.push(OutputChunk::Abort {
            message_metadata: metadata,
        });
        self.session.finished = true;
    }

    fn ensure_started(&mut self, out: &mut Vec<OutputChunk>) {
        if self.session.started {
            return;
        }
        self.session.started = true;
        self.session.stream_started_at = Some(Instant::now());
        out.push(OutputChunk::Start {
            message_id: self.message_id.clone(),
        });
        out.push(OutputChunk::StartStep);
    }

    fn start_turn(&mut self, out: &mut Vec<OutputChunk>) {
        // A block still open at a new turn lost its stop marker.
        self.close_open_blocks(out);
        self.session.reset_turn();
    }

    fn stop_block(&mut self, index: usize, out: &mut Vec<OutputChunk>) {
        match self.session.take_block(index) {
            Some(BlockKind::Text) => self.close_text(out),
            Some(BlockKind::ToolUse) => self.close_tool(out),
            Some(BlockKind::Thinking) => self.close_thinking(out),
            None => self.close_open_blocks(out),
        }
    }

    /// Close text, then tool, then thinking.
    pub(super) fn close_open_blocks(&mut self, out: &mut Vec<OutputChunk>) {
        self.close_text(out);
        self.close_tool(out);
        self.close_thinking(out);
    }

    /// Metadata fields known without a result event.
    pub(super) fn base_metadata(&self) -> MessageMetadata {
        MessageMetadata {
            provider: self.options.provider.as_str().to_owned(),
            session_id: self.session.session_id.clone(),
            duration_ms: self
                .session
                .stream_started_at
                .map_or(0, |started| duration_millis(started.elapsed())),
            last_text_id: self.session.last_closed_text_id.clone(),
            ..MessageMetadata::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: serde_json::Value) -> AgentEvent {
        serde_json::from_value(value).expect("agent event")
    }

    fn kinds(chunks: &[OutputChunk]) -> Vec<&'static str> {
        chunks.iter().map(OutputChunk::kind).collect()
    }

    #[test]
    fn test_first_event_emits_lifecycle_once() {
        let mut transformer =
            ChunkTransformer::with_message_id(TransformOptions::default(), "msg-1".into());
        let first = transformer.push_event(event(json!({"type": "keep_alive"})));
        assert_eq!(
            first,
            vec![
                OutputChunk::Start {
                    message_id: "msg-1".into()
                },
                OutputChunk::StartStep
            ]
        );
        assert!(transformer.session().is_started());

        let second = transformer.push_event(event(json!({"type": "stream_event"})));
        assert!(second.is_empty());
    }

    #[test]
    fn test_stop_for_unknown_index_closes_open_block() {
        let mut transformer = ChunkTransformer::new(TransformOptions::default());
        transformer.push_event(event(json!({
            "type":"stream_event",
            "event":{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}
        })));
        let chunks = transformer.push_event(event(json!({
            "type":"stream_event",
            "event":{"type":"content_block_stop","index":7}
        })));
        assert_eq!(kinds(&chunks), vec!["text-end"]);
        assert_eq!(transformer.session().last_closed_text_id(), Some("text-0"));
    }

    #[test]
    fn test_abort_before_start_is_noop() {
        let mut transformer = ChunkTransformer::new(TransformOptions::default());
        let mut out = Vec::new();
        transformer.abort_into(&mut out);
        assert!(out.is_empty());
        assert!(!transformer.is_finished());
    }

    #[test]
    fn test_abort_flushes_open_blocks() {
        let mut transformer = ChunkTransformer::new(TransformOptions::default());
        transformer.push_event(event(json!({
            "type":"stream_event",
            "event":{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"toolu_1","name":"Bash"}}
        })));
        transformer.push_event(event(json!({
            "type":"stream_event",
            "event":{"type":"content_block_delta","index":0,"delta":{"type":"input_json_delta","partial_json":"{\"command\":\"ls"}}
        })));

        let mut out = Vec::new();
        transformer.abort_into(&mut out);
        assert_eq!(kinds(&out), vec!["tool-input-available", "abort"]);
        match &out[0] {
            OutputChunk::ToolInputAvailable { input, .. } => {
                assert_eq!(input["parseError"], true);
                assert_eq!(input["raw"], "{\"command\":\"ls");
            }
            other => panic!("Expected ToolInputAvailable, got {other:?}"),
        }
        match &out[1] {
            OutputChunk::Abort { message_metadata } => assert!(message_metadata.aborted),
            other => panic!("Expected Abort, got {other:?}"),
        }
        assert!(transformer.is_finished());

        let mut after = Vec::new();
        transformer.abort_into(&mut after);
        assert!(after.is_empty());
    }
    #[test]
    fn test_huge_block_index_stop_closes_open_block() {
        let huge = 4_611_686_018_427_387_904_u64;
        let mut transformer = ChunkTransformer::new(TransformOptions::default());
        let opened = transformer.push_event(event(json!({
            "type":"stream_event",
            "event":{"type":"content_block_start","index":huge,"content_block":{"type":"text","text":""}}
        })));
        assert_eq!(kinds(&opened), vec!["start", "start-step", "text-start"]);

        transformer.push_event(event(json!({
            "type":"stream_event",
            "event":{"type":"content_block_delta","index":huge,"delta":{"type":"text_delta","text":"ok"}}
        })));
        let stopped = transformer.push_event(event(json!({
            "type":"stream_event",
            "event":{"type":"content_block_stop","index":huge}
        })));
        assert_eq!(kinds(&stopped), vec!["text-end"]);
        assert!(transformer.session().open_text_id().is_none());
    }

    #[test]
    fn test_abort_settles_pending_compaction() {
        let mut transformer = ChunkTransformer::new(TransformOptions::default());
        transformer.push_event(event(json!({
            "type":"system","subtype":"status","status":"compacting"
        })));

        let mut out = Vec::new();
        transformer.abort_into(&mut out);
        assert_eq!(kinds(&out), vec!["tool-output-available", "abort"]);
        assert_eq!(out[0].block_id(), Some("compact-0"));
    }
}
