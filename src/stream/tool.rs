use serde_json::json;

use crate::protocol::agent::classify::ToolResult;
use crate::protocol::agent::MessageBlock;
use crate::protocol::chunk::OutputChunk;
use crate::protocol::mapping::tool_result_content_to_text;
use crate::stream::session::OpenTool;
use crate::stream::transcoder::ChunkTransformer;
use crate::util::unix_now_millis;

/// Key under which chunkify stamps tool chunks in `providerMetadata`.
pub const PROVIDER_METADATA_KEY: &str = "chunkify";

/// Resolve accumulated tool input text into a structured value.
///
/// Text that does not parse (typically a stream aborted mid-argument)
/// resolves to `{"raw": <text>, "parseError": true}`; an empty buffer is a
/// call without arguments and resolves to `{}`.
#[must_use]
pub fn resolve_tool_input(raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::debug!(
                error = %err,
                raw_len = raw.len(),
                "tool input did not parse, using raw fallback"
            );
            json!({ "raw": raw, "parseError": true })
        }
    }
}

fn resolution_stamp() -> serde_json::Value {
    json!({ PROVIDER_METADATA_KEY: { "resolvedAt": unix_now_millis() } })
}

impl ChunkTransformer {
    /// Open a streamed tool invocation under its composite identity.
    pub(super) fn open_tool(
        &mut self,
        original_id: String,
        name: String,
        out: &mut Vec<OutputChunk>,
    ) {
        self.close_text(out);
        self.close_tool(out);
        self.close_thinking(out);

        let composite_id = self.session.composite_tool_id(&original_id);
        let duplicate = self.session.emitted_tool_ids.contains(&composite_id);
        if duplicate {
            tracing::debug!(
                tool_call_id = %composite_id,
                "tool re-opened after finalization, suppressing"
            );
        } else {
            out.push(OutputChunk::ToolInputStart {
                tool_call_id: composite_id.clone(),
                tool_name: name.clone(),
            });
        }
        self.session
            .identity_map
            .insert(original_id, composite_id.clone());
        self.session.open_tool = Some(OpenTool {
            composite_id,
            name,
            input_buffer: String::new(),
            duplicate,
        });
    }

    pub(super) fn append_tool_input(&mut self, fragment: String, out: &mut Vec<OutputChunk>) {
        let Some(tool) = self.session.open_tool.as_mut() else {
            tracing::debug!("tool input fragment without an open tool, ignoring");
            return;
        };
        tool.input_buffer.push_str(&fragment);
        if !tool.duplicate {
            out.push(OutputChunk::ToolInputDelta {
                tool_call_id: tool.composite_id.clone(),
                input_text_delta: fragment,
            });
        }
    }

    /// Finalize the open tool invocation, at most once per identity.
    pub(super) fn close_tool(&mut self, out: &mut Vec<OutputChunk>) {
        let Some(tool) = self.session.open_tool.take() else {
            return;
        };
        if self.session.emitted_tool_ids.contains(&tool.composite_id) {
            tracing::debug!(
                tool_call_id = %tool.composite_id,
                "tool already finalized, skipping"
            );
            return;
        }
        let input = resolve_tool_input(&tool.input_buffer);
        self.session
            .emitted_tool_ids
            .insert(tool.composite_id.clone());
        out.push(OutputChunk::ToolInputAvailable {
            tool_call_id: tool.composite_id,
            tool_name: tool.name,
            input,
            provider_metadata: Some(resolution_stamp()),
        });
    }

    /// Emit a tool call known only from a complete assistant message.
    pub(super) fn emit_monolithic_tool(
        &mut self,
        original_id: String,
        name: String,
        input: serde_json::Value,
        out: &mut Vec<OutputChunk>,
    ) {
        if self.session.tool_already_emitted(&original_id) {
            tracing::debug!(
                tool_use_id = %original_id,
                "monolithic tool re-report, skipping"
            );
            return;
        }
        self.close_text(out);
        self.close_thinking(out);

        let composite_id = self.session.composite_tool_id(&original_id);
        self.session
            .identity_map
            .insert(original_id, composite_id.clone());
        self.session.emitted_tool_ids.insert(composite_id.clone());
        out.push(OutputChunk::ToolInputAvailable {
            tool_call_id: composite_id,
            tool_name: name,
            input: if input.is_null() { json!({}) } else { input },
            provider_metadata: Some(resolution_stamp()),
        });
    }

    /// Match a tool result back to the composite identity it was opened under.
    pub(super) fn emit_tool_result(&mut self, result: ToolResult, out: &mut Vec<OutputChunk>) {
        let tool_call_id = match self.session.identity_map.get(&result.tool_use_id) {
            Some(composite) => composite.clone(),
            None => {
                tracing::warn!(
                    tool_use_id = %result.tool_use_id,
                    "tool result for unknown tool id, using raw id"
                );
                result.tool_use_id
            }
        };
        if result.is_error {
            out.push(OutputChunk::ToolOutputError {
                tool_call_id,
                error_text: tool_result_content_to_text(&result.content),
            });
        } else {
            out.push(OutputChunk::ToolOutputAvailable {
                tool_call_id,
                output: result.content,
            });
        }
    }

    /// Handle a complete assistant turn; it also ends any streaming tool.
    pub(super) fn handle_assistant_message(
        &mut self,
        blocks: Vec<MessageBlock>,
        out: &mut Vec<OutputChunk>,
    ) {
        self.close_tool(out);
        for block in blocks {
            match block {
                MessageBlock::Text { text } => {
                    // A started block carries this text through its deltas.
                    if self.session.text_streamed_this_turn || self.session.open_text.is_some() {
                        continue;
                    }
                    self.emit_monolithic_text(text, out);
                }
                MessageBlock::ToolUse { id, name, input } => {
                    self.emit_monolithic_tool(id, name, input, out);
                }
                MessageBlock::Thinking { thinking } => {
                    self.emit_monolithic_thinking(thinking, out);
                }
                MessageBlock::Unknown => {}
            }
        }
    }
}
