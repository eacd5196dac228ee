use serde_json::json;

use crate::protocol::chunk::OutputChunk;
use crate::stream::session::OpenThinking;
use crate::stream::transcoder::ChunkTransformer;
use crate::util::push_json_string_body_escaped;

/// Pseudo-tool name reasoning blocks are surfaced under.
pub const THINKING_TOOL_NAME: &str = "Thinking";

const THINKING_ENVELOPE_OPEN: &str = "{\"text\":\"";

fn thinking_completed() -> serde_json::Value {
    json!({ "status": "completed" })
}

impl ChunkTransformer {
    pub(super) fn open_thinking(&mut self, out: &mut Vec<OutputChunk>) {
        self.close_text(out);
        self.close_tool(out);
        self.close_thinking(out);

        let id = self.session.next_thinking_id();
        out.push(OutputChunk::ToolInputStart {
            tool_call_id: id.clone(),
            tool_name: THINKING_TOOL_NAME.to_owned(),
        });
        self.session.open_thinking = Some(OpenThinking {
            id,
            text: String::new(),
            envelope_started: false,
        });
    }

    /// Stream reasoning text as slices of a growing `{"text": ...}` document.
    pub(super) fn append_thinking(&mut self, text: &str, out: &mut Vec<OutputChunk>) {
        if self.session.open_thinking.is_none() {
            self.open_thinking(out);
        }
        let Some(thinking) = self.session.open_thinking.as_mut() else {
            return;
        };
        thinking.text.push_str(text);

        let mut fragment = String::with_capacity(THINKING_ENVELOPE_OPEN.len() + text.len());
        if !thinking.envelope_started {
            fragment.push_str(THINKING_ENVELOPE_OPEN);
            thinking.envelope_started = true;
        }
        push_json_string_body_escaped(&mut fragment, text);
        out.push(OutputChunk::ToolInputDelta {
            tool_call_id: thinking.id.clone(),
            input_text_delta: fragment,
        });
    }

    /// Close the streamed reasoning block; it completes synchronously.
    pub(super) fn close_thinking(&mut self, out: &mut Vec<OutputChunk>) {
        let Some(thinking) = self.session.open_thinking.take() else {
            return;
        };
        out.push(OutputChunk::ToolInputAvailable {
            tool_call_id: thinking.id.clone(),
            tool_name: THINKING_TOOL_NAME.to_owned(),
            input: json!({ "text": thinking.text }),
            provider_metadata: None,
        });
        out.push(OutputChunk::ToolOutputAvailable {
            tool_call_id: thinking.id,
            output: thinking_completed(),
        });
        self.session.thinking_streamed_this_turn = true;
    }

    /// Emit reasoning reported only in a complete assistant message.
    pub(super) fn emit_monolithic_thinking(&mut self, text: String, out: &mut Vec<OutputChunk>) {
        if self.session.thinking_streamed_this_turn || self.session.open_thinking.is_some() {
            tracing::debug!("monolithic thinking already streamed this turn, skipping");
            return;
        }
        if text.is_empty() {
            return;
        }
        self.close_text(out);
        self.close_tool(out);

        let id = self.session.next_thinking_id();
        out.push(OutputChunk::ToolInputStart {
            tool_call_id: id.clone(),
            tool_name: THINKING_TOOL_NAME.to_owned(),
        });
        out.push(OutputChunk::ToolInputAvailable {
            tool_call_id: id.clone(),
            tool_name: THINKING_TOOL_NAME.to_owned(),
            input: json!({ "text": text }),
            provider_metadata: None,
        });
        out.push(OutputChunk::ToolOutputAvailable {
            tool_call_id: id,
            output: thinking_completed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::agent::AgentEvent;
    use crate::stream::transcoder::TransformOptions;

    fn started() -> ChunkTransformer {
        let mut transformer = ChunkTransformer::new(TransformOptions::default());
        let _ = transformer.push_event(AgentEvent::Unknown);
        transformer
    }

    fn deltas(chunks: &[OutputChunk]) -> String {
        chunks
            .iter()
            .filter_map(|chunk| match chunk {
                OutputChunk::ToolInputDelta {
                    input_text_delta, ..
                } => Some(input_text_delta.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_envelope_opened_once() {
        let mut transformer = started();
        let mut out = Vec::new();
        transformer.open_thinking(&mut out);
        transformer.append_thinking("Let me \"check\"", &mut out);
        transformer.append_thinking("\nthe file", &mut out);

        let streamed = deltas(&out);
        assert_eq!(streamed, "{\"text\":\"Let me \\\"check\\\"\\nthe file");
        assert_eq!(streamed.matches("{\"text\":").count(), 1);

        // A consumer closing the partial document sees the full text.
        let repaired: serde_json::Value =
            serde_json::from_str(&format!("{streamed}\"}}")).expect("repairable json");
        assert_eq!(repaired["text"], "Let me \"check\"\nthe file");
    }

    #[test]
    fn test_close_emits_available_then_output() {
        let mut transformer = started();
        let mut out = Vec::new();
        transformer.open_thinking(&mut out);
        transformer.append_thinking("plan", &mut out);
        out.clear();

        transformer.close_thinking(&mut out);
        assert_eq!(
            out,
            vec![
                OutputChunk::ToolInputAvailable {
                    tool_call_id: "thinking-0".into(),
                    tool_name: THINKING_TOOL_NAME.into(),
                    input: json!({"text": "plan"}),
                    provider_metadata: None,
                },
                OutputChunk::ToolOutputAvailable {
                    tool_call_id: "thinking-0".into(),
                    output: json!({"status": "completed"}),
                },
            ]
        );
    }

    #[test]
    fn test_monolithic_suppressed_while_open_or_streamed() {
        let mut transformer = started();
        let mut out = Vec::new();
        transformer.open_thinking(&mut out);
        out.clear();

        transformer.emit_monolithic_thinking("plan".into(), &mut out);
        assert!(out.is_empty(), "open block suppresses re-report");

        transformer.close_thinking(&mut out);
        out.clear();
        transformer.emit_monolithic_thinking("plan".into(), &mut out);
        assert!(out.is_empty(), "streamed flag suppresses re-report");

        transformer.session.reset_turn();
        transformer.emit_monolithic_thinking("next turn".into(), &mut out);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].block_id(), Some("thinking-1"));
    }
}
