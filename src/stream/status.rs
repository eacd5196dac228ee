use serde_json::json;

use crate::protocol::agent::{CompactMetadata, SessionInit};
use crate::protocol::chunk::{OutputChunk, SessionInitPayload};
use crate::protocol::mapping::normalize_mcp_servers;
use crate::stream::transcoder::ChunkTransformer;

/// Pseudo-tool name compaction cycles are surfaced under.
pub const COMPACTION_TOOL_NAME: &str = "Compact";

impl ChunkTransformer {
    pub(super) fn session_init(&mut self, init: SessionInit, out: &mut Vec<OutputChunk>) {
        if init.session_id.is_some() {
            self.session.session_id.clone_from(&init.session_id);
        }
        out.push(OutputChunk::SessionInit(SessionInitPayload {
            session_id: init.session_id,
            model: init.model,
            mcp_servers: normalize_mcp_servers(init.mcp_servers),
            tools: init.tools,
            plugins: init.plugins,
            skills: init.skills,
        }));
    }

    /// Open the compaction pseudo-tool and remember it until its boundary.
    pub(super) fn compaction_start(&mut self, out: &mut Vec<OutputChunk>) {
        if let Some(pending) = self.session.pending_compaction_id.as_deref() {
            tracing::debug!(tool_call_id = %pending, "compaction already in progress");
            return;
        }
        let id = self.open_compaction(out);
        self.session.pending_compaction_id = Some(id);
    }

    /// Complete the pending compaction, synthesizing its start when missing.
    pub(super) fn compaction_boundary(
        &mut self,
        metadata: Option<CompactMetadata>,
        out: &mut Vec<OutputChunk>,
    ) {
        let id = match self.session.pending_compaction_id.take() {
            Some(id) => id,
            None => {
                tracing::warn!(
                    "compaction boundary without compacting status, synthesizing start"
                );
                self.open_compaction(out)
            }
        };

        let mut output = json!({ "status": "completed" });
        if let Some(metadata) = metadata {
            if let Some(trigger) = metadata.trigger {
                output["trigger"] = json!(trigger);
            }
            if let Some(pre_tokens) = metadata.pre_tokens {
                output["preTokens"] = json!(pre_tokens);
            }
        }
        out.push(OutputChunk::ToolOutputAvailable {
            tool_call_id: id,
            output,
        });
    }

    /// Settle a compaction whose boundary never arrived before the stream ended.
    pub(super) fn close_pending_compaction(&mut self, out: &mut Vec<OutputChunk>) {
        let Some(id) = self.session.pending_compaction_id.take() else {
            return;
        };
        tracing::debug!(tool_call_id = %id, "stream ended during compaction");
        out.push(OutputChunk::ToolOutputAvailable {
            tool_call_id: id,
            output: json!({ "status": "interrupted" }),
        });
    }

    fn open_compaction(&mut self, out: &mut Vec<OutputChunk>) -> String {
        self.close_open_blocks(out);

        let id = self.session.next_compaction_id();
        out.push(OutputChunk::ToolInputStart {
            tool_call_id: id.clone(),
            tool_name: COMPACTION_TOOL_NAME.to_owned(),
        });
        out.push(OutputChunk::ToolInputAvailable {
            tool_call_id: id.clone(),
            tool_name: COMPACTION_TOOL_NAME.to_owned(),
            input: json!({ "status": "compacting" }),
            provider_metadata: None,
        });
        self.session.emitted_tool_ids.insert(id.clone());
        id
    }
}
