use serde::{Deserialize, Serialize};

use crate::protocol::mapping::McpServerStatus;

/// One UI chunk produced by the transformer.
///
/// Emission order is part of the contract with the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutputChunk {
    #[serde(rename = "start", rename_all = "camelCase")]
    Start { message_id: String },
    #[serde(rename = "start-step")]
    StartStep,
    #[serde(rename = "text-start")]
    TextStart { id: String },
    #[serde(rename = "text-delta")]
    TextDelta { id: String, delta: String },
    #[serde(rename = "text-end")]
    TextEnd { id: String },
    #[serde(rename = "tool-input-start", rename_all = "camelCase")]
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
    },
    #[serde(rename = "tool-input-delta", rename_all = "camelCase")]
    ToolInputDelta {
        tool_call_id: String,
        input_text_delta: String,
    },
    #[serde(rename = "tool-input-available", rename_all = "camelCase")]
    ToolInputAvailable {
        tool_call_id: String,
        tool_name: String,
        input: serde_json::Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_metadata: Option<serde_json::Value>,
    },
    #[serde(rename = "tool-output-available", rename_all = "camelCase")]
    ToolOutputAvailable {
        tool_call_id: String,
        output: serde_json::Value,
    },
    #[serde(rename = "tool-output-error", rename_all = "camelCase")]
    ToolOutputError {
        tool_call_id: String,
        error_text: String,
    },
    #[serde(rename = "session-init")]
    SessionInit(SessionInitPayload),
    #[serde(rename = "message-metadata", rename_all = "camelCase")]
    MessageMetadata { message_metadata: MessageMetadata },
    #[serde(rename = "finish-step", rename_all = "camelCase")]
    FinishStep { message_metadata: MessageMetadata },
    #[serde(rename = "finish", rename_all = "camelCase")]
    Finish { message_metadata: MessageMetadata },
    #[serde(rename = "abort", rename_all = "camelCase")]
    Abort { message_metadata: MessageMetadata },
}

impl OutputChunk {
    /// The wire `type` tag of this chunk.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            OutputChunk::Start { .. } => "start",
            OutputChunk::StartStep => "start-step",
            OutputChunk::TextStart { .. } => "text-start",
            OutputChunk::TextDelta { .. } => "text-delta",
            OutputChunk::TextEnd { .. } => "text-end",
            OutputChunk::ToolInputStart { .. } => "tool-input-start",
            OutputChunk::ToolInputDelta { .. } => "tool-input-delta",
            OutputChunk::ToolInputAvailable { .. } => "tool-input-available",
            OutputChunk::ToolOutputAvailable { .. } => "tool-output-available",
            OutputChunk::ToolOutputError { .. } => "tool-output-error",
            OutputChunk::SessionInit(_) => "session-init",
            OutputChunk::MessageMetadata { .. } => "message-metadata",
            OutputChunk::FinishStep { .. } => "finish-step",
            OutputChunk::Finish { .. } => "finish",
            OutputChunk::Abort { .. } => "abort",
        }
    }

    /// Tool call id for tool chunks, block id for text chunks.
    #[must_use]
    pub fn block_id(&self) -> Option<&str> {
        match self {
            OutputChunk::TextStart { id }
            | OutputChunk::TextDelta { id, .. }
            | OutputChunk::TextEnd { id } => Some(id),
            OutputChunk::ToolInputStart { tool_call_id, .. }
            | OutputChunk::ToolInputDelta { tool_call_id, .. }
            | OutputChunk::ToolInputAvailable { tool_call_id, .. }
            | OutputChunk::ToolOutputAvailable { tool_call_id, .. }
            | OutputChunk::ToolOutputError { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }
}

/// Normalized session initialization announcement.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInitPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub mcp_servers: Vec<McpServer>,
    pub tools: Vec<String>,
    pub plugins: Vec<serde_json::Value>,
    pub skills: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServer {
    pub name: String,
    pub status: McpServerStatus,
}

/// Accounting attached to the terminal chunks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageMetadata {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_read_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_creation_input_tokens: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_cost_usd: Option<f64>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_turns: Option<u64>,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_text_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_usage: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub aborted: bool,
}
