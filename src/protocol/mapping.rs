use serde::{Deserialize, Serialize};

use super::agent::McpServerDescriptor;
use super::chunk::McpServer;

// ---------------------------------------------------------------------------
// Auxiliary server status
// ---------------------------------------------------------------------------

/// Fixed status vocabulary for auxiliary (MCP) servers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum McpServerStatus {
    Connected,
    Failed,
    #[default]
    Pending,
    NeedsAuth,
}

#[must_use]
pub fn runtime_status_to_mcp(s: &str) -> McpServerStatus {
    match s {
        "connected" => McpServerStatus::Connected,
        "failed" => McpServerStatus::Failed,
        "needs-auth" | "needs_auth" => McpServerStatus::NeedsAuth,
        _ => McpServerStatus::Pending, // fallback
    }
}

#[must_use]
pub fn normalize_mcp_servers(servers: Vec<McpServerDescriptor>) -> Vec<McpServer> {
    servers
        .into_iter()
        .map(|server| McpServer {
            status: runtime_status_to_mcp(&server.status),
            name: server.name,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tool result payloads
// ---------------------------------------------------------------------------

/// Flatten a tool-result `content` value into display text.
///
/// Strings pass through, arrays of `{"type":"text"}` blocks are joined with
/// newlines, anything else is stringified JSON.
#[must_use]
pub fn tool_result_content_to_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Null => String::new(),
        serde_json::Value::Array(blocks) => {
            let mut out = String::new();
            for block in blocks {
                let text = match block {
                    serde_json::Value::String(text) => Some(text.as_str()),
                    serde_json::Value::Object(map) => map.get("text").and_then(|v| v.as_str()),
                    _ => None,
                };
                match text {
                    Some(text) => {
                        if !out.is_empty() {
                            out.push('\n');
                        }
                        out.push_str(text);
                    }
                    None => return content.to_string(),
                }
            }
            out
        }
        other => other.to_string(),
    }
}
