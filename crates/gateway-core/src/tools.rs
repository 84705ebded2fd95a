//! Tool definitions passed to upstream providers.
//!
//! The gateway never executes tools itself — it only forwards the tool
//! schema the client supplied (or, for Warp, maps a small fixed set of
//! client tool names to Warp's built-in tool identifiers) and relays the
//! resulting `tool_use` blocks back to the client. Actual execution happens
//! client-side, except for the explicit `/w/v1/tools/execute` passthrough
//! endpoint, which forwards to an external, untrusted tool runner.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool definition as supplied by the client and forwarded upstream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    /// Tool name (e.g. `"Bash"`, `"Read"`, `"my_custom_tool"`).
    pub name: String,
    /// Human-readable description shown to the model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// JSON Schema describing the tool's input shape.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}
