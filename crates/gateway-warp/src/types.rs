//! Generated Protobuf types for the Warp `multi_agent` wire protocol, plus
//! the session/config types built around them.

#![allow(clippy::all)]

include!(concat!(env!("OUT_DIR"), "/warp.multi_agent.v1.rs"));

use std::collections::HashMap;

/// Static configuration for the Warp adapter.
#[derive(Clone, Debug)]
pub struct WarpConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_version: String,
    pub os_category: String,
    pub os_name: String,
    pub os_version: String,
}

impl Default for WarpConfig {
    fn default() -> Self {
        Self {
            base_url: "https://app.warp.dev/ai/multi-agent".into(),
            client_id: "warp-terminal".into(),
            client_version: "1.0.0".into(),
            os_category: "desktop".into(),
            os_name: "linux".into(),
            os_version: "unknown".into(),
        }
    }
}

/// Per-session state the adapter tracks across turns of one conversation,
/// keyed by `metadata.conversation_id`. `tool_use_id → tool_name` lets
/// response parsing translate a `tool_call` variant back to the canonical
/// name, and lets a later `tool_result` pick the matching success/error
/// wire variant.
#[derive(Clone, Debug, Default)]
pub struct WarpSession {
    pub tool_names: HashMap<String, String>,
    pub turn_id: u64,
}

/// Shell command prefixes considered safe to run without confirmation.
pub const SAFE_COMMAND_PREFIXES: &[&str] = &[
    "ls", "cat", "head", "tail", "grep", "find", "pwd", "echo", "wc", "tree", "file", "stat",
    "du", "df", "which", "whereis", "type", "env", "printenv", "whoami", "id", "date", "uname",
    "hostname",
];

/// Additional safe subcommand patterns (`git status`, `npm list`, …).
pub const SAFE_COMMAND_SUBCOMMANDS: &[(&str, &[&str])] = &[
    ("git", &["status", "log", "diff", "show", "branch", "remote", "tag"]),
    ("npm", &["list", "ls", "view", "info", "search"]),
];

/// Substrings that flag a command as risky regardless of its prefix.
/// A bare `curl` is not included — only a `curl | sh`-style pipe is risky,
/// checked separately in `message_converter::is_risky_command`.
pub const RISKY_COMMAND_PATTERNS: &[&str] =
    &["rm -rf", "sudo", "chmod 777", "chown", "mkfs", "dd ", "kill -9", "shutdown", "reboot", "> /dev/"];
