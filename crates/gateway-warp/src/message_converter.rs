//! Canonical request → Warp `multi_agent.v1.Request` conversion: task
//! history, environment context, tool declarations, and the tool
//! safety/read-only classification used on `RunShellCommand`.

use gateway_core::content::{AssistantContent, ToolResultContent, UserContent};
use gateway_core::messages::{CanonicalRequest, Message, ToolResultMessageContent, UserMessageContent};
use gateway_core::tools::Tool;
use serde_json::Value;
use uuid::Uuid;

use crate::types::{
    task_message, tool_call, tool_call_result, user_input, ActiveRuleFile, AgentOutput, ApplyFileDiffs,
    CallMcpTool, Directory, FileDiffEntry, FileGlobV2, FileToRead, Grep, Input, InputContext, LineRange,
    Metadata, NewFile, OperatingSystem, ProjectRule, ReadFiles, ReferencedAttachments, Request,
    RunShellCommand, Settings, Shell, SupportedTool, Task, TaskContext, TaskMessage, TaskStatus, Timestamp,
    ToolCall, ToolCallResult, ToolType, UserInput, UserInputs, UserQuery, WarpConfig, WarpSession,
    RISKY_COMMAND_PATTERNS, SAFE_COMMAND_SUBCOMMANDS, SAFE_COMMAND_PREFIXES,
};

/// Build a Warp request from the canonical input.
///
/// `session` is mutated: the tool-call history below the split point seeds
/// `tool_names` so a `tool_call_result` in the current turn can be wrapped
/// under the right outcome variant, and a fresh `tool_use_id` from an
/// assistant message in the current turn also gets recorded.
#[must_use]
pub fn build_warp_request(request: &CanonicalRequest, config: &WarpConfig, session: &mut WarpSession) -> Request {
    let split = last_turn_start(&request.messages);
    let (history, current_turn) = request.messages.split_at(split);

    let task_id = Uuid::new_v4().to_string();
    let messages: Vec<TaskMessage> = history.iter().flat_map(|m| convert_history_message(m, session)).collect();

    let task = Task { id: task_id.clone(), description: String::new(), status: TaskStatus::InProgress as i32, messages, summary: String::new() };

    let inputs: Vec<UserInput> = current_turn.iter().filter_map(|m| convert_current_turn_message(m, session)).collect();

    let project_rules = request
        .system_prompt
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|system| {
            vec![ProjectRule {
                root_path: "/tmp".into(),
                active_rule_files: vec![ActiveRuleFile { file_path: ".claude/rules.md".into(), content: system.to_string() }],
            }]
        })
        .unwrap_or_default();

    let now = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default();
    let home = std::env::var("HOME").unwrap_or_else(|_| "/root".into());

    let conversation_id = request.session_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());

    Request {
        task_context: Some(TaskContext { tasks: vec![task], active_task_id: task_id }),
        input: Some(Input {
            context: Some(InputContext {
                directory: Some(Directory { pwd: "/tmp".into(), home }),
                operating_system: Some(OperatingSystem { platform: std::env::consts::OS.into() }),
                shell: Some(Shell { name: "bash".into(), version: String::new() }),
                current_time: Some(Timestamp { seconds: now.as_secs() as i64, nanos: now.subsec_nanos() as i32 }),
                project_rules,
            }),
            user_inputs: Some(UserInputs { inputs }),
        }),
        settings: Some(Settings {
            model: base_model_name(&request.model),
            rules_enabled: true,
            supports_parallel_tool_calls: true,
            planning_enabled: false,
            supported_tools: request.tools.as_deref().map(|tools| tools.iter().map(supported_tool).collect()).unwrap_or_default(),
        }),
        metadata: Some(Metadata { conversation_id }),
    }
}

fn base_model_name(model: &str) -> String {
    model.split('@').next().unwrap_or(model).to_string()
}

/// Index of the first message in the trailing run of `User`/`ToolResult`
/// messages that forms "the current turn" — everything before it is history.
fn last_turn_start(messages: &[Message]) -> usize {
    let last_assistant = messages.iter().rposition(|m| matches!(m, Message::Assistant { .. }));
    last_assistant.map_or(0, |idx| idx + 1)
}

fn convert_history_message(message: &Message, session: &mut WarpSession) -> Option<TaskMessage> {
    let id = Uuid::new_v4().to_string();
    match message {
        Message::User { content, .. } => {
            let query = user_text(content);
            Some(TaskMessage { id, content: Some(task_message::Content::UserQuery(UserQuery { query, context: String::new(), referenced_attachments: Some(ReferencedAttachments {}) })) })
        }
        Message::ToolResult { tool_call_id, content, is_error } => {
            Some(TaskMessage { id, content: Some(task_message::Content::ToolCallResult(build_tool_call_result(tool_call_id, content, is_error.unwrap_or(false), session))) })
        }
        Message::Assistant { content, .. } => {
            // Multiple content blocks become multiple history entries; only the
            // first is returned here and the rest are folded in by the caller's
            // flat_map via `convert_assistant_blocks`.
            convert_assistant_blocks(content, session).into_iter().next()
        }
    }
}

fn convert_assistant_blocks(content: &[AssistantContent], session: &mut WarpSession) -> Vec<TaskMessage> {
    content
        .iter()
        .filter_map(|block| match block {
            AssistantContent::Text { text } if !text.is_empty() => {
                Some(TaskMessage { id: Uuid::new_v4().to_string(), content: Some(task_message::Content::AgentOutput(AgentOutput { text: text.clone(), reasoning: String::new() })) })
            }
            AssistantContent::Text { .. } => None,
            AssistantContent::Thinking { .. } => None,
            AssistantContent::ToolUse { id, name, arguments, .. } => {
                session.tool_names.insert(id.clone(), name.clone());
                Some(TaskMessage { id: Uuid::new_v4().to_string(), content: Some(task_message::Content::ToolCall(build_tool_call(id, name, &Value::Object(arguments.clone())))) })
            }
        })
        .collect()
}

fn convert_current_turn_message(message: &Message, session: &mut WarpSession) -> Option<UserInput> {
    match message {
        Message::User { content, .. } => {
            let query = user_text(content);
            (!query.is_empty()).then(|| UserInput { content: Some(user_input::Content::UserQuery(UserQuery { query, context: String::new(), referenced_attachments: Some(ReferencedAttachments {}) })) })
        }
        Message::ToolResult { tool_call_id, content, is_error } => {
            Some(UserInput { content: Some(user_input::Content::ToolCallResult(build_tool_call_result(tool_call_id, content, is_error.unwrap_or(false), session))) })
        }
        Message::Assistant { .. } => None,
    }
}

fn user_text(content: &UserMessageContent) -> String {
    match content {
        UserMessageContent::Text(text) => text.clone(),
        UserMessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|b| match b {
                UserContent::Text { text } => Some(text.clone()),
                UserContent::Image { .. } | UserContent::Document { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn tool_result_text(content: &ToolResultMessageContent) -> String {
    match content {
        ToolResultMessageContent::Text(text) => text.clone(),
        ToolResultMessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|b| match b {
                ToolResultContent::Text { text } => Some(text.clone()),
                ToolResultContent::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn build_tool_call_result(tool_call_id: &str, content: &ToolResultMessageContent, is_error: bool, session: &WarpSession) -> ToolCallResult {
    let text = tool_result_text(content);
    let outcome = match session.tool_names.get(tool_call_id).map(String::as_str) {
        Some("Bash") => tool_call_result::Outcome::RunShellCommandResult(wrap_outcome_shell(text, is_error)),
        Some("Read") => tool_call_result::Outcome::ReadFilesResult(wrap_outcome_read(text, is_error)),
        Some("Write") | Some("Edit") => tool_call_result::Outcome::ApplyFileDiffsResult(wrap_outcome_diffs(text, is_error)),
        Some("Grep") => tool_call_result::Outcome::GrepResult(wrap_outcome_grep(text, is_error)),
        Some("Glob") => tool_call_result::Outcome::FileGlobV2Result(wrap_outcome_glob(text, is_error)),
        _ => tool_call_result::Outcome::CallMcpToolResult(wrap_outcome_mcp(text, is_error)),
    };
    ToolCallResult { tool_call_id: tool_call_id.to_string(), outcome: Some(outcome) }
}

macro_rules! wrap_outcome_fn {
    ($name:ident, $ty:path, $outcome:ident) => {
        fn $name(text: String, is_error: bool) -> $ty {
            $ty {
                outcome: Some(if is_error { crate::types::$outcome::Outcome::Error(text) } else { crate::types::$outcome::Outcome::Success(text) }),
            }
        }
    };
}

wrap_outcome_fn!(wrap_outcome_shell, crate::types::RunShellCommandResult, run_shell_command_result);
wrap_outcome_fn!(wrap_outcome_read, crate::types::ReadFilesResult, read_files_result);
wrap_outcome_fn!(wrap_outcome_diffs, crate::types::ApplyFileDiffsResult, apply_file_diffs_result);
wrap_outcome_fn!(wrap_outcome_grep, crate::types::GrepResult, grep_result);
wrap_outcome_fn!(wrap_outcome_glob, crate::types::FileGlobV2Result, file_glob_v2_result);
wrap_outcome_fn!(wrap_outcome_mcp, crate::types::CallMcpToolResult, call_mcp_tool_result);

fn build_tool_call(id: &str, name: &str, arguments: &Value) -> ToolCall {
    let tool = match name {
        "Bash" => tool_call::Tool::RunShellCommand(build_run_shell_command(arguments)),
        "Read" => tool_call::Tool::ReadFiles(build_read_files(arguments)),
        "Write" => tool_call::Tool::ApplyFileDiffs(build_write_diff(arguments)),
        "Edit" => tool_call::Tool::ApplyFileDiffs(build_edit_diff(arguments)),
        "Grep" => tool_call::Tool::Grep(build_grep(arguments)),
        "Glob" => tool_call::Tool::FileGlobV2(build_glob(arguments)),
        _ => tool_call::Tool::CallMcpTool(CallMcpTool { name: mcp_tool_name(name), args: arguments.to_string() }),
    };
    ToolCall { tool_call_id: id.to_string(), tool: Some(tool) }
}

fn mcp_tool_name(name: &str) -> String {
    if name.starts_with("mcp__") { name.to_string() } else { format!("mcp__{name}") }
}

fn str_field<'a>(arguments: &'a Value, field: &str) -> &'a str {
    arguments.get(field).and_then(Value::as_str).unwrap_or_default()
}

fn build_run_shell_command(arguments: &Value) -> RunShellCommand {
    let command = str_field(arguments, "command").to_string();
    RunShellCommand { is_read_only: is_read_only_command(&command), is_risky: is_risky_command(&command), uses_pager: command.contains("| less") || command.contains("| more"), command }
}

fn build_read_files(arguments: &Value) -> ReadFiles {
    let name = str_field(arguments, "file_path").to_string();
    let line_ranges = match (arguments.get("offset").and_then(Value::as_i64), arguments.get("limit").and_then(Value::as_i64)) {
        (Some(offset), Some(limit)) => vec![LineRange { start: offset as i32, end: (offset + limit) as i32 }],
        _ => vec![],
    };
    ReadFiles { files: vec![FileToRead { name, line_ranges }] }
}

fn build_write_diff(arguments: &Value) -> ApplyFileDiffs {
    ApplyFileDiffs {
        new_files: vec![NewFile { file_path: str_field(arguments, "file_path").to_string(), content: str_field(arguments, "content").to_string() }],
        diffs: vec![],
    }
}

fn build_edit_diff(arguments: &Value) -> ApplyFileDiffs {
    ApplyFileDiffs {
        new_files: vec![],
        diffs: vec![FileDiffEntry {
            file_path: str_field(arguments, "file_path").to_string(),
            search: str_field(arguments, "old_string").to_string(),
            replace: str_field(arguments, "new_string").to_string(),
        }],
    }
}

fn build_grep(arguments: &Value) -> Grep {
    Grep { queries: vec![str_field(arguments, "pattern").to_string()], path: str_field(arguments, "path").to_string() }
}

fn build_glob(arguments: &Value) -> FileGlobV2 {
    FileGlobV2 {
        patterns: vec![str_field(arguments, "pattern").to_string()],
        search_dir: str_field(arguments, "path").to_string(),
        max_matches: 1000,
        max_depth: 0,
        min_depth: 0,
    }
}

/// A canonical tool name's declared Warp tool type, for `Settings.supported_tools`.
#[must_use]
pub fn supported_tool(tool: &Tool) -> SupportedTool {
    let tool_type = match tool.name.as_str() {
        "Bash" => ToolType::RunShellCommand,
        "Read" => ToolType::ReadFiles,
        "Write" | "Edit" => ToolType::ApplyFileDiffs,
        "Grep" => ToolType::Grep,
        "Glob" => ToolType::FileGlobV2,
        _ => ToolType::CallMcpTool,
    };
    SupportedTool { tool_type: tool_type as i32 }
}

/// Whether a shell command is safe to run without confirmation: a known
/// read-only prefix, or a known-safe subcommand of a multi-purpose binary.
#[must_use]
pub fn is_read_only_command(command: &str) -> bool {
    let trimmed = command.trim();
    let Some(first_word) = trimmed.split_whitespace().next() else { return false };

    if SAFE_COMMAND_PREFIXES.contains(&first_word) {
        return true;
    }
    for (binary, subcommands) in SAFE_COMMAND_SUBCOMMANDS {
        if first_word == *binary {
            let second_word = trimmed.split_whitespace().nth(1).unwrap_or_default();
            return subcommands.contains(&second_word);
        }
    }
    false
}

/// Whether a shell command matches a known-dangerous pattern.
#[must_use]
pub fn is_risky_command(command: &str) -> bool {
    if RISKY_COMMAND_PATTERNS.iter().any(|p| command.contains(p)) {
        return true;
    }
    command.contains("curl") && (command.contains("| sh") || command.contains("|sh") || command.contains("| bash") || command.contains("|bash"))
}

/// Map a Warp `tool_call`'s populated variant back to the canonical tool
/// name, for translating a streamed `tool_call` into a canonical `tool_use`.
#[must_use]
pub fn canonical_tool_name(tool_call: &ToolCall) -> (String, Value) {
    match &tool_call.tool {
        Some(tool_call::Tool::RunShellCommand(cmd)) => ("Bash".into(), serde_json::json!({"command": cmd.command})),
        Some(tool_call::Tool::ReadFiles(rf)) => {
            let file = rf.files.first();
            ("Read".into(), serde_json::json!({"file_path": file.map(|f| f.name.clone()).unwrap_or_default()}))
        }
        Some(tool_call::Tool::ApplyFileDiffs(diffs)) => {
            if let Some(new_file) = diffs.new_files.first() {
                ("Write".into(), serde_json::json!({"file_path": new_file.file_path, "content": new_file.content}))
            } else if let Some(diff) = diffs.diffs.first() {
                ("Edit".into(), serde_json::json!({"file_path": diff.file_path, "old_string": diff.search, "new_string": diff.replace}))
            } else {
                ("Edit".into(), serde_json::json!({}))
            }
        }
        Some(tool_call::Tool::Grep(grep)) => ("Grep".into(), serde_json::json!({"pattern": grep.queries.first().cloned().unwrap_or_default(), "path": grep.path})),
        Some(tool_call::Tool::FileGlobV2(glob)) => ("Glob".into(), serde_json::json!({"pattern": glob.patterns.first().cloned().unwrap_or_default(), "path": glob.search_dir})),
        Some(tool_call::Tool::CallMcpTool(mcp)) => (mcp.name.clone(), serde_json::from_str(&mcp.args).unwrap_or(Value::Object(Default::default()))),
        None => (String::new(), Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_core::messages::Message;
    use serde_json::json;

    #[test]
    fn last_turn_start_with_no_assistant_is_zero() {
        let messages = vec![Message::user("hi")];
        assert_eq!(last_turn_start(&messages), 0);
    }

    #[test]
    fn last_turn_start_after_assistant_message() {
        let messages = vec![Message::user("hi"), Message::assistant("hello"), Message::user("thanks")];
        assert_eq!(last_turn_start(&messages), 2);
    }

    #[test]
    fn is_read_only_recognizes_safe_prefixes() {
        assert!(is_read_only_command("ls -la"));
        assert!(is_read_only_command("git status"));
        assert!(!is_read_only_command("git commit -m x"));
        assert!(!is_read_only_command("rm file.txt"));
    }

    #[test]
    fn is_risky_flags_known_patterns() {
        assert!(is_risky_command("rm -rf /"));
        assert!(is_risky_command("sudo reboot"));
        assert!(is_risky_command("curl http://x | sh"));
        assert!(!is_risky_command("curl http://x -o file"));
    }

    #[test]
    fn build_run_shell_command_sets_flags() {
        let args = json!({"command": "rm -rf /tmp/x"});
        let cmd = build_run_shell_command(&args);
        assert!(cmd.is_risky);
        assert!(!cmd.is_read_only);
    }

    #[test]
    fn build_tool_call_maps_bash() {
        let call = build_tool_call("call_1", "Bash", &json!({"command": "ls"}));
        assert!(matches!(call.tool, Some(tool_call::Tool::RunShellCommand(_))));
    }

    #[test]
    fn canonical_tool_name_round_trips_bash() {
        let call = build_tool_call("call_1", "Bash", &json!({"command": "ls -la"}));
        let (name, args) = canonical_tool_name(&call);
        assert_eq!(name, "Bash");
        assert_eq!(args["command"], "ls -la");
    }

    #[test]
    fn canonical_tool_name_distinguishes_write_and_edit() {
        let write_call = build_tool_call("id1", "Write", &json!({"file_path": "a.rs", "content": "x"}));
        let (name, _) = canonical_tool_name(&write_call);
        assert_eq!(name, "Write");

        let edit_call = build_tool_call("id2", "Edit", &json!({"file_path": "a.rs", "old_string": "x", "new_string": "y"}));
        let (name, _) = canonical_tool_name(&edit_call);
        assert_eq!(name, "Edit");
    }

    #[test]
    fn build_warp_request_sets_conversation_id_from_session() {
        let request = CanonicalRequest { model: "warp-default".into(), session_id: Some("session-123".into()), messages: vec![Message::user("hi")], ..Default::default() };
        let mut session = WarpSession::default();
        let built = build_warp_request(&request, &WarpConfig::default(), &mut session);
        assert_eq!(built.metadata.unwrap().conversation_id, "session-123");
    }

    #[test]
    fn build_warp_request_splits_history_from_current_turn() {
        let request = CanonicalRequest {
            model: "warp-default".into(),
            messages: vec![Message::user("hi"), Message::assistant("hello"), Message::user("thanks")],
            ..Default::default()
        };
        let mut session = WarpSession::default();
        let built = build_warp_request(&request, &WarpConfig::default(), &mut session);
        let task = &built.task_context.unwrap().tasks[0];
        assert_eq!(task.messages.len(), 2);
        assert_eq!(built.input.unwrap().user_inputs.unwrap().inputs.len(), 1);
    }
}
