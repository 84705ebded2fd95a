//! # Message Converter
//!
//! Converts a canonical request into either of Vertex's two request shapes:
//! the Claude-on-Vertex envelope (reusing Anthropic's message/tool
//! conversion, since the two wire formats are structurally identical) or the
//! Gemini `generateContent` shape.

use serde_json::{Map, Value};

use gateway_core::content::{AssistantContent, ToolResultContent, UserContent};
use gateway_core::messages::{CanonicalRequest, Message, ToolResultMessageContent, UserMessageContent};
use gateway_core::tools::Tool;

use crate::types::{
    FunctionCallData, FunctionDeclaration, FunctionResponseData, GenerationConfig, GeminiContent,
    GeminiPart, GeminiRequest, GeminiTool, InlineDataContent, SystemInstruction, VertexClaudeRequest,
    GEMINI_INCOMPATIBLE_SCHEMA_FIELDS, TOOL_RESULT_MAX_LENGTH, VERTEX_ANTHROPIC_VERSION,
    VERTEX_INCOMPATIBLE_SCHEMA_FIELDS,
};

/// Placeholder thought signature for tool calls that didn't originate from
/// Gemini (e.g. replayed from Anthropic) — Gemini 3's validator rejects
/// function-call parts with no signature at all.
const SKIP_THOUGHT_SIGNATURE: &str = "skip_thought_signature_validator";

// ─────────────────────────────────────────────────────────────────────────────
// Claude-on-Vertex
// ─────────────────────────────────────────────────────────────────────────────

/// Build the Claude-on-Vertex request body for a canonical request.
///
/// Reuses `gateway-anthropic`'s message/tool conversion verbatim (the two
/// wire formats are identical on this point) and strips the Vertex-specific
/// incompatible schema fields from each tool afterward.
#[must_use]
pub fn build_claude_vertex_request(request: &CanonicalRequest, default_max_tokens: u32) -> VertexClaudeRequest {
    let messages = gateway_anthropic::message_converter::convert_messages(&request.messages);
    let system = request.system_prompt.as_deref().map(|s| Value::String(s.to_string()));
    let mut tools = request.tools.as_deref().map(|t| gateway_anthropic::message_converter::convert_tools(t, false));
    if let Some(tools) = tools.as_mut() {
        for tool in tools.iter_mut() {
            tool.input_schema = strip_schema_fields(&tool.input_schema, VERTEX_INCOMPATIBLE_SCHEMA_FIELDS);
        }
    }

    VertexClaudeRequest {
        anthropic_version: VERTEX_ANTHROPIC_VERSION.into(),
        max_tokens: request.max_tokens.unwrap_or(default_max_tokens),
        messages,
        system,
        tools,
        tool_choice: None,
        temperature: request.temperature,
        top_p: request.top_p,
        top_k: request.top_k,
        stop_sequences: request.stop_sequences.clone(),
        metadata: request.session_id.as_deref().map(|id| serde_json::json!({"user_id": id})),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gemini
// ─────────────────────────────────────────────────────────────────────────────

/// Build the Gemini `generateContent`/`streamGenerateContent` request body.
#[must_use]
pub fn build_gemini_request(request: &CanonicalRequest, default_max_tokens: u32) -> GeminiRequest {
    GeminiRequest {
        contents: convert_messages(&request.messages),
        system_instruction: request.system_prompt.as_deref().map(|s| SystemInstruction {
            parts: vec![GeminiPart::Text { text: s.to_string(), thought: None, thought_signature: None }],
        }),
        generation_config: GenerationConfig {
            max_output_tokens: Some(request.max_tokens.unwrap_or(default_max_tokens)),
            stop_sequences: request.stop_sequences.clone(),
        },
        tools: request.tools.as_deref().map(convert_tools).filter(|t| !t.is_empty()),
    }
}

/// Convert canonical conversation messages to Gemini `contents`.
#[must_use]
pub fn convert_messages(messages: &[Message]) -> Vec<GeminiContent> {
    messages.iter().filter_map(convert_message).collect()
}

fn convert_message(message: &Message) -> Option<GeminiContent> {
    match message {
        Message::User { content, .. } => {
            let parts = convert_user_content(content);
            (!parts.is_empty()).then_some(GeminiContent { role: "user".into(), parts })
        }
        Message::Assistant { content, .. } => {
            let parts: Vec<GeminiPart> = content.iter().filter_map(convert_assistant_content).collect();
            (!parts.is_empty()).then_some(GeminiContent { role: "model".into(), parts })
        }
        Message::ToolResult { tool_call_id, content, .. } => {
            let result_text = extract_tool_result_text(content);
            let truncated = truncate_tool_result(&result_text);
            Some(GeminiContent {
                role: "user".into(),
                parts: vec![GeminiPart::FunctionResponse {
                    function_response: FunctionResponseData {
                        name: "tool_result".into(),
                        response: serde_json::json!({"result": truncated, "tool_call_id": tool_call_id}),
                    },
                }],
            })
        }
    }
}

fn convert_assistant_content(content: &AssistantContent) -> Option<GeminiPart> {
    match content {
        AssistantContent::Text { text } if !text.is_empty() => {
            Some(GeminiPart::Text { text: text.clone(), thought: None, thought_signature: None })
        }
        AssistantContent::Text { .. } | AssistantContent::Thinking { .. } => None,
        AssistantContent::ToolUse { name, arguments, thought_signature, .. } => Some(GeminiPart::FunctionCall {
            function_call: FunctionCallData { name: name.clone(), args: Value::Object(arguments.clone()) },
            thought_signature: Some(thought_signature.clone().unwrap_or_else(|| SKIP_THOUGHT_SIGNATURE.to_string())),
        }),
    }
}

fn convert_user_content(content: &UserMessageContent) -> Vec<GeminiPart> {
    match content {
        UserMessageContent::Text(text) => {
            if text.is_empty() {
                vec![]
            } else {
                vec![GeminiPart::Text { text: text.clone(), thought: None, thought_signature: None }]
            }
        }
        UserMessageContent::Blocks(blocks) => blocks.iter().filter_map(convert_user_block).collect(),
    }
}

fn convert_user_block(block: &UserContent) -> Option<GeminiPart> {
    match block {
        UserContent::Text { text } => Some(GeminiPart::Text { text: text.clone(), thought: None, thought_signature: None }),
        UserContent::Image { data, mime_type } => {
            Some(GeminiPart::InlineData { inline_data: InlineDataContent { mime_type: mime_type.clone(), data: data.clone() } })
        }
        UserContent::Document { data, mime_type, .. } if mime_type == "application/pdf" => {
            Some(GeminiPart::InlineData { inline_data: InlineDataContent { mime_type: "application/pdf".into(), data: data.clone() } })
        }
        UserContent::Document { .. } => None,
    }
}

fn extract_tool_result_text(content: &ToolResultMessageContent) -> String {
    match content {
        ToolResultMessageContent::Text(text) => text.clone(),
        ToolResultMessageContent::Blocks(blocks) => blocks
            .iter()
            .filter_map(|b| match b {
                ToolResultContent::Text { text } => Some(text.as_str()),
                ToolResultContent::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn truncate_tool_result(content: &str) -> String {
    if content.len() <= TOOL_RESULT_MAX_LENGTH {
        content.to_string()
    } else {
        let truncated = &content[..TOOL_RESULT_MAX_LENGTH];
        format!("{truncated}\n\n[Content truncated — {TOOL_RESULT_MAX_LENGTH} char limit]")
    }
}

/// Convert canonical tools to Gemini `functionDeclarations`, sanitizing
/// schemas for fields Gemini rejects.
#[must_use]
pub fn convert_tools(tools: &[Tool]) -> Vec<GeminiTool> {
    let declarations: Vec<FunctionDeclaration> = tools
        .iter()
        .map(|tool| FunctionDeclaration {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: strip_schema_fields(&tool.input_schema, GEMINI_INCOMPATIBLE_SCHEMA_FIELDS),
        })
        .collect();

    if declarations.is_empty() { vec![] } else { vec![GeminiTool { function_declarations: declarations }] }
}

/// Recursively remove the named fields from a JSON schema — used both for
/// Gemini's `additionalProperties`/`$schema` and Vertex's
/// `$comment`/`input_examples`.
#[must_use]
pub fn strip_schema_fields(schema: &Value, fields: &[&str]) -> Value {
    match schema {
        Value::Object(map) => {
            let mut cleaned = Map::new();
            for (key, value) in map {
                if fields.contains(&key.as_str()) {
                    continue;
                }
                cleaned.insert(key.clone(), strip_schema_fields(value, fields));
            }
            Value::Object(cleaned)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(|v| strip_schema_fields(v, fields)).collect()),
        other => other.clone(),
    }
}
