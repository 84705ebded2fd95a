//! # Message Converter
//!
//! Converts a canonical request into the Anthropic Messages API wire format,
//! and converts non-streaming Anthropic responses back into canonical
//! assistant messages.

use serde_json::{Value, json};

use gateway_core::content::{AssistantContent, ToolResultContent, UserContent};
use gateway_core::messages::{
    CanonicalRequest, Message, ToolResultMessageContent, UserMessageContent,
};

use crate::types::{
    AnthropicMessageParam, AnthropicRequest, AnthropicTool, CacheControl, SystemPromptBlock,
    OAUTH_SYSTEM_PROMPT_PREFIX,
};

/// Build the Anthropic Messages API request body for a canonical request.
///
/// `is_oauth` controls whether the OAuth system prompt prefix is prepended
/// and whether the last system-prompt block and last tool definition get an
/// ephemeral cache breakpoint (OAuth connections are billed for prompt
/// caching; API-key connections are not worth the complexity for a
/// single-shot system prompt).
#[must_use]
pub fn build_request(request: &CanonicalRequest, is_oauth: bool, default_max_tokens: u32) -> AnthropicRequest {
    AnthropicRequest {
        model: request.model.clone(),
        max_tokens: request.max_tokens.unwrap_or(default_max_tokens),
        messages: convert_messages(&request.messages),
        system: build_system_prompt(request.system_prompt.as_deref(), is_oauth),
        tools: request.tools.as_deref().map(|t| convert_tools(t, is_oauth)),
        stream: request.stream,
        thinking: None,
        output_config: None,
        stop_sequences: request.stop_sequences.clone(),
    }
}

/// Convert canonical conversation messages to Anthropic message params.
#[must_use]
pub fn convert_messages(messages: &[Message]) -> Vec<AnthropicMessageParam> {
    messages.iter().map(convert_message).collect()
}

fn convert_message(message: &Message) -> AnthropicMessageParam {
    match message {
        Message::User { content, .. } => convert_user_message(content),
        Message::Assistant { content, .. } => convert_assistant_message(content),
        Message::ToolResult {
            tool_call_id,
            content,
            is_error,
        } => convert_tool_result(tool_call_id, content, *is_error),
    }
}

fn convert_user_message(content: &UserMessageContent) -> AnthropicMessageParam {
    let blocks = match content {
        UserMessageContent::Text(text) => vec![json!({"type": "text", "text": text})],
        UserMessageContent::Blocks(blocks) => blocks.iter().map(convert_user_content).collect(),
    };
    AnthropicMessageParam { role: "user".into(), content: blocks }
}

fn convert_user_content(content: &UserContent) -> Value {
    match content {
        UserContent::Text { text } => json!({"type": "text", "text": text}),
        UserContent::Image { data, mime_type } => json!({
            "type": "image",
            "source": {"type": "base64", "media_type": mime_type, "data": data},
        }),
        UserContent::Document { data, mime_type, .. } => json!({
            "type": "document",
            "source": {"type": "base64", "media_type": mime_type, "data": data},
        }),
    }
}

/// Convert an assistant message to Anthropic format.
///
/// Thinking blocks are only included when they carry a signature — Anthropic
/// rejects display-only thinking sent back on a later turn.
fn convert_assistant_message(content: &[AssistantContent]) -> AnthropicMessageParam {
    let blocks: Vec<Value> = content.iter().filter_map(convert_assistant_content).collect();
    AnthropicMessageParam { role: "assistant".into(), content: blocks }
}

fn convert_assistant_content(content: &AssistantContent) -> Option<Value> {
    match content {
        AssistantContent::Text { text } => Some(json!({"type": "text", "text": text})),
        AssistantContent::Thinking { thinking, signature } => {
            let sig = signature.as_ref()?;
            Some(json!({"type": "thinking", "thinking": thinking, "signature": sig}))
        }
        AssistantContent::ToolUse { id, name, arguments, .. } => Some(json!({
            "type": "tool_use",
            "id": id,
            "name": name,
            "input": arguments,
        })),
    }
}

fn convert_tool_result(
    tool_call_id: &str,
    content: &ToolResultMessageContent,
    is_error: Option<bool>,
) -> AnthropicMessageParam {
    let result_content = match content {
        ToolResultMessageContent::Text(text) => vec![json!({"type": "text", "text": text})],
        ToolResultMessageContent::Blocks(blocks) => {
            blocks.iter().map(convert_tool_result_content).collect()
        }
    };

    let mut block = json!({
        "type": "tool_result",
        "tool_use_id": tool_call_id,
        "content": result_content,
    });
    if is_error == Some(true) {
        block["is_error"] = json!(true);
    }

    AnthropicMessageParam { role: "user".into(), content: vec![block] }
}

fn convert_tool_result_content(content: &ToolResultContent) -> Value {
    match content {
        ToolResultContent::Text { text } => json!({"type": "text", "text": text}),
        ToolResultContent::Image { data, mime_type } => json!({
            "type": "image",
            "source": {"type": "base64", "media_type": mime_type, "data": data},
        }),
    }
}

/// Build the system prompt value.
///
/// OAuth connections get a two-block array (prefix + caller system prompt,
/// with an ephemeral cache breakpoint on the last block); API-key
/// connections get a plain string.
fn build_system_prompt(system_prompt: Option<&str>, is_oauth: bool) -> Option<Value> {
    if !is_oauth {
        return system_prompt.map(|s| Value::String(s.to_string()));
    }

    let mut blocks = vec![SystemPromptBlock::text(OAUTH_SYSTEM_PROMPT_PREFIX)];
    if let Some(text) = system_prompt {
        blocks.push(SystemPromptBlock::text(text));
    }
    if let Some(last) = blocks.last_mut() {
        last.cache_control = Some(CacheControl { cache_type: "ephemeral".into(), ttl: None });
    }
    Some(serde_json::to_value(&blocks).expect("SystemPromptBlock serialization"))
}

/// Convert canonical tools to Anthropic format.
///
/// The last tool gets an ephemeral 1h cache breakpoint on OAuth connections
/// — tool definitions rarely change within a session and are the largest
/// stable chunk of the prompt.
#[must_use]
pub fn convert_tools(tools: &[gateway_core::tools::Tool], is_oauth: bool) -> Vec<AnthropicTool> {
    let mut result: Vec<AnthropicTool> = tools
        .iter()
        .map(|t| AnthropicTool {
            name: t.name.clone(),
            description: t.description.clone().unwrap_or_default(),
            input_schema: t.input_schema.clone(),
            cache_control: None,
        })
        .collect();

    if is_oauth {
        if let Some(last) = result.last_mut() {
            last.cache_control = Some(CacheControl { cache_type: "ephemeral".into(), ttl: Some("1h".into()) });
        }
    }

    result
}
