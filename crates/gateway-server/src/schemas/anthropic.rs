//! Anthropic Messages client schema.
//!
//! `CanonicalRequest` is already "Claude-shaped" (see
//! `gateway_anthropic::message_converter`), so parsing an inbound `/v1/messages`
//! body is close to an identity transform; the streaming side is the
//! canonical SSE shape almost verbatim, since `StreamEvent` was designed
//! against this wire format in the first place.

use gateway_core::content::{AssistantContent, ToolResultContent, UserContent};
use gateway_core::errors::GatewayError;
use gateway_core::events::{AssistantMessage, StreamEvent};
use gateway_core::messages::{
    CanonicalRequest, Message, ToolResultMessageContent, UserMessageContent,
};
use gateway_core::tools::Tool;
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::{SseFrame, SseTranslator, error_message};

/// Parse an Anthropic Messages API request body into a [`CanonicalRequest`].
pub fn parse_request(body: &Value) -> Result<CanonicalRequest, GatewayError> {
    let model = body["model"]
        .as_str()
        .ok_or_else(|| GatewayError::ClientError("missing \"model\"".into()))?
        .to_string();

    let messages_in = body["messages"]
        .as_array()
        .ok_or_else(|| GatewayError::ClientError("missing \"messages\"".into()))?;

    let mut messages = Vec::with_capacity(messages_in.len());
    for raw in messages_in {
        messages.push(parse_message(raw)?);
    }

    let system_prompt = match &body["system"] {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => {
            let joined: String = blocks
                .iter()
                .filter_map(|b| b["text"].as_str())
                .collect::<Vec<_>>()
                .join("\n");
            if joined.is_empty() { None } else { Some(joined) }
        }
        _ => None,
    };

    let tools = body["tools"].as_array().map(|arr| {
        arr.iter()
            .filter_map(|t| {
                Some(Tool {
                    name: t["name"].as_str()?.to_string(),
                    description: t["description"].as_str().map(String::from),
                    input_schema: t["input_schema"].clone(),
                })
            })
            .collect::<Vec<_>>()
    });

    Ok(CanonicalRequest {
        model,
        system_prompt,
        messages,
        tools,
        max_tokens: body["max_tokens"].as_u64().map(|v| v as u32),
        temperature: body["temperature"].as_f64().map(|v| v as f32),
        top_p: body["top_p"].as_f64().map(|v| v as f32),
        top_k: body["top_k"].as_u64().map(|v| v as u32),
        stop_sequences: body["stop_sequences"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()),
        session_id: body["metadata"]["session_id"].as_str().map(String::from),
        stream: body["stream"].as_bool().unwrap_or(false),
    })
}

fn parse_message(raw: &Value) -> Result<Message, GatewayError> {
    let role = raw["role"]
        .as_str()
        .ok_or_else(|| GatewayError::ClientError("message missing \"role\"".into()))?;

    match role {
        "user" => Ok(Message::User { content: parse_user_content(&raw["content"]), timestamp: None }),
        "assistant" => Ok(Message::Assistant {
            content: parse_assistant_content(&raw["content"]),
            usage: None,
            cost: None,
            stop_reason: None,
            thinking: None,
        }),
        other => Err(GatewayError::ClientError(format!("unsupported message role: {other}"))),
    }
}

fn parse_user_content(content: &Value) -> UserMessageContent {
    if let Some(text) = content.as_str() {
        return UserMessageContent::Text(text.to_string());
    }
    let Some(blocks) = content.as_array() else {
        return UserMessageContent::Text(String::new());
    };

    // A user turn carrying tool_result blocks is represented by the
    // caller as a sequence of separate `Message::ToolResult`s upstream of
    // this function; here we only need the content blocks that stay
    // attached to the user message itself (text/image/document).
    let parsed: Vec<UserContent> = blocks
        .iter()
        .filter_map(|b| match b["type"].as_str() {
            Some("text") => Some(UserContent::Text { text: b["text"].as_str()?.to_string() }),
            Some("image") => Some(UserContent::Image {
                data: b["source"]["data"].as_str()?.to_string(),
                mime_type: b["source"]["media_type"].as_str()?.to_string(),
            }),
            _ => None,
        })
        .collect();
    UserMessageContent::Blocks(parsed)
}

/// Anthropic folds `tool_result` blocks into the user turn's content array;
/// the canonical model keeps them as standalone `Message::ToolResult`
/// entries, so a single wire "user" message can expand into several
/// canonical messages. Callers that need this expansion use
/// [`expand_user_turn`] instead of [`parse_message`] directly.
pub fn expand_user_turn(raw: &Value) -> Result<Vec<Message>, GatewayError> {
    let role = raw["role"].as_str().unwrap_or("");
    if role != "user" {
        return Ok(vec![parse_message(raw)?]);
    }
    let Some(blocks) = raw["content"].as_array() else {
        return Ok(vec![parse_message(raw)?]);
    };

    let mut out = Vec::new();
    let mut leftover: Vec<UserContent> = Vec::new();
    for block in blocks {
        match block["type"].as_str() {
            Some("tool_result") => {
                if !leftover.is_empty() {
                    out.push(Message::User { content: UserMessageContent::Blocks(std::mem::take(&mut leftover)), timestamp: None });
                }
                out.push(Message::ToolResult {
                    tool_call_id: block["tool_use_id"].as_str().unwrap_or_default().to_string(),
                    content: parse_tool_result_content(&block["content"]),
                    is_error: block["is_error"].as_bool(),
                });
            }
            Some("text") => leftover.push(UserContent::Text { text: block["text"].as_str().unwrap_or_default().to_string() }),
            Some("image") => leftover.push(UserContent::Image {
                data: block["source"]["data"].as_str().unwrap_or_default().to_string(),
                mime_type: block["source"]["media_type"].as_str().unwrap_or_default().to_string(),
            }),
            _ => {}
        }
    }
    if !leftover.is_empty() || out.is_empty() {
        out.push(Message::User { content: UserMessageContent::Blocks(leftover), timestamp: None });
    }
    Ok(out)
}

fn parse_tool_result_content(content: &Value) -> ToolResultMessageContent {
    if let Some(text) = content.as_str() {
        return ToolResultMessageContent::Text(text.to_string());
    }
    let Some(blocks) = content.as_array() else {
        return ToolResultMessageContent::Text(String::new());
    };
    let parsed: Vec<ToolResultContent> = blocks
        .iter()
        .filter_map(|b| match b["type"].as_str() {
            Some("text") => Some(ToolResultContent::Text { text: b["text"].as_str()?.to_string() }),
            Some("image") => Some(ToolResultContent::Image {
                data: b["source"]["data"].as_str()?.to_string(),
                mime_type: b["source"]["media_type"].as_str()?.to_string(),
            }),
            _ => None,
        })
        .collect();
    ToolResultMessageContent::Blocks(parsed)
}

fn parse_assistant_content(content: &Value) -> Vec<AssistantContent> {
    let Some(blocks) = content.as_array() else {
        return vec![AssistantContent::Text { text: content.as_str().unwrap_or_default().to_string() }];
    };
    blocks
        .iter()
        .filter_map(|b| match b["type"].as_str() {
            Some("text") => Some(AssistantContent::Text { text: b["text"].as_str()?.to_string() }),
            Some("thinking") => Some(AssistantContent::Thinking {
                thinking: b["thinking"].as_str()?.to_string(),
                signature: b["signature"].as_str().map(String::from),
            }),
            Some("tool_use") => Some(AssistantContent::ToolUse {
                id: b["id"].as_str()?.to_string(),
                name: b["name"].as_str()?.to_string(),
                arguments: b["input"].as_object().cloned().unwrap_or_default(),
                thought_signature: None,
            }),
            _ => None,
        })
        .collect()
}

/// Render the non-streaming `/v1/messages` response body.
pub fn non_streaming_response(message: &AssistantMessage, stop_reason: &str, model: &str) -> Value {
    let content: Vec<Value> = message
        .content
        .iter()
        .map(|block| match block {
            AssistantContent::Text { text } => json!({"type": "text", "text": text}),
            AssistantContent::Thinking { thinking, signature } => {
                json!({"type": "thinking", "thinking": thinking, "signature": signature})
            }
            AssistantContent::ToolUse { id, name, arguments, .. } => {
                json!({"type": "tool_use", "id": id, "name": name, "input": Value::Object(arguments.clone())})
            }
        })
        .collect();

    json!({
        "id": format!("msg_{}", Uuid::now_v7()),
        "type": "message",
        "role": "assistant",
        "model": model,
        "content": content,
        "stop_reason": stop_reason,
        "stop_sequence": Value::Null,
        "usage": usage_json(message),
    })
}

fn usage_json(message: &AssistantMessage) -> Value {
    let usage = message.token_usage.as_ref();
    json!({
        "input_tokens": usage.map_or(0, |u| u.input_tokens),
        "output_tokens": usage.map_or(0, |u| u.output_tokens),
        "cache_read_input_tokens": usage.and_then(|u| u.cache_read_tokens),
        "cache_creation_input_tokens": usage.and_then(|u| u.cache_creation_tokens),
    })
}

/// Render a `{error:{type,message}}` envelope for a non-streaming error.
pub fn error_response(err: &GatewayError) -> Value {
    json!({"type": "error", "error": {"type": err.error_type(), "message": error_message(err)}})
}

/// Tracks open content blocks while translating canonical events into the
/// native Anthropic SSE event sequence.
#[derive(Default)]
pub struct AnthropicSseTranslator {
    block_index: u64,
    block_open: bool,
    tool_delta_sent: bool,
    input_tokens: u64,
    message_id: String,
    model: String,
}

impl AnthropicSseTranslator {
    #[must_use]
    pub fn new(model: impl Into<String>, input_tokens: u64) -> Self {
        Self { input_tokens, message_id: format!("msg_{}", Uuid::now_v7()), model: model.into(), ..Default::default() }
    }

    fn open_block(&mut self, block: Value) -> Vec<SseFrame> {
        if self.block_open {
            return Vec::new();
        }
        self.block_open = true;
        vec![SseFrame::named(
            "content_block_start",
            json!({"type": "content_block_start", "index": self.block_index, "content_block": block}),
        )]
    }

    fn close_block(&mut self) -> Vec<SseFrame> {
        if !self.block_open {
            return Vec::new();
        }
        self.block_open = false;
        self.tool_delta_sent = false;
        let frame = SseFrame::named(
            "content_block_stop",
            json!({"type": "content_block_stop", "index": self.block_index}),
        );
        self.block_index += 1;
        vec![frame]
    }
}

impl SseTranslator for AnthropicSseTranslator {
    fn translate(&mut self, event: &StreamEvent) -> Vec<SseFrame> {
        match event {
            StreamEvent::Start => vec![SseFrame::named(
                "message_start",
                json!({
                    "type": "message_start",
                    "message": {
                        "id": self.message_id,
                        "type": "message",
                        "role": "assistant",
                        "model": self.model,
                        "content": [],
                        "stop_reason": Value::Null,
                        "usage": {"input_tokens": self.input_tokens, "output_tokens": 0},
                    }
                }),
            )],
            StreamEvent::TextStart => self.open_block(json!({"type": "text", "text": ""})),
            StreamEvent::TextDelta { delta } => vec![SseFrame::named(
                "content_block_delta",
                json!({"type": "content_block_delta", "index": self.block_index, "delta": {"type": "text_delta", "text": delta}}),
            )],
            StreamEvent::TextEnd { .. } => self.close_block(),
            StreamEvent::ThinkingStart => self.open_block(json!({"type": "thinking", "thinking": ""})),
            StreamEvent::ThinkingDelta { delta } => vec![SseFrame::named(
                "content_block_delta",
                json!({"type": "content_block_delta", "index": self.block_index, "delta": {"type": "thinking_delta", "thinking": delta}}),
            )],
            StreamEvent::ThinkingEnd { signature, .. } => {
                let mut frames = Vec::new();
                if let Some(sig) = signature {
                    frames.push(SseFrame::named(
                        "content_block_delta",
                        json!({"type": "content_block_delta", "index": self.block_index, "delta": {"type": "signature_delta", "signature": sig}}),
                    ));
                }
                frames.extend(self.close_block());
                frames
            }
            StreamEvent::ToolCallStart { tool_call_id, name } => {
                self.tool_delta_sent = false;
                self.open_block(json!({"type": "tool_use", "id": tool_call_id, "name": name, "input": {}}))
            }
            StreamEvent::ToolCallDelta { arguments_delta, .. } => {
                self.tool_delta_sent = true;
                vec![SseFrame::named(
                    "content_block_delta",
                    json!({"type": "content_block_delta", "index": self.block_index, "delta": {"type": "input_json_delta", "partial_json": arguments_delta}}),
                )]
            }
            StreamEvent::ToolCallEnd { tool_call } => {
                let mut frames = Vec::new();
                if !self.tool_delta_sent {
                    let args = Value::Object(tool_call.arguments.clone()).to_string();
                    frames.push(SseFrame::named(
                        "content_block_delta",
                        json!({"type": "content_block_delta", "index": self.block_index, "delta": {"type": "input_json_delta", "partial_json": args}}),
                    ));
                }
                frames.extend(self.close_block());
                frames
            }
            StreamEvent::Done { message, stop_reason } => {
                let usage = message.token_usage.as_ref();
                vec![
                    SseFrame::named(
                        "message_delta",
                        json!({
                            "type": "message_delta",
                            "delta": {"stop_reason": stop_reason, "stop_sequence": Value::Null},
                            "usage": {"output_tokens": usage.map_or(0, |u| u.output_tokens)},
                        }),
                    ),
                    SseFrame::named("message_stop", json!({"type": "message_stop"})),
                ]
            }
            StreamEvent::Error { error } => {
                vec![SseFrame::named("error", json!({"type": "error", "error": {"type": "api_error", "message": error}}))]
            }
            StreamEvent::Retry { .. } | StreamEvent::SafetyBlock { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_text_request() {
        let body = json!({
            "model": "claude-sonnet-4-5",
            "max_tokens": 1024,
            "messages": [{"role": "user", "content": "hi there"}],
        });
        let req = parse_request(&body).unwrap();
        assert_eq!(req.model, "claude-sonnet-4-5");
        assert_eq!(req.max_tokens, Some(1024));
        assert_eq!(req.messages.len(), 1);
        assert!(req.messages[0].is_user());
    }

    #[test]
    fn missing_messages_is_client_error() {
        let body = json!({"model": "claude-sonnet-4-5"});
        assert!(matches!(parse_request(&body), Err(GatewayError::ClientError(_))));
    }

    #[test]
    fn expand_user_turn_splits_tool_result() {
        let raw = json!({
            "role": "user",
            "content": [
                {"type": "tool_result", "tool_use_id": "toolu_1", "content": "42"},
                {"type": "text", "text": "thanks"},
            ],
        });
        let expanded = expand_user_turn(&raw).unwrap();
        assert_eq!(expanded.len(), 2);
        assert!(expanded[0].is_tool_result());
        assert!(expanded[1].is_user());
    }

    #[test]
    fn translator_emits_well_formed_text_sequence() {
        let mut t = AnthropicSseTranslator::new("claude-sonnet-4-5", 10);
        let start = t.translate(&StreamEvent::Start);
        assert_eq!(start[0].event, Some("message_start"));
        let block_start = t.translate(&StreamEvent::TextStart);
        assert_eq!(block_start[0].event, Some("content_block_start"));
        let delta = t.translate(&StreamEvent::TextDelta { delta: "hi".into() });
        assert_eq!(delta[0].data["delta"]["text"], "hi");
        let stop = t.translate(&StreamEvent::TextEnd { text: "hi".into(), signature: None });
        assert_eq!(stop[0].event, Some("content_block_stop"));
    }

    #[test]
    fn tool_call_without_delta_synthesizes_one() {
        let mut t = AnthropicSseTranslator::new("claude-sonnet-4-5", 10);
        let _ = t.translate(&StreamEvent::ToolCallStart { tool_call_id: "tc1".into(), name: "Bash".into() });
        let mut args = Map::new();
        args.insert("command".into(), json!("ls"));
        let frames = t.translate(&StreamEvent::ToolCallEnd {
            tool_call: gateway_core::messages::ToolCall { arguments: args, id: "tc1".into(), name: "Bash".into(), ..Default::default() },
        });
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data["delta"]["type"], "input_json_delta");
        assert_eq!(frames[1].event, Some("content_block_stop"));
    }
}
