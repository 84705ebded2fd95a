//! OpenAI Chat Completions client schema.

use gateway_core::content::AssistantContent;
use gateway_core::errors::GatewayError;
use gateway_core::events::{AssistantMessage, StreamEvent};
use gateway_core::messages::{CanonicalRequest, Message, ToolResultMessageContent, UserMessageContent};
use gateway_core::tools::Tool;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{DONE_MARKER, SseFrame, SseTranslator, error_message};

/// Parse an OpenAI Chat Completions request body into a [`CanonicalRequest`].
pub fn parse_request(body: &Value) -> Result<CanonicalRequest, GatewayError> {
    let model = body["model"]
        .as_str()
        .ok_or_else(|| GatewayError::ClientError("missing \"model\"".into()))?
        .to_string();

    let messages_in = body["messages"]
        .as_array()
        .ok_or_else(|| GatewayError::ClientError("missing \"messages\"".into()))?;

    let mut system_prompt = None;
    let mut messages = Vec::with_capacity(messages_in.len());
    for raw in messages_in {
        match raw["role"].as_str() {
            Some("system") | Some("developer") => {
                let text = raw["content"].as_str().unwrap_or_default().to_string();
                system_prompt = Some(match system_prompt {
                    Some(existing) => format!("{existing}\n{text}"),
                    None => text,
                });
            }
            Some("user") => messages.push(Message::User {
                content: parse_user_content(&raw["content"]),
                timestamp: None,
            }),
            Some("assistant") => messages.push(parse_assistant_message(raw)),
            Some("tool") => messages.push(Message::ToolResult {
                tool_call_id: raw["tool_call_id"].as_str().unwrap_or_default().to_string(),
                content: ToolResultMessageContent::Text(raw["content"].as_str().unwrap_or_default().to_string()),
                is_error: None,
            }),
            other => {
                return Err(GatewayError::ClientError(format!("unsupported message role: {other:?}")));
            }
        }
    }

    let tools = body["tools"].as_array().map(|arr| {
        arr.iter()
            .filter_map(|t| {
                let func = &t["function"];
                Some(Tool {
                    name: func["name"].as_str()?.to_string(),
                    description: func["description"].as_str().map(String::from),
                    input_schema: func["parameters"].clone(),
                })
            })
            .collect::<Vec<_>>()
    });

    Ok(CanonicalRequest {
        model,
        system_prompt,
        messages,
        tools,
        max_tokens: body["max_completion_tokens"]
            .as_u64()
            .or_else(|| body["max_tokens"].as_u64())
            .map(|v| v as u32),
        temperature: body["temperature"].as_f64().map(|v| v as f32),
        top_p: body["top_p"].as_f64().map(|v| v as f32),
        top_k: None,
        stop_sequences: match &body["stop"] {
            Value::String(s) => Some(vec![s.clone()]),
            Value::Array(arr) => Some(arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()),
            _ => None,
        },
        session_id: body["user"].as_str().map(String::from),
        stream: body["stream"].as_bool().unwrap_or(false),
    })
}

fn parse_user_content(content: &Value) -> UserMessageContent {
    if let Some(text) = content.as_str() {
        return UserMessageContent::Text(text.to_string());
    }
    let Some(parts) = content.as_array() else {
        return UserMessageContent::Text(String::new());
    };
    let joined: String = parts
        .iter()
        .filter(|p| p["type"] == "text")
        .filter_map(|p| p["text"].as_str())
        .collect::<Vec<_>>()
        .join("\n");
    UserMessageContent::Text(joined)
}

fn parse_assistant_message(raw: &Value) -> Message {
    let mut content = Vec::new();
    if let Some(text) = raw["content"].as_str() {
        if !text.is_empty() {
            content.push(AssistantContent::Text { text: text.to_string() });
        }
    }
    if let Some(calls) = raw["tool_calls"].as_array() {
        for call in calls {
            let arguments = call["function"]["arguments"]
                .as_str()
                .and_then(|s| serde_json::from_str(s).ok())
                .unwrap_or_default();
            content.push(AssistantContent::ToolUse {
                id: call["id"].as_str().unwrap_or_default().to_string(),
                name: call["function"]["name"].as_str().unwrap_or_default().to_string(),
                arguments,
                thought_signature: None,
            });
        }
    }
    Message::Assistant { content, usage: None, cost: None, stop_reason: None, thinking: None }
}

/// Render the non-streaming `/v1/chat/completions` response body.
pub fn non_streaming_response(message: &AssistantMessage, stop_reason: &str, model: &str) -> Value {
    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in &message.content {
        match block {
            AssistantContent::Text { text: t } => text.push_str(t),
            AssistantContent::ToolUse { id, name, arguments, .. } => {
                tool_calls.push(json!({
                    "id": id,
                    "type": "function",
                    "function": {"name": name, "arguments": Value::Object(arguments.clone()).to_string()},
                }));
            }
            AssistantContent::Thinking { .. } => {}
        }
    }

    let mut message_json = json!({"role": "assistant", "content": if text.is_empty() { Value::Null } else { json!(text) }});
    if !tool_calls.is_empty() {
        message_json["tool_calls"] = json!(tool_calls);
    }

    let usage = message.token_usage.as_ref();
    json!({
        "id": format!("chatcmpl-{}", Uuid::now_v7()),
        "object": "chat.completion",
        "model": model,
        "choices": [{
            "index": 0,
            "message": message_json,
            "finish_reason": map_finish_reason(stop_reason),
        }],
        "usage": {
            "prompt_tokens": usage.map_or(0, |u| u.input_tokens),
            "completion_tokens": usage.map_or(0, |u| u.output_tokens),
            "total_tokens": usage.map_or(0, |u| u.input_tokens + u.output_tokens),
        },
    })
}

fn map_finish_reason(stop_reason: &str) -> &'static str {
    match stop_reason {
        "tool_use" => "tool_calls",
        "max_tokens" | "model_context_window_exceeded" => "length",
        _ => "stop",
    }
}

/// Render an OpenAI-shaped `{error:{message,type,code}}` envelope.
pub fn error_response(err: &GatewayError) -> Value {
    json!({"error": {"message": error_message(err), "type": err.error_type(), "code": err.http_status()}})
}

/// Tracks the single open tool-call / text stream for an in-flight response,
/// since OpenAI's chunk format has no concept of interleaved content blocks
/// the way Anthropic's does.
#[derive(Default)]
pub struct OpenAiSseTranslator {
    id: String,
    model: String,
    created: i64,
    text_open: bool,
    tool_index: Option<u32>,
    next_tool_index: u32,
}

impl OpenAiSseTranslator {
    #[must_use]
    pub fn new(model: impl Into<String>, created_unix: i64) -> Self {
        Self { id: format!("chatcmpl-{}", Uuid::now_v7()), model: model.into(), created: created_unix, ..Default::default() }
    }

    fn chunk(&self, delta: Value, finish_reason: Option<&str>) -> SseFrame {
        SseFrame::data_only(json!({
            "id": self.id,
            "object": "chat.completion.chunk",
            "created": self.created,
            "model": self.model,
            "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}],
        }))
    }
}

impl SseTranslator for OpenAiSseTranslator {
    fn translate(&mut self, event: &StreamEvent) -> Vec<SseFrame> {
        match event {
            StreamEvent::Start => vec![self.chunk(json!({"role": "assistant", "content": ""}), None)],
            StreamEvent::TextStart => {
                self.text_open = true;
                Vec::new()
            }
            StreamEvent::TextDelta { delta } => vec![self.chunk(json!({"content": delta}), None)],
            StreamEvent::TextEnd { .. } => {
                self.text_open = false;
                Vec::new()
            }
            StreamEvent::ToolCallStart { tool_call_id, name } => {
                let index = self.next_tool_index;
                self.next_tool_index += 1;
                self.tool_index = Some(index);
                vec![self.chunk(
                    json!({"tool_calls": [{"index": index, "id": tool_call_id, "type": "function", "function": {"name": name, "arguments": ""}}]}),
                    None,
                )]
            }
            StreamEvent::ToolCallDelta { arguments_delta, .. } => {
                let index = self.tool_index.unwrap_or(0);
                vec![self.chunk(json!({"tool_calls": [{"index": index, "function": {"arguments": arguments_delta}}]}), None)]
            }
            StreamEvent::ToolCallEnd { .. } => {
                self.tool_index = None;
                Vec::new()
            }
            StreamEvent::Done { stop_reason, .. } => vec![self.chunk(json!({}), Some(map_finish_reason(stop_reason)))],
            StreamEvent::Error { error } => {
                vec![SseFrame::data_only(json!({"error": {"message": error, "type": "api_error", "code": Value::Null}}))]
            }
            StreamEvent::ThinkingStart
            | StreamEvent::ThinkingDelta { .. }
            | StreamEvent::ThinkingEnd { .. }
            | StreamEvent::Retry { .. }
            | StreamEvent::SafetyBlock { .. } => Vec::new(),
        }
    }

    fn finalize(&mut self) -> Vec<SseFrame> {
        vec![SseFrame::data_only(json!(DONE_MARKER))]
    }
}
