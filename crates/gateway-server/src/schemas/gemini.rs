//! Gemini `generateContent` / `streamGenerateContent` client schema.

use gateway_core::content::AssistantContent;
use gateway_core::errors::GatewayError;
use gateway_core::events::{AssistantMessage, StreamEvent};
use gateway_core::messages::{CanonicalRequest, Message, ToolResultMessageContent, UserMessageContent};
use gateway_core::tools::Tool;
use serde_json::{Value, json};

use super::{SseFrame, SseTranslator, error_message};

/// Parse a Gemini `generateContent`/`streamGenerateContent` request body into
/// a [`CanonicalRequest`]. `model` and `stream` are supplied by the router
/// from the path/endpoint match, since Gemini carries neither in the body.
pub fn parse_request(body: &Value, model: &str, stream: bool) -> Result<CanonicalRequest, GatewayError> {
    let contents = body["contents"]
        .as_array()
        .ok_or_else(|| GatewayError::ClientError("missing \"contents\"".into()))?;

    let mut messages = Vec::with_capacity(contents.len());
    for raw in contents {
        messages.push(parse_content(raw)?);
    }

    let system_prompt = body["systemInstruction"]["parts"]
        .as_array()
        .map(|parts| parts.iter().filter_map(|p| p["text"].as_str()).collect::<Vec<_>>().join("\n"))
        .filter(|s| !s.is_empty());

    let tools = body["tools"]
        .as_array()
        .and_then(|arr| arr.first())
        .and_then(|t| t["functionDeclarations"].as_array())
        .map(|decls| {
            decls
                .iter()
                .filter_map(|d| {
                    Some(Tool {
                        name: d["name"].as_str()?.to_string(),
                        description: d["description"].as_str().map(String::from),
                        input_schema: d["parameters"].clone(),
                    })
                })
                .collect::<Vec<_>>()
        });

    let gen_config = &body["generationConfig"];
    Ok(CanonicalRequest {
        model: model.to_string(),
        system_prompt,
        messages,
        tools,
        max_tokens: gen_config["maxOutputTokens"].as_u64().map(|v| v as u32),
        temperature: gen_config["temperature"].as_f64().map(|v| v as f32),
        top_p: gen_config["topP"].as_f64().map(|v| v as f32),
        top_k: gen_config["topK"].as_u64().map(|v| v as u32),
        stop_sequences: gen_config["stopSequences"]
            .as_array()
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect()),
        session_id: None,
        stream,
    })
}

fn parse_content(raw: &Value) -> Result<Message, GatewayError> {
    let role = raw["role"].as_str().unwrap_or("user");
    let parts = raw["parts"].as_array().cloned().unwrap_or_default();

    if role == "model" {
        let content = parts
            .iter()
            .filter_map(|p| {
                if let Some(text) = p["text"].as_str() {
                    Some(AssistantContent::Text { text: text.to_string() })
                } else if p.get("functionCall").is_some() {
                    let fc = &p["functionCall"];
                    Some(AssistantContent::ToolUse {
                        id: fc["name"].as_str().unwrap_or_default().to_string(),
                        name: fc["name"].as_str().unwrap_or_default().to_string(),
                        arguments: fc["args"].as_object().cloned().unwrap_or_default(),
                        thought_signature: None,
                    })
                } else {
                    None
                }
            })
            .collect();
        return Ok(Message::Assistant { content, usage: None, cost: None, stop_reason: None, thinking: None });
    }

    // A functionResponse part represents a tool result; Gemini allows it to
    // appear standalone in a "user"-role turn.
    if let Some(fr_part) = parts.iter().find(|p| p.get("functionResponse").is_some()) {
        let fr = &fr_part["functionResponse"];
        let response_text = fr["response"].to_string();
        return Ok(Message::ToolResult {
            tool_call_id: fr["name"].as_str().unwrap_or_default().to_string(),
            content: ToolResultMessageContent::Text(response_text),
            is_error: None,
        });
    }

    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect::<Vec<_>>().join("\n");
    Ok(Message::User { content: UserMessageContent::Text(text), timestamp: None })
}

/// Render the non-streaming `generateContent` response body.
pub fn non_streaming_response(message: &AssistantMessage, stop_reason: &str) -> Value {
    let parts: Vec<Value> = message
        .content
        .iter()
        .map(|block| match block {
            AssistantContent::Text { text } => json!({"text": text}),
            AssistantContent::ToolUse { name, arguments, .. } => {
                json!({"functionCall": {"name": name, "args": Value::Object(arguments.clone())}})
            }
            AssistantContent::Thinking { thinking, .. } => json!({"text": thinking, "thought": true}),
        })
        .collect();

    let usage = message.token_usage.as_ref();
    json!({
        "candidates": [{
            "content": {"role": "model", "parts": parts},
            "finishReason": map_finish_reason(stop_reason),
            "index": 0,
        }],
        "usageMetadata": {
            "promptTokenCount": usage.map_or(0, |u| u.input_tokens),
            "candidatesTokenCount": usage.map_or(0, |u| u.output_tokens),
            "totalTokenCount": usage.map_or(0, |u| u.input_tokens + u.output_tokens),
        },
    })
}

fn map_finish_reason(stop_reason: &str) -> &'static str {
    match stop_reason {
        "max_tokens" | "model_context_window_exceeded" => "MAX_TOKENS",
        "tool_use" => "STOP",
        _ => "STOP",
    }
}

/// Render a Gemini-shaped `{error:{code,message,status}}` envelope.
pub fn error_response(err: &GatewayError) -> Value {
    json!({"error": {"code": err.http_status(), "message": error_message(err), "status": gemini_status(err)}})
}

fn gemini_status(err: &GatewayError) -> &'static str {
    match err.http_status() {
        400 => "INVALID_ARGUMENT",
        401 | 403 => "PERMISSION_DENIED",
        429 => "RESOURCE_EXHAUSTED",
        503 => "UNAVAILABLE",
        _ => "INTERNAL",
    }
}

/// Gemini's `streamGenerateContent` sends whole-candidate JSON objects per
/// chunk rather than field-level deltas, so this translator buffers text and
/// emits one frame per text delta carrying the accumulated chunk, plus a
/// dedicated frame per completed tool call (Gemini has no partial
/// function-call-argument streaming wire shape).
#[derive(Default)]
pub struct GeminiSseTranslator {
    sent_any: bool,
}

impl GeminiSseTranslator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn candidate_chunk(&self, parts: Vec<Value>, finish_reason: Option<&str>) -> SseFrame {
        let mut candidate = json!({"content": {"role": "model", "parts": parts}, "index": 0});
        if let Some(reason) = finish_reason {
            candidate["finishReason"] = json!(reason);
        }
        SseFrame::data_only(json!({"candidates": [candidate]}))
    }
}

impl SseTranslator for GeminiSseTranslator {
    fn translate(&mut self, event: &StreamEvent) -> Vec<SseFrame> {
        match event {
            StreamEvent::TextDelta { delta } => {
                self.sent_any = true;
                vec![self.candidate_chunk(vec![json!({"text": delta})], None)]
            }
            StreamEvent::ToolCallEnd { tool_call } => {
                self.sent_any = true;
                vec![self.candidate_chunk(
                    vec![json!({"functionCall": {"name": tool_call.name, "args": Value::Object(tool_call.arguments.clone())}})],
                    None,
                )]
            }
            StreamEvent::Done { stop_reason, .. } => {
                vec![self.candidate_chunk(Vec::new(), Some(map_finish_reason(stop_reason)))]
            }
            StreamEvent::Error { error } => {
                vec![SseFrame::data_only(json!({"error": {"code": 502, "message": error, "status": "INTERNAL"}}))]
            }
            StreamEvent::Start
            | StreamEvent::TextStart
            | StreamEvent::TextEnd { .. }
            | StreamEvent::ThinkingStart
            | StreamEvent::ThinkingDelta { .. }
            | StreamEvent::ThinkingEnd { .. }
            | StreamEvent::ToolCallStart { .. }
            | StreamEvent::ToolCallDelta { .. }
            | StreamEvent::Retry { .. }
            | StreamEvent::SafetyBlock { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_user_turn_text() {
        let body = json!({"contents": [{"role": "user", "parts": [{"text": "hi"}]}]});
        let req = parse_request(&body, "gemini-2.5-pro", false).unwrap();
        assert_eq!(req.model, "gemini-2.5-pro");
        assert_eq!(req.messages.len(), 1);
        assert!(req.messages[0].is_user());
    }

    #[test]
    fn parses_function_response_as_tool_result() {
        let body = json!({
            "contents": [{"role": "user", "parts": [{"functionResponse": {"name": "Bash", "response": {"output": "ok"}}}]}],
        });
        let req = parse_request(&body, "gemini-2.5-pro", false).unwrap();
        assert!(req.messages[0].is_tool_result());
    }

    #[test]
    fn missing_contents_is_client_error() {
        let body = json!({});
        assert!(matches!(parse_request(&body, "gemini-2.5-pro", false), Err(GatewayError::ClientError(_))));
    }

    #[test]
    fn status_mapping_covers_common_codes() {
        assert_eq!(gemini_status(&GatewayError::ClientError("x".into())), "INVALID_ARGUMENT");
        assert_eq!(gemini_status(&GatewayError::AuthError("x".into())), "PERMISSION_DENIED");
    }
}
