//! Streaming event types emitted by the Streaming Engine.
//!
//! [`StreamEvent`] is the canonical, vendor-agnostic event sequence every
//! adapter (Anthropic, Vertex, Warp) translates its wire format into before
//! handing it to the server's SSE relay. It is purely in-memory — never
//! persisted — and drives the client-facing `text/event-stream` response.

use serde::{Deserialize, Serialize};

use crate::messages::{TokenUsage, ToolCall};

// ─────────────────────────────────────────────────────────────────────────────
// StreamEvent — canonical LLM streaming events
// ─────────────────────────────────────────────────────────────────────────────

/// Events emitted while relaying an in-flight LLM response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// Stream started.
    #[serde(rename = "start")]
    Start,

    /// Text block started.
    #[serde(rename = "text_start")]
    TextStart,

    /// Incremental text content.
    #[serde(rename = "text_delta")]
    TextDelta {
        /// Text fragment.
        delta: String,
    },

    /// Text block completed.
    #[serde(rename = "text_end")]
    TextEnd {
        /// Full accumulated text.
        text: String,
        /// Verification signature.
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },

    /// Thinking block started (extended thinking).
    #[serde(rename = "thinking_start")]
    ThinkingStart,

    /// Incremental thinking content.
    #[serde(rename = "thinking_delta")]
    ThinkingDelta {
        /// Thinking text fragment.
        delta: String,
    },

    /// Thinking block completed.
    #[serde(rename = "thinking_end")]
    ThinkingEnd {
        /// Full thinking text.
        thinking: String,
        /// Verification signature.
        #[serde(skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },

    /// Tool call started.
    #[serde(rename = "toolcall_start")]
    ToolCallStart {
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Tool name.
        name: String,
    },

    /// Incremental tool call argument JSON.
    #[serde(rename = "toolcall_delta")]
    ToolCallDelta {
        /// Tool call ID.
        #[serde(rename = "toolCallId")]
        tool_call_id: String,
        /// Partial JSON arguments.
        #[serde(rename = "argumentsDelta")]
        arguments_delta: String,
    },

    /// Tool call fully constructed.
    #[serde(rename = "toolcall_end")]
    ToolCallEnd {
        /// Complete tool call.
        #[serde(rename = "toolCall")]
        tool_call: ToolCall,
    },

    /// Stream completed successfully.
    #[serde(rename = "done")]
    Done {
        /// Full assistant message.
        message: AssistantMessage,
        /// Stop reason from LLM.
        #[serde(rename = "stopReason")]
        stop_reason: String,
    },

    /// Stream error.
    #[serde(rename = "error")]
    Error {
        /// Error message.
        error: String,
    },

    /// Retryable error — a retry is about to happen.
    #[serde(rename = "retry")]
    Retry {
        /// Current attempt (1-based).
        attempt: u32,
        /// Maximum retries configured.
        #[serde(rename = "maxRetries")]
        max_retries: u32,
        /// Delay before next retry in ms.
        #[serde(rename = "delayMs")]
        delay_ms: u64,
        /// Error info.
        error: RetryErrorInfo,
    },

    /// Safety block (Vertex/Gemini provider).
    #[serde(rename = "safety_block")]
    SafetyBlock {
        /// Categories that triggered the block.
        #[serde(rename = "blockedCategories")]
        blocked_categories: Vec<String>,
        /// Error message.
        error: String,
    },
}

/// Error info attached to a [`StreamEvent::Retry`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RetryErrorInfo {
    /// Error category string.
    pub category: String,
    /// Human-readable message.
    pub message: String,
    /// Whether retryable.
    #[serde(rename = "isRetryable")]
    pub is_retryable: bool,
}

/// Stream event type strings, in emission order for a well-formed stream.
const STREAM_EVENT_TYPES: &[&str] = &[
    "start",
    "text_start",
    "text_delta",
    "text_end",
    "thinking_start",
    "thinking_delta",
    "thinking_end",
    "toolcall_start",
    "toolcall_delta",
    "toolcall_end",
    "done",
    "error",
    "retry",
    "safety_block",
];

/// Check if a type string is a known stream event type.
#[must_use]
pub fn is_stream_event_type(type_str: &str) -> bool {
    STREAM_EVENT_TYPES.contains(&type_str)
}

/// The completed assistant message carried by [`StreamEvent::Done`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantMessage {
    /// Assistant content blocks.
    pub content: Vec<crate::content::AssistantContent>,
    /// Token usage.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stream_event_start_serde() {
        let e = StreamEvent::Start;
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json, json!({"type": "start"}));
        let back: StreamEvent = serde_json::from_value(json).unwrap();
        assert_eq!(e, back);
    }

    #[test]
    fn stream_event_text_delta_serde() {
        let e = StreamEvent::TextDelta {
            delta: "hello".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "text_delta");
        assert_eq!(json["delta"], "hello");
    }

    #[test]
    fn stream_event_text_end_serde() {
        let e = StreamEvent::TextEnd {
            text: "full text".into(),
            signature: Some("sig123".into()),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "text_end");
        assert_eq!(json["text"], "full text");
        assert_eq!(json["signature"], "sig123");
    }

    #[test]
    fn stream_event_text_end_no_signature() {
        let e = StreamEvent::TextEnd {
            text: "text".into(),
            signature: None,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert!(json.get("signature").is_none());
    }

    #[test]
    fn stream_event_thinking_delta() {
        let e = StreamEvent::ThinkingDelta {
            delta: "hmm".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "thinking_delta");
    }

    #[test]
    fn stream_event_toolcall_start() {
        let e = StreamEvent::ToolCallStart {
            tool_call_id: "tc-1".into(),
            name: "bash".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "toolcall_start");
        assert_eq!(json["toolCallId"], "tc-1");
        assert_eq!(json["name"], "bash");
    }

    #[test]
    fn stream_event_toolcall_delta() {
        let e = StreamEvent::ToolCallDelta {
            tool_call_id: "tc-1".into(),
            arguments_delta: r#"{"comm"#.into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["argumentsDelta"], r#"{"comm"#);
    }

    #[test]
    fn stream_event_done() {
        let msg = AssistantMessage {
            content: vec![crate::content::AssistantContent::text("response")],
            token_usage: None,
        };
        let e = StreamEvent::Done {
            message: msg,
            stop_reason: "end_turn".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "done");
        assert_eq!(json["stopReason"], "end_turn");
    }

    #[test]
    fn stream_event_error() {
        let e = StreamEvent::Error {
            error: "connection reset".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "error");
    }

    #[test]
    fn stream_event_retry() {
        let e = StreamEvent::Retry {
            attempt: 2,
            max_retries: 5,
            delay_ms: 2000,
            error: RetryErrorInfo {
                category: "rate_limit".into(),
                message: "too many requests".into(),
                is_retryable: true,
            },
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "retry");
        assert_eq!(json["attempt"], 2);
        assert_eq!(json["maxRetries"], 5);
    }

    #[test]
    fn stream_event_safety_block() {
        let e = StreamEvent::SafetyBlock {
            blocked_categories: vec!["HARM_CATEGORY_DANGEROUS".into()],
            error: "blocked by safety filter".into(),
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "safety_block");
    }

    #[test]
    fn stream_event_all_variants_serialize() {
        let events: Vec<StreamEvent> = vec![
            StreamEvent::Start,
            StreamEvent::TextStart,
            StreamEvent::TextDelta { delta: "d".into() },
            StreamEvent::TextEnd {
                text: "t".into(),
                signature: None,
            },
            StreamEvent::ThinkingStart,
            StreamEvent::ThinkingDelta { delta: "d".into() },
            StreamEvent::ThinkingEnd {
                thinking: "t".into(),
                signature: None,
            },
            StreamEvent::ToolCallStart {
                tool_call_id: "id".into(),
                name: "n".into(),
            },
            StreamEvent::ToolCallDelta {
                tool_call_id: "id".into(),
                arguments_delta: "d".into(),
            },
            StreamEvent::ToolCallEnd {
                tool_call: ToolCall::default(),
            },
            StreamEvent::Done {
                message: AssistantMessage {
                    content: vec![],
                    token_usage: None,
                },
                stop_reason: "end_turn".into(),
            },
            StreamEvent::Error {
                error: "e".into(),
            },
            StreamEvent::Retry {
                attempt: 1,
                max_retries: 3,
                delay_ms: 1000,
                error: RetryErrorInfo {
                    category: "c".into(),
                    message: "m".into(),
                    is_retryable: true,
                },
            },
            StreamEvent::SafetyBlock {
                blocked_categories: vec![],
                error: "e".into(),
            },
        ];
        for event in &events {
            let json = serde_json::to_value(event).unwrap();
            assert!(json.get("type").is_some());
        }
        assert_eq!(events.len(), 14);
    }

    #[test]
    fn is_stream_event_type_positive() {
        assert!(is_stream_event_type("start"));
        assert!(is_stream_event_type("text_delta"));
        assert!(is_stream_event_type("done"));
        assert!(is_stream_event_type("safety_block"));
    }

    #[test]
    fn is_stream_event_type_negative() {
        assert!(!is_stream_event_type("agent_start"));
        assert!(!is_stream_event_type("turn_end"));
        assert!(!is_stream_event_type("unknown"));
    }
}
