//! # Stream Handler
//!
//! Translates Anthropic's raw SSE event sequence (`message_start`,
//! `content_block_start/delta/stop`, `message_delta`, `message_stop`) into
//! the canonical [`StreamEvent`] sequence the Streaming Engine expects.
//!
//! Anthropic's wire format already matches the canonical block-oriented
//! shape closely, so this is mostly a rename — the state this handler tracks
//! is (a) which content block is currently open, since `content_block_delta`
//! doesn't repeat the block's type, and (b) the finished blocks and usage
//! needed to assemble the [`StreamEvent::Done`] emitted on `message_stop`.

use serde_json::Map;

use gateway_core::content::AssistantContent;
use gateway_core::events::{AssistantMessage, StreamEvent};
use gateway_core::messages::{ProviderType, ToolCall, TokenUsage};

use crate::types::{AnthropicSseEvent, SseContentBlock, SseDelta, SseUsage};

/// Which kind of content block is open at a given index, tracked so a
/// `content_block_delta` or `content_block_stop` knows how to translate.
#[derive(Clone, Debug, Default)]
enum OpenBlock {
    #[default]
    None,
    Text(String),
    Thinking {
        thinking: String,
        signature: Option<String>,
    },
    ToolUse {
        id: String,
        name: String,
        partial_json: String,
    },
}

/// Per-stream state the handler threads through successive SSE events.
#[derive(Clone, Debug, Default)]
pub struct StreamHandlerState {
    open: OpenBlock,
    blocks: Vec<AssistantContent>,
    usage: SseUsage,
    stop_reason: Option<String>,
    delta_output_tokens: u64,
}

/// Translate one raw Anthropic SSE event into zero or more canonical events.
pub fn handle_sse_event(event: &AnthropicSseEvent, state: &mut StreamHandlerState) -> Vec<StreamEvent> {
    match event {
        AnthropicSseEvent::MessageStart { message } => {
            state.usage = message.usage.clone();
            vec![StreamEvent::Start]
        }

        AnthropicSseEvent::ContentBlockStart { content_block, .. } => match content_block {
            SseContentBlock::Text { .. } => {
                state.open = OpenBlock::Text(String::new());
                vec![StreamEvent::TextStart]
            }
            SseContentBlock::Thinking { .. } => {
                state.open = OpenBlock::Thinking { thinking: String::new(), signature: None };
                vec![StreamEvent::ThinkingStart]
            }
            SseContentBlock::ToolUse { id, name } => {
                state.open = OpenBlock::ToolUse { id: id.clone(), name: name.clone(), partial_json: String::new() };
                vec![StreamEvent::ToolCallStart { tool_call_id: id.clone(), name: name.clone() }]
            }
        },

        AnthropicSseEvent::ContentBlockDelta { delta, .. } => match (delta, &mut state.open) {
            (SseDelta::TextDelta { text }, OpenBlock::Text(acc)) => {
                acc.push_str(text);
                vec![StreamEvent::TextDelta { delta: text.clone() }]
            }
            (SseDelta::ThinkingDelta { thinking }, OpenBlock::Thinking { thinking: acc, .. }) => {
                acc.push_str(thinking);
                vec![StreamEvent::ThinkingDelta { delta: thinking.clone() }]
            }
            (SseDelta::SignatureDelta { signature }, OpenBlock::Thinking { signature: sig, .. }) => {
                *sig = Some(signature.clone());
                vec![]
            }
            (SseDelta::InputJsonDelta { partial_json }, OpenBlock::ToolUse { id, partial_json: acc, .. }) => {
                acc.push_str(partial_json);
                vec![StreamEvent::ToolCallDelta { tool_call_id: id.clone(), arguments_delta: partial_json.clone() }]
            }
            _ => vec![],
        },

        AnthropicSseEvent::ContentBlockStop { .. } => match std::mem::take(&mut state.open) {
            OpenBlock::Text(text) => {
                state.blocks.push(AssistantContent::Text { text: text.clone() });
                vec![StreamEvent::TextEnd { text, signature: None }]
            }
            OpenBlock::Thinking { thinking, signature } => {
                state.blocks.push(AssistantContent::Thinking { thinking: thinking.clone(), signature: signature.clone() });
                vec![StreamEvent::ThinkingEnd { thinking, signature }]
            }
            OpenBlock::ToolUse { id, name, partial_json } => {
                let arguments: Map<String, serde_json::Value> =
                    serde_json::from_str(&partial_json).unwrap_or_default();
                let tool_call = ToolCall {
                    content_type: "tool_use".into(),
                    id,
                    name,
                    arguments,
                    thought_signature: None,
                };
                state.blocks.push(AssistantContent::ToolUse {
                    id: tool_call.id.clone(),
                    name: tool_call.name.clone(),
                    arguments: tool_call.arguments.clone(),
                    thought_signature: None,
                });
                vec![StreamEvent::ToolCallEnd { tool_call }]
            }
            OpenBlock::None => vec![],
        },

        AnthropicSseEvent::MessageDelta { delta, usage } => {
            state.stop_reason = delta.stop_reason.clone();
            if let Some(usage) = usage {
                state.delta_output_tokens = usage.output_tokens;
            }
            vec![]
        }

        AnthropicSseEvent::MessageStop => {
            let output_tokens = if state.delta_output_tokens > 0 { state.delta_output_tokens } else { state.usage.output_tokens };
            let token_usage = TokenUsage {
                input_tokens: state.usage.input_tokens,
                output_tokens,
                cache_read_tokens: (state.usage.cache_read_input_tokens > 0).then_some(state.usage.cache_read_input_tokens),
                cache_creation_tokens: (state.usage.cache_creation_input_tokens > 0).then_some(state.usage.cache_creation_input_tokens),
                cache_creation_5m_tokens: state.usage.cache_creation.as_ref().map(|c| c.ephemeral_5m_input_tokens),
                cache_creation_1h_tokens: state.usage.cache_creation.as_ref().map(|c| c.ephemeral_1h_input_tokens),
                provider_type: Some(ProviderType::Anthropic),
            };
            let message = AssistantMessage { content: std::mem::take(&mut state.blocks), token_usage: Some(token_usage) };
            vec![StreamEvent::Done { message, stop_reason: state.stop_reason.clone().unwrap_or_else(|| "end_turn".into()) }]
        }

        AnthropicSseEvent::Ping => vec![],

        AnthropicSseEvent::Error { error } => vec![StreamEvent::Error { error: error.message.clone() }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SseError, SseMessage};

    #[test]
    fn message_start_emits_start() {
        let mut state = StreamHandlerState::default();
        let event = AnthropicSseEvent::MessageStart { message: SseMessage::default() };
        let events = handle_sse_event(&event, &mut state);
        assert_eq!(events, vec![StreamEvent::Start]);
    }

    #[test]
    fn text_block_round_trip() {
        let mut state = StreamHandlerState::default();
        let start = AnthropicSseEvent::ContentBlockStart { index: 0, content_block: SseContentBlock::Text { text: String::new() } };
        assert_eq!(handle_sse_event(&start, &mut state), vec![StreamEvent::TextStart]);

        let delta = AnthropicSseEvent::ContentBlockDelta { index: 0, delta: SseDelta::TextDelta { text: "hi".into() } };
        assert_eq!(handle_sse_event(&delta, &mut state), vec![StreamEvent::TextDelta { delta: "hi".into() }]);

        let stop = AnthropicSseEvent::ContentBlockStop { index: 0 };
        assert_eq!(handle_sse_event(&stop, &mut state), vec![StreamEvent::TextEnd { text: "hi".into(), signature: None }]);
        assert_eq!(state.blocks.len(), 1);
    }

    #[test]
    fn thinking_block_accumulates_signature() {
        let mut state = StreamHandlerState::default();
        let start = AnthropicSseEvent::ContentBlockStart { index: 0, content_block: SseContentBlock::Thinking { thinking: String::new() } };
        let _ = handle_sse_event(&start, &mut state);

        let delta = AnthropicSseEvent::ContentBlockDelta { index: 0, delta: SseDelta::ThinkingDelta { thinking: "pondering".into() } };
        let _ = handle_sse_event(&delta, &mut state);

        let sig_delta = AnthropicSseEvent::ContentBlockDelta { index: 0, delta: SseDelta::SignatureDelta { signature: "sig".into() } };
        assert!(handle_sse_event(&sig_delta, &mut state).is_empty());

        let stop = AnthropicSseEvent::ContentBlockStop { index: 0 };
        let events = handle_sse_event(&stop, &mut state);
        assert_eq!(events, vec![StreamEvent::ThinkingEnd { thinking: "pondering".into(), signature: Some("sig".into()) }]);
    }

    #[test]
    fn tool_use_block_accumulates_json_and_parses_on_stop() {
        let mut state = StreamHandlerState::default();
        let start = AnthropicSseEvent::ContentBlockStart {
            index: 0,
            content_block: SseContentBlock::ToolUse { id: "toolu_1".into(), name: "bash".into() },
        };
        assert_eq!(
            handle_sse_event(&start, &mut state),
            vec![StreamEvent::ToolCallStart { tool_call_id: "toolu_1".into(), name: "bash".into() }]
        );

        let delta1 = AnthropicSseEvent::ContentBlockDelta {
            index: 0,
            delta: SseDelta::InputJsonDelta { partial_json: "{\"cmd\":".into() },
        };
        let _ = handle_sse_event(&delta1, &mut state);
        let delta2 = AnthropicSseEvent::ContentBlockDelta {
            index: 0,
            delta: SseDelta::InputJsonDelta { partial_json: "\"ls\"}".into() },
        };
        let _ = handle_sse_event(&delta2, &mut state);

        let stop = AnthropicSseEvent::ContentBlockStop { index: 0 };
        let events = handle_sse_event(&stop, &mut state);
        match &events[0] {
            StreamEvent::ToolCallEnd { tool_call } => {
                assert_eq!(tool_call.id, "toolu_1");
                assert_eq!(tool_call.arguments.get("cmd").unwrap(), "ls");
            }
            other => panic!("expected ToolCallEnd, got {other:?}"),
        }
        assert_eq!(state.blocks.len(), 1);
    }

    #[test]
    fn message_delta_then_stop_emits_done_with_stop_reason_and_usage() {
        let mut state = StreamHandlerState::default();
        let start_msg = AnthropicSseEvent::MessageStart {
            message: SseMessage { id: Some("msg_1".into()), model: None, stop_reason: None, usage: SseUsage { input_tokens: 12, ..Default::default() } },
        };
        let _ = handle_sse_event(&start_msg, &mut state);

        let delta = AnthropicSseEvent::MessageDelta {
            delta: crate::types::SseMessageDelta { stop_reason: Some("end_turn".into()) },
            usage: Some(crate::types::SseUsageDelta { output_tokens: 7 }),
        };
        assert!(handle_sse_event(&delta, &mut state).is_empty());

        let stop = AnthropicSseEvent::MessageStop;
        let events = handle_sse_event(&stop, &mut state);
        match &events[0] {
            StreamEvent::Done { message, stop_reason } => {
                assert_eq!(stop_reason, "end_turn");
                assert_eq!(message.token_usage.as_ref().unwrap().input_tokens, 12);
                assert_eq!(message.token_usage.as_ref().unwrap().output_tokens, 7);
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    #[test]
    fn error_event_maps_to_stream_error() {
        let mut state = StreamHandlerState::default();
        let event = AnthropicSseEvent::Error { error: SseError { error_type: "overloaded_error".into(), message: "busy".into() } };
        let events = handle_sse_event(&event, &mut state);
        assert_eq!(events, vec![StreamEvent::Error { error: "busy".into() }]);
    }

    #[test]
    fn ping_is_silent() {
        let mut state = StreamHandlerState::default();
        assert!(handle_sse_event(&AnthropicSseEvent::Ping, &mut state).is_empty());
    }
}
