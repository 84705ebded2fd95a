//! # Stream Handler
//!
//! Implements the Warp streaming state machine: decoded
//! [`ResponseEvent`](crate::types::ResponseEvent)s are translated into the
//! canonical [`StreamEvent`] sequence, tracking which content block (text,
//! thinking, or tool-use) is currently open so deltas land in the right
//! place and a tool-use block is always emitted as a complete
//! start/delta/end triple.

use serde_json::Map;

use gateway_core::content::AssistantContent;
use gateway_core::events::{AssistantMessage, StreamEvent};
use gateway_core::messages::{ProviderType, TokenUsage, ToolCall as CanonicalToolCall};

use crate::message_converter::canonical_tool_name;
use crate::types::{client_action, response_event, task_message, ClientAction, FinishedEvent, ResponseEvent, TaskMessage, ToolCall, WarpSession};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
enum OpenBlock {
    #[default]
    None,
    Text,
    Thinking,
}

#[derive(Clone, Debug, Default)]
pub struct WarpStreamState {
    open: OpenBlock,
    accumulated_text: String,
    accumulated_thinking: String,
    blocks: Vec<AssistantContent>,
    saw_tool_use: bool,
    input_tokens: u64,
    output_tokens: u64,
    cache_read_tokens: u64,
    cache_creation_tokens: u64,
}

/// Process one decoded `ResponseEvent`, mutating `state` and `session` and
/// returning the canonical events it produces.
pub fn process_response_event(event: &ResponseEvent, state: &mut WarpStreamState, session: &mut WarpSession) -> Vec<StreamEvent> {
    match &event.event {
        Some(response_event::Event::Init(_)) => vec![],
        Some(response_event::Event::ClientActions(actions)) => actions.actions.iter().flat_map(|a| process_client_action(a, state, session)).collect(),
        Some(response_event::Event::Finished(finished)) => handle_finished(finished, state),
        None => vec![],
    }
}

fn process_client_action(action: &ClientAction, state: &mut WarpStreamState, session: &mut WarpSession) -> Vec<StreamEvent> {
    match &action.action {
        Some(client_action::Action::AppendToMessageContent(append)) => append.message.as_ref().map(|m| process_message_delta(m, state, session)).unwrap_or_default(),
        Some(client_action::Action::AddMessagesToTask(add)) => add.messages.iter().flat_map(|m| process_message_complete(m, state, session)).collect(),
        Some(client_action::Action::UpdateTaskMessage(update)) => update.message.as_ref().map(|m| process_message_delta(m, state, session)).unwrap_or_default(),
        Some(client_action::Action::CreateTask(_)) => vec![],
        Some(client_action::Action::UpdateTaskStatus(_)) => vec![],
        None => vec![],
    }
}

fn process_message_delta(message: &TaskMessage, state: &mut WarpStreamState, _session: &mut WarpSession) -> Vec<StreamEvent> {
    match &message.content {
        Some(task_message::Content::AgentOutput(output)) => {
            let mut events = Vec::new();
            if !output.reasoning.is_empty() {
                events.extend(emit_thinking_delta(&output.reasoning, state));
            }
            if !output.text.is_empty() {
                events.extend(emit_text_delta(&output.text, state));
            }
            events
        }
        _ => vec![],
    }
}

fn process_message_complete(message: &TaskMessage, state: &mut WarpStreamState, session: &mut WarpSession) -> Vec<StreamEvent> {
    match &message.content {
        Some(task_message::Content::AgentOutput(output)) if !output.text.is_empty() => emit_text_delta(&output.text, state),
        Some(task_message::Content::ToolCall(tool_call)) => emit_tool_use(tool_call, state, session),
        _ => vec![],
    }
}

fn emit_text_delta(text: &str, state: &mut WarpStreamState) -> Vec<StreamEvent> {
    let mut events = if state.open == OpenBlock::Thinking { close_open_block(state) } else { Vec::new() };
    if state.open != OpenBlock::Text {
        events.push(StreamEvent::TextStart);
        state.open = OpenBlock::Text;
    }
    state.accumulated_text.push_str(text);
    events.push(StreamEvent::TextDelta { delta: text.to_string() });
    events
}

fn emit_thinking_delta(text: &str, state: &mut WarpStreamState) -> Vec<StreamEvent> {
    let mut events = if state.open == OpenBlock::Text { close_open_block(state) } else { Vec::new() };
    if state.open != OpenBlock::Thinking {
        events.push(StreamEvent::ThinkingStart);
        state.open = OpenBlock::Thinking;
    }
    state.accumulated_thinking.push_str(text);
    events.push(StreamEvent::ThinkingDelta { delta: text.to_string() });
    events
}

fn emit_tool_use(tool_call: &ToolCall, state: &mut WarpStreamState, session: &mut WarpSession) -> Vec<StreamEvent> {
    let mut events = close_open_block(state);

    let (name, arguments) = canonical_tool_name(tool_call);
    session.tool_names.insert(tool_call.tool_call_id.clone(), name.clone());
    let arguments_map: Map<String, serde_json::Value> = match arguments {
        serde_json::Value::Object(map) => map,
        _ => Map::new(),
    };

    events.push(StreamEvent::ToolCallStart { tool_call_id: tool_call.tool_call_id.clone(), name: name.clone() });
    events.push(StreamEvent::ToolCallDelta { tool_call_id: tool_call.tool_call_id.clone(), arguments_delta: serde_json::to_string(&arguments_map).unwrap_or_default() });

    let canonical = CanonicalToolCall { content_type: "tool_use".into(), id: tool_call.tool_call_id.clone(), name, arguments: arguments_map.clone(), thought_signature: None };
    state.blocks.push(AssistantContent::ToolUse { id: canonical.id.clone(), name: canonical.name.clone(), arguments: arguments_map, thought_signature: None });
    state.saw_tool_use = true;
    events.push(StreamEvent::ToolCallEnd { tool_call: canonical });
    events
}

fn close_open_block(state: &mut WarpStreamState) -> Vec<StreamEvent> {
    match state.open {
        OpenBlock::Text => {
            let text = std::mem::take(&mut state.accumulated_text);
            state.blocks.push(AssistantContent::Text { text: text.clone() });
            state.open = OpenBlock::None;
            vec![StreamEvent::TextEnd { text, signature: None }]
        }
        OpenBlock::Thinking => {
            let thinking = std::mem::take(&mut state.accumulated_thinking);
            state.blocks.push(AssistantContent::Thinking { thinking: thinking.clone(), signature: None });
            state.open = OpenBlock::None;
            vec![StreamEvent::ThinkingEnd { thinking, signature: None }]
        }
        OpenBlock::None => vec![],
    }
}

fn handle_finished(finished: &FinishedEvent, state: &mut WarpStreamState) -> Vec<StreamEvent> {
    let mut events = close_open_block(state);

    for usage in &finished.token_usage {
        state.input_tokens += usage.input_tokens;
        state.output_tokens += usage.output_tokens;
        state.cache_read_tokens += usage.cache_read_input_tokens;
        state.cache_creation_tokens += usage.cache_creation_input_tokens;
    }

    let stop_reason = if state.saw_tool_use { "tool_use" } else { map_warp_stop_reason(&finished.stop_reason) };

    events.push(StreamEvent::Done {
        message: AssistantMessage {
            content: std::mem::take(&mut state.blocks),
            token_usage: Some(TokenUsage {
                input_tokens: state.input_tokens,
                output_tokens: state.output_tokens,
                cache_read_tokens: (state.cache_read_tokens > 0).then_some(state.cache_read_tokens),
                cache_creation_tokens: (state.cache_creation_tokens > 0).then_some(state.cache_creation_tokens),
                cache_creation_5m_tokens: None,
                cache_creation_1h_tokens: None,
                provider_type: Some(ProviderType::Warp),
            }),
        },
        stop_reason: stop_reason.to_string(),
    });
    events
}

fn map_warp_stop_reason(reason: &str) -> &'static str {
    match reason {
        "done" => "end_turn",
        "quota_limit" => "quota_limit",
        "max_token_limit" => "max_tokens",
        "context_window_exceeded" => "context_window_exceeded",
        "llm_unavailable" => "llm_unavailable",
        "internal_error" => "internal_error",
        _ => "end_turn",
    }
}
