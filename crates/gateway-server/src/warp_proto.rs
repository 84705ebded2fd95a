//! `/w/v1/messages/proto` — the Warp-native Protobuf pipeline. Unlike the
//! other `/w/` routes (JSON schemas forced to the Warp vendor), this one
//! speaks Warp's own wire format directly: the request body is a `prost`-
//! encoded `warp.multi_agent.v1.Request`, and the response is SSE with
//! base64-encoded `ResponseEvent` payloads, matching what Warp's own
//! backend sends the real Warp client.
//!
//! History reconstruction only replays `UserQuery`/`ToolCallResult`/
//! `AgentOutput` entries; a prior turn's `ToolCall` entries are dropped when
//! rebuilding message history, since only their outcome (the next
//! `ToolCallResult`) feeds back into the next model call.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use axum::response::sse::{Event, KeepAlive, Sse};
use base64::Engine;
use futures::{Stream, StreamExt};
use gateway_core::errors::GatewayError;
use gateway_core::events::StreamEvent;
use gateway_core::messages::{CanonicalRequest, Message, ToolResultMessageContent};
use gateway_router::provider::StreamEventStream;
use prost::Message as _;
use tracing::warn;

use gateway_warp::types::{
    client_action, response_event, task_message, user_input, ClientAction, ClientActions, FinishedEvent, InitEvent, Request, ResponseEvent, TaskMessage, TokenUsage as WarpTokenUsage,
};

pub fn decode_request(body: &Bytes) -> Result<CanonicalRequest, GatewayError> {
    let request = Request::decode(body.as_ref()).map_err(|err| GatewayError::ClientError(format!("invalid warp protobuf request: {err}")))?;

    let model = request.settings.as_ref().map(|s| s.model.clone()).filter(|m| !m.is_empty()).unwrap_or_default();

    let mut messages = Vec::new();
    if let Some(task_context) = &request.task_context {
        for task in &task_context.tasks {
            for m in &task.messages {
                if let Some(message) = task_message_to_canonical(m) {
                    messages.push(message);
                }
            }
        }
    }
    if let Some(input) = &request.input {
        if let Some(user_inputs) = &input.user_inputs {
            for ui in &user_inputs.inputs {
                if let Some(message) = user_input_to_canonical(ui) {
                    messages.push(message);
                }
            }
        }
    }

    if messages.is_empty() {
        return Err(GatewayError::ClientError("warp request carries no user input".into()));
    }

    Ok(CanonicalRequest { model, messages, stream: true, ..Default::default() })
}

fn task_message_to_canonical(message: &TaskMessage) -> Option<Message> {
    match &message.content {
        Some(task_message::Content::UserQuery(q)) => Some(Message::user(q.query.clone())),
        Some(task_message::Content::AgentOutput(o)) if !o.text.is_empty() => Some(Message::assistant(o.text.clone())),
        Some(task_message::Content::ToolCallResult(r)) => Some(tool_call_result_to_canonical(r)),
        _ => None,
    }
}

fn user_input_to_canonical(input: &gateway_warp::types::UserInput) -> Option<Message> {
    match &input.content {
        Some(user_input::Content::UserQuery(q)) => Some(Message::user(q.query.clone())),
        Some(user_input::Content::ToolCallResult(r)) => Some(tool_call_result_to_canonical(r)),
        None => None,
    }
}

fn tool_call_result_to_canonical(result: &gateway_warp::types::ToolCallResult) -> Message {
    let (text, is_error) = extract_outcome_text(result);
    Message::ToolResult { tool_call_id: result.tool_call_id.clone(), content: ToolResultMessageContent::Text(text), is_error: Some(is_error) }
}

fn extract_outcome_text(result: &gateway_warp::types::ToolCallResult) -> (String, bool) {
    use gateway_warp::types::tool_call_result::Outcome;
    match &result.outcome {
        Some(Outcome::RunShellCommandResult(r)) => shell_outcome(&r.outcome),
        Some(Outcome::ReadFilesResult(r)) => read_outcome(&r.outcome),
        Some(Outcome::ApplyFileDiffsResult(r)) => diffs_outcome(&r.outcome),
        Some(Outcome::GrepResult(r)) => grep_outcome(&r.outcome),
        Some(Outcome::FileGlobV2Result(r)) => glob_outcome(&r.outcome),
        Some(Outcome::CallMcpToolResult(r)) => mcp_outcome(&r.outcome),
        None => (String::new(), false),
    }
}

fn shell_outcome(outcome: &Option<gateway_warp::types::run_shell_command_result::Outcome>) -> (String, bool) {
    use gateway_warp::types::run_shell_command_result::Outcome;
    match outcome {
        Some(Outcome::Success(s)) => (s.clone(), false),
        Some(Outcome::Error(e)) => (e.clone(), true),
        None => (String::new(), false),
    }
}

fn read_outcome(outcome: &Option<gateway_warp::types::read_files_result::Outcome>) -> (String, bool) {
    use gateway_warp::types::read_files_result::Outcome;
    match outcome {
        Some(Outcome::Success(s)) => (s.clone(), false),
        Some(Outcome::Error(e)) => (e.clone(), true),
        None => (String::new(), false),
    }
}

fn diffs_outcome(outcome: &Option<gateway_warp::types::apply_file_diffs_result::Outcome>) -> (String, bool) {
    use gateway_warp::types::apply_file_diffs_result::Outcome;
    match outcome {
        Some(Outcome::Success(s)) => (s.clone(), false),
        Some(Outcome::Error(e)) => (e.clone(), true),
        None => (String::new(), false),
    }
}

fn grep_outcome(outcome: &Option<gateway_warp::types::grep_result::Outcome>) -> (String, bool) {
    use gateway_warp::types::grep_result::Outcome;
    match outcome {
        Some(Outcome::Success(s)) => (s.clone(), false),
        Some(Outcome::Error(e)) => (e.clone(), true),
        None => (String::new(), false),
    }
}

fn glob_outcome(outcome: &Option<gateway_warp::types::file_glob_v2_result::Outcome>) -> (String, bool) {
    use gateway_warp::types::file_glob_v2_result::Outcome;
    match outcome {
        Some(Outcome::Success(s)) => (s.clone(), false),
        Some(Outcome::Error(e)) => (e.clone(), true),
        None => (String::new(), false),
    }
}

fn mcp_outcome(outcome: &Option<gateway_warp::types::call_mcp_tool_result::Outcome>) -> (String, bool) {
    use gateway_warp::types::call_mcp_tool_result::Outcome;
    match outcome {
        Some(Outcome::Success(s)) => (s.clone(), false),
        Some(Outcome::Error(e)) => (e.clone(), true),
        None => (String::new(), false),
    }
}

/// Translate the canonical event stream into Warp `ResponseEvent` frames and
/// return the SSE response, base64-encoding each frame the way Warp's own
/// backend does.
pub fn sse_response(events: StreamEventStream) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let frames = async_stream::stream! {
        futures::pin_mut!(events);
        yield encode(ResponseEvent { event: Some(response_event::Event::Init(InitEvent::default())) });

        while let Some(item) = events.next().await {
            let event = match item {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "warp proto upstream error");
                    StreamEvent::Error { error: err.to_string() }
                }
            };
            if let Some(frame) = translate(&event) {
                yield encode(frame);
            }
        }
    };

    Sse::new(frames.map(Ok)).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)))
}

fn translate(event: &StreamEvent) -> Option<ResponseEvent> {
    match event {
        StreamEvent::TextDelta { delta } => Some(append_text(delta.clone(), String::new())),
        StreamEvent::ThinkingDelta { delta } => Some(append_text(String::new(), delta.clone())),
        StreamEvent::ToolCallEnd { tool_call } => Some(append_tool_use(tool_call)),
        StreamEvent::Done { message, stop_reason } => Some(finished(message.token_usage.clone(), stop_reason)),
        StreamEvent::Error { error } => Some(finished_error(error)),
        _ => None,
    }
}

fn append_text(text: String, reasoning: String) -> ResponseEvent {
    let message = TaskMessage {
        id: uuid::Uuid::new_v4().to_string(),
        content: Some(task_message::Content::AgentOutput(gateway_warp::types::AgentOutput { text, reasoning })),
    };
    ResponseEvent {
        event: Some(response_event::Event::ClientActions(ClientActions {
            actions: vec![ClientAction { action: Some(client_action::Action::AppendToMessageContent(gateway_warp::types::AppendToMessageContent { message: Some(message) })) }],
        })),
    }
}

/// Wraps every outbound tool call as `CallMcpTool` regardless of its
/// canonical name. Warp's own wire format only assigns the richer
/// `RunShellCommand`/`ReadFiles`/... variants to tool calls it itself
/// generates; a tool call this gateway relays back out over the Warp wire
/// format (e.g. one produced by the Anthropic or Vertex adapter) has no
/// such provenance, so the generic MCP envelope is the only one that can
/// round-trip the name and arguments without guessing a Warp-native shape.
fn append_tool_use(tool_call: &gateway_core::messages::ToolCall) -> ResponseEvent {
    let args = serde_json::Value::Object(tool_call.arguments.clone());
    let wire_tool_call = gateway_warp::types::ToolCall {
        tool_call_id: tool_call.id.clone(),
        tool: Some(gateway_warp::types::tool_call::Tool::CallMcpTool(gateway_warp::types::CallMcpTool { name: tool_call.name.clone(), args: args.to_string() })),
    };
    let message = TaskMessage { id: uuid::Uuid::new_v4().to_string(), content: Some(task_message::Content::ToolCall(wire_tool_call)) };
    ResponseEvent {
        event: Some(response_event::Event::ClientActions(ClientActions {
            actions: vec![ClientAction { action: Some(client_action::Action::AppendToMessageContent(gateway_warp::types::AppendToMessageContent { message: Some(message) })) }],
        })),
    }
}

fn finished(usage: Option<gateway_core::messages::TokenUsage>, stop_reason: &str) -> ResponseEvent {
    let token_usage = usage
        .map(|u| {
            vec![WarpTokenUsage {
                input_tokens: u.input_tokens,
                output_tokens: u.output_tokens,
                cache_read_input_tokens: u.cache_read_tokens.unwrap_or(0),
                cache_creation_input_tokens: u.cache_creation_tokens.unwrap_or(0),
            }]
        })
        .unwrap_or_default();
    ResponseEvent { event: Some(response_event::Event::Finished(FinishedEvent { stop_reason: stop_reason.to_string(), token_usage })) }
}

fn finished_error(error: &str) -> ResponseEvent {
    ResponseEvent { event: Some(response_event::Event::Finished(FinishedEvent { stop_reason: format!("error: {error}"), token_usage: vec![] })) }
}

fn encode(event: ResponseEvent) -> Event {
    let bytes = event.encode_to_vec();
    Event::default().data(base64::engine::general_purpose::STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_warp::types::{Input, Settings, UserInput, UserInputs, UserQuery};

    #[test]
    fn decodes_minimal_request_into_canonical() {
        let request = Request {
            settings: Some(Settings { model: "claude-sonnet-4-5".into(), ..Default::default() }),
            input: Some(Input { user_inputs: Some(UserInputs { inputs: vec![UserInput { content: Some(user_input::Content::UserQuery(UserQuery { query: "hello".into(), ..Default::default() })) }] }), ..Default::default() }),
            ..Default::default()
        };
        let bytes = request.encode_to_vec();
        let canonical = decode_request(&Bytes::from(bytes)).unwrap();
        assert_eq!(canonical.model, "claude-sonnet-4-5");
        assert_eq!(canonical.messages.len(), 1);
        assert!(canonical.messages[0].is_user());
    }

    #[test]
    fn empty_request_is_client_error() {
        let bytes = Request::default().encode_to_vec();
        assert!(decode_request(&Bytes::from(bytes)).is_err());
    }

    #[test]
    fn text_delta_translates_to_append_action() {
        let event = StreamEvent::TextDelta { delta: "hi".into() };
        let response = translate(&event).unwrap();
        assert!(matches!(response.event, Some(response_event::Event::ClientActions(_))));
    }
}
