//! Agent Loop / ReAct (§4.6): a per-participant Thought -> Action ->
//! Observation loop, bounded to at most 3 iterations, that surfaces the
//! model's reasoning as events rather than hiding it behind native tool
//! calling.
//!
//! Grounded on the streaming state-machine shape of the `ThinkNode` ReAct
//! step in `graphweave` (forward tokens, inspect the accumulated reply,
//! decide the next transition) — adapted here to drive
//! [`crate::gateway::GatewayClient::stream`] directly instead of a generic
//! `LlmClient` trait, since this crate's gateway already is that seam.

use futures_util::StreamExt;

use crate::error::GatewayError;
use crate::events::{emit, Event, EventSink};
use crate::gateway::{GatewayClient, GatewayEvent};
use crate::model::{Message, ParticipantId, Response, ToolCall, ToolSchema};
use crate::parsers::parse_react_step;
use crate::tools::ToolExecutor;

/// Maximum Thought/Action/Observation iterations before a forced terminal
/// respond pass (§4.6).
pub const MAX_REACT_ITERATIONS: u32 = 3;

/// Run the ReAct loop for one participant, emitting `thought`/`action`/
/// `observation` events as it progresses and returning the terminal
/// [`Response`] (§4.6).
pub async fn run_react_loop(
    model: &ParticipantId,
    mut messages: Vec<Message>,
    gateway: &dyn GatewayClient,
    tool_executor: &dyn ToolExecutor,
    tools: &[ToolSchema],
    timeout_secs: u64,
    sink: &EventSink,
) -> Result<Response, GatewayError> {
    let mut tool_calls_made = Vec::new();

    for iteration in 0..MAX_REACT_ITERATIONS {
        let reply = stream_to_completion(model, &messages, gateway, timeout_secs, sink).await?;
        let step = parse_react_step(&reply);

        if let Some(thought) = &step.thought {
            emit(sink, Event::Thought { model: model.clone(), text: thought.clone() });
        }

        match step.action.as_deref() {
            Some("search_web") => {
                let query = step.action_arg.clone().unwrap_or_default();
                emit(
                    sink,
                    Event::Action {
                        model: model.clone(),
                        name: "search_web".to_string(),
                        arg: Some(query.clone()),
                    },
                );

                let args_json = serde_json::json!({ "query": query }).to_string();
                let call_id = format!("react_{}_{}", model, iteration);
                let result = tool_executor.execute("search_web", &args_json).await;

                emit(
                    sink,
                    Event::ToolCallEvent {
                        model: Some(model.clone()),
                        name: "search_web".to_string(),
                        args: args_json.clone(),
                    },
                );
                emit(
                    sink,
                    Event::ToolResultEvent {
                        model: Some(model.clone()),
                        name: "search_web".to_string(),
                        result: result.clone(),
                    },
                );

                let observation = format!("Observation: {}", result);
                emit(sink, Event::Observation { model: model.clone(), text: observation.clone() });

                tool_calls_made.push(ToolCall {
                    id: call_id,
                    name: "search_web".to_string(),
                    arguments_json: args_json,
                });

                messages.push(Message::assistant(reply));
                messages.push(Message::user(observation));
            }
            Some("respond") | Some("synthesize") | None => {
                emit(
                    sink,
                    Event::Action {
                        model: model.clone(),
                        name: step.action.clone().unwrap_or_else(|| "respond".to_string()),
                        arg: None,
                    },
                );
                let mut response = Response::new(model.clone(), reply);
                response.reasoned = Some(true);
                response.tool_calls_made = tool_calls_made;
                return Ok(response);
            }
            Some(other) => {
                // Unrecognized action text: treat it like a respond(), keeping the
                // model's own words as the final content (§4.6 "no recognized action").
                emit(
                    sink,
                    Event::Action { model: model.clone(), name: other.to_string(), arg: step.action_arg.clone() },
                );
                let mut response = Response::new(model.clone(), reply);
                response.reasoned = Some(true);
                response.tool_calls_made = tool_calls_made;
                return Ok(response);
            }
        }
    }

    // Iterations exhausted with no terminal action: force one final request (§4.6).
    messages.push(Message::user(
        "You have reached the iteration limit. Answer now without using any more tools."
            .to_string(),
    ));
    let final_reply = stream_to_completion(model, &messages, gateway, timeout_secs, sink).await?;
    let mut response = Response::new(model.clone(), final_reply);
    response.reasoned = Some(true);
    response.tool_calls_made = tool_calls_made;
    Ok(response)
}

/// Drive one `gateway.stream()` call to completion, forwarding `token`
/// events and returning the accumulated content.
async fn stream_to_completion(
    model: &ParticipantId,
    messages: &[Message],
    gateway: &dyn GatewayClient,
    timeout_secs: u64,
    sink: &EventSink,
) -> Result<String, GatewayError> {
    let mut stream = gateway.stream(model, messages, None, timeout_secs);
    let mut content = String::new();

    while let Some(event) = stream.next().await {
        match event {
            GatewayEvent::Token { content: piece } => {
                content.push_str(&piece);
                emit(sink, Event::Token { model: Some(model.clone()), content: piece });
            }
            GatewayEvent::Done { content: full, .. } => {
                if !full.is_empty() {
                    content = full;
                }
                return Ok(content);
            }
            GatewayEvent::Error { message } => return Err(GatewayError::Transport(message)),
            GatewayEvent::ToolCall { .. } | GatewayEvent::ToolResult { .. } => {}
        }
    }

    Ok(content)
}
