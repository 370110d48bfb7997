//! Round Executors (§4.7): two interchangeable strategies implementing the
//! same `execute_round` protocol, plus the single `RoundConfig` factory that
//! keeps per-phase dispatch out of both executors (§9 "Strategy pattern").
//!
//! [`BatchParallelExecutor`] spawns one task per participant and joins them;
//! [`SequentialStreamingExecutor`] drives participants one at a time over a
//! streaming call each, so tokens can be forwarded as they arrive.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::config::RunConfig;
use crate::events::{emit, Event, EventSink};
use crate::gateway::{GatewayClient, GatewayEvent};
use crate::model::{Message, ParticipantId, Response, RoundRecord, RoundType};
use crate::parsers::{extract_critiques_of, parse_revised_answer};
use crate::prompts;
use crate::react;
use crate::tools::ToolExecutor;
use crate::model::ToolSchema;

/// The prior-round data a round's prompt builder needs, keyed by phase.
/// Variants line up with the contexts named in §4.7.
pub enum RoundContext {
    Initial,
    Critique { initial_responses: Vec<Response> },
    Defense { initial_responses: Vec<Response>, critique_responses: Vec<Response> },
}

/// Static per-phase dispatch table (§4.7's RoundConfig table).
#[derive(Debug, Clone, Copy)]
pub struct RoundConfig {
    pub round_type: RoundType,
    pub uses_tools: bool,
    pub uses_react: bool,
    pub has_revised_answer: bool,
}

/// The single factory centralizing round-type dispatch; both executors call
/// this instead of re-implementing a `switch` on round type (§9).
pub fn build_round_config(round_type: RoundType, react_enabled: bool) -> RoundConfig {
    RoundConfig {
        round_type,
        uses_tools: round_type.uses_tools(),
        uses_react: react_enabled && round_type.uses_react(),
        has_revised_answer: round_type.has_revised_answer(),
    }
}

/// Build the per-participant prompt for `round_type`, dispatching on
/// `context` the same factory owns (§4.3's builders, called from one place).
fn build_messages_for(
    round_type: RoundType,
    query: &str,
    participant: &ParticipantId,
    context: &RoundContext,
    today: NaiveDate,
) -> Vec<Message> {
    match (round_type, context) {
        (RoundType::Initial, _) => prompts::build_initial(query, today),
        (RoundType::Critique, RoundContext::Critique { initial_responses }) => {
            prompts::build_critique(query, participant, initial_responses)
        }
        (
            RoundType::Defense,
            RoundContext::Defense { initial_responses, critique_responses },
        ) => {
            let own_initial = initial_responses
                .iter()
                .find(|r| &r.model == participant)
                .map(|r| r.content.clone())
                .unwrap_or_default();
            let critique_pairs: Vec<(String, String)> = critique_responses
                .iter()
                .map(|r| (r.model.clone(), r.content.clone()))
                .collect();
            let critiques_of_self = extract_critiques_of(&critique_pairs, participant);
            prompts::build_defense(query, &own_initial, &critiques_of_self)
        }
        _ => prompts::build_initial(query, today),
    }
}

/// Parameters shared by both round executors for a single round invocation.
pub struct RoundParams<'a> {
    pub round_type: RoundType,
    pub round_number: u32,
    pub query: &'a str,
    pub context: RoundContext,
    pub participants: &'a [ParticipantId],
    pub react_enabled: bool,
    pub today: NaiveDate,
}

/// The `ExecuteRound` protocol (§4.7, §9): one operation, two implementations.
#[async_trait]
pub trait ExecuteRound: Send + Sync {
    async fn execute_round(
        &self,
        params: RoundParams<'_>,
        gateway: Arc<dyn GatewayClient>,
        tool_executor: Arc<dyn ToolExecutor>,
        tool_schemas: &[ToolSchema],
        run_config: &RunConfig,
        sink: &EventSink,
    ) -> RoundRecord;
}

fn finalize_revised_answer(config: RoundConfig, response: &mut Response) {
    if config.has_revised_answer {
        // Guarantees I2: the parser's fallback never yields an empty string.
        response.revised_answer = Some(parse_revised_answer(&response.content));
    }
}

async fn run_participant(
    participant: ParticipantId,
    messages: Vec<Message>,
    config: RoundConfig,
    gateway: Arc<dyn GatewayClient>,
    tool_executor: Arc<dyn ToolExecutor>,
    tool_schemas: Vec<ToolSchema>,
    max_tool_calls: u32,
    timeout_secs: u64,
    sink: EventSink,
) -> Result<Response, String> {
    let call = async {
        if config.uses_react {
            let messages = prompts::wrap_react(messages, react::MAX_REACT_ITERATIONS);
            react::run_react_loop(
                &participant,
                messages,
                gateway.as_ref(),
                tool_executor.as_ref(),
                &tool_schemas,
                timeout_secs,
                &sink,
            )
            .await
        } else if config.uses_tools {
            gateway
                .query_with_tools(
                    &participant,
                    &messages,
                    &tool_schemas,
                    tool_executor.as_ref(),
                    max_tool_calls,
                    timeout_secs,
                )
                .await
        } else {
            gateway.query(&participant, &messages, None, timeout_secs).await
        }
    };

    match tokio::time::timeout(Duration::from_secs(timeout_secs), call).await {
        Ok(Ok(mut response)) => {
            finalize_revised_answer(config, &mut response);
            Ok(response)
        }
        Ok(Err(err)) => Err(err.as_model_error_reason()),
        Err(_) => Err(format!("timeout after {}s", timeout_secs)),
    }
}

/// All participants concurrent, completion-ordered results, independent
/// per-participant timeouts (§4.7).
pub struct BatchParallelExecutor;

#[async_trait]
impl ExecuteRound for BatchParallelExecutor {
    async fn execute_round(
        &self,
        params: RoundParams<'_>,
        gateway: Arc<dyn GatewayClient>,
        tool_executor: Arc<dyn ToolExecutor>,
        tool_schemas: &[ToolSchema],
        run_config: &RunConfig,
        sink: &EventSink,
    ) -> RoundRecord {
        let config = build_round_config(params.round_type, params.react_enabled);
        let max_tool_calls = run_config.max_tool_calls.non_streaming;
        let timeout_secs = run_config.per_participant_timeout_secs;

        for participant in params.participants {
            emit(sink, Event::ModelStart { model: participant.clone() });
        }

        let mut tasks = FuturesUnordered::new();
        for participant in params.participants {
            let messages =
                build_messages_for(params.round_type, params.query, participant, &params.context, params.today);
            let participant = participant.clone();
            let gateway = Arc::clone(&gateway);
            let tool_executor = Arc::clone(&tool_executor);
            let tool_schemas = tool_schemas.to_vec();
            let sink = sink.clone();

            tasks.push(tokio::spawn(async move {
                let result = run_participant(
                    participant.clone(),
                    messages,
                    config,
                    gateway,
                    tool_executor,
                    tool_schemas,
                    max_tool_calls,
                    timeout_secs,
                    sink,
                )
                .await;
                (participant, result)
            }));
        }

        let mut responses = Vec::new();
        while let Some(joined) = tasks.next().await {
            let (participant, result) = match joined {
                Ok(pair) => pair,
                Err(join_err) => {
                    log::error!("rounds::batch_parallel: participant task panicked: {}", join_err);
                    continue;
                }
            };

            match result {
                Ok(response) => {
                    emit(
                        sink,
                        Event::ModelComplete { model: participant.clone(), response: response.clone() },
                    );
                    responses.push(response);
                }
                Err(reason) => {
                    emit(sink, Event::ModelError { model: participant.clone(), reason });
                }
            }
        }

        let record = RoundRecord {
            round_number: params.round_number,
            round_type: params.round_type,
            responses,
        };
        emit(
            sink,
            Event::RoundComplete {
                round_number: record.round_number,
                round_type: record.round_type,
                responses: record.responses.clone(),
            },
        );
        record
    }
}

/// One participant at a time, in submission order, per-token events that
/// never interleave across participants (§4.7, §5 P5).
pub struct SequentialStreamingExecutor;

#[async_trait]
impl ExecuteRound for SequentialStreamingExecutor {
    async fn execute_round(
        &self,
        params: RoundParams<'_>,
        gateway: Arc<dyn GatewayClient>,
        tool_executor: Arc<dyn ToolExecutor>,
        tool_schemas: &[ToolSchema],
        run_config: &RunConfig,
        sink: &EventSink,
    ) -> RoundRecord {
        let config = build_round_config(params.round_type, params.react_enabled);
        let max_tool_calls = run_config.max_tool_calls.streaming;
        let timeout_secs = run_config.per_participant_timeout_secs;

        let mut responses = Vec::new();

        for participant in params.participants {
            emit(sink, Event::ModelStart { model: participant.clone() });

            let messages =
                build_messages_for(params.round_type, params.query, participant, &params.context, params.today);

            let outcome = if config.uses_react {
                let messages = prompts::wrap_react(messages, react::MAX_REACT_ITERATIONS);
                tokio::time::timeout(
                    Duration::from_secs(timeout_secs),
                    react::run_react_loop(
                        participant,
                        messages,
                        gateway.as_ref(),
                        tool_executor.as_ref(),
                        tool_schemas,
                        timeout_secs,
                        sink,
                    ),
                )
                .await
                .map_err(|_| format!("timeout after {}s", timeout_secs))
                .and_then(|r| r.map_err(|e| e.as_model_error_reason()))
            } else {
                tokio::time::timeout(
                    Duration::from_secs(timeout_secs),
                    stream_with_tool_loop(
                        participant,
                        messages,
                        gateway.as_ref(),
                        tool_executor.as_ref(),
                        tool_schemas,
                        config.uses_tools,
                        max_tool_calls,
                        timeout_secs,
                        sink,
                    ),
                )
                .await
                .map_err(|_| format!("timeout after {}s", timeout_secs))
                .and_then(|r| r.map_err(|e| e.as_model_error_reason()))
            };

            match outcome {
                Ok(mut response) => {
                    finalize_revised_answer(config, &mut response);
                    emit(
                        sink,
                        Event::ModelComplete { model: participant.clone(), response: response.clone() },
                    );
                    responses.push(response);
                }
                Err(reason) => {
                    emit(sink, Event::ModelError { model: participant.clone(), reason });
                }
            }
        }

        let record = RoundRecord {
            round_number: params.round_number,
            round_type: params.round_type,
            responses,
        };
        emit(
            sink,
            Event::RoundComplete {
                round_number: record.round_number,
                round_type: record.round_type,
                responses: record.responses.clone(),
            },
        );
        record
    }
}

/// Stream one participant's reply, forwarding `token` events, then run the
/// same tool-call/result loop `query_with_tools` runs but over the streaming
/// form, emitting `tool_call`/`tool_result` events as each call executes
/// (§4.1, §4.7 S4).
async fn stream_with_tool_loop(
    participant: &ParticipantId,
    mut messages: Vec<Message>,
    gateway: &dyn GatewayClient,
    tool_executor: &dyn ToolExecutor,
    tool_schemas: &[ToolSchema],
    uses_tools: bool,
    max_tool_calls: u32,
    timeout_secs: u64,
    sink: &EventSink,
) -> Result<Response, crate::error::GatewayError> {
    let tools_arg = if uses_tools { Some(tool_schemas) } else { None };

    let (mut content, mut pending_tool_calls) =
        stream_once(participant, &messages, gateway, tools_arg, timeout_secs, sink).await?;
    let mut tool_calls_made = Vec::new();

    // `range 0..max_tool_calls` uniformly — matches the non-streaming loop (§9 REDESIGN FLAGS).
    for _ in 0..max_tool_calls {
        if pending_tool_calls.is_empty() || !uses_tools {
            break;
        }

        let mut assistant_msg = Message::assistant(content.clone());
        assistant_msg.tool_calls = pending_tool_calls.clone();
        messages.push(assistant_msg);

        for tc in &pending_tool_calls {
            emit(
                sink,
                Event::ToolCallEvent {
                    model: Some(participant.clone()),
                    name: tc.name.clone(),
                    args: tc.arguments_json.clone(),
                },
            );
            let result = tool_executor.execute(&tc.name, &tc.arguments_json).await;
            emit(
                sink,
                Event::ToolResultEvent {
                    model: Some(participant.clone()),
                    name: tc.name.clone(),
                    result: result.clone(),
                },
            );
            messages.push(Message::tool(tc.id.clone(), result));
        }
        tool_calls_made.extend(pending_tool_calls.drain(..));

        let (next_content, next_tool_calls) =
            stream_once(participant, &messages, gateway, tools_arg, timeout_secs, sink).await?;
        content = next_content;
        pending_tool_calls = next_tool_calls;
    }

    let mut response = Response::new(participant.clone(), content);
    response.tool_calls_made = tool_calls_made;
    Ok(response)
}

/// Drive a single `gateway.stream()` call to completion, forwarding `token`
/// events, returning the accumulated content and any tool calls requested.
async fn stream_once(
    participant: &ParticipantId,
    messages: &[Message],
    gateway: &dyn GatewayClient,
    tools_arg: Option<&[ToolSchema]>,
    timeout_secs: u64,
    sink: &EventSink,
) -> Result<(String, Vec<crate::model::ToolCall>), crate::error::GatewayError> {
    let mut stream = gateway.stream(participant, messages, tools_arg, timeout_secs);
    let mut content = String::new();
    let mut tool_calls_made = Vec::new();

    while let Some(event) = stream.next().await {
        match event {
            GatewayEvent::Token { content: piece } => {
                content.push_str(&piece);
                emit(sink, Event::Token { model: Some(participant.clone()), content: piece });
            }
            GatewayEvent::Done { content: full, tool_calls_made: made } => {
                if !full.is_empty() {
                    content = full;
                }
                tool_calls_made = made;
            }
            GatewayEvent::Error { message } => {
                return Err(crate::error::GatewayError::Transport(message));
            }
            GatewayEvent::ToolCall { .. } | GatewayEvent::ToolResult { .. } => {}
        }
    }

    Ok((content, tool_calls_made))
}
