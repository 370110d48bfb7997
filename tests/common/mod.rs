//! Scripted `GatewayClient` double shared by the integration tests: each
//! participant gets a queue of canned outcomes, popped one per call, so a
//! single mock can play back the exact multi-round scenarios from the
//! testable-properties scenarios (S2-S4).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use deliberate::gateway::{GatewayClient, GatewayEvent, GatewayEventStream};
use deliberate::model::{Message, Response, ToolCall, ToolSchema};
use deliberate::tools::ToolExecutor;
use deliberate::GatewayError;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// One scripted non-streaming outcome.
pub enum QueryOutcome {
    Ok(Response),
    /// Sleeps past the caller's timeout so the outer `tokio::time::timeout` fires.
    HangPastTimeout,
    Err(String),
}

/// One scripted streaming outcome: the events `stream()` should emit, in order.
pub struct StreamOutcome {
    pub events: Vec<GatewayEvent>,
}

#[derive(Default)]
pub struct ScriptedGateway {
    queries: Mutex<HashMap<String, VecDeque<QueryOutcome>>>,
    streams: Mutex<HashMap<String, VecDeque<StreamOutcome>>>,
    /// Every `stream()` call's messages, in call order, for asserting on what
    /// a caller actually sent (e.g. that a ReAct preamble was prepended).
    pub stream_calls: Mutex<Vec<(String, Vec<Message>)>>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_query(&self, model: &str, outcome: QueryOutcome) {
        self.queries.lock().unwrap().entry(model.to_string()).or_default().push_back(outcome);
    }

    pub fn queue_stream(&self, model: &str, events: Vec<GatewayEvent>) {
        self.streams
            .lock()
            .unwrap()
            .entry(model.to_string())
            .or_default()
            .push_back(StreamOutcome { events });
    }
}

#[async_trait]
impl GatewayClient for ScriptedGateway {
    async fn query(
        &self,
        model: &str,
        _messages: &[Message],
        _tools: Option<&[ToolSchema]>,
        timeout_secs: u64,
    ) -> Result<Response, GatewayError> {
        let outcome = self.queries.lock().unwrap().get_mut(model).and_then(|q| q.pop_front());
        match outcome {
            Some(QueryOutcome::Ok(response)) => Ok(response),
            Some(QueryOutcome::Err(msg)) => Err(GatewayError::Transport(msg)),
            Some(QueryOutcome::HangPastTimeout) => {
                tokio::time::sleep(Duration::from_secs(timeout_secs + 2)).await;
                Ok(Response::new(model.to_string(), "too late".to_string()))
            }
            None => Ok(Response::new(model.to_string(), String::new())),
        }
    }

    fn stream(
        &self,
        model: &str,
        messages: &[Message],
        _tools: Option<&[ToolSchema]>,
        _timeout_secs: u64,
    ) -> GatewayEventStream {
        self.stream_calls.lock().unwrap().push((model.to_string(), messages.to_vec()));
        let outcome = self.streams.lock().unwrap().get_mut(model).and_then(|q| q.pop_front());
        let events = outcome.map(|o| o.events).unwrap_or_else(|| {
            vec![GatewayEvent::Done { content: String::new(), tool_calls_made: Vec::new() }]
        });

        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        for event in events {
            let _ = tx.send(event);
        }
        Box::pin(UnboundedReceiverStream::new(rx))
    }

    async fn query_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolSchema],
        tool_executor: &dyn ToolExecutor,
        max_tool_calls: u32,
        timeout_secs: u64,
    ) -> Result<Response, GatewayError> {
        // Mirrors HttpGatewayClient::query_with_tools's own loop (range
        // 0..max_tool_calls) against the scripted queue, so a test can queue
        // one outcome with `tool_calls_made` set and a follow-up outcome for
        // the re-query after tool execution, exercising the real loop shape.
        let mut working_messages = messages.to_vec();
        let mut last_response = self.query(model, &working_messages, Some(tools), timeout_secs).await?;
        let mut tool_calls_made = Vec::new();

        for _ in 0..max_tool_calls {
            if last_response.tool_calls_made.is_empty() {
                break;
            }

            let mut assistant_msg = Message::assistant(last_response.content.clone());
            assistant_msg.tool_calls = last_response.tool_calls_made.clone();
            working_messages.push(assistant_msg);

            for tc in &last_response.tool_calls_made {
                let result = tool_executor.execute(&tc.name, &tc.arguments_json).await;
                working_messages.push(Message::tool(tc.id.clone(), result));
            }
            tool_calls_made.extend(last_response.tool_calls_made.clone());

            last_response = self.query(model, &working_messages, Some(tools), timeout_secs).await?;
        }

        last_response.tool_calls_made = tool_calls_made;
        Ok(last_response)
    }
}

/// A `ToolExecutor` that always returns a fixed canned result, recording
/// every call it receives for assertions.
pub struct RecordingToolExecutor {
    pub result: String,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl RecordingToolExecutor {
    pub fn new(result: impl Into<String>) -> Self {
        Self { result: result.into(), calls: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl ToolExecutor for RecordingToolExecutor {
    async fn execute(&self, name: &str, arguments_json: &str) -> String {
        self.calls.lock().unwrap().push((name.to_string(), arguments_json.to_string()));
        self.result.clone()
    }

    fn schemas(&self) -> Vec<ToolSchema> {
        vec![ToolSchema {
            name: "search_web".to_string(),
            description: "search".to_string(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }]
    }
}

pub fn tool_call(id: &str, name: &str, arguments_json: &str) -> ToolCall {
    ToolCall { id: id.to_string(), name: name.to_string(), arguments_json: arguments_json.to_string() }
}
