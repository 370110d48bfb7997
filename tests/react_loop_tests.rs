//! Integration test: `react_enabled: true` actually routes through the
//! Thought/Action/Observation loop, and the model is told the protocol
//! (via `prompts::wrap_react`) before the first call.

mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use common::{RecordingToolExecutor, ScriptedGateway};
use deliberate::config::RunConfig;
use deliberate::gateway::GatewayEvent;
use deliberate::model::{Role, RoundType};
use deliberate::rounds::{BatchParallelExecutor, ExecuteRound, RoundContext, RoundParams};
use deliberate::tools::ToolExecutor;
use deliberate::Event;
use futures_util::StreamExt;

#[tokio::test]
async fn react_enabled_round_wraps_prompt_and_runs_loop() {
    let participants: Vec<String> = vec!["p1".to_string()];
    let gateway = Arc::new(ScriptedGateway::new());

    gateway.queue_stream(
        "p1",
        vec![GatewayEvent::Done {
            content: "Thought: I need current data.\nAction: search_web(\"foo\")".to_string(),
            tool_calls_made: Vec::new(),
        }],
    );
    gateway.queue_stream(
        "p1",
        vec![GatewayEvent::Done {
            content: "Thought: I have enough now.\nAction: respond()\nThe final answer about foo.".to_string(),
            tool_calls_made: Vec::new(),
        }],
    );

    let tool_executor = Arc::new(RecordingToolExecutor::new("mock search result"));
    let tool_executor_dyn: Arc<dyn ToolExecutor> = tool_executor.clone();
    let run_config = RunConfig::new(vec!["p1".to_string(), "p2".to_string()], "p1".to_string());
    let executor = BatchParallelExecutor;
    let (sink, mut stream) = deliberate::events::channel();
    let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
    let gateway_dyn: Arc<dyn deliberate::gateway::GatewayClient> = gateway.clone();

    let handle = tokio::spawn(async move {
        executor
            .execute_round(
                RoundParams {
                    round_type: RoundType::Initial,
                    round_number: 1,
                    query: "what about foo?",
                    context: RoundContext::Initial,
                    participants: &participants,
                    react_enabled: true,
                    today,
                },
                gateway_dyn,
                tool_executor_dyn,
                &[],
                &run_config,
                &sink,
            )
            .await
    });

    let mut thoughts = Vec::new();
    let mut actions = Vec::new();
    while let Some(event) = stream.next().await {
        match event {
            Event::Thought { text, .. } => thoughts.push(text),
            Event::Action { name, .. } => actions.push(name),
            _ => {}
        }
    }

    let record = handle.await.unwrap();
    assert_eq!(record.responses.len(), 1);
    let response = &record.responses[0];
    assert!(response.content.contains("The final answer about foo."));
    assert_eq!(response.tool_calls_made.len(), 1);
    assert_eq!(response.tool_calls_made[0].name, "search_web");

    assert_eq!(thoughts.len(), 2);
    assert_eq!(actions, vec!["search_web".to_string(), "respond".to_string()]);
    assert_eq!(tool_executor.calls.lock().unwrap().len(), 1);

    let calls = gateway.stream_calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    let first_call_messages = &calls[0].1;
    assert_eq!(first_call_messages[0].role, Role::System);
    assert!(first_call_messages[0].content.contains("Thought: <your reasoning>"));
    assert!(first_call_messages[0].content.contains("search_web(\"<query>\")"));
}
