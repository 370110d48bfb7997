//! Integration test: a batch-parallel Initial round drives the real
//! multi-turn native tool-call loop in `GatewayClient::query_with_tools`,
//! not just a single scripted call.

mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use common::{tool_call, QueryOutcome, RecordingToolExecutor, ScriptedGateway};
use deliberate::config::RunConfig;
use deliberate::model::{Response, RoundType};
use deliberate::rounds::{BatchParallelExecutor, ExecuteRound, RoundContext, RoundParams};
use deliberate::tools::ToolExecutor;

#[tokio::test]
async fn native_tool_loop_executes_call_then_requeries() {
    let participants: Vec<String> = vec!["p1".to_string(), "p2".to_string()];
    let gateway = Arc::new(ScriptedGateway::new());

    let mut first = Response::new("p1", "Let me check that.");
    first.tool_calls_made = vec![tool_call("call1", "search_web", "{\"query\":\"foo\"}")];
    gateway.queue_query("p1", QueryOutcome::Ok(first));
    gateway.queue_query("p1", QueryOutcome::Ok(Response::new("p1", "final answer from p1")));
    gateway.queue_query("p2", QueryOutcome::Ok(Response::new("p2", "plain answer from p2")));

    let tool_executor = Arc::new(RecordingToolExecutor::new("mock search result"));
    let tool_executor_dyn: Arc<dyn ToolExecutor> = tool_executor.clone();
    let run_config = RunConfig::new(participants.clone(), "p1".to_string());
    let executor = BatchParallelExecutor;
    let (sink, _stream) = deliberate::events::channel();
    let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
    let gateway_dyn: Arc<dyn deliberate::gateway::GatewayClient> = gateway;

    let record = executor
        .execute_round(
            RoundParams {
                round_type: RoundType::Initial,
                round_number: 1,
                query: "what is foo?",
                context: RoundContext::Initial,
                participants: &participants,
                react_enabled: false,
                today,
            },
            gateway_dyn,
            tool_executor_dyn,
            &[],
            &run_config,
            &sink,
        )
        .await;

    assert_eq!(record.responses.len(), 2);
    let p1 = record.responses.iter().find(|r| r.model == "p1").expect("p1 responds");
    assert_eq!(p1.content, "final answer from p1");
    assert_eq!(p1.tool_calls_made.len(), 1);
    assert_eq!(p1.tool_calls_made[0].name, "search_web");

    assert_eq!(tool_executor.calls.lock().unwrap().len(), 1);
    assert_eq!(tool_executor.calls.lock().unwrap()[0].0, "search_web");
}
