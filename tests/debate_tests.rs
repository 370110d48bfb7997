//! Integration test for the debate orchestrator's fixed round sequence (S2).

mod common;

use std::sync::Arc;

use chrono::NaiveDate;
use common::{QueryOutcome, RecordingToolExecutor, ScriptedGateway};
use deliberate::config::RunConfig;
use deliberate::debate::run_debate;
use deliberate::model::Response;
use deliberate::rounds::BatchParallelExecutor;
use deliberate::tools::ToolExecutor;
use deliberate::Event;
use futures_util::StreamExt;

fn queue_round(gateway: &ScriptedGateway, participants: &[&str], content_for: impl Fn(&str) -> String) {
    for p in participants {
        gateway.queue_query(p, QueryOutcome::Ok(Response::new(p.to_string(), content_for(p))));
    }
}

#[tokio::test]
async fn s2_one_cycle_all_rounds_succeed() {
    let participants: Vec<String> = vec!["p1".to_string(), "p2".to_string(), "p3".to_string()];
    let gateway = Arc::new(ScriptedGateway::new());
    let names: Vec<&str> = participants.iter().map(|s| s.as_str()).collect();

    queue_round(&gateway, &names, |p| format!("initial answer from {}", p));
    queue_round(&gateway, &names, |p| format!("## Critique of p1\nnice\n## Critique of p2\nok\n## Critique of p3\ngood (from {})", p));
    queue_round(&gateway, &names, |p| format!("## Addressing Critiques\nnoted\n## Revised Response\nfinal answer from {}", p));

    let tool_executor: Arc<dyn ToolExecutor> = Arc::new(RecordingToolExecutor::new("unused"));
    let run_config = RunConfig::new(participants.clone(), "p1".to_string());
    let executor = BatchParallelExecutor;
    let (sink, mut stream) = deliberate::events::channel();

    let today = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
    let gateway_dyn: Arc<dyn deliberate::gateway::GatewayClient> = gateway.clone();

    let handle = tokio::spawn(async move {
        run_debate(
            "What is the best approach?",
            &participants,
            &executor,
            gateway_dyn,
            tool_executor,
            &[],
            &run_config,
            today,
            &sink,
        )
        .await
    });

    let mut round_completes = Vec::new();
    let mut debate_complete_rounds = None;
    while let Some(event) = stream.next().await {
        match event {
            Event::RoundComplete { round_number, responses, .. } => {
                round_completes.push((round_number, responses.len()));
            }
            Event::DebateComplete { rounds } => {
                debate_complete_rounds = Some(rounds);
            }
            _ => {}
        }
    }

    let rounds = handle.await.unwrap().unwrap();
    assert_eq!(rounds.len(), 3);
    assert_eq!(rounds[0].round_number, 1);
    assert_eq!(rounds[1].round_number, 2);
    assert_eq!(rounds[2].round_number, 3);

    assert_eq!(round_completes.len(), 3);
    assert!(round_completes.iter().all(|(_, n)| *n == 3));

    let defense = &rounds[2];
    for response in &defense.responses {
        let revised = response.revised_answer.as_ref().expect("defense round sets revised_answer");
        assert!(revised.starts_with("final answer from"));
    }

    assert_eq!(debate_complete_rounds.unwrap().len(), 3);
}
