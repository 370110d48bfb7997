//! Ranking Pipeline (§4.10): stage1 initial answers, anonymization, stage2
//! peer ranking, aggregation, and reflection synthesis.
//!
//! Grounded on [`crate::rounds`] for stage1 (it is exactly one initial round)
//! and [`crate::aggregate`] for the aggregation step; stage2 has no
//! equivalent in the debate protocol and is built directly against
//! [`crate::gateway::GatewayClient::query`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use futures_util::stream::{FuturesUnordered, StreamExt};

use crate::config::RunConfig;
use crate::error::DeliberationError;
use crate::events::{emit, Event, EventSink};
use crate::gateway::GatewayClient;
use crate::model::{
    AggregateEntry, Label, ParticipantId, RankingRecord, RankingRunResult, Response, RoundType,
    ToolSchema,
};
use crate::prompts::{self, TranscriptEntry};
use crate::rounds::{ExecuteRound, RoundContext, RoundParams};
use crate::synthesize;
use crate::tools::ToolExecutor;

/// Assign labels `A, B, C, ...` in `participants` submission order, not the
/// order `responses` happen to be in (batch-parallel completion order would
/// otherwise leak race timing into the labeling, violating I3's "prefix of
/// the alphabet in submission order"). Participants absent from `responses`
/// (e.g. timed out in stage1) are skipped, leaving no gap in the label run.
fn anonymize(participants: &[ParticipantId], responses: &[Response]) -> BTreeMap<Label, ParticipantId> {
    participants
        .iter()
        .filter(|p| responses.iter().any(|r| &r.model == *p))
        .enumerate()
        .map(|(idx, p)| {
            let label = (b'A' + idx as u8) as char;
            (label, p.clone())
        })
        .collect()
}

fn labeled_content<'a>(
    responses: &'a [Response],
    label_to_model: &BTreeMap<Label, ParticipantId>,
) -> Vec<(Label, &'a str)> {
    label_to_model
        .iter()
        .filter_map(|(label, model)| {
            responses
                .iter()
                .find(|r| &r.model == model)
                .map(|r| (*label, r.content.as_str()))
        })
        .collect()
}

/// Run the full ranking protocol end to end, returning the terminal
/// [`RankingRunResult`] (§4.10).
///
/// Aborts with [`DeliberationError::QuorumLost`] if stage1 collects fewer
/// than 2 responses, before any synthesis call is made.
pub async fn run_ranking(
    query: &str,
    participants: &[ParticipantId],
    chairman: &ParticipantId,
    stage1_executor: &dyn ExecuteRound,
    gateway: Arc<dyn GatewayClient>,
    tool_executor: Arc<dyn ToolExecutor>,
    tool_schemas: &[ToolSchema],
    run_config: &RunConfig,
    today: NaiveDate,
    sink: &EventSink,
) -> Result<RankingRunResult, DeliberationError> {
    if let Err(msg) = run_config.validate() {
        let err = DeliberationError::InvalidConfig(msg);
        emit(sink, Event::Error { message: err.to_string() });
        return Err(err);
    }

    // Stage 1: one initial round, exactly as in the debate protocol.
    emit(sink, Event::RoundStart { round_number: 1, round_type: RoundType::Initial });
    let stage1_record = stage1_executor
        .execute_round(
            RoundParams {
                round_type: RoundType::Initial,
                round_number: 1,
                query,
                context: RoundContext::Initial,
                participants,
                react_enabled: run_config.use_react,
                today,
            },
            Arc::clone(&gateway),
            Arc::clone(&tool_executor),
            tool_schemas,
            run_config,
            sink,
        )
        .await;

    if stage1_record.responses.len() < 2 {
        emit(sink, Event::Error { message: DeliberationError::QuorumLost.to_string() });
        return Err(DeliberationError::QuorumLost);
    }

    let stage1 = stage1_record.responses;
    let label_to_model = anonymize(participants, &stage1);
    let labeled = labeled_content(&stage1, &label_to_model);

    // Stage 2: every original participant peer-ranks the anonymized set,
    // concurrently and independently (self-ranking is permitted, §4.10).
    let timeout_secs = run_config.per_participant_timeout_secs;
    let mut tasks = FuturesUnordered::new();
    for participant in participants {
        emit(sink, Event::ModelStart { model: participant.clone() });
        let messages = prompts::build_peer_rank(query, &labeled);
        let participant = participant.clone();
        let gateway = Arc::clone(&gateway);
        tasks.push(tokio::spawn(async move {
            let result = tokio::time::timeout(
                std::time::Duration::from_secs(timeout_secs),
                gateway.query(&participant, &messages, None, timeout_secs),
            )
            .await;
            (participant, result)
        }));
    }

    let mut stage2 = Vec::new();
    while let Some(joined) = tasks.next().await {
        let (participant, result) = match joined {
            Ok(pair) => pair,
            Err(join_err) => {
                log::error!("ranking::stage2: participant task panicked: {}", join_err);
                continue;
            }
        };
        match result {
            Ok(Ok(response)) => {
                let parsed_order = crate::parsers::parse_ranking(&response.content);
                emit(
                    sink,
                    Event::ModelComplete { model: participant.clone(), response: response.clone() },
                );
                stage2.push(RankingRecord {
                    model: participant,
                    evaluation_text: response.content,
                    parsed_order,
                });
            }
            Ok(Err(gateway_err)) => {
                emit(
                    sink,
                    Event::ModelError { model: participant, reason: gateway_err.as_model_error_reason() },
                );
            }
            Err(_) => {
                emit(
                    sink,
                    Event::ModelError { model: participant, reason: format!("timeout after {}s", timeout_secs) },
                );
            }
        }
    }

    let aggregate: Vec<AggregateEntry> = crate::aggregate::aggregate(&stage2, &label_to_model);

    // Synthesis: the chairman reflects over the labeled responses, the peer
    // rankings, and the aggregate, then produces the final answer.
    let mut transcript = Vec::new();
    let stage1_text = labeled
        .iter()
        .map(|(label, content)| format!("Response {}:\n{}", label, content))
        .collect::<Vec<_>>()
        .join("\n\n");
    transcript.push(TranscriptEntry { label: "Initial responses".to_string(), content: &stage1_text });

    let stage2_text = stage2
        .iter()
        .map(|r| format!("{}'s ranking:\n{}", r.model, r.evaluation_text))
        .collect::<Vec<_>>()
        .join("\n\n");
    transcript.push(TranscriptEntry { label: "Peer rankings".to_string(), content: &stage2_text });

    let aggregate_text = aggregate
        .iter()
        .map(|e| format!("{}: mean position {:.2} over {} votes", e.model, e.mean_position, e.vote_count))
        .collect::<Vec<_>>()
        .join("\n");
    transcript.push(TranscriptEntry { label: "Aggregate".to_string(), content: &aggregate_text });

    let synthesis = synthesize::run_reflection(chairman, query, &transcript, gateway.as_ref(), timeout_secs, sink)
        .await
        .map_err(|e| DeliberationError::SynthesisFailed(e.to_string()));

    let synthesis = match synthesis {
        Ok(synthesis) => synthesis,
        Err(err) => {
            emit(sink, Event::Error { message: err.to_string() });
            return Err(err);
        }
    };

    Ok(RankingRunResult { stage1, stage2, synthesis, label_to_model, aggregate })
}
