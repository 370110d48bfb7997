//! A deliberation engine: a fixed panel of independent chat-completion
//! endpoints works one question via either a debate protocol (initial
//! answers, then critique/defense cycles) or a ranking protocol (initial
//! answers, anonymized peer ranking, aggregation), ending in one
//! chairman-produced synthesis. The sole output of a run is a lazy
//! [`EventStream`]; the terminal [`RunResult`] is obtained separately from
//! the [`tokio::task::JoinHandle`] returned alongside it.

pub mod aggregate;
pub mod config;
pub mod debate;
pub mod error;
pub mod events;
pub mod gateway;
pub mod model;
pub mod parsers;
pub mod prompts;
pub mod ranking;
pub mod react;
pub mod rounds;
pub mod synthesize;
pub mod tools;

pub use config::RunConfig;
pub use error::{DeliberationError, GatewayError};
pub use events::{Event, EventStream};
pub use model::{DebateRunResult, ParticipantId, RankingRunResult, RoundRecord, RunResult};

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::task::JoinHandle;

use gateway::GatewayClient;
use model::ToolSchema;
use prompts::TranscriptEntry;
use rounds::ExecuteRound;
use tools::ToolExecutor;

/// Render every round's responses as one transcript section per round, for
/// the chairman's reflection pass (§4.8 -> §4.9 composition).
fn debate_transcript(rounds: &[RoundRecord]) -> Vec<(String, String)> {
    rounds
        .iter()
        .map(|round| {
            let label = format!("Round {} ({:?})", round.round_number, round.round_type);
            let body = round
                .responses
                .iter()
                .map(|r| format!("### {}\n{}", r.model, r.content))
                .collect::<Vec<_>>()
                .join("\n\n");
            (label, body)
        })
        .collect()
}

/// Run the full debate protocol: the fixed round sequence, then one
/// reflection-synthesis pass over the completed transcript.
///
/// Returns the [`EventStream`] immediately; the terminal [`RunResult`] (or a
/// [`DeliberationError`] if quorum was lost or synthesis failed) resolves on
/// the returned task handle once the run completes.
pub fn run_debate_deliberation(
    query: String,
    participants: Vec<ParticipantId>,
    chairman: ParticipantId,
    executor: Arc<dyn ExecuteRound>,
    gateway: Arc<dyn GatewayClient>,
    tool_executor: Arc<dyn ToolExecutor>,
    tool_schemas: Vec<ToolSchema>,
    run_config: RunConfig,
    today: NaiveDate,
) -> (EventStream, JoinHandle<Result<RunResult, DeliberationError>>) {
    let (sink, stream) = events::channel();

    let handle = tokio::spawn(async move {
        let rounds = debate::run_debate(
            &query,
            &participants,
            executor.as_ref(),
            Arc::clone(&gateway),
            Arc::clone(&tool_executor),
            &tool_schemas,
            &run_config,
            today,
            &sink,
        )
        .await?;

        let sections = debate_transcript(&rounds);
        let transcript: Vec<TranscriptEntry<'_>> = sections
            .iter()
            .map(|(label, content)| TranscriptEntry { label: label.clone(), content: content.as_str() })
            .collect();

        let synthesis = synthesize::run_reflection(
            &chairman,
            &query,
            &transcript,
            gateway.as_ref(),
            run_config.per_participant_timeout_secs,
            &sink,
        )
        .await
        .map_err(|e| DeliberationError::SynthesisFailed(e.to_string()));

        let synthesis = match synthesis {
            Ok(synthesis) => synthesis,
            Err(err) => {
                events::emit(&sink, Event::Error { message: err.to_string() });
                return Err(err);
            }
        };

        Ok(RunResult::Debate(DebateRunResult { rounds, synthesis }))
    });

    (stream, handle)
}

/// Run the full ranking protocol: one initial round, anonymized peer
/// ranking, aggregation, then one reflection-synthesis pass.
///
/// Returns the [`EventStream`] immediately; the terminal [`RunResult`] (or a
/// [`DeliberationError`] if quorum was lost or synthesis failed) resolves on
/// the returned task handle once the run completes.
pub fn run_ranking_deliberation(
    query: String,
    participants: Vec<ParticipantId>,
    chairman: ParticipantId,
    stage1_executor: Arc<dyn ExecuteRound>,
    gateway: Arc<dyn GatewayClient>,
    tool_executor: Arc<dyn ToolExecutor>,
    tool_schemas: Vec<ToolSchema>,
    run_config: RunConfig,
    today: NaiveDate,
) -> (EventStream, JoinHandle<Result<RunResult, DeliberationError>>) {
    let (sink, stream) = events::channel();

    let handle = tokio::spawn(async move {
        let result = ranking::run_ranking(
            &query,
            &participants,
            &chairman,
            stage1_executor.as_ref(),
            gateway,
            tool_executor,
            &tool_schemas,
            &run_config,
            today,
            &sink,
        )
        .await?;

        Ok(RunResult::Ranking(result))
    });

    (stream, handle)
}
