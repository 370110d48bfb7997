//! Debate Orchestrator (§4.8): the single definition of the round sequence
//! (initial -> N x (critique, defense)), delegating round execution to
//! whichever [`ExecuteRound`] strategy the caller wired in.
//!
//! Runs a fixed number of cycles and always ends on defense; there is no
//! convergence-based early exit.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::config::RunConfig;
use crate::error::DeliberationError;
use crate::events::{emit, Event, EventSink};
use crate::gateway::GatewayClient;
use crate::model::{ParticipantId, RoundRecord, RoundType, ToolSchema};
use crate::rounds::{ExecuteRound, RoundContext, RoundParams};
use crate::tools::ToolExecutor;

/// Fewer than 2 successes in an initial or defense round aborts the run (§7 `QuorumError`).
fn check_quorum(record: &RoundRecord) -> Result<(), DeliberationError> {
    let quorum_applies = matches!(record.round_type, RoundType::Initial | RoundType::Defense);
    if quorum_applies && record.responses.len() < 2 {
        Err(DeliberationError::QuorumLost)
    } else {
        Ok(())
    }
}

/// Run the fixed debate sequence and return the completed rounds, or abort
/// with [`DeliberationError::QuorumLost`] (§4.8, §7, §8 P7/B1).
///
/// `run_config.cycles` must already be `>= 1` ([`RunConfig::validate`]);
/// `cycles = 1` yields exactly `{initial, critique, defense}` and every
/// cycle count always terminates on a defense round (I7).
pub async fn run_debate(
    query: &str,
    participants: &[ParticipantId],
    executor: &dyn ExecuteRound,
    gateway: Arc<dyn GatewayClient>,
    tool_executor: Arc<dyn ToolExecutor>,
    tool_schemas: &[ToolSchema],
    run_config: &RunConfig,
    today: NaiveDate,
    sink: &EventSink,
) -> Result<Vec<RoundRecord>, DeliberationError> {
    if let Err(msg) = run_config.validate() {
        let err = DeliberationError::InvalidConfig(msg);
        emit(sink, Event::Error { message: err.to_string() });
        return Err(err);
    }

    let mut rounds = Vec::new();

    emit(sink, Event::RoundStart { round_number: 1, round_type: RoundType::Initial });
    let initial_record = executor
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

    if let Err(err) = check_quorum(&initial_record) {
        emit(sink, Event::Error { message: err.to_string() });
        return Err(err);
    }
    let initial_responses = initial_record.responses.clone();
    rounds.push(initial_record);

    for k in 1..=run_config.cycles {
        let critique_round_number = 2 * k;
        emit(sink, Event::RoundStart { round_number: critique_round_number, round_type: RoundType::Critique });
        let critique_record = executor
            .execute_round(
                RoundParams {
                    round_type: RoundType::Critique,
                    round_number: critique_round_number,
                    query,
                    context: RoundContext::Critique { initial_responses: initial_responses.clone() },
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
        let critique_responses = critique_record.responses.clone();
        rounds.push(critique_record);

        let defense_round_number = 2 * k + 1;
        emit(sink, Event::RoundStart { round_number: defense_round_number, round_type: RoundType::Defense });
        let defense_record = executor
            .execute_round(
                RoundParams {
                    round_type: RoundType::Defense,
                    round_number: defense_round_number,
                    query,
                    context: RoundContext::Defense {
                        initial_responses: initial_responses.clone(),
                        critique_responses,
                    },
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

        if let Err(err) = check_quorum(&defense_record) {
            emit(sink, Event::Error { message: err.to_string() });
            return Err(err);
        }
        rounds.push(defense_record);
    }

    emit(sink, Event::DebateComplete { rounds: rounds.clone() });
    Ok(rounds)
}
