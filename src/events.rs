//! The single public output of a deliberation run: a lazy stream of typed events.
//!
//! No callbacks, no observer trait, no global signal — every producer (round
//! executors, the agent loop, the debate orchestrator, the reflection
//! synthesizer) writes into an internal `mpsc` channel and the run's entry
//! point wraps the receiver half as a [`Stream`] the caller can drain at its
//! own pace. The channel is unbounded: emitting an event never suspends, so
//! producers never block on a slow or absent consumer.

use std::pin::Pin;

use futures_util::stream::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::model::{ParticipantId, Response, RoundRecord, RoundType, ToolCall};

/// One step of the deliberation trace. Consumers must be total over this
/// variant set; new variants may only be added additively (§6).
#[derive(Debug, Clone)]
pub enum Event {
    RoundStart {
        round_number: u32,
        round_type: RoundType,
    },
    RoundComplete {
        round_number: u32,
        round_type: RoundType,
        responses: Vec<Response>,
    },
    ModelStart {
        model: ParticipantId,
    },
    ModelComplete {
        model: ParticipantId,
        response: Response,
    },
    ModelError {
        model: ParticipantId,
        reason: String,
    },
    Token {
        model: Option<ParticipantId>,
        content: String,
    },
    ToolCallEvent {
        model: Option<ParticipantId>,
        name: String,
        args: String,
    },
    ToolResultEvent {
        model: Option<ParticipantId>,
        name: String,
        result: String,
    },
    Thought {
        model: ParticipantId,
        text: String,
    },
    Action {
        model: ParticipantId,
        name: String,
        arg: Option<String>,
    },
    Observation {
        model: ParticipantId,
        text: String,
    },
    Reflection {
        text: String,
    },
    Synthesis {
        model: ParticipantId,
        text: String,
    },
    DebateComplete {
        rounds: Vec<RoundRecord>,
    },
    Error {
        message: String,
    },
}

/// A lazy sequence of [`Event`]s. The sole output of every entrypoint in this crate.
pub type EventStream = Pin<Box<dyn Stream<Item = Event> + Send>>;

/// The sending half handed to producers (executors, agent loops, the synthesizer).
///
/// Unbounded so that emitting an event never suspends a producer waiting on a
/// slow consumer; the run's entrypoint owns the matching receiver and exposes
/// it to the caller as an [`EventStream`].
pub type EventSink = mpsc::UnboundedSender<Event>;

/// Create a fresh channel pair: an [`EventSink`] for producers and the
/// [`EventStream`] to hand back to the caller.
pub fn channel() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Box::pin(UnboundedReceiverStream::new(rx)))
}

/// Send an event, discarding the error produced when the consumer has already
/// dropped the stream (mirrors the `let _ = tx.send(...)` idiom used for
/// best-effort event forwarding).
pub fn emit(sink: &EventSink, event: Event) {
    let _ = sink.send(event);
}
