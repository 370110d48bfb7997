//! Reflection Synthesizer (§4.9): the chairman makes one streaming call over
//! the full transcript and its reply is split into a reasoning trace and a
//! final answer at the `## Synthesis` boundary.
//!
//! Forwards each token as it arrives while accumulating the full reply,
//! the same streaming-accumulation shape the gateway adapter itself uses.

use futures_util::StreamExt;

use crate::error::GatewayError;
use crate::events::{emit, Event, EventSink};
use crate::gateway::{GatewayClient, GatewayEvent};
use crate::model::{ParticipantId, Response};
use crate::parsers::parse_reflection_split;
use crate::prompts::{self, TranscriptEntry};

/// Run the chairman's single reflection pass over `transcript` and emit
/// `reflection` then `synthesis` (§4.9, §8 B4/S6).
///
/// No tools are offered to the chairman for this call (§4.9).
pub async fn run_reflection(
    chairman: &ParticipantId,
    question: &str,
    transcript: &[TranscriptEntry<'_>],
    gateway: &dyn GatewayClient,
    timeout_secs: u64,
    sink: &EventSink,
) -> Result<Response, GatewayError> {
    let messages = prompts::build_reflection(question, transcript);

    let mut stream = gateway.stream(chairman, &messages, None, timeout_secs);
    let mut content = String::new();

    while let Some(event) = stream.next().await {
        match event {
            GatewayEvent::Token { content: piece } => {
                content.push_str(&piece);
                emit(sink, Event::Token { model: Some(chairman.clone()), content: piece });
            }
            GatewayEvent::Done { content: full, .. } => {
                if !full.is_empty() {
                    content = full;
                }
            }
            GatewayEvent::Error { message } => return Err(GatewayError::Transport(message)),
            GatewayEvent::ToolCall { .. } | GatewayEvent::ToolResult { .. } => {}
        }
    }

    let (reflection, synthesis) = parse_reflection_split(&content);
    emit(sink, Event::Reflection { text: reflection });
    emit(sink, Event::Synthesis { model: chairman.clone(), text: synthesis.clone() });

    Ok(Response::new(chairman.clone(), synthesis))
}
