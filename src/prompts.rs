//! Prompt Builders (§4.3): one deterministic, pure function per phase.
//!
//! Every builder takes only its phase-relevant inputs and returns a
//! `Vec<Message>` ready to hand to [`crate::gateway::GatewayClient`].
//! Purity is required for testability (§8 R2): calling a builder twice with
//! identical inputs must produce identical output, so none of these touch
//! the clock, RNG, or any shared state.

use chrono::NaiveDate;

use crate::model::{Label, Message, ParticipantId, Response};

/// Question-only prompt for the initial round, oriented with the current
/// calendar date so time-sensitive searches have a reference point (§4.3).
pub fn build_initial(question: &str, today: NaiveDate) -> Vec<Message> {
    let system = format!(
        "Today's date is {}. You are one participant in a panel of independent models \
         deliberating on a single question. The `search_web` tool is available if you need \
         up-to-date information. Answer the question as completely as you can.",
        today.format("%Y-%m-%d")
    );
    vec![Message::system(system), Message::user(question.to_string())]
}

/// Critique prompt: question plus every other participant's initial response,
/// requiring one `## Critique of <ParticipantId>` header per other participant (§4.3).
pub fn build_critique(question: &str, self_id: &ParticipantId, initial_responses: &[Response]) -> Vec<Message> {
    let others: Vec<&Response> = initial_responses
        .iter()
        .filter(|r| &r.model != self_id)
        .collect();

    let mut body = format!(
        "Question:\n{}\n\nHere are the responses from the other participants. For each one, \
         write a section headed exactly `## Critique of <ParticipantId>` (using their id as \
         written below) evaluating correctness, completeness, and clarity. Do not critique \
         yourself.\n\n",
        question
    );
    for r in &others {
        body.push_str(&format!("### Response from {}\n{}\n\n", r.model, r.content));
    }

    vec![
        Message::system(
            "You are one participant in a panel. Write one `## Critique of <ParticipantId>` \
             section per other participant."
                .to_string(),
        ),
        Message::user(body),
    ]
}

/// Defense prompt: question + the participant's own initial response + the
/// concatenation of critiques targeting it, requiring `## Addressing
/// Critiques` and `## Revised Response` sections (§4.3).
pub fn build_defense(question: &str, own_initial: &str, critiques_of_self: &str) -> Vec<Message> {
    let body = format!(
        "Question:\n{}\n\nYour initial response:\n{}\n\nCritiques you received:\n{}\n\n\
         Write a `## Addressing Critiques` section responding to each critique, then a \
         `## Revised Response` section with your complete, final answer.",
        question, own_initial, critiques_of_self
    );
    vec![
        Message::system(
            "You are revising your answer in light of peer critiques.".to_string(),
        ),
        Message::user(body),
    ]
}

/// Peer-rank prompt: question + anonymized responses labeled `Response A`,
/// `Response B`, ... in submission order, requiring a `FINAL RANKING:` block (§4.3).
pub fn build_peer_rank(question: &str, labeled_responses: &[(Label, &str)]) -> Vec<Message> {
    let mut body = format!(
        "Question:\n{}\n\nHere are anonymized responses from a panel of models. Rank them from \
         best to worst.\n\n",
        question
    );
    for (label, content) in labeled_responses {
        body.push_str(&format!("Response {}:\n{}\n\n", label, content));
    }
    body.push_str(
        "End your reply with a line `FINAL RANKING:` followed by a numbered list in the form \
         `1. Response X`, one per response, best first, with no trailing commentary after the \
         list.",
    );

    vec![
        Message::system("You are ranking anonymized peer responses.".to_string()),
        Message::user(body),
    ]
}

/// A transcript entry the reflection prompt embeds verbatim.
pub struct TranscriptEntry<'a> {
    pub label: String,
    pub content: &'a str,
}

/// Reflection prompt: question + full transcript, instructing the chairman
/// to analyze agreement/disagreement/claims/quality then emit `## Synthesis`
/// followed by the final answer. No tools offered (§4.3, §4.9).
pub fn build_reflection(question: &str, transcript: &[TranscriptEntry<'_>]) -> Vec<Message> {
    let mut body = format!("Question:\n{}\n\nFull transcript:\n\n", question);
    for entry in transcript {
        body.push_str(&format!("--- {} ---\n{}\n\n", entry.label, entry.content));
    }
    body.push_str(
        "Analyze where the participants agree, where they disagree, which factual claims are \
         worth scrutiny, and how the responses differ in quality. Then write a line containing \
         exactly `## Synthesis` followed by your final answer to the question.",
    );

    vec![
        Message::system(
            "You are the chairman producing the final synthesis of a panel deliberation."
                .to_string(),
        ),
        Message::user(body),
    ]
}

/// Prepend the Thought/Action/Observation protocol description to any
/// prompt's first user message, declaring `search_web("...")` and
/// `respond()` and capping the iteration count (§4.3, §4.6).
pub fn wrap_react(mut messages: Vec<Message>, max_iterations: u32) -> Vec<Message> {
    let preamble = format!(
        "You may reason step by step using this protocol, for at most {} iterations:\n\
         Thought: <your reasoning>\n\
         Action: search_web(\"<query>\") | respond()\n\
         If you choose search_web, you will receive an Observation with the results and may \
         continue. When you are ready to give your final answer, choose respond() and then \
         write your answer.",
        max_iterations
    );
    messages.insert(0, Message::system(preamble));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_are_pure() {
        let date = NaiveDate::from_ymd_opt(2026, 7, 28).unwrap();
        assert_eq!(
            serde_json::to_string(&build_initial("q", date)).unwrap(),
            serde_json::to_string(&build_initial("q", date)).unwrap()
        );
    }

    #[test]
    fn critique_skips_self() {
        let responses = vec![
            Response::new("p1", "a1"),
            Response::new("p2", "a2"),
        ];
        let msgs = build_critique("q", &"p1".to_string(), &responses);
        let body = &msgs[1].content;
        assert!(!body.contains("Response from p1"));
        assert!(body.contains("Response from p2"));
    }
}
