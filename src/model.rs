//! Data types shared by every stage of a deliberation run.
//!
//! These are plain value types: no behavior beyond construction and the
//! occasional derived comparison. The gateway, prompt builders, parsers and
//! orchestrators all speak in terms of the structs defined here.

use serde::{Deserialize, Serialize};

/// Opaque identifier naming a chat model on the gateway. Equality is by value.
pub type ParticipantId = String;

/// Which phase of the debate protocol a [`RoundRecord`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundType {
    Initial,
    Critique,
    Defense,
}

impl RoundType {
    /// Whether the gateway should expose the `search_web` tool for this round.
    pub fn uses_tools(self) -> bool {
        !matches!(self, RoundType::Critique)
    }

    /// Whether a ReAct-enabled run uses the agent loop for this round, when ReAct is on.
    pub fn uses_react(self) -> bool {
        !matches!(self, RoundType::Critique)
    }

    /// Whether responses in this round carry a `revised_answer`.
    pub fn has_revised_answer(self) -> bool {
        matches!(self, RoundType::Defense)
    }
}

/// A chat message role, mirroring the OpenAI chat-completions contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A declarative tool call requested by an assistant message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Arguments as a raw JSON-encoded string; may be assembled across streaming fragments.
    pub arguments_json: String,
}

/// A single chat message in the conversation passed to the gateway.
///
/// Insertion order is preserved by callers; the sequence handed to
/// [`crate::gateway::GatewayClient`] is always non-empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tool_calls: Vec<ToolCall>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.into());
        msg
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }
}

/// A declarative tool schema advertised to the gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// The result of executing a [`ToolCall`], bound back to its originating call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub name: String,
    pub content: String,
}

/// Billed token counts for one gateway call, when the adapter reports them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub total_tokens: usize,
}

/// The output of one participant for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub model: ParticipantId,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoned: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tool_calls_made: Vec<ToolCall>,
    /// Populated only for defense rounds; falls back to `content` when parsing fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl Response {
    pub fn new(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            content: content.into(),
            reasoned: None,
            tool_calls_made: Vec::new(),
            revised_answer: None,
            usage: None,
        }
    }
}

/// The complete set of responses collected for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round_number: u32,
    pub round_type: RoundType,
    /// Preserves arrival order: completion order in batch-parallel, submission order
    /// in sequential-streaming.
    pub responses: Vec<Response>,
}

/// A single letter identifying an anonymized response during peer ranking.
pub type Label = char;

/// One participant's peer-ranking evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingRecord {
    pub model: ParticipantId,
    pub evaluation_text: String,
    pub parsed_order: Vec<Label>,
}

/// One model's position in the aggregated peer ranking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregateEntry {
    pub model: ParticipantId,
    pub mean_position: f64,
    pub vote_count: u32,
}

/// Terminal value returned alongside the event stream of a ranking run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingRunResult {
    pub stage1: Vec<Response>,
    pub stage2: Vec<RankingRecord>,
    pub synthesis: Response,
    pub label_to_model: std::collections::BTreeMap<Label, ParticipantId>,
    pub aggregate: Vec<AggregateEntry>,
}

/// Terminal value returned alongside the event stream of a debate run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateRunResult {
    pub rounds: Vec<RoundRecord>,
    pub synthesis: Response,
}

/// Either shape of terminal run result, tagged for persistence (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RunResult {
    Ranking(RankingRunResult),
    Debate(DebateRunResult),
}
