//! Per-run configuration surface (§6).
//!
//! Users construct this manually — no file parsing dependencies are
//! introduced here. Reading it from YAML, environment variables, or a CLI
//! flag set is an adapter concern.
//!
//! # Example
//!
//! ```rust
//! use deliberate::config::RunConfig;
//!
//! let config = RunConfig::new(
//!     vec!["gpt-4.1".to_string(), "claude-3".to_string()],
//!     "gpt-4.1".to_string(),
//! );
//! assert_eq!(config.cycles, 1);
//! ```

use crate::model::ParticipantId;

/// Per-call tool-call iteration caps for the two gateway tool loops (§4.1, §6).
#[derive(Debug, Clone, Copy)]
pub struct MaxToolCalls {
    pub non_streaming: u32,
    pub streaming: u32,
}

impl Default for MaxToolCalls {
    fn default() -> Self {
        Self {
            non_streaming: 5,
            streaming: 5,
        }
    }
}

/// Read-only, per-run configuration (§6 "Configuration surface the core expects").
///
/// Environment concerns — API base URLs, credentials, connection pooling —
/// are adapter properties and live on the concrete [`crate::gateway::GatewayClient`]
/// implementation, not here.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// The fixed panel for this run. Must contain at least 2 participants.
    pub participants: Vec<ParticipantId>,
    /// The model that produces the final synthesis; need not be a panel member.
    pub chairman: ParticipantId,
    /// Whether ReAct-enabled rounds use the agent loop instead of native tool calling.
    pub use_react: bool,
    /// Critique-defense pairs after the initial round. Must be `>= 1`.
    pub cycles: u32,
    /// Wall-clock timeout applied independently to each participant request.
    pub per_participant_timeout_secs: u64,
    pub max_tool_calls: MaxToolCalls,
}

/// Default per-participant timeout, matching the 120 second default of §5.
pub const DEFAULT_PER_PARTICIPANT_TIMEOUT_SECS: u64 = 120;

impl RunConfig {
    /// Build a config with the mandated defaults: batch-parallel-friendly
    /// `cycles = 1`, ReAct off, a 120s timeout (§9 REDESIGN FLAGS).
    pub fn new(participants: Vec<ParticipantId>, chairman: ParticipantId) -> Self {
        Self {
            participants,
            chairman,
            use_react: false,
            cycles: 1,
            per_participant_timeout_secs: DEFAULT_PER_PARTICIPANT_TIMEOUT_SECS,
            max_tool_calls: MaxToolCalls::default(),
        }
    }

    pub fn with_cycles(mut self, cycles: u32) -> Self {
        self.cycles = cycles;
        self
    }

    pub fn with_react(mut self, use_react: bool) -> Self {
        self.use_react = use_react;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.per_participant_timeout_secs = secs;
        self
    }

    /// Validate the invariants §6/§9 place on this surface: `participants.len() >= 2`
    /// and `cycles >= 1`. Returns a description of the first violation found.
    pub fn validate(&self) -> Result<(), String> {
        if self.participants.len() < 2 {
            return Err("participants must contain at least 2 entries".to_string());
        }
        if self.cycles < 1 {
            return Err("cycles must be >= 1".to_string());
        }
        if self.max_tool_calls.non_streaming < 1 || self.max_tool_calls.streaming < 1 {
            return Err("max_tool_calls must be >= 1 for both loop forms".to_string());
        }
        Ok(())
    }
}
