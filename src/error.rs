//! Error taxonomy for the deliberation engine (see the error handling design).
//!
//! Two enums cover the whole surface: [`GatewayError`] for a single gateway
//! call, and [`DeliberationError`] for run-level failures that abort a round
//! sequence. Parser failures are deliberately absent here — every parser is
//! total and recovers locally via its documented fallback, so a parse
//! failure never becomes an `Err` anywhere in this crate.

use std::fmt;

/// Failure modes of a single call to a [`crate::gateway::GatewayClient`].
#[derive(Debug, Clone)]
pub enum GatewayError {
    /// Connection, transport, or non-2xx response from the gateway.
    Transport(String),
    /// The per-call wall-clock deadline elapsed before a response arrived.
    Timeout(u64),
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Transport(msg) => write!(f, "transport error: {}", msg),
            GatewayError::Timeout(secs) => write!(f, "timeout after {}s", secs),
        }
    }
}

impl std::error::Error for GatewayError {}

impl GatewayError {
    /// Render the way `model_error{reason}` expects it (§4.1, §7).
    pub fn as_model_error_reason(&self) -> String {
        match self {
            GatewayError::Transport(msg) => msg.clone(),
            GatewayError::Timeout(secs) => format!("timeout after {}s", secs),
        }
    }
}

/// Run-level failures that abort a debate or ranking run (§7).
#[derive(Debug, Clone)]
pub enum DeliberationError {
    /// `RunConfig::validate` rejected the configuration before any round ran.
    InvalidConfig(String),
    /// Fewer than 2 participants succeeded in an initial or defense round.
    QuorumLost,
    /// The synthesizer's gateway call failed.
    SynthesisFailed(String),
}

impl fmt::Display for DeliberationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliberationError::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            DeliberationError::QuorumLost => write!(f, "quorum lost"),
            DeliberationError::SynthesisFailed(msg) => write!(f, "synthesis failed: {}", msg),
        }
    }
}

impl std::error::Error for DeliberationError {}
