//! The LLM Gateway Client: non-streaming, streaming, and streaming-with-tools
//! request/response cycles against a chat-completions endpoint (§4.1).
//!
//! [`GatewayClient`] is the one seam every round executor and agent loop
//! talks through; [`http`] provides the concrete adapter used in production,
//! built directly on `reqwest` with a hand-rolled SSE reader for the
//! tool-call fragment merging §6 requires.

pub mod http;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::Stream;

use crate::error::GatewayError;
use crate::model::{Message, Response, ToolCall, ToolSchema};
use crate::tools::ToolExecutor;

/// One increment of a streaming gateway call (§4.1).
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Token {
        content: String,
    },
    ToolCall {
        id: Option<String>,
        index: u32,
        name: Option<String>,
        arguments_fragment: String,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
    },
    Done {
        content: String,
        tool_calls_made: Vec<ToolCall>,
    },
    Error {
        message: String,
    },
}

/// A lazy sequence of [`GatewayEvent`]s, one terminal `Done` or `Error` guaranteed (§4.1).
pub type GatewayEventStream = Pin<Box<dyn Stream<Item = GatewayEvent> + Send>>;

/// Uniform interface to an OpenAI-compatible chat-completions endpoint.
///
/// Implementations must be `Send + Sync` so a single client can be shared
/// across the concurrent tasks a batch-parallel round spawns.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// A full request/response call. `tools`, when non-empty, is forwarded
    /// to the provider's function-calling API but tool calls are returned
    /// unexecuted in [`Response::tool_calls_made`] — callers that want the
    /// loop executed for them should use [`GatewayClient::query_with_tools`].
    async fn query(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        timeout_secs: u64,
    ) -> Result<Response, GatewayError>;

    /// A streaming request/response call yielding token and tool-call deltas.
    fn stream(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        timeout_secs: u64,
    ) -> GatewayEventStream;

    /// Runs the non-streaming tool loop internally (§4.1 "Tool loop"):
    /// send, execute any requested tool calls through `tool_executor`,
    /// append results, and resend until the assistant stops requesting
    /// tools or `max_tool_calls` iterations have elapsed.
    async fn query_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolSchema],
        tool_executor: &dyn ToolExecutor,
        max_tool_calls: u32,
        timeout_secs: u64,
    ) -> Result<Response, GatewayError>;
}
