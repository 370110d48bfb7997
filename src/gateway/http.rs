//! Concrete [`GatewayClient`] against an OpenAI-compatible chat-completions
//! endpoint, both non-streaming JSON and SSE streaming (§6).
//!
//! Request/response bodies are built and parsed by hand with `reqwest` +
//! `serde_json`: the native tool-calling loop and the `index`-keyed
//! streaming tool-call merge (§6) need direct control over both the
//! request shape and the SSE fragment stream.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::GatewayError;
use crate::model::{Message, Response, Role, ToolCall, ToolSchema};
use crate::tools::ToolExecutor;

use super::{GatewayClient, GatewayEvent, GatewayEventStream};

/// Gateway adapter speaking the OpenAI chat-completions wire format.
///
/// Holds its own tuned [`reqwest::Client`]; callers that want connection
/// pooling shared across many [`HttpGatewayClient`]s should construct one
/// `reqwest::Client` and pass it via [`HttpGatewayClient::with_http_client`].
pub struct HttpGatewayClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl HttpGatewayClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    fn wire_message(msg: &Message) -> serde_json::Value {
        match msg.role {
            Role::System => serde_json::json!({"role": "system", "content": msg.content}),
            Role::User => serde_json::json!({"role": "user", "content": msg.content}),
            Role::Tool => serde_json::json!({
                "role": "tool",
                "tool_call_id": msg.tool_call_id,
                "content": msg.content,
            }),
            Role::Assistant => {
                if msg.tool_calls.is_empty() {
                    serde_json::json!({"role": "assistant", "content": msg.content})
                } else {
                    let tool_calls: Vec<serde_json::Value> = msg
                        .tool_calls
                        .iter()
                        .map(|tc| {
                            serde_json::json!({
                                "id": tc.id,
                                "type": "function",
                                "function": {
                                    "name": tc.name,
                                    "arguments": tc.arguments_json,
                                }
                            })
                        })
                        .collect();
                    serde_json::json!({
                        "role": "assistant",
                        "content": serde_json::Value::Null,
                        "tool_calls": tool_calls,
                    })
                }
            }
        }
    }

    fn wire_tools(tools: Option<&[ToolSchema]>) -> Option<Vec<serde_json::Value>> {
        tools.map(|tools| {
            tools
                .iter()
                .map(|t| {
                    serde_json::json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect()
        })
    }

    fn request_body(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        stream: bool,
    ) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": model,
            "messages": messages.iter().map(Self::wire_message).collect::<Vec<_>>(),
            "stream": stream,
        });
        if let Some(wire_tools) = Self::wire_tools(tools) {
            body["tools"] = serde_json::Value::Array(wire_tools);
        }
        body
    }

    fn parse_non_streaming_response(
        model: &str,
        text: &str,
    ) -> Result<Response, GatewayError> {
        let parsed: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| GatewayError::Transport(format!("invalid JSON response: {}", e)))?;

        let choice_msg = parsed
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .ok_or_else(|| GatewayError::Transport("no choices in response".to_string()))?;

        let content = choice_msg
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or("")
            .to_string();

        let tool_calls_made = choice_msg
            .get("tool_calls")
            .and_then(|tc| tc.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|tc| {
                        let id = tc.get("id")?.as_str()?.to_string();
                        let func = tc.get("function")?;
                        let name = func.get("name")?.as_str()?.to_string();
                        let arguments_json =
                            func.get("arguments")?.as_str().unwrap_or("{}").to_string();
                        Some(ToolCall { id, name, arguments_json })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let usage = parsed.get("usage").map(|u| crate::model::TokenUsage {
            input_tokens: u.get("prompt_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
            output_tokens: u
                .get("completion_tokens")
                .and_then(|v| v.as_u64())
                .unwrap_or(0) as usize,
            total_tokens: u.get("total_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as usize,
        });

        Ok(Response {
            model: model.to_string(),
            content,
            reasoned: None,
            tool_calls_made,
            revised_answer: None,
            usage,
        })
    }
}

#[async_trait]
impl GatewayClient for HttpGatewayClient {
    async fn query(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        timeout_secs: u64,
    ) -> Result<Response, GatewayError> {
        let body = self.request_body(model, messages, tools, false);
        let url = self.endpoint();

        let call = async {
            let resp = self
                .http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| GatewayError::Transport(e.to_string()))?;

            let status = resp.status();
            let text = resp
                .text()
                .await
                .map_err(|e| GatewayError::Transport(e.to_string()))?;

            if !status.is_success() {
                if log::log_enabled!(log::Level::Error) {
                    log::error!("gateway query: HTTP {} from {}: {}", status, url, text);
                }
                return Err(GatewayError::Transport(format!("HTTP {}: {}", status, text)));
            }

            Self::parse_non_streaming_response(model, &text)
        };

        match tokio::time::timeout(Duration::from_secs(timeout_secs), call).await {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout(timeout_secs)),
        }
    }

    fn stream(
        &self,
        model: &str,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        timeout_secs: u64,
    ) -> GatewayEventStream {
        let body = self.request_body(model, messages, tools, true);
        let url = self.endpoint();
        let http = self.http.clone();
        let api_key = self.api_key.clone();
        let model = model.to_string();

        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let run = async {
                let resp = http
                    .post(&url)
                    .header("Authorization", format!("Bearer {}", api_key))
                    .header("Content-Type", "application/json")
                    .header("Accept", "text/event-stream")
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| GatewayError::Transport(e.to_string()))?;

                if !resp.status().is_success() {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    return Err(GatewayError::Transport(format!("HTTP {}: {}", status, text)));
                }

                let mut byte_stream = resp.bytes_stream();
                let mut buffer = String::new();
                let mut content = String::new();
                // Merge tool-call fragments by their streaming `index` (§6).
                let mut tool_calls: BTreeMap<u32, (Option<String>, Option<String>, String)> =
                    BTreeMap::new();

                while let Some(chunk) = byte_stream.next().await {
                    let chunk = chunk.map_err(|e| GatewayError::Transport(e.to_string()))?;
                    buffer.push_str(&String::from_utf8_lossy(&chunk));

                    while let Some(newline_pos) = buffer.find('\n') {
                        let line = buffer[..newline_pos].trim_end_matches('\r').to_string();
                        buffer.drain(..=newline_pos);

                        let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) else {
                            continue;
                        };
                        let data = data.trim();
                        if data.is_empty() {
                            continue;
                        }
                        if data == "[DONE]" {
                            continue;
                        }

                        let parsed: serde_json::Value = match serde_json::from_str(data) {
                            Ok(v) => v,
                            Err(_) => {
                                log::debug!("gateway stream: unparseable SSE chunk: {}", data);
                                continue;
                            }
                        };

                        let delta = parsed
                            .get("choices")
                            .and_then(|c| c.get(0))
                            .and_then(|c| c.get("delta"));
                        let Some(delta) = delta else { continue };

                        if let Some(piece) = delta.get("content").and_then(|c| c.as_str()) {
                            if !piece.is_empty() {
                                content.push_str(piece);
                                let _ = tx.send(GatewayEvent::Token { content: piece.to_string() });
                            }
                        }

                        if let Some(deltas) = delta.get("tool_calls").and_then(|t| t.as_array()) {
                            for frag in deltas {
                                let index =
                                    frag.get("index").and_then(|i| i.as_u64()).unwrap_or(0) as u32;
                                let id = frag.get("id").and_then(|i| i.as_str()).map(str::to_string);
                                let name = frag
                                    .get("function")
                                    .and_then(|f| f.get("name"))
                                    .and_then(|n| n.as_str())
                                    .map(str::to_string);
                                let args_fragment = frag
                                    .get("function")
                                    .and_then(|f| f.get("arguments"))
                                    .and_then(|a| a.as_str())
                                    .unwrap_or("")
                                    .to_string();

                                let entry = tool_calls.entry(index).or_insert((None, None, String::new()));
                                if entry.0.is_none() {
                                    entry.0 = id.clone();
                                }
                                if entry.1.is_none() {
                                    entry.1 = name.clone();
                                }
                                entry.2.push_str(&args_fragment);

                                let _ = tx.send(GatewayEvent::ToolCall {
                                    id,
                                    index,
                                    name,
                                    arguments_fragment: args_fragment,
                                });
                            }
                        }
                    }
                }

                let tool_calls_made: Vec<ToolCall> = tool_calls
                    .into_iter()
                    .map(|(_, (id, name, arguments_json))| ToolCall {
                        id: id.unwrap_or_default(),
                        name: name.unwrap_or_default(),
                        arguments_json,
                    })
                    .collect();

                Ok(GatewayEvent::Done { content, tool_calls_made })
            };

            let outcome = match tokio::time::timeout(Duration::from_secs(timeout_secs), run).await {
                Ok(Ok(done)) => done,
                Ok(Err(err)) => GatewayEvent::Error { message: err.to_string() },
                Err(_) => GatewayEvent::Error { message: format!("timeout after {}s", timeout_secs) },
            };
            let _ = tx.send(outcome);
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }

    async fn query_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolSchema],
        tool_executor: &dyn ToolExecutor,
        max_tool_calls: u32,
        timeout_secs: u64,
    ) -> Result<Response, GatewayError> {
        let mut working_messages = messages.to_vec();
        let mut last_response = self.query(model, &working_messages, Some(tools), timeout_secs).await?;
        let mut tool_calls_made = Vec::new();

        // `range 0..max_tool_calls` uniformly — no off-by-one (§9 REDESIGN FLAGS).
        for _ in 0..max_tool_calls {
            if last_response.tool_calls_made.is_empty() {
                break;
            }

            let mut assistant_msg = Message::assistant(last_response.content.clone());
            assistant_msg.tool_calls = last_response.tool_calls_made.clone();
            working_messages.push(assistant_msg);

            for tc in &last_response.tool_calls_made {
                let result = tool_executor.execute(&tc.name, &tc.arguments_json).await;
                working_messages.push(Message::tool(tc.id.clone(), result));
            }
            tool_calls_made.extend(last_response.tool_calls_made.clone());

            last_response = self.query(model, &working_messages, Some(tools), timeout_secs).await?;
        }

        last_response.tool_calls_made = tool_calls_made;
        Ok(last_response)
    }
}
