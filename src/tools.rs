//! Tool Registry & Executor (§4.2): declarative tool schemas dispatched to
//! handlers. The core declares exactly one tool, `search_web`.
//!
//! The registry is read-only at runtime (§3 "Lifecycle"): it is configured
//! once at startup and handed by reference to every round executor and agent
//! loop for the remainder of the run.

use async_trait::async_trait;
use serde::Deserialize;

use crate::model::ToolSchema;

/// Dispatches a decoded tool-call argument string to the matching handler.
///
/// Implementations must never fail the call: malformed arguments or a
/// failed provider both become a tool-result *string* (§9 "Tool result
/// semantics under failure"), never a bubbled error.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute `name` with raw JSON-encoded `arguments_json`, returning the
    /// content to place in the tool-result message. Total: never panics or
    /// returns `Err` for a recognized tool name.
    async fn execute(&self, name: &str, arguments_json: &str) -> String;

    /// The schemas this executor can dispatch, advertised to the gateway.
    fn schemas(&self) -> Vec<ToolSchema>;
}

/// Minimal HTTP contract for a Tavily-shaped search provider (§6).
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, String>;
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub content: String,
}

#[derive(Deserialize)]
struct SearchWebArgs {
    query: String,
}

/// The sentinel returned when the search provider is unavailable or
/// unauthorized (§4.2, §7 `ToolUnavailable`). The model must be able to
/// proceed without search, so this is phrased as information, not failure.
pub const SEARCH_UNAVAILABLE_MESSAGE: &str =
    "Web search is currently unavailable. Answer using your own knowledge instead.";

/// The literal content produced when a tool call's arguments fail to decode (§4.2).
pub const INVALID_ARGUMENTS_MESSAGE: &str = "Error: invalid tool arguments";

/// A registry holding the single `search_web` tool, backed by any [`SearchProvider`].
pub struct ToolRegistry {
    search: Box<dyn SearchProvider>,
}

impl ToolRegistry {
    pub fn new(search: Box<dyn SearchProvider>) -> Self {
        Self { search }
    }

    fn search_schema() -> ToolSchema {
        ToolSchema {
            name: "search_web".to_string(),
            description: "Search the web for up-to-date information relevant to the question."
                .to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query to send to the provider."
                    }
                },
                "required": ["query"]
            }),
        }
    }

    /// Format raw search results as `[i] title\nurl\ncontent` blocks separated
    /// by blank lines, the shape the models are prompted to expect (§6).
    pub fn format_results(results: &[SearchResult]) -> String {
        results
            .iter()
            .enumerate()
            .map(|(i, r)| format!("[{}] {}\n{}\n{}", i + 1, r.title, r.url, r.content))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    async fn execute(&self, name: &str, arguments_json: &str) -> String {
        if name != "search_web" {
            return format!("Error: unknown tool '{}'", name);
        }

        let args: SearchWebArgs = match serde_json::from_str(arguments_json) {
            Ok(args) => args,
            Err(_) => {
                log::debug!("tools::search_web: failed to decode arguments {:?}", arguments_json);
                return INVALID_ARGUMENTS_MESSAGE.to_string();
            }
        };

        match self.search.search(&args.query).await {
            Ok(results) if !results.is_empty() => Self::format_results(&results),
            Ok(_) => SEARCH_UNAVAILABLE_MESSAGE.to_string(),
            Err(reason) => {
                log::warn!("tools::search_web: provider error: {}", reason);
                SEARCH_UNAVAILABLE_MESSAGE.to_string()
            }
        }
    }

    fn schemas(&self) -> Vec<ToolSchema> {
        vec![Self::search_schema()]
    }
}

/// A [`SearchProvider`] speaking the Tavily-shaped HTTP contract of §6.
pub struct TavilySearchProvider {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl TavilySearchProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.tavily.com".to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SearchProvider for TavilySearchProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchResult>, String> {
        let body = serde_json::json!({
            "query": query,
            "search_depth": "basic",
            "max_results": 5,
        });

        let resp = self
            .http
            .post(format!("{}/search", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        if !resp.status().is_success() {
            return Err(format!("search provider returned HTTP {}", resp.status()));
        }

        let parsed: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;
        let results = parsed
            .get("results")
            .and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|r| {
                        Some(SearchResult {
                            title: r.get("title")?.as_str()?.to_string(),
                            url: r.get("url")?.as_str()?.to_string(),
                            content: r.get("content")?.as_str()?.to_string(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingProvider;

    #[async_trait]
    impl SearchProvider for FailingProvider {
        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, String> {
            Err("unauthorized".to_string())
        }
    }

    struct StubProvider;

    #[async_trait]
    impl SearchProvider for StubProvider {
        async fn search(&self, _query: &str) -> Result<Vec<SearchResult>, String> {
            Ok(vec![SearchResult {
                title: "Example".to_string(),
                url: "https://example.com".to_string(),
                content: "an example result".to_string(),
            }])
        }
    }

    #[tokio::test]
    async fn search_unavailable_is_truthful_not_fatal() {
        let registry = ToolRegistry::new(Box::new(FailingProvider));
        let out = registry.execute("search_web", r#"{"query":"usd to eur"}"#).await;
        assert_eq!(out, SEARCH_UNAVAILABLE_MESSAGE);
    }

    #[tokio::test]
    async fn invalid_arguments_never_aborts_the_loop() {
        let registry = ToolRegistry::new(Box::new(StubProvider));
        let out = registry.execute("search_web", "not json").await;
        assert_eq!(out, INVALID_ARGUMENTS_MESSAGE);
    }

    #[tokio::test]
    async fn formats_results_as_numbered_blocks() {
        let registry = ToolRegistry::new(Box::new(StubProvider));
        let out = registry.execute("search_web", r#"{"query":"usd to eur"}"#).await;
        assert_eq!(out, "[1] Example\nhttps://example.com\nan example result");
    }
}
