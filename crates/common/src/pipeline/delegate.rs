//! Search stage
//!
//! Two generative-text calls: a forced `web_search` tool call that refines the
//! topic into a search term, then a free-text call that produces the raw
//! results for that term.

use super::error::{Stage, StageError, StageResult};
use super::prompts;
use super::write_debug_dump;
use crate::llm::{ChatMessage, CompletionRequest, LlmClient, LlmError, ToolCallRequest};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Prefix of the human-readable text reported when the search stage fails
pub const SEARCH_ERROR_MARKER: &str = "Erro ao realizar pesquisa";

/// Output of a successful search stage
#[derive(Debug, Clone, PartialEq)]
pub struct RawResults {
    pub search_term: String,
    pub tool_call_id: String,
    pub text: String,
}

pub struct SearchDelegate {
    llm: Arc<dyn LlmClient>,
    dump_dir: Option<PathBuf>,
}

impl SearchDelegate {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm, dump_dir: None }
    }

    /// Write the raw results to `<dir>/search_results.txt` on success
    pub fn with_debug_dump(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_dir = dir;
        self
    }

    /// Topic plus domain hint words
    pub fn augmented_query(topic: &str) -> String {
        format!("{} {}", topic, prompts::SEARCH_DOMAIN_HINTS)
    }

    /// Human-readable failure text, always starting with the error marker
    pub fn failure_text(topic: &str, err: &StageError) -> String {
        format!(
            "{} para: {}. Detalhes: {}",
            SEARCH_ERROR_MARKER,
            Self::augmented_query(topic),
            err
        )
    }

    /// Run the search stage for `topic`. No retries.
    pub async fn delegate_search(&self, topic: &str) -> StageResult<RawResults> {
        let start = Instant::now();
        let augmented = Self::augmented_query(topic);
        debug!(topic, query = %augmented, "Delegating search");

        let call = self
            .llm
            .force_tool_call(ToolCallRequest {
                messages: vec![
                    ChatMessage::system(prompts::DELEGATE_SYSTEM_PROMPT),
                    ChatMessage::user(prompts::delegate_user_prompt(topic, &augmented)),
                ],
                tool: prompts::search_tool(),
            })
            .await
            .map_err(|e| StageError::upstream(Stage::Search, e))?;

        let search_term = call
            .arguments
            .get(prompts::SEARCH_TERM_ARG)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                StageError::upstream(
                    Stage::Search,
                    LlmError::InvalidToolArguments(format!(
                        "missing `{}` argument",
                        prompts::SEARCH_TERM_ARG
                    )),
                )
            })?
            .to_string();

        debug!(topic, search_term = %search_term, tool_call_id = %call.id, "Search term chosen");

        let text = self
            .llm
            .complete_text(CompletionRequest::new(
                prompts::RESULTS_SYSTEM_PROMPT,
                prompts::results_user_prompt(&search_term),
            ))
            .await
            .map_err(|e| StageError::upstream(Stage::Search, e))?;

        write_debug_dump(self.dump_dir.as_deref(), "search_results.txt", &text).await;

        info!(
            topic,
            search_term = %search_term,
            chars = text.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Search stage complete"
        );

        Ok(RawResults {
            search_term,
            tool_call_id: call.id,
            text,
        })
    }
}

/// True when `text` is the failure text of a search stage
pub fn is_search_failure(text: &str) -> bool {
    text.trim_start().starts_with(SEARCH_ERROR_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockLlmClient, MockReply, RequestShape};
    use serde_json::json;

    fn delegate(mock: &Arc<MockLlmClient>) -> SearchDelegate {
        SearchDelegate::new(mock.clone())
    }

    #[tokio::test]
    async fn test_two_calls_in_order() {
        let mock = Arc::new(MockLlmClient::scripted([
            MockReply::ToolCall(json!({ "search_term": "  programação funcional  " })),
            MockReply::Content("1. Livro - https://livro.example/fp".to_string()),
        ]));

        let raw = delegate(&mock).delegate_search("programação funcional").await.unwrap();
        assert_eq!(raw.search_term, "programação funcional");
        assert_eq!(raw.text, "1. Livro - https://livro.example/fp");
        assert!(!raw.tool_call_id.is_empty());

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].shape, RequestShape::ToolCall);
        assert_eq!(calls[1].shape, RequestShape::Text);
        assert!(calls[0].messages[1]
            .content
            .contains("programação funcional artigos pesquisa estudos informações"));
        assert!(calls[1].messages[1].content.contains("'programação funcional'"));
    }

    #[tokio::test]
    async fn test_missing_search_term_is_upstream_failure() {
        let mock = Arc::new(MockLlmClient::scripted([MockReply::ToolCall(json!({ "query": "x" }))]));

        let err = delegate(&mock).delegate_search("biologia").await.unwrap_err();
        assert!(matches!(
            err,
            StageError::UpstreamUnavailable { stage: Stage::Search, source: LlmError::InvalidToolArguments(_) }
        ));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_network_failure_on_second_call() {
        let mock = Arc::new(MockLlmClient::scripted([
            MockReply::ToolCall(json!({ "search_term": "clima" })),
            MockReply::NetworkFailure("connection reset".to_string()),
        ]));

        let err = delegate(&mock).delegate_search("clima").await.unwrap_err();
        assert!(matches!(err, StageError::UpstreamUnavailable { source: LlmError::Network(_), .. }));

        let text = SearchDelegate::failure_text("clima", &err);
        assert!(is_search_failure(&text));
        assert!(text.contains("clima artigos pesquisa estudos informações"));
    }

    #[tokio::test]
    async fn test_debug_dump_written() {
        let dir = std::env::temp_dir().join(format!("sourcefinder-dump-{}", std::process::id()));
        let mock = Arc::new(MockLlmClient::scripted([
            MockReply::ToolCall(json!({ "search_term": "astronomia" })),
            MockReply::Content("resultados".to_string()),
        ]));

        delegate(&mock)
            .with_debug_dump(Some(dir.clone()))
            .delegate_search("astronomia")
            .await
            .unwrap();

        let dumped = tokio::fs::read_to_string(dir.join("search_results.txt")).await.unwrap();
        assert_eq!(dumped, "resultados");
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }
}
