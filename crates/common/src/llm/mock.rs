//! Mock generative-text client
//!
//! Replies are consumed in call order from a script. An offline client answers
//! unscripted calls with canned output so the pipeline can run without
//! network access.

use super::types::*;
use super::LlmClient;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

/// A scripted reply
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Tool call with the given arguments object
    ToolCall(serde_json::Value),
    /// Text or JSON-mode content
    Content(String),
    /// Fail with a network error carrying this message
    NetworkFailure(String),
    /// Fail as if the service returned no content
    Empty,
}

/// A call observed by the mock
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub shape: RequestShape,
    pub messages: Vec<ChatMessage>,
}

/// Mock client for tests and offline development
pub struct MockLlmClient {
    script: Mutex<VecDeque<MockReply>>,
    calls: Mutex<Vec<RecordedCall>>,
    offline: bool,
    latency: Option<Duration>,
}

impl MockLlmClient {
    /// Client that answers from `replies` and fails once they run out
    pub fn scripted(replies: impl IntoIterator<Item = MockReply>) -> Self {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            calls: Mutex::new(Vec::new()),
            offline: false,
            latency: None,
        }
    }

    /// Client that answers every call with canned output
    pub fn offline() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            offline: true,
            latency: None,
        }
    }

    /// Delay every reply by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Calls received so far
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls received so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    async fn next(&self, shape: RequestShape, messages: &[ChatMessage]) -> LlmResult<MockReply> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                shape,
                messages: messages.to_vec(),
            });
        }

        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match scripted {
            Some(MockReply::NetworkFailure(message)) => Err(LlmError::Network(message)),
            Some(MockReply::Empty) => Err(LlmError::EmptyContent),
            Some(reply) => Ok(reply),
            None if self.offline => Ok(canned_reply(shape, messages)),
            None => Err(LlmError::Unscripted { shape }),
        }
    }
}

/// Canned output derived from the last user message
fn canned_reply(shape: RequestShape, messages: &[ChatMessage]) -> MockReply {
    let prompt = messages
        .iter()
        .rev()
        .find(|m| m.role == "user")
        .map(|m| m.content.as_str())
        .unwrap_or_default();
    let term = quoted(prompt).unwrap_or(prompt).trim().to_string();

    match shape {
        RequestShape::ToolCall => MockReply::ToolCall(serde_json::json!({ "search_term": term })),
        RequestShape::Text => MockReply::Content(format!(
            "Resultados simulados para '{}':\n\
             1. Wikipedia - https://pt.wikipedia.org/w/index.php?search={}\n\
             Visão geral enciclopédica do tema.",
            term,
            term.replace(' ', "+")
        )),
        RequestShape::Json => {
            let topic = quoted(prompt).unwrap_or("tema");
            MockReply::Content(
                serde_json::json!({
                    "fontes": [{
                        "titulo": format!("Wikipedia: {}", topic),
                        "autores": "Wikipedia",
                        "instituicao": "Wikimedia Foundation",
                        "ano_publicacao": null,
                        "link": format!("https://pt.wikipedia.org/w/index.php?search={}", topic.replace(' ', "+")),
                        "tipo_acesso": "Artigo",
                        "descricao": "Resposta simulada (provedor mock)."
                    }]
                })
                .to_string(),
            )
        }
    }
}

/// First single-quoted span of `text`
fn quoted(text: &str) -> Option<&str> {
    let start = text.find('\'')? + 1;
    let len = text[start..].find('\'')?;
    Some(&text[start..start + len])
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn force_tool_call(&self, request: ToolCallRequest) -> LlmResult<ToolCall> {
        match self.next(RequestShape::ToolCall, &request.messages).await? {
            MockReply::ToolCall(arguments) => Ok(ToolCall {
                id: format!("call_mock_{}", self.call_count()),
                name: request.tool.name,
                arguments,
            }),
            _ => Err(LlmError::MissingToolCall { tool: request.tool.name }),
        }
    }

    async fn complete_text(&self, request: CompletionRequest) -> LlmResult<String> {
        match self.next(RequestShape::Text, &request.messages).await? {
            MockReply::Content(content) => Ok(content),
            _ => Err(LlmError::EmptyContent),
        }
    }

    async fn complete_json(&self, request: CompletionRequest) -> LlmResult<String> {
        match self.next(RequestShape::Json, &request.messages).await? {
            MockReply::Content(content) => Ok(content),
            _ => Err(LlmError::EmptyContent),
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_replies_in_order() {
        let mock = MockLlmClient::scripted([
            MockReply::Content("first".to_string()),
            MockReply::NetworkFailure("boom".to_string()),
        ]);

        let first = mock.complete_text(CompletionRequest::new("s", "u")).await.unwrap();
        assert_eq!(first, "first");

        let second = mock.complete_text(CompletionRequest::new("s", "u")).await;
        assert!(matches!(second, Err(LlmError::Network(_))));

        let third = mock.complete_json(CompletionRequest::new("s", "u")).await;
        assert!(matches!(third, Err(LlmError::Unscripted { shape: RequestShape::Json })));

        assert_eq!(mock.call_count(), 3);
        assert_eq!(mock.calls()[2].shape, RequestShape::Json);
    }

    #[tokio::test]
    async fn test_offline_replies_are_usable() {
        let mock = MockLlmClient::offline();
        let json = mock
            .complete_json(CompletionRequest::new("s", "Analise resultados sobre 'rust async'"))
            .await
            .unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let link = value["fontes"][0]["link"].as_str().unwrap();
        assert!(link.starts_with("https://"));
        assert!(link.ends_with("rust+async"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_reply() {
        let mock = MockLlmClient::offline().with_latency(Duration::from_secs(30));
        let start = tokio::time::Instant::now();

        mock.complete_text(CompletionRequest::new("s", "sobre 'x'")).await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[test]
    fn test_quoted() {
        assert_eq!(quoted("sobre 'x y' e"), Some("x y"));
        assert_eq!(quoted("no quotes"), None);
    }
}
