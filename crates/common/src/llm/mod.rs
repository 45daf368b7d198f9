//! Generative-text service abstraction
//!
//! The pipeline talks to the service through three distinct request shapes:
//! - a forced tool call that names a search term
//! - a free-text completion
//! - a JSON-mode completion used for extraction
//!
//! Providers:
//! - OpenAI-compatible `/chat/completions` endpoints
//! - Mock (scripted replies for tests, canned replies for offline runs)

mod mock;
mod openai;
mod types;

pub use mock::{MockLlmClient, MockReply, RecordedCall};
pub use openai::OpenAiClient;
pub use types::{
    ChatMessage, CompletionRequest, LlmError, LlmResult, RequestShape, ToolCall, ToolCallRequest,
    ToolSpec,
};

use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Client for the generative-text service
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Issue a request that forces a call to `request.tool` and return that call
    async fn force_tool_call(&self, request: ToolCallRequest) -> LlmResult<ToolCall>;

    /// Free-text completion
    async fn complete_text(&self, request: CompletionRequest) -> LlmResult<String>;

    /// Completion constrained to a single JSON object, returned unparsed
    async fn complete_json(&self, request: CompletionRequest) -> LlmResult<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Create a client based on configuration
///
/// The `openai` provider requires an API key; its absence is a configuration error.
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider.as_str() {
        "openai" => {
            let key = config.api_key().ok_or_else(|| AppError::Configuration {
                message: "generative-text API key is not configured (set APP__LLM__API_KEY or OPENAI_API_KEY)".to_string(),
            })?;
            Ok(Arc::new(OpenAiClient::new(config, key)?))
        }
        "mock" => Ok(Arc::new(MockLlmClient::offline())),
        other => Err(AppError::Configuration {
            message: format!("unknown llm provider: {}", other),
        }),
    }
}
