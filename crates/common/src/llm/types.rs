//! Request and response types shared by every `LlmClient` implementation.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for generative-text calls
pub type LlmResult<T> = std::result::Result<T, LlmError>;

/// The three request shapes the pipeline relies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestShape {
    /// Forced function call returning structured arguments
    ToolCall,
    /// Free-text completion
    Text,
    /// Completion constrained to a JSON object
    Json,
}

impl RequestShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestShape::ToolCall => "tool_call",
            RequestShape::Text => "text",
            RequestShape::Json => "json",
        }
    }
}

impl fmt::Display for RequestShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", "assistant"
    pub role: String,

    /// Message content
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Function the service is forced to call
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object
    pub parameters: serde_json::Value,
}

/// Tool-forcing request
#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub messages: Vec<ChatMessage>,
    pub tool: ToolSpec,
}

/// Free-text or JSON-mode completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    /// System + user prompt pair
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
        }
    }
}

/// Tool call returned by the service
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Parsed arguments object
    pub arguments: serde_json::Value,
}

/// Generative-text client errors
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication rejected (HTTP {status})")]
    Auth { status: u16 },

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("response carried no call to tool `{tool}`")]
    MissingToolCall { tool: String },

    #[error("tool call arguments are not valid JSON: {0}")]
    InvalidToolArguments(String),

    #[error("response carried no content")]
    EmptyContent,

    #[error("no scripted reply for {shape} request")]
    Unscripted { shape: RequestShape },
}
