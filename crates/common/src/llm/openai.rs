//! OpenAI-compatible chat completions client

use super::types::*;
use super::LlmClient;
use crate::config::LlmConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

/// Client for `/chat/completions`
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: Option<f32>,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatResponseRaw {
    choices: Vec<RawChoice>,
}

#[derive(Deserialize)]
struct RawChoice {
    message: RawMessage,
}

#[derive(Deserialize)]
struct RawMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<RawToolCall>>,
}

#[derive(Deserialize)]
struct RawToolCall {
    id: String,
    function: RawFunction,
}

#[derive(Deserialize)]
struct RawFunction {
    name: String,
    arguments: String,
}

impl OpenAiClient {
    /// Create a new client; every request is bounded by `config.timeout_secs`
    pub fn new(config: &LlmConfig, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_key: api_key.to_string(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
        })
    }

    fn body<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatCompletionBody<'a> {
        ChatCompletionBody {
            model: &self.model,
            messages,
            temperature: self.temperature,
            tools: None,
            tool_choice: None,
            response_format: None,
        }
    }

    async fn send(&self, shape: RequestShape, body: &ChatCompletionBody<'_>) -> LlmResult<RawMessage> {
        let start = Instant::now();
        let result = self.send_inner(body).await;

        metrics::record_llm_call(shape.as_str(), start.elapsed().as_secs_f64(), result.is_ok());
        match &result {
            Ok(_) => debug!(
                shape = %shape,
                model = %self.model,
                duration_ms = start.elapsed().as_millis() as u64,
                "Chat completion"
            ),
            Err(e) => warn!(shape = %shape, model = %self.model, error = %e, "Chat completion failed"),
        }

        result
    }

    async fn send_inner(&self, body: &ChatCompletionBody<'_>) -> LlmResult<RawMessage> {
        let response = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout { timeout_secs: self.timeout_secs }
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(LlmError::Auth { status: status.as_u16() });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let raw: ChatResponseRaw = response.json().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout { timeout_secs: self.timeout_secs }
            } else {
                LlmError::Parse(e.to_string())
            }
        })?;

        raw.choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| LlmError::Parse("response has no choices".to_string()))
    }
}

fn non_empty_content(message: RawMessage) -> LlmResult<String> {
    match message.content {
        Some(content) if !content.trim().is_empty() => Ok(content),
        _ => Err(LlmError::EmptyContent),
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn force_tool_call(&self, request: ToolCallRequest) -> LlmResult<ToolCall> {
        let tool_name = request.tool.name.clone();
        let mut body = self.body(&request.messages);
        body.tools = Some(vec![serde_json::json!({
            "type": "function",
            "function": {
                "name": request.tool.name,
                "description": request.tool.description,
                "parameters": request.tool.parameters,
            }
        })]);
        body.tool_choice = Some(serde_json::json!({
            "type": "function",
            "function": { "name": tool_name }
        }));

        let message = self.send(RequestShape::ToolCall, &body).await?;

        let call = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .find(|c| c.function.name == tool_name)
            .ok_or_else(|| LlmError::MissingToolCall { tool: tool_name.clone() })?;

        let arguments = serde_json::from_str(&call.function.arguments)
            .map_err(|e| LlmError::InvalidToolArguments(e.to_string()))?;

        Ok(ToolCall {
            id: call.id,
            name: call.function.name,
            arguments,
        })
    }

    async fn complete_text(&self, request: CompletionRequest) -> LlmResult<String> {
        let body = self.body(&request.messages);
        let message = self.send(RequestShape::Text, &body).await?;
        non_empty_content(message)
    }

    async fn complete_json(&self, request: CompletionRequest) -> LlmResult<String> {
        let mut body = self.body(&request.messages);
        body.response_format = Some(serde_json::json!({ "type": "json_object" }));
        let message = self.send(RequestShape::Json, &body).await?;
        non_empty_content(message)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
