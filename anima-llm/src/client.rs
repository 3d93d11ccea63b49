//! LLM Client — completion service trait and an OpenAI-compatible backend.

use std::time::{Duration, Instant};

use anima_core::config::LlmConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::retry::RetryPolicy;
use crate::types::{ChatMessage, CompletionOutput, ToolCall, ToolSpec};

/// Chat-completion capability used by the turn loop.
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Plain completion without tools; returns the message text.
    async fn call_simple(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;

    /// Completion with tools offered (`tool_choice = auto`).
    async fn call_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<CompletionOutput, LlmError>;

    /// Model identifier, for logs and traces.
    fn model_name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'static str>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
}

#[derive(Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: String,
    function: WireFunction,
}

#[derive(Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

impl From<ChatResponse> for CompletionOutput {
    fn from(resp: ChatResponse) -> Self {
        let Some(choice) = resp.choices.into_iter().next() else {
            return CompletionOutput::default();
        };
        CompletionOutput {
            text: choice.message.content.unwrap_or_default(),
            tool_calls: choice
                .message
                .tool_calls
                .into_iter()
                .map(|c| ToolCall {
                    id: c.id,
                    name: c.function.name,
                    arguments: c.function.arguments,
                })
                .collect(),
            finish_reason: choice.finish_reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// OpenAI-compatible chat completions client (`POST {base}/v1/chat/completions`).
pub struct LlmClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Build a client from the `llm` config section.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ConfigError`] if the HTTP client cannot be built.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let http = Client::builder()
            .build()
            .map_err(|e| LlmError::ConfigError(e.to_string()))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.chat_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_millis(config.timeout_ms),
            retry: RetryPolicy::from_llm_config(config),
        })
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn body<'a>(&'a self, messages: &'a [ChatMessage], tools: &[ToolSpec]) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            tools: tools.iter().map(ToolSpec::to_openai).collect(),
            tool_choice: if tools.is_empty() { None } else { Some("auto") },
        }
    }

    async fn post_once(&self, body: &ChatRequest<'_>) -> Result<ChatResponse, LlmError> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let mut req = self.http.post(&url).json(body).timeout(self.timeout);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let start = Instant::now();
        let resp = req.send().await.map_err(|e| {
            if e.is_timeout() {
                LlmError::Timeout(u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX))
            } else {
                LlmError::from(e)
            }
        })?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "completion API returned error");
            return Err(LlmError::RequestFailed(format!("HTTP {} {text}", status.as_u16())));
        }
        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;
        debug!(
            model = %self.model,
            latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "completion received"
        );
        Ok(parsed)
    }

    async fn complete(&self, messages: &[ChatMessage], tools: &[ToolSpec]) -> Result<CompletionOutput, LlmError> {
        let body = self.body(messages, tools);
        let resp = self
            .retry
            .run("chat_completion", || self.post_once(&body))
            .await?;
        Ok(resp.into())
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    async fn call_simple(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        Ok(self.complete(messages, &[]).await?.text)
    }

    async fn call_with_tools(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSpec],
    ) -> Result<CompletionOutput, LlmError> {
        self.complete(messages, tools).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
