//! LLM provider contracts and the OpenAI-compatible HTTP client
//!
//! The pipeline only ever sees the [`CompletionProvider`] and
//! [`EmbeddingProvider`] traits; [`OpenAiClient`] implements both against
//! the OpenAI chat-completions/embeddings wire format, which the Bedrock
//! gateway also speaks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{Config, LlmMethod};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("response contained no choices")]
    EmptyResponse,

    #[error("embedding batch returned {got} vectors for {expected} inputs")]
    BatchMismatch { expected: usize, got: usize },
}

/// One chat message in a completion request
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: content.into(),
        }
    }
}

/// A completion request with an optional structured-response hint.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    /// Ask the backend for a JSON object response where supported.
    pub json_response: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, max_tokens: u32) -> Self {
        Self {
            messages,
            max_tokens,
            json_response: false,
        }
    }

    pub fn expecting_json(mut self) -> Self {
        self.json_response = true;
        self
    }
}

/// Blocking-per-call completion backend. Fails atomically per request.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Batched embedding backend. The whole batch succeeds or fails together.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

/// Shared client for OpenAI and OpenAI-compatible gateways.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    method: LlmMethod,
    completion_model: String,
    embedding_model: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());

        tracing::info!(
            method = %config.method,
            model = %config.completion_model,
            "Initialized LLM client"
        );

        Self {
            http: reqwest::Client::new(),
            base_url,
            api_key: config.api_key.clone(),
            method: config.method,
            completion_model: config.completion_model.clone(),
            embedding_model: config.embedding_model.clone(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[derive(Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Serialize)]
struct EmbeddingBody<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

#[async_trait]
impl CompletionProvider for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let start = std::time::Instant::now();

        // response_format and low temperature are OpenAI-specific; the
        // Bedrock gateway rejects unknown parameters.
        let (temperature, response_format) = match self.method {
            LlmMethod::OpenAi => (
                Some(0.1),
                request
                    .json_response
                    .then(|| serde_json::json!({"type": "json_object"})),
            ),
            LlmMethod::Bedrock => (None, None),
        };

        let body = ChatCompletionBody {
            model: &self.completion_model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature,
            response_format,
        };

        let response = self
            .http
            .post(self.endpoint("chat/completions"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = status.as_u16(), "Completion request rejected");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse)?;

        tracing::debug!(
            model = %self.completion_model,
            elapsed_ms = start.elapsed().as_millis(),
            response_length = content.len(),
            "Completion received"
        );

        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        tracing::info!(count = texts.len(), model = %self.embedding_model, "Embedding batch");

        let body = EmbeddingBody {
            model: &self.embedding_model,
            input: texts,
        };

        let response = self
            .http
            .post(self.endpoint("embeddings"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();

        if vectors.len() != texts.len() {
            return Err(LlmError::BatchMismatch {
                expected: texts.len(),
                got: vectors.len(),
            });
        }

        Ok(vectors)
    }
}
