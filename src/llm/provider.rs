// src/llm/provider.rs
// The generative service boundary. The client only ever talks to the
// trait, so tests substitute deterministic stubs and no module-level
// singleton exists.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

/// One completion request to the external text service.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    /// Output token budget for this call. The retry loop grows this on
    /// truncated output, so it is per-call, never per-client.
    pub max_output_tokens: u32,
}

/// Transport/service failures. The generation client treats every variant
/// as transient; classification into the retry taxonomy happens there.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("service returned HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service response carried no completion text")]
    EmptyResponse,
}

/// Capability interface for the external generative text service.
#[async_trait]
pub trait GenerativeService: Send + Sync {
    /// Service name for logging/debugging.
    fn name(&self) -> &'static str;

    /// Run one completion call. Strict-JSON output is requested; the
    /// response text is returned as-is, tolerance happens downstream.
    async fn complete(&self, request: CompletionRequest) -> Result<String, ServiceError>;
}

/// OpenAI-compatible chat-completions service.
#[derive(Clone)]
pub struct OpenAiService {
    client: Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl OpenAiService {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
        }
    }

    /// Read `OPENAI_API_KEY` (required) plus optional `OPENAI_BASE_URL`
    /// and `QUIZFORGE_MODEL` overrides.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY not set")?;
        let mut service = Self::new(api_key);
        if let Ok(base) = std::env::var("OPENAI_BASE_URL") {
            service.api_base = base;
        }
        if let Ok(model) = std::env::var("QUIZFORGE_MODEL") {
            service.model = model;
        }
        Ok(service)
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.api_base.trim_end_matches('/'))
    }
}

#[async_trait]
impl GenerativeService for OpenAiService {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ServiceError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user},
            ],
            "temperature": 0.7,
            "max_tokens": request.max_output_tokens,
            "response_format": {"type": "json_object"},
        });

        debug!(
            model = %self.model,
            max_output_tokens = request.max_output_tokens,
            "sending completion request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ServiceError::Api { status, body });
        }

        let body: Value = response.json().await?;
        let text = body
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .ok_or(ServiceError::EmptyResponse)?;

        Ok(text.to_string())
    }
}
