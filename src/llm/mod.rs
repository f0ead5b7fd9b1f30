//! LLM capability
//!
//! The pipeline needs two things from a language model: structured
//! extraction (JSON mode) for query parsing and free text for answers.
//! Providers:
//! - `openai`: any OpenAI-compatible `/chat/completions` endpoint (OpenAI, vLLM)
//! - `ollama`: a local Ollama server via `/api/generate`

pub mod json;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::Result;

pub use json::extract_json_object;
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

/// Which HTTP API to speak
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

/// LLM connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub base_url: String,
    pub api_key: Option<String>,
    /// Model used for query extraction
    pub parse_model: String,
    /// Model used for answer generation
    pub answer_model: String,
    /// HTTP client ceiling; stage timeouts are usually tighter
    pub http_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            base_url: openai::DEFAULT_BASE_URL.to_string(),
            api_key: None,
            parse_model: "gpt-4o-mini".to_string(),
            answer_model: "gpt-4o-mini".to_string(),
            http_timeout_ms: 60_000,
        }
    }
}

impl LlmConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }
}

/// One prompt, provider-neutral
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub user: String,
    pub temperature: f32,
    /// When set, the provider is asked for a JSON object matching this schema
    pub response_schema: Option<serde_json::Value>,
}

impl CompletionRequest {
    pub fn text(model: &str, system: String, user: String, temperature: f32) -> Self {
        Self {
            model: model.to_string(),
            system,
            user,
            temperature,
            response_schema: None,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn wants_json(&self) -> bool {
        self.response_schema.is_some()
    }
}

/// Language model capability consumed by the parser and the composer
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Provider label for logs
    fn name(&self) -> &str;

    /// Run one completion and return the raw text of the reply
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Check whether the provider is reachable
    async fn health_check(&self) -> bool {
        true
    }
}

/// Build the configured provider
pub fn build_llm(config: &LlmConfig) -> Result<Arc<dyn LanguageModel>> {
    let llm: Arc<dyn LanguageModel> = match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAiClient::from_config(config)?),
        LlmProvider::Ollama => Arc::new(OllamaClient::from_config(config)?),
    };
    Ok(llm)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_config_default() {
        let config = LlmConfig::default();
        assert_eq!(config.provider, LlmProvider::OpenAi);
        assert_eq!(config.parse_model, "gpt-4o-mini");
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_provider_serde_names() {
        let provider: LlmProvider = serde_json::from_str("\"ollama\"").unwrap();
        assert_eq!(provider, LlmProvider::Ollama);
        assert_eq!(serde_json::to_string(&LlmProvider::OpenAi).unwrap(), "\"openai\"");
    }

    #[test]
    fn test_completion_request_schema() {
        let request = CompletionRequest::text("m", "sys".into(), "user".into(), 0.0);
        assert!(!request.wants_json());
        let request = request.with_schema(serde_json::json!({"type": "object"}));
        assert!(request.wants_json());
    }

    #[test]
    fn test_build_llm_providers() {
        let llm = build_llm(&LlmConfig::default()).unwrap();
        assert_eq!(llm.name(), "openai");

        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            base_url: ollama::DEFAULT_OLLAMA_URL.to_string(),
            ..Default::default()
        };
        let llm = build_llm(&config).unwrap();
        assert_eq!(llm.name(), "ollama");
    }
}
