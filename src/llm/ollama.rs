//! Ollama API client
//!
//! Non-streaming generation against a local Ollama server.
//! Endpoint: POST /api/generate

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::errors::{Result, ShopError};
use crate::llm::{CompletionRequest, LanguageModel, LlmConfig};

/// Default Ollama API endpoint
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Ollama generation client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    /// Create Ollama client from configuration
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(ShopError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Get base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_body(request: &CompletionRequest) -> OllamaGenerateRequest<'_> {
        OllamaGenerateRequest {
            model: &request.model,
            system: &request.system,
            prompt: &request.user,
            stream: false,
            // Ollama accepts either "json" or a JSON schema here
            format: request.response_schema.clone(),
            options: Some(json!({ "temperature": request.temperature })),
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| ShopError::Llm(format!("Failed to send request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ShopError::Llm(format!("HTTP {}: {}", status, error_text)));
        }

        let parsed: OllamaGenerateResponse = response
            .json()
            .await
            .map_err(|e| ShopError::Llm(format!("Failed to parse response: {}", e)))?;

        let text = parsed.response.trim();
        if text.is_empty() {
            return Err(ShopError::Llm("Empty completion".to_string()));
        }
        Ok(text.to_string())
    }

    /// Check if Ollama is available
    async fn health_check(&self) -> bool {
        let url = format!("{}/api/version", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Ollama generate request
#[derive(Debug, Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<serde_json::Value>,
}

/// Ollama generate response (non-streaming)
#[derive(Debug, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
}
