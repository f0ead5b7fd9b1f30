use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::answer::AnswerConfig;
use crate::embedding::EmbeddingConfig;
use crate::errors::ShopError;
use crate::llm::LlmConfig;
use crate::parser::ParserConfig;
use crate::pipeline::PipelineConfig;
use crate::rerank::RerankConfig;
use crate::retrieval::RetrievalConfig;
use crate::store::StoreConfig;

const REDACTED: &str = "********";

/// Complete configuration, one section per component
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub parse: ParserConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub retrieval: RetrievalConfig,
    pub rerank: RerankConfig,
    pub answer: AnswerConfig,
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    /// A missing default file yields defaults; a missing explicit file is
    /// an error. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::config_path()?;
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Config::default()
                }
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".shoptalk").join("config.toml"))
    }

    /// Apply deployment environment variables. `lookup` is injected so tests
    /// do not touch the process environment.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = get("PARSE_MODEL") {
            self.llm.parse_model = model;
        }
        if let Some(model) = get("NLG_MODEL") {
            self.llm.answer_model = model;
        }
        if let Some(model) = get("MODEL_NAME") {
            self.embedding.model_id = model;
        }
        if let Some(url) = get("QDRANT_URL") {
            self.store.url = url;
        }
        if let Some(key) = get("QDRANT_API_KEY") {
            self.store.api_key = Some(key);
        }
        if let Some(collection) = get("SHOPTALK_COLLECTION") {
            self.store.collection = collection;
        }
    }

    /// Copy safe to display, with API keys masked
    pub fn redacted(&self) -> Self {
        let mask = |key: &Option<String>| key.as_ref().map(|_| REDACTED.to_string());
        let mut config = self.clone();
        config.llm.api_key = mask(&self.llm.api_key);
        config.store.api_key = mask(&self.store.api_key);
        config
    }

    /// Reject settings no request could succeed with
    pub fn validate(&self) -> std::result::Result<(), ShopError> {
        let retrieval = &self.retrieval;
        if retrieval.max_k == 0 {
            return Err(ShopError::Config("retrieval.max_k must be at least 1".to_string()));
        }
        if retrieval.default_k == 0 || retrieval.default_k > retrieval.max_k {
            return Err(ShopError::Config(format!(
                "retrieval.default_k must be between 1 and {}",
                retrieval.max_k
            )));
        }
        if self.answer.top_n == 0 {
            return Err(ShopError::Config("answer.top_n must be at least 1".to_string()));
        }
        if self.pipeline.max_query_chars == 0 {
            return Err(ShopError::Config(
                "pipeline.max_query_chars must be at least 1".to_string(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ShopError::Config("embedding.dimension must be at least 1".to_string()));
        }

        let timeouts = [
            ("llm.http_timeout_ms", self.llm.http_timeout_ms),
            ("parse.timeout_ms", self.parse.timeout_ms),
            ("embedding.timeout_ms", self.embedding.timeout_ms),
            ("store.timeout_ms", self.store.timeout_ms),
            ("rerank.timeout_ms", self.rerank.timeout_ms),
            ("answer.timeout_ms", self.answer.timeout_ms),
            ("pipeline.request_budget_ms", self.pipeline.request_budget_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, ms)| *ms == 0) {
            return Err(ShopError::Config(format!("{} must be greater than zero", name)));
        }

        Ok(())
    }
}
