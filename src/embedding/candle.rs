//! Local sentence-transformer embeddings via candle
//!
//! Loads a BERT-family model (e5, gte, MiniLM) from the HuggingFace hub,
//! mean-pools the last hidden state over the attention mask and
//! L2-normalizes the result.

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use hf_hub::{api::sync::Api, Repo, RepoType};
use std::fmt::Display;
use tokenizers::Tokenizer;
use tracing::info;

use crate::embedding::{normalize, Embedder, EmbeddingConfig};
use crate::errors::{Result, ShopError};

fn embed_err(context: &str, e: impl Display) -> ShopError {
    ShopError::Embedding(format!("{}: {}", context, e))
}

/// BERT encoder with mean pooling
pub struct CandleEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    model_id: String,
    dimension: usize,
    query_prefix: String,
}

impl CandleEmbedder {
    /// Download (or reuse the cached copy of) the model and load it on CPU
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().map_err(|e| embed_err("failed to create HuggingFace API client", e))?;
        let repo = api.repo(Repo::new(config.model_id.clone(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| embed_err("failed to download model config", e))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| embed_err("failed to download tokenizer", e))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| embed_err("failed to download model weights", e))?;

        let bert_config: Config = serde_json::from_str(&std::fs::read_to_string(config_path)?)?;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| embed_err("failed to load tokenizer", e))?;

        // SAFETY: the safetensors file is owned by the hub cache and not mutated while mapped
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)
                .map_err(|e| embed_err("failed to load model weights", e))?
        };
        let model = BertModel::load(vb, &bert_config)
            .map_err(|e| embed_err("failed to build BERT model", e))?;

        info!(model = %config.model_id, dimension = config.dimension, "embedding model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
            model_id: config.model_id.clone(),
            dimension: config.dimension,
            query_prefix: config.effective_query_prefix(),
        })
    }

    fn forward(&self, text: &str) -> candle_core::Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| candle_core::Error::Msg(format!("tokenization failed: {}", e)))?;

        let ids = encoding.get_ids().to_vec();
        let mask = encoding.get_attention_mask().to_vec();
        let len = ids.len();

        let token_ids = Tensor::from_vec(ids, (1, len), &self.device)?;
        let attention_mask = Tensor::from_vec(mask, (1, len), &self.device)?;
        let token_type_ids = token_ids.zeros_like()?;

        let hidden = self
            .model
            .forward(&token_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = Self::mean_pool(&hidden, &attention_mask)?;

        pooled.squeeze(0)?.to_vec1::<f32>()
    }

    /// Mean pooling with attention mask
    fn mean_pool(hidden: &Tensor, attention_mask: &Tensor) -> candle_core::Result<Tensor> {
        let mask = attention_mask
            .unsqueeze(2)?
            .expand(hidden.shape())?
            .to_dtype(hidden.dtype())?;

        let summed = (hidden * &mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
        summed.broadcast_div(&counts)
    }
}

impl Embedder for CandleEmbedder {
    fn name(&self) -> &str {
        &self.model_id
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let prefixed = format!("{}{}", self.query_prefix, text);
        let mut vector = self
            .forward(&prefixed)
            .map_err(|e| embed_err("inference failed", e))?;

        if vector.len() != self.dimension {
            return Err(ShopError::Embedding(format!(
                "model produced {} dimensions, expected {}",
                vector.len(),
                self.dimension
            )));
        }
        normalize(&mut vector);
        Ok(vector)
    }
}
