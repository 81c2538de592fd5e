//! Feature-extraction pipeline for BERT-family sentence embedding models
//! running on candle.
//!
//! `quantized` rounds every weight to half precision on load. The forward
//! pass always runs in `F32`: candle's BERT builds its additive attention
//! mask from `f32::MIN`, which overflows to `-inf` in `F16` and `BF16`.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokenizers::Tokenizer;

use hfembed_core::config::ModelStoreConfig;
use hfembed_core::error::{Error, Result as CoreResult};
use hfembed_core::traits::{FeatureExtractor, PipelineFactory};
use hfembed_core::types::{DevicePreference, Embedding, ModelType, PipelineOptions, PoolingOptions, Task};

use crate::device::select_device;
use crate::hub::{ModelFiles, ModelStore};
use crate::pool::pool;
use crate::tokenize::{configure_tokenizer, tokenize_on_device};

/// Builds [`BertExtractor`]s from files resolved by a [`ModelStore`].
#[derive(Clone)]
pub struct CandlePipeline {
    store: ModelStore,
    device: DevicePreference,
    max_len: usize,
}

impl CandlePipeline {
    pub fn new(store: ModelStore) -> Self {
        let defaults = ModelStoreConfig::default();
        Self { store, device: defaults.device, max_len: defaults.max_len }
    }

    pub fn from_config(config: &ModelStoreConfig) -> Self {
        Self { store: ModelStore::from_config(config), device: config.device, max_len: config.max_len }
    }

    pub fn with_device(mut self, device: DevicePreference) -> Self { self.device = device; self }

    pub fn with_max_len(mut self, max_len: usize) -> Self { self.max_len = max_len; self }

    pub fn store(&self) -> &ModelStore { &self.store }
}

#[async_trait]
impl PipelineFactory for CandlePipeline {
    async fn pipeline(
        &self,
        task: Task,
        model: ModelType,
        options: PipelineOptions,
    ) -> CoreResult<Arc<dyn FeatureExtractor>> {
        tracing::info!(%task, %model, quantized = options.quantized, "building pipeline");
        let this = self.clone();
        let extractor = tokio::task::spawn_blocking(move || {
            let files = this.store.resolve(model)?;
            BertExtractor::load(&files, model, options, this.device, this.max_len)
        })
        .await
        .map_err(|e| Error::init(model.identifier(), e))?
        .map_err(|e| Error::init(model.identifier(), format!("{e:#}")))?;
        Ok(Arc::new(extractor))
    }
}

/// Only the shape parameters; the rest of `config.json` goes to candle.
#[derive(Deserialize)]
struct ModelShape {
    hidden_size: usize,
    max_position_embeddings: usize,
}

struct Inner {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    max_len: usize,
    dim: usize,
}

#[derive(Clone)]
pub struct BertExtractor {
    inner: Arc<Inner>,
    model_type: ModelType,
}

impl BertExtractor {
    /// Blocking: loads tokenizer, config and weights.
    pub fn load(
        files: &ModelFiles,
        model_type: ModelType,
        options: PipelineOptions,
        device: DevicePreference,
        max_len: usize,
    ) -> Result<Self> {
        let start = Instant::now();
        let device = select_device(device)?;

        let mut tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", files.tokenizer.display(), e))?;

        let raw = std::fs::read_to_string(&files.config)
            .with_context(|| format!("Failed to read {}", files.config.display()))?;
        let config: BertConfig = serde_json::from_str(&raw).context("Invalid BERT config")?;
        let shape: ModelShape = serde_json::from_str(&raw).context("Invalid BERT config")?;

        tracing::info!(model = %model_type, quantized = options.quantized, "loading weights from {}", files.weights.display());
        let vb = if options.quantized {
            VarBuilder::from_tensors(half_precision_weights(&files.weights, &device)?, DType::F32, &device)
        } else {
            // SAFETY: the weights file is not modified while mapped.
            unsafe { VarBuilder::from_mmaped_safetensors(&[&files.weights], DType::F32, &device)? }
        };
        let model = BertModel::load(vb, &config).context("Failed to build BERT model")?;

        let max_len = max_len.min(shape.max_position_embeddings);
        configure_tokenizer(&mut tokenizer, max_len)?;

        tracing::info!(model = %model_type, dim = shape.hidden_size, "model loaded in {}ms", start.elapsed().as_millis());
        let inner = Inner {
            model,
            tokenizer,
            device,
            max_len,
            dim: shape.hidden_size,
        };
        Ok(Self { inner: Arc::new(inner), model_type })
    }

    pub fn model_type(&self) -> ModelType { self.model_type }
}

/// Every tensor in `path`, rounded through `F16` and widened back to `F32`.
fn half_precision_weights(path: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let tensors = candle_core::safetensors::load(path, device)
        .with_context(|| format!("Failed to read weights from {}", path.display()))?;
    tensors
        .into_iter()
        .map(|(name, t)| -> Result<(String, Tensor)> {
            let t = t.to_dtype(DType::F16)?.to_dtype(DType::F32)?;
            Ok((name, t))
        })
        .collect()
}

impl Inner {
    fn embed(&self, text: &str, options: PoolingOptions) -> Result<Embedding> {
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = pool(&hidden, &attention_mask, options)?;
        let out: Vec<f32> = pooled.squeeze(0)?.to_device(&Device::Cpu)?.to_vec1()?;
        anyhow::ensure!(out.len() == self.dim, "expected {} dims, got {}", self.dim, out.len());
        anyhow::ensure!(out.iter().all(|x| x.is_finite()), "model produced non-finite values");
        Ok(out)
    }
}

#[async_trait]
impl FeatureExtractor for BertExtractor {
    async fn extract(&self, text: &str, options: PoolingOptions) -> CoreResult<Embedding> {
        let inner = Arc::clone(&self.inner);
        let text = text.to_string();
        let start = Instant::now();
        let out = tokio::task::spawn_blocking(move || inner.embed(&text, options))
            .await
            .map_err(Error::inference)?
            .map_err(|e| Error::inference(format!("{e:#}")))?;
        let elapsed = start.elapsed().as_millis();
        if elapsed > 100 {
            tracing::warn!(model = %self.model_type, "slow embedding: {elapsed}ms");
        } else {
            tracing::debug!(model = %self.model_type, "embedded in {elapsed}ms");
        }
        Ok(out)
    }

    fn dim(&self) -> usize { self.inner.dim }
}

