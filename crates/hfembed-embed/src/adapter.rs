use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;

use hfembed_core::config::{Config, EmbeddingConfig};
use hfembed_core::error::Result;
use hfembed_core::traits::{BaseEmbedding, FeatureExtractor, PipelineFactory};
use hfembed_core::types::{Embedding, ModelType, PipelineOptions, PoolingOptions, Task};

use crate::default_pipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractorState {
    Uninitialized,
    Ready,
}

/// Embeds text with a feature-extraction pipeline that is built on first use.
///
/// Concurrent first calls share one in-flight construction, so the factory
/// runs at most once per instance as long as construction succeeds. A failed
/// construction leaves the adapter uninitialized; the next call tries again.
pub struct HuggingFaceEmbedding {
    config: EmbeddingConfig,
    factory: Arc<dyn PipelineFactory>,
    extractor: OnceCell<Arc<dyn FeatureExtractor>>,
}

impl HuggingFaceEmbedding {
    pub fn new(config: EmbeddingConfig, factory: Arc<dyn PipelineFactory>) -> Self {
        Self { config, factory, extractor: OnceCell::new() }
    }

    /// Adapter for the `[embedding]` section, backed by the pipeline the
    /// `[models]` section selects.
    pub fn from_config(config: &Config) -> Result<Self> {
        let factory = default_pipeline(&config.models()?);
        Ok(Self::new(config.embedding()?, factory))
    }

    pub fn model_type(&self) -> ModelType { self.config.model_type }

    pub fn quantized(&self) -> bool { self.config.quantized }

    pub fn state(&self) -> ExtractorState {
        if self.extractor.initialized() { ExtractorState::Ready } else { ExtractorState::Uninitialized }
    }

    pub async fn get_extractor(&self) -> Result<Arc<dyn FeatureExtractor>> {
        if let Some(extractor) = self.extractor.get() {
            return Ok(Arc::clone(extractor));
        }
        let extractor = self
            .extractor
            .get_or_try_init(|| async {
                tracing::info!(model = %self.config.model_type, quantized = self.config.quantized, "initializing extractor");
                self.factory
                    .pipeline(Task::FeatureExtraction, self.config.model_type, PipelineOptions { quantized: self.config.quantized })
                    .await
            })
            .await?;
        Ok(Arc::clone(extractor))
    }
}

#[async_trait]
impl BaseEmbedding for HuggingFaceEmbedding {
    async fn get_text_embedding(&self, text: &str) -> Result<Embedding> {
        let extractor = self.get_extractor().await?;
        extractor.extract(text, PoolingOptions::mean_normalized()).await
    }

    async fn get_query_embedding(&self, query: &str) -> Result<Embedding> {
        self.get_text_embedding(query).await
    }
}
