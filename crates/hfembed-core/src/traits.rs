use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::similarity::similarity;
use crate::types::{Embedding, ModelType, PipelineOptions, PoolingOptions, SimilarityType, Task};

/// Text to vector capability consumed by retrieval and indexing callers.
#[async_trait]
pub trait BaseEmbedding: Send + Sync {
    async fn get_text_embedding(&self, text: &str) -> Result<Embedding>;

    async fn get_query_embedding(&self, query: &str) -> Result<Embedding>;

    /// Embeds `texts` one at a time, preserving order.
    async fn get_text_embeddings(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.get_text_embedding(text).await?);
        }
        Ok(out)
    }

    fn similarity(&self, a: &[f32], b: &[f32], mode: SimilarityType) -> Result<f32> {
        similarity(a, b, mode)
    }
}

/// A loaded pipeline: tokenization, inference and pooling for one model.
#[async_trait]
pub trait FeatureExtractor: Send + Sync {
    async fn extract(&self, text: &str, options: PoolingOptions) -> Result<Embedding>;
    fn dim(&self) -> usize;
}

/// Builds extractors. Construction may download and load model weights.
#[async_trait]
pub trait PipelineFactory: Send + Sync {
    async fn pipeline(
        &self,
        task: Task,
        model: ModelType,
        options: PipelineOptions,
    ) -> Result<Arc<dyn FeatureExtractor>>;
}
