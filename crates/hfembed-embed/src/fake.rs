//! Deterministic hashed-token pipeline for tests and development.
//!
//! Selected by `models.use_fake` or `APP_USE_FAKE_EMBEDDINGS=1`.

use async_trait::async_trait;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use twox_hash::XxHash64;

use hfembed_core::error::{Error, Result};
use hfembed_core::traits::{FeatureExtractor, PipelineFactory};
use hfembed_core::types::{Embedding, ModelType, Pooling, PipelineOptions, PoolingOptions, Task};

use crate::pool::normalize_in_place;

/// Quantized fake weights are rounded to this step.
const QUANT_STEP: f32 = 1.0 / 256.0;

#[derive(Clone, Default)]
pub struct FakePipeline {
    dim: Option<usize>,
    load_delay: Duration,
    fail_load: Option<String>,
    fail_on: Option<String>,
    constructions: Arc<AtomicUsize>,
}

impl FakePipeline {
    pub fn new() -> Self { Self::default() }

    /// Override the model's native dimension. Zero fails construction.
    pub fn with_dim(mut self, dim: usize) -> Self { self.dim = Some(dim); self }

    /// Sleep this long while "loading", to widen race windows in tests.
    pub fn with_load_delay(mut self, delay: Duration) -> Self { self.load_delay = delay; self }

    /// Every construction fails with `reason`.
    pub fn failing(mut self, reason: impl Into<String>) -> Self { self.fail_load = Some(reason.into()); self }

    /// Extraction of exactly `text` fails.
    pub fn failing_on(mut self, text: impl Into<String>) -> Self { self.fail_on = Some(text.into()); self }

    /// How many times `pipeline` has run, across clones.
    pub fn constructions(&self) -> usize { self.constructions.load(Ordering::SeqCst) }
}

#[async_trait]
impl PipelineFactory for FakePipeline {
    async fn pipeline(
        &self,
        task: Task,
        model: ModelType,
        options: PipelineOptions,
    ) -> Result<Arc<dyn FeatureExtractor>> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(%task, %model, quantized = options.quantized, "building fake pipeline");
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        if let Some(reason) = &self.fail_load {
            return Err(Error::init(model.identifier(), reason));
        }
        let dim = self.dim.unwrap_or_else(|| model.dim());
        if dim == 0 {
            return Err(Error::init(model.identifier(), "embedding dimension must be non-zero"));
        }
        Ok(Arc::new(FakeExtractor {
            dim,
            quantized: options.quantized,
            fail_on: self.fail_on.clone(),
        }))
    }
}

pub struct FakeExtractor {
    dim: usize,
    quantized: bool,
    fail_on: Option<String>,
}

impl FakeExtractor {
    fn token_vector(&self, position: usize, token: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        let mut hasher = XxHash64::with_seed(0);
        token.hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h as usize) % self.dim;
        let val = 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32) * 0.5;
        v[idx] += val + (position as f32 % 3.0) * 0.01;
        // a little spread so the quantized rounding has something to round
        v[(idx + 1) % self.dim] += val / 7.0;
        v
    }
}

#[async_trait]
impl FeatureExtractor for FakeExtractor {
    async fn extract(&self, text: &str, options: PoolingOptions) -> Result<Embedding> {
        if self.fail_on.as_deref() == Some(text) {
            return Err(Error::inference(format!("fake extractor rejected input '{text}'")));
        }
        let mut tokens: Vec<Vec<f32>> = text
            .split_whitespace()
            .enumerate()
            .map(|(i, tok)| self.token_vector(i, tok))
            .collect();
        // blank input still has the special tokens around it
        if tokens.is_empty() {
            tokens.push(self.token_vector(0, ""));
        }

        let mut out = vec![0f32; self.dim];
        match options.pooling {
            Pooling::Mean => {
                for t in &tokens {
                    for (o, x) in out.iter_mut().zip(t) {
                        *o += x;
                    }
                }
                let n = tokens.len() as f32;
                out.iter_mut().for_each(|o| *o /= n);
            }
            Pooling::Cls => {
                if let Some(first) = tokens.first() {
                    out.copy_from_slice(first);
                }
            }
        }
        if self.quantized {
            out.iter_mut().for_each(|o| *o = (*o / QUANT_STEP).round() * QUANT_STEP);
        }
        if options.normalize {
            normalize_in_place(&mut out);
        }
        Ok(out)
    }

    fn dim(&self) -> usize { self.dim }
}
