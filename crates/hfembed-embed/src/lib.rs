//! Text embeddings from sentence-transformer models, loaded lazily.
//!
//! [`HuggingFaceEmbedding`] is the entry point. It asks a
//! [`PipelineFactory`] for a feature extractor on first use: the candle
//! pipeline in [`bert`] for real models, or [`fake::FakePipeline`] for
//! deterministic hashed-token vectors.

pub mod adapter;
pub mod bert;
pub mod device;
pub mod fake;
pub mod hub;
pub mod pool;
pub mod tokenize;

use std::sync::Arc;

use hfembed_core::config::ModelStoreConfig;
use hfembed_core::traits::PipelineFactory;

pub use adapter::{ExtractorState, HuggingFaceEmbedding};
pub use bert::{BertExtractor, CandlePipeline};
pub use fake::FakePipeline;
pub use hub::{ModelFiles, ModelStore};
pub use pool::{cls_pool, l2_normalize, mean_pool, normalize_in_place};

/// Pipeline selected by configuration: fake when `use_fake` is set or
/// `APP_USE_FAKE_EMBEDDINGS` is `1`/`true`, candle otherwise.
pub fn default_pipeline(config: &ModelStoreConfig) -> Arc<dyn PipelineFactory> {
    if config.use_fake || use_fake_from_env() {
        tracing::info!("Using FakePipeline");
        return Arc::new(FakePipeline::new());
    }
    Arc::new(CandlePipeline::from_config(config))
}

fn use_fake_from_env() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
