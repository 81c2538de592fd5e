//! Domain types shared by the adapter, the pipelines and the CLI.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// A pooled embedding. Length is fixed per model.
pub type Embedding = Vec<f32>;

/// Supported sentence embedding models.
///
/// The serialized form is the identifier used on the model hub; the
/// `sentence-transformers/` and `BAAI/` names are accepted as aliases.
/// Only BERT-family models are listed: candle has no MPNet implementation,
/// so `Xenova/all-mpnet-base-v2` is rejected as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelType {
    #[default]
    #[serde(rename = "Xenova/all-MiniLM-L6-v2", alias = "sentence-transformers/all-MiniLM-L6-v2")]
    AllMiniLmL6V2,
    #[serde(rename = "Xenova/all-MiniLM-L12-v2", alias = "sentence-transformers/all-MiniLM-L12-v2")]
    AllMiniLmL12V2,
    #[serde(rename = "Xenova/bge-small-en-v1.5", alias = "BAAI/bge-small-en-v1.5")]
    BgeSmallEnV15,
}

impl ModelType {
    pub const ALL: [ModelType; 3] = [Self::AllMiniLmL6V2, Self::AllMiniLmL12V2, Self::BgeSmallEnV15];

    /// Identifier as configured by callers.
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::AllMiniLmL6V2 => "Xenova/all-MiniLM-L6-v2",
            Self::AllMiniLmL12V2 => "Xenova/all-MiniLM-L12-v2",
            Self::BgeSmallEnV15 => "Xenova/bge-small-en-v1.5",
        }
    }

    /// Hub repository publishing `config.json`, `tokenizer.json` and
    /// `model.safetensors` for this model.
    pub fn weights_repo(&self) -> &'static str {
        match self {
            Self::AllMiniLmL6V2 => "sentence-transformers/all-MiniLM-L6-v2",
            Self::AllMiniLmL12V2 => "sentence-transformers/all-MiniLM-L12-v2",
            Self::BgeSmallEnV15 => "BAAI/bge-small-en-v1.5",
        }
    }

    pub fn dim(&self) -> usize {
        match self {
            Self::AllMiniLmL6V2 | Self::AllMiniLmL12V2 | Self::BgeSmallEnV15 => 384,
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.identifier() == s || m.weights_repo() == s)
            .ok_or_else(|| {
                let supported: Vec<&str> = Self::ALL.iter().map(|m| m.identifier()).collect();
                Error::InvalidConfig(format!("unsupported model '{}' (supported: {})", s, supported.join(", ")))
            })
    }
}

/// Pipeline task requested from the inference library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    FeatureExtraction,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FeatureExtraction => "feature-extraction",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options applied when a pipeline is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipelineOptions {
    pub quantized: bool,
}

/// Reduction of per-token outputs into one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    #[default]
    Mean,
    Cls,
}

/// Options applied on every extraction call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolingOptions {
    pub pooling: Pooling,
    pub normalize: bool,
}

impl PoolingOptions {
    /// Mean pooling followed by L2 normalization.
    pub const fn mean_normalized() -> Self {
        Self { pooling: Pooling::Mean, normalize: true }
    }
}

impl Default for PoolingOptions {
    fn default() -> Self { Self::mean_normalized() }
}

/// Where candle runs the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    Cpu,
    Metal,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityType {
    #[default]
    Cosine,
    #[serde(alias = "dot")]
    DotProduct,
    Euclidean,
}

impl FromStr for SimilarityType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "dot" | "dotproduct" | "dot_product" => Ok(Self::DotProduct),
            "euclidean" => Ok(Self::Euclidean),
            other => Err(Error::InvalidConfig(format!("unknown similarity type '{}'", other))),
        }
    }
}
