use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The inference library could not build a pipeline (unknown model,
    /// missing or unreachable weights, device failure).
    #[error("Failed to initialize extractor for {model}: {reason}")]
    ExtractorInitialization { model: String, reason: String },

    /// The extractor failed while processing a text.
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl Error {
    pub fn init(model: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ExtractorInitialization { model: model.into(), reason: reason.to_string() }
    }

    pub fn inference(reason: impl std::fmt::Display) -> Self {
        Self::Inference(reason.to_string())
    }

    pub fn is_initialization(&self) -> bool {
        matches!(self, Self::ExtractorInitialization { .. })
    }

    pub fn is_inference(&self) -> bool {
        matches!(self, Self::Inference(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
