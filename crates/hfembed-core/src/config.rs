//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars.
//! Nested keys in env vars are separated by `__`, e.g. `APP_EMBEDDING__QUANTIZED`.
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::{DevicePreference, ModelType};

/// Constructor configuration of the embedding adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbeddingConfig {
    pub model_type: ModelType,
    pub quantized: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { model_type: ModelType::default(), quantized: true }
    }
}

/// Where model files live and how the candle pipeline runs them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelStoreConfig {
    pub cache_dir: String,
    /// Use this directory as-is instead of `<cache_dir>/<repo>`.
    pub model_dir: Option<String>,
    pub allow_download: bool,
    pub endpoint: String,
    pub max_len: usize,
    pub device: DevicePreference,
    pub use_fake: bool,
}

impl Default for ModelStoreConfig {
    fn default() -> Self {
        Self {
            cache_dir: "~/.cache/hfembed/models".to_string(),
            model_dir: None,
            allow_download: true,
            endpoint: "https://huggingface.co".to_string(),
            max_len: 256,
            device: DevicePreference::default(),
            use_fake: false,
        }
    }
}

impl ModelStoreConfig {
    pub fn cache_path(&self) -> PathBuf { expand_path(&self.cache_dir) }

    pub fn model_path(&self) -> Option<PathBuf> { self.model_dir.as_deref().map(expand_path) }

    fn validate(&self) -> Result<()> {
        if self.max_len == 0 {
            return Err(Error::InvalidConfig("models.max_len must be greater than 0".into()));
        }
        if self.cache_dir.trim().is_empty() {
            return Err(Error::InvalidConfig("models.cache_dir must not be empty".into()));
        }
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(Error::InvalidConfig(format!("models.endpoint is not an http(s) url: {}", self.endpoint)));
        }
        Ok(())
    }
}

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    /// Wraps an already assembled figment (tests, embedding applications).
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config = Self { figment };
        config.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// The `[embedding]` section, or defaults when absent.
    pub fn embedding(&self) -> Result<EmbeddingConfig> { self.section("embedding") }

    /// The `[models]` section, or defaults when absent.
    pub fn models(&self) -> Result<ModelStoreConfig> { self.section("models") }

    fn section<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        if self.figment.contains(key) { self.get(key) } else { Ok(T::default()) }
    }

    fn validate(&self) -> Result<()> {
        self.embedding()?;
        self.models()?.validate()
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
