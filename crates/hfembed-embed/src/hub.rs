//! Local model file store with on-demand download from a model hub.
//!
//! Layout: `<cache_dir>/<org>--<name>/{config.json,tokenizer.json,model.safetensors}`.
//! A configured `model_dir` is used as-is and never downloaded into.

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hfembed_core::config::ModelStoreConfig;
use hfembed_core::types::ModelType;

pub const CONFIG_FILE: &str = "config.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";
pub const REQUIRED_FILES: [&str; 3] = [CONFIG_FILE, TOKENIZER_FILE, WEIGHTS_FILE];

/// Called with `(file, downloaded_bytes, total_bytes)`; total is 0 when unknown.
pub type ProgressCallback = Arc<dyn Fn(&str, u64, u64) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub dir: PathBuf,
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelFiles {
    fn in_dir(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            config: dir.join(CONFIG_FILE),
            tokenizer: dir.join(TOKENIZER_FILE),
            weights: dir.join(WEIGHTS_FILE),
        }
    }
}

#[derive(Clone)]
pub struct ModelStore {
    cache_dir: PathBuf,
    model_dir: Option<PathBuf>,
    endpoint: String,
    allow_download: bool,
    progress: Option<ProgressCallback>,
}

impl ModelStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        let defaults = ModelStoreConfig::default();
        Self {
            cache_dir: cache_dir.into(),
            model_dir: None,
            endpoint: defaults.endpoint,
            allow_download: defaults.allow_download,
            progress: None,
        }
    }

    pub fn from_config(config: &ModelStoreConfig) -> Self {
        Self {
            cache_dir: config.cache_path(),
            model_dir: config.model_path(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            allow_download: config.allow_download,
            progress: None,
        }
    }

    pub fn with_download(mut self, allow: bool) -> Self { self.allow_download = allow; self }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self { self.progress = Some(progress); self }

    pub fn model_dir(&self, model: ModelType) -> PathBuf {
        match &self.model_dir {
            Some(dir) => dir.clone(),
            None => self.cache_dir.join(model.weights_repo().replace('/', "--")),
        }
    }

    pub fn is_complete(&self, model: ModelType) -> bool {
        let dir = self.model_dir(model);
        REQUIRED_FILES.iter().all(|f| dir.join(f).is_file())
    }

    /// Blocking: makes sure every required file exists locally, downloading
    /// missing ones when allowed.
    pub fn resolve(&self, model: ModelType) -> Result<ModelFiles> {
        let dir = self.model_dir(model);
        let missing: Vec<&str> = REQUIRED_FILES.iter().copied().filter(|f| !dir.join(f).is_file()).collect();
        if missing.is_empty() {
            tracing::debug!(dir = %dir.display(), "model files present");
            return Ok(ModelFiles::in_dir(&dir));
        }
        if self.model_dir.is_some() {
            bail!("model_dir {} is missing {}", dir.display(), missing.join(", "));
        }
        if !self.allow_download {
            bail!("{} is missing {} and downloads are disabled", dir.display(), missing.join(", "));
        }

        fs::create_dir_all(&dir).with_context(|| format!("Failed to create model dir {}", dir.display()))?;
        for file in missing {
            let url = format!("{}/{}/resolve/main/{}", self.endpoint, model.weights_repo(), file);
            self.download_file(&url, file, &dir.join(file))?;
        }
        Ok(ModelFiles::in_dir(&dir))
    }

    fn download_file(&self, url: &str, name: &str, path: &Path) -> Result<()> {
        tracing::info!("Downloading {} to {}", url, path.display());
        let response = ureq::get(url).call().with_context(|| format!("Failed to download from {url}"))?;
        let total_size = response
            .header("content-length")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let part = path.with_file_name(format!("{name}.part"));
        let result = self
            .stream_to(response.into_reader(), name, &part, total_size)
            .and_then(|downloaded| {
                if total_size > 0 && downloaded != total_size {
                    bail!("truncated download of {url}: {downloaded} of {total_size} bytes");
                }
                fs::rename(&part, path).with_context(|| format!("Failed to move {} into place", part.display()))?;
                Ok(downloaded)
            });
        match result {
            Ok(downloaded) => {
                tracing::info!("Downloaded {} bytes to {}", downloaded, path.display());
                Ok(())
            }
            Err(e) => {
                if part.exists() {
                    if let Err(rm) = fs::remove_file(&part) {
                        tracing::warn!("Failed to remove {}: {}", part.display(), rm);
                    }
                }
                Err(e)
            }
        }
    }

    /// Copies `reader` into `part`, reporting progress; returns the byte count.
    fn stream_to(&self, mut reader: impl Read, name: &str, part: &Path, total_size: u64) -> Result<u64> {
        let mut file = fs::File::create(part).with_context(|| format!("Failed to create {}", part.display()))?;
        let mut downloaded: u64 = 0;
        let mut buffer = [0u8; 64 * 1024];
        loop {
            let n = reader.read(&mut buffer).context("Failed to read from download stream")?;
            if n == 0 {
                break;
            }
            file.write_all(&buffer[..n]).context("Failed to write model file")?;
            downloaded += n as u64;
            if let Some(cb) = &self.progress {
                cb(name, downloaded, total_size);
            }
        }
        file.flush()?;
        Ok(downloaded)
    }
}
