use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::embeddings::download;
use crate::embeddings::model::{
    Device, EmbedderOptions, EmbeddingModel, Pooling, DEFAULT_BATCH_SIZE,
};

/// Central configuration loaded from environment variables.
///
/// Call `load_dotenv()` first to pick up a `.env` file; everything has a
/// default, so an empty environment yields a CPU, English, mean-pooled setup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Base directory holding one subdirectory per downloaded model
    pub model_dir: PathBuf,
    /// Language name the model was chosen from (CUBERTOPIC_LANGUAGE)
    pub language: String,
    /// Embedding model chosen from `language`
    pub model: EmbeddingModel,
    /// Compute device for the forward pass (default: cpu)
    pub device: Device,
    /// Documents per forward pass
    pub batch_size: usize,
    pub pooling: Pooling,
    /// L2-normalize pooled vectors (default: whatever the model's pipeline does)
    pub normalize: bool,
}

impl Config {
    /// Load a `.env` file if present. Missing files are not an error.
    pub fn load_dotenv() {
        let _ = dotenvy::dotenv();
    }

    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. `load()` passes the
    /// process environment; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let model_dir = lookup("CUBERTOPIC_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(download::default_model_dir);

        let language = lookup("CUBERTOPIC_LANGUAGE").unwrap_or_else(|| "english".to_string());
        let model = EmbeddingModel::for_language(&language);

        let device = parse_var(&lookup, "CUBERTOPIC_DEVICE")?.unwrap_or_default();
        let pooling = parse_var(&lookup, "CUBERTOPIC_POOLING")?.unwrap_or_default();

        let batch_size = match lookup("CUBERTOPIC_BATCH_SIZE") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|&n| n > 0)
                .with_context(|| {
                    format!("CUBERTOPIC_BATCH_SIZE must be a positive integer, got '{raw}'")
                })?,
            None => DEFAULT_BATCH_SIZE,
        };

        let normalize = match lookup("CUBERTOPIC_NORMALIZE") {
            Some(raw) => parse_bool(&raw).with_context(|| {
                format!("CUBERTOPIC_NORMALIZE must be true/false/1/0, got '{raw}'")
            })?,
            None => model.normalizes(),
        };

        Ok(Self {
            model_dir,
            language,
            model,
            device,
            batch_size,
            pooling,
            normalize,
        })
    }

    /// Directory holding the chosen model's files.
    pub fn embedding_model_dir(&self) -> PathBuf {
        download::model_dir_for(&self.model_dir, self.model)
    }

    /// Check that the chosen model has been downloaded.
    /// Call this before loading the embedder.
    pub fn require_model(&self) -> Result<()> {
        let dir = self.embedding_model_dir();
        if !download::model_files_present(&dir) {
            anyhow::bail!(
                "Embedding model files not found in {}\n\
                 Fetch them with cubertopic::embeddings::download::download_model \
                 or set CUBERTOPIC_MODEL_DIR to a directory that has them.",
                dir.display()
            );
        }
        Ok(())
    }

    pub fn embedder_options(&self) -> EmbedderOptions {
        EmbedderOptions::from(self)
    }
}

impl From<&Config> for EmbedderOptions {
    fn from(config: &Config) -> Self {
        EmbedderOptions {
            model: config.model,
            device: config.device,
            batch_size: config.batch_size,
            pooling: config.pooling,
            normalize: config.normalize,
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr<Err = String>,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| raw.parse::<T>().map_err(|e| anyhow::anyhow!("{key}: {e}")))
        .transpose()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}
