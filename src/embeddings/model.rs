// Model catalogue and inference options.
//
// Both shipped models are sentence-transformers MiniLM variants exported to
// ONNX, producing 384-dimensional mean-pooled sentence vectors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Embedding dimension shared by both shipped models.
pub const EMBEDDING_DIM: usize = 384;

/// Documents per forward pass unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// A pretrained sentence embedding model available as ONNX on HuggingFace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmbeddingModel {
    /// sentence-transformers/all-MiniLM-L6-v2 — English.
    #[default]
    AllMiniLmL6V2,
    /// sentence-transformers/paraphrase-multilingual-MiniLM-L12-v2 — 50+ languages.
    ParaphraseMultilingualMiniLmL12V2,
}

impl EmbeddingModel {
    /// Pick a model from a language name. English gets the small English
    /// model; any other language gets the multilingual one.
    pub fn for_language(language: &str) -> Self {
        match language.trim().to_ascii_lowercase().as_str() {
            "english" | "en" => EmbeddingModel::AllMiniLmL6V2,
            _ => EmbeddingModel::ParaphraseMultilingualMiniLmL12V2,
        }
    }

    /// Directory name used under the model base directory.
    pub fn name(self) -> &'static str {
        match self {
            EmbeddingModel::AllMiniLmL6V2 => "all-MiniLM-L6-v2",
            EmbeddingModel::ParaphraseMultilingualMiniLmL12V2 => {
                "paraphrase-multilingual-MiniLM-L12-v2"
            }
        }
    }

    /// Base URL for raw file downloads from the HuggingFace repo.
    pub fn hf_url(self) -> String {
        format!(
            "https://huggingface.co/sentence-transformers/{}/resolve/main",
            self.name()
        )
    }

    /// Path of the ONNX export inside the HuggingFace repo.
    pub fn onnx_file(self) -> &'static str {
        "onnx/model.onnx"
    }

    pub fn dimension(self) -> usize {
        EMBEDDING_DIM
    }

    /// Longest token sequence the model was trained with; longer input is
    /// truncated.
    pub fn max_seq_len(self) -> usize {
        match self {
            EmbeddingModel::AllMiniLmL6V2 => 256,
            EmbeddingModel::ParaphraseMultilingualMiniLmL12V2 => 128,
        }
    }

    /// Whether the model's sentence-transformers pipeline ends with a
    /// Normalize module.
    pub fn normalizes(self) -> bool {
        match self {
            EmbeddingModel::AllMiniLmL6V2 => true,
            EmbeddingModel::ParaphraseMultilingualMiniLmL12V2 => false,
        }
    }

    /// Approximate size of the ONNX file, for download messages.
    pub fn approx_size_mb(self) -> u32 {
        match self {
            EmbeddingModel::AllMiniLmL6V2 => 90,
            EmbeddingModel::ParaphraseMultilingualMiniLmL12V2 => 470,
        }
    }
}

impl fmt::Display for EmbeddingModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How per-token hidden states are reduced to one vector per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pooling {
    /// Average over real tokens, weighted by the attention mask.
    #[default]
    Mean,
    /// Hidden state of the first ([CLS]) token.
    Cls,
}

impl FromStr for Pooling {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Pooling::Mean),
            "cls" => Ok(Pooling::Cls),
            other => Err(format!("unknown pooling '{other}' (expected mean or cls)")),
        }
    }
}

/// Where the forward pass runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda { device_id: i32 },
}

impl FromStr for Device {
    type Err = String;

    /// Accepts `cpu`, `cuda` (device 0), or `cuda:<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "cpu" => Ok(Device::Cpu),
            "cuda" | "gpu" => Ok(Device::Cuda { device_id: 0 }),
            _ => {
                let id = s.strip_prefix("cuda:").ok_or_else(|| {
                    format!("unknown device '{s}' (expected cpu, cuda, or cuda:<id>)")
                })?;
                let device_id = id
                    .parse::<i32>()
                    .ok()
                    .filter(|&n| n >= 0)
                    .ok_or_else(|| format!("invalid CUDA device id '{id}'"))?;
                Ok(Device::Cuda { device_id })
            }
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda { device_id } => write!(f, "cuda:{device_id}"),
        }
    }
}

/// Everything the embedder needs beyond the model files themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderOptions {
    pub model: EmbeddingModel,
    pub device: Device,
    pub batch_size: usize,
    pub pooling: Pooling,
    pub normalize: bool,
}

impl EmbedderOptions {
    pub fn for_model(model: EmbeddingModel) -> Self {
        Self {
            model,
            device: Device::Cpu,
            batch_size: DEFAULT_BATCH_SIZE,
            pooling: Pooling::Mean,
            normalize: model.normalizes(),
        }
    }
}

impl Default for EmbedderOptions {
    fn default() -> Self {
        Self::for_model(EmbeddingModel::default())
    }
}
