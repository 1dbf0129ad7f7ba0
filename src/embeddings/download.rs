// Model download helper for the sentence embedding models.
//
// Fetches the ONNX export and tokenizer of a sentence-transformers model from
// HuggingFace into a platform-appropriate directory
// (~/.local/share/cubertopic/models/<model>/ on Linux) so later runs load
// from disk without touching the network.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::io::AsyncWriteExt;
use tracing::info;

use super::model::EmbeddingModel;
use super::sentence::{MODEL_FILE, TOKENIZER_FILE};

/// Returns the default base directory for storing model files.
pub fn default_model_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cubertopic")
        .join("models")
}

/// Subdirectory within `base` holding one model's files.
pub fn model_dir_for(base: &Path, model: EmbeddingModel) -> PathBuf {
    base.join(model.name())
}

/// Check whether both required files exist in a model directory.
pub fn model_files_present(dir: &Path) -> bool {
    dir.join(MODEL_FILE).exists() && dir.join(TOKENIZER_FILE).exists()
}

/// Download `model` into its subdirectory of `base`, skipping files that
/// already exist. Returns the model directory.
pub async fn download_model(base: &Path, model: EmbeddingModel) -> Result<PathBuf> {
    let dir = model_dir_for(base, model);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create model directory: {}", dir.display()))?;

    let base_url = model.hf_url();

    let tokenizer_path = dir.join(TOKENIZER_FILE);
    if tokenizer_path.exists() {
        info!(model = %model, "Tokenizer already exists, skipping");
    } else {
        download_file(
            &format!("{}/{}", base_url, TOKENIZER_FILE),
            &tokenizer_path,
            false,
        )
        .await?;
    }

    let model_path = dir.join(MODEL_FILE);
    if model_path.exists() {
        info!(model = %model, "ONNX model already exists, skipping");
    } else {
        info!(
            model = %model,
            "Downloading {} (~{} MB)",
            model.onnx_file(),
            model.approx_size_mb()
        );
        download_file(
            &format!("{}/{}", base_url, model.onnx_file()),
            &model_path,
            true,
        )
        .await?;
    }

    Ok(dir)
}

/// Download a single file from a URL to a local path.
/// If `show_progress` is true, display a progress bar.
///
/// The body is written to a `.part` file first and renamed into place, so an
/// interrupted download never leaves a truncated model that looks present.
async fn download_file(url: &str, dest: &Path, show_progress: bool) -> Result<()> {
    let client = reqwest::Client::new();
    let mut response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to download {}", url))?;

    if !response.status().is_success() {
        anyhow::bail!("Download failed with status {}: {}", response.status(), url);
    }

    let pb = if show_progress {
        Some(progress_bar(response.content_length()))
    } else {
        None
    };

    let mut part = PartialFile::create(dest).await?;
    while let Some(chunk) = response
        .chunk()
        .await
        .context("Failed to read response body")?
    {
        let written = part.write_chunk(&chunk).await?;
        if let Some(ref pb) = pb {
            pb.set_position(written);
        }
    }
    part.finish().await?;

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    info!("Downloaded {} to {}", url, dest.display());
    Ok(())
}

/// A file being downloaded. Chunks are appended to `<dest>.part` as they
/// arrive; `finish` renames it onto `dest`.
struct PartialFile {
    file: tokio::fs::File,
    partial: PathBuf,
    dest: PathBuf,
    written: u64,
}

impl PartialFile {
    async fn create(dest: &Path) -> Result<Self> {
        let partial = dest.with_extension("part");
        let file = tokio::fs::File::create(&partial)
            .await
            .with_context(|| format!("Failed to create {}", partial.display()))?;
        Ok(Self {
            file,
            partial,
            dest: dest.to_path_buf(),
            written: 0,
        })
    }

    /// Append one chunk. Returns the total bytes written so far.
    async fn write_chunk(&mut self, chunk: &[u8]) -> Result<u64> {
        self.file
            .write_all(chunk)
            .await
            .with_context(|| format!("Failed to write {}", self.partial.display()))?;
        self.written += chunk.len() as u64;
        Ok(self.written)
    }

    async fn finish(mut self) -> Result<u64> {
        self.file
            .flush()
            .await
            .with_context(|| format!("Failed to write {}", self.partial.display()))?;
        drop(self.file);
        tokio::fs::rename(&self.partial, &self.dest)
            .await
            .with_context(|| format!("Failed to move download into {}", self.dest.display()))?;
        Ok(self.written)
    }
}

fn progress_bar(total_size: Option<u64>) -> ProgressBar {
    match total_size {
        Some(size) => {
            let pb = ProgressBar::new(size);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("    [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("    {spinner} {bytes}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            pb
        }
    }
}
