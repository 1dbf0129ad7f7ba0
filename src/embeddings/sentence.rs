// Sentence embedding extractor backed by a local ONNX model.
//
// Documents are tokenized, right-padded, and pushed through the encoder in
// chunks of `batch_size`; the last_hidden_state output is pooled (mean by
// default) and optionally L2-normalized to match the model's own pipeline.
// Chunking only affects throughput: the rows are identical either way.
//
// Only `forward` touches ONNX Runtime. Chunking and the post-inference path
// (shape check, pooling, normalization) are plain functions tested below and
// in `pooling`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

use super::model::{Device, EmbedderOptions};
use super::pooling::{embed_padded, pad_batch, EncoderOutput, PaddedBatch, TokenizedDoc};
use super::traits::Embedder;
use crate::config::Config;
use crate::document::DocumentBatch;
use crate::error::{EmbeddingError, Result};
use crate::matrix::EmbeddingMatrix;

pub const MODEL_FILE: &str = "model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Turns text documents into fixed-width dense vectors.
///
/// The ONNX session sits behind Arc<Mutex> because `Session::run` takes
/// `&mut self`; concurrent calls are serialized on that lock. The tokenizer
/// is only read, so it is shared behind a plain Arc. Cloning is cheap and
/// clones share the loaded model, which is released when the last one drops.
#[derive(Clone)]
pub struct SentenceEmbedder {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    pad_id: u32,
    options: EmbedderOptions,
}

impl SentenceEmbedder {
    /// Load the model and tokenizer from `model_dir`.
    ///
    /// Expects `model.onnx` and `tokenizer.json` in the directory; see
    /// `download::download_model` to fetch them.
    pub fn load(model_dir: &Path, options: EmbedderOptions) -> Result<Self> {
        if options.batch_size == 0 {
            return Err(EmbeddingError::invalid_input(
                None,
                "batch_size must be greater than zero",
            ));
        }

        let model_path = model_dir.join(MODEL_FILE);
        let tokenizer_path = model_dir.join(TOKENIZER_FILE);

        if !model_path.exists() {
            return Err(EmbeddingError::ModelNotFound(model_path));
        }
        if !tokenizer_path.exists() {
            return Err(EmbeddingError::ModelNotFound(tokenizer_path));
        }

        let session = build_session(&model_path, options.device)?;

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            EmbeddingError::resource(format!("failed to load embedding tokenizer: {e}"))
        })?;

        // Padding is done by hand per chunk, so any fixed padding baked into
        // tokenizer.json is switched off after reading its pad id.
        let pad_id = tokenizer.get_padding().map(|p| p.pad_id).unwrap_or(0);
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: options.model.max_seq_len(),
                ..Default::default()
            }))
            .map_err(|e| EmbeddingError::resource(format!("failed to configure truncation: {e}")))?;

        info!(
            model = %options.model,
            device = %options.device,
            dir = %model_dir.display(),
            "Loaded sentence embedding model"
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            tokenizer: Arc::new(tokenizer),
            pad_id,
            options,
        })
    }

    /// Load the model the configuration points at.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::load(&config.embedding_model_dir(), config.embedder_options())
    }

    pub fn options(&self) -> &EmbedderOptions {
        &self.options
    }

    /// Embed every document, one row per document, in input order.
    ///
    /// All or nothing: any failure returns an error and no matrix.
    pub fn create_embeddings<S: AsRef<str>>(&self, documents: &[S]) -> Result<EmbeddingMatrix> {
        embed_in_chunks(
            documents,
            self.options.batch_size,
            self.options.model.dimension(),
            |chunk, offset| self.embed_chunk(chunk, offset),
        )
    }

    /// Async wrapper: runs `create_embeddings` on the blocking pool so the
    /// runtime stays responsive. Wrap in `tokio::time::timeout` for a
    /// deadline and report expiry with `EmbeddingError::timeout`.
    pub async fn create_embeddings_async(&self, documents: &[String]) -> Result<EmbeddingMatrix> {
        if documents.is_empty() {
            return Ok(EmbeddingMatrix::empty(self.options.model.dimension()));
        }

        let embedder = self.clone();
        let documents = documents.to_vec();

        tokio::task::spawn_blocking(move || embedder.create_embeddings(&documents))
            .await
            .map_err(|e| EmbeddingError::resource(format!("embedding task failed: {e}")))?
    }

    /// Tokenize, run one forward pass, pool. Returns `chunk.len() * dim`
    /// values. `offset` is the index of the chunk's first document in the
    /// caller's batch, for error reporting.
    fn embed_chunk<S: AsRef<str>>(&self, chunk: &[S], offset: usize) -> Result<Vec<f32>> {
        let encodings = chunk
            .iter()
            .enumerate()
            .map(|(i, text)| {
                self.tokenizer.encode(text.as_ref(), true).map_err(|e| {
                    EmbeddingError::invalid_input(
                        Some(offset + i),
                        format!("tokenization failed: {e}"),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let docs: Vec<TokenizedDoc<'_>> = encodings
            .iter()
            .map(|enc| TokenizedDoc {
                ids: enc.get_ids(),
                attention_mask: enc.get_attention_mask(),
                type_ids: enc.get_type_ids(),
            })
            .collect();

        let padded = pad_batch(&docs, self.pad_id);
        embed_padded(
            &padded,
            self.options.model.dimension(),
            self.options.pooling,
            self.options.normalize,
            |inputs| self.forward(inputs),
        )
    }

    /// One encoder pass. Output 0 is last_hidden_state: [batch, seq_len, dim].
    fn forward(&self, padded: &PaddedBatch) -> Result<EncoderOutput> {
        let shape = [padded.batch_size as i64, padded.max_len as i64];
        let input_ids = Tensor::from_array((shape, padded.input_ids.clone())).map_err(|e| {
            EmbeddingError::resource(format!("failed to create input_ids tensor: {e}"))
        })?;
        let attention_mask = Tensor::from_array((shape, padded.attention_mask.clone()))
            .map_err(|e| {
                EmbeddingError::resource(format!("failed to create attention_mask tensor: {e}"))
            })?;
        let token_type_ids = Tensor::from_array((shape, padded.token_type_ids.clone()))
            .map_err(|e| {
                EmbeddingError::resource(format!("failed to create token_type_ids tensor: {e}"))
            })?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbeddingError::resource(format!("session lock poisoned: {e}")))?;

        let outputs = session
            .run(ort::inputs! {
                "input_ids" => input_ids,
                "attention_mask" => attention_mask,
                "token_type_ids" => token_type_ids
            })
            .map_err(|e| EmbeddingError::resource(format!("embedding inference failed: {e}")))?;

        let (out_shape, data) = outputs[0].try_extract_tensor::<f32>().map_err(|e| {
            EmbeddingError::resource(format!("failed to extract embedding output: {e}"))
        })?;

        let dims: Vec<i64> = out_shape.iter().copied().collect();
        Ok((dims, data.to_vec()))
    }
}

/// Split `documents` into chunks of `batch_size`, embed each with
/// `embed_chunk(chunk, offset)` and stack the rows in input order. `offset`
/// is the index of the chunk's first document. Stops at the first error.
fn embed_in_chunks<S, F>(
    documents: &[S],
    batch_size: usize,
    dim: usize,
    mut embed_chunk: F,
) -> Result<EmbeddingMatrix>
where
    F: FnMut(&[S], usize) -> Result<Vec<f32>>,
{
    if documents.is_empty() {
        return Ok(EmbeddingMatrix::empty(dim));
    }
    if batch_size == 0 {
        return Err(EmbeddingError::invalid_input(
            None,
            "batch_size must be greater than zero",
        ));
    }

    let mut values = Vec::with_capacity(documents.len() * dim);
    let mut chunks = 0usize;
    for (chunk_index, chunk) in documents.chunks(batch_size).enumerate() {
        let offset = chunk_index * batch_size;
        let rows = embed_chunk(chunk, offset)?;
        if rows.len() != chunk.len() * dim {
            return Err(EmbeddingError::Shape {
                batch: chunk.len(),
                dim,
                actual: vec![rows.len() as i64],
            });
        }
        values.extend(rows);
        chunks += 1;
    }

    debug!(
        batch_size = documents.len(),
        dim = dim,
        chunks = chunks,
        "Computed sentence embeddings"
    );

    EmbeddingMatrix::from_flat(documents.len(), dim, values)
}

impl Embedder for SentenceEmbedder {
    fn embed_documents(&self, documents: &DocumentBatch) -> Result<EmbeddingMatrix> {
        self.create_embeddings(documents.as_slice())
    }

    fn dimension(&self) -> usize {
        self.options.model.dimension()
    }
}

impl std::fmt::Debug for SentenceEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SentenceEmbedder")
            .field("options", &self.options)
            .field("pad_id", &self.pad_id)
            .finish_non_exhaustive()
    }
}

/// Create the ONNX session, registering the CUDA execution provider when a
/// GPU is requested. Registration errors out instead of silently falling
/// back to CPU.
fn build_session(model_path: &Path, device: Device) -> Result<Session> {
    let builder = Session::builder().map_err(|e| {
        EmbeddingError::resource(format!("failed to create ONNX session builder: {e}"))
    })?;

    let mut builder = match device {
        Device::Cpu => builder,
        Device::Cuda { device_id } => with_cuda(builder, device_id)?,
    };

    builder.commit_from_file(model_path).map_err(|e| {
        EmbeddingError::resource(format!(
            "failed to load embedding model from {}: {e}",
            model_path.display()
        ))
    })
}

#[cfg(feature = "cuda")]
fn with_cuda(
    builder: ort::session::builder::SessionBuilder,
    device_id: i32,
) -> Result<ort::session::builder::SessionBuilder> {
    use ort::execution_providers::CUDAExecutionProvider;

    let cuda = CUDAExecutionProvider::default()
        .with_device_id(device_id)
        .build()
        .error_on_failure();

    builder.with_execution_providers([cuda]).map_err(|e| {
        EmbeddingError::resource(format!("CUDA device {device_id} unavailable: {e}"))
    })
}

#[cfg(not(feature = "cuda"))]
fn with_cuda(
    _builder: ort::session::builder::SessionBuilder,
    device_id: i32,
) -> Result<ort::session::builder::SessionBuilder> {
    tracing::warn!(
        device_id,
        "CUDA requested but cubertopic was built without the `cuda` feature"
    );
    Err(EmbeddingError::resource(format!(
        "CUDA device {device_id} requested, but this build has no CUDA support \
         (enable the `cuda` feature)"
    )))
}
