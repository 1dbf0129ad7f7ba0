// Embedder trait — the seam downstream topic stages depend on.
//
// Clustering and topic extraction only need "documents in, fixed-width rows
// out". Keeping that behind a trait lets those stages run against the ONNX
// extractor in production and a cheap deterministic stand-in in tests.

use crate::document::DocumentBatch;
use crate::error::{EmbeddingError, Result};
use crate::matrix::EmbeddingMatrix;

/// Converts documents into an embedding matrix with one row per document.
pub trait Embedder: Send + Sync {
    /// Embed a batch. Row `i` of the result belongs to document `i`, and the
    /// call either embeds every document or fails.
    fn embed_documents(&self, documents: &DocumentBatch) -> Result<EmbeddingMatrix>;

    /// Width of every row this embedder produces.
    fn dimension(&self) -> usize;

    /// Embed a single document.
    fn embed_one(&self, document: &str) -> Result<Vec<f32>> {
        let batch = DocumentBatch::new(vec![document.to_string()]);
        let matrix = self.embed_documents(&batch)?;
        matrix
            .row(0)
            .map(|r| r.to_vec())
            .ok_or_else(|| EmbeddingError::resource("embedder returned no rows for one document"))
    }
}
