// cubertopic: sentence embedding extraction for a topic modeling pipeline.
//
// This is the library root. Documents go in as a DocumentBatch, come out as
// an EmbeddingMatrix with one fixed-width row per document; clustering and
// topic extraction happen downstream.

pub mod config;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod matrix;
pub mod telemetry;

pub use document::DocumentBatch;
pub use embeddings::{Embedder, SentenceEmbedder};
pub use error::{EmbeddingError, ErrorKind};
pub use matrix::EmbeddingMatrix;
