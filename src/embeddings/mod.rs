// Sentence embeddings — text in, fixed-width dense vectors out.
//
// The Embedder trait is the contract downstream topic stages use;
// SentenceEmbedder implements it with a local ONNX model.

pub mod download;
pub mod model;
pub mod pooling;
pub mod sentence;
pub mod traits;

pub use model::{Device, EmbedderOptions, EmbeddingModel, Pooling, EMBEDDING_DIM};
pub use sentence::SentenceEmbedder;
pub use traits::Embedder;
