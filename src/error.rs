// Typed errors for the embedding contract.
//
// Callers need to tell "you gave me bad input" apart from "the model or the
// compute device let us down", so every failure collapses into one of two
// kinds. Outer layers (config, download) stay on anyhow.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// The two failure kinds a caller can observe from `create_embeddings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: null or non-text entries, text the tokenizer rejects.
    InvalidInput,
    /// Model failed to load, compute device unavailable or exhausted,
    /// inference failed.
    Resource,
}

#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// A document could not be accepted. `index` points at the offending
    /// entry when there is one.
    #[error("Invalid input{}: {reason}", at_index(.index))]
    InvalidInput {
        index: Option<usize>,
        reason: String,
    },

    /// Model or tokenizer file missing from the model directory.
    #[error("Embedding model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    /// Compute device, session, or inference failure.
    #[error("Embedding resource error: {0}")]
    Resource(String),

    /// The model produced output that disagrees with its declared dimension.
    #[error("Unexpected model output shape: expected [{batch}, _, {dim}], got {actual:?}")]
    Shape {
        batch: usize,
        dim: usize,
        actual: Vec<i64>,
    },
}

impl EmbeddingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EmbeddingError::InvalidInput { .. } => ErrorKind::InvalidInput,
            EmbeddingError::ModelNotFound(_)
            | EmbeddingError::Resource(_)
            | EmbeddingError::Shape { .. } => ErrorKind::Resource,
        }
    }

    pub fn invalid_input(index: Option<usize>, reason: impl Into<String>) -> Self {
        EmbeddingError::InvalidInput {
            index,
            reason: reason.into(),
        }
    }

    pub fn resource(reason: impl Into<String>) -> Self {
        EmbeddingError::Resource(reason.into())
    }

    /// A caller-imposed deadline elapsed. Treated like any other resource
    /// failure: the device did not deliver in time.
    pub fn timeout(elapsed: Duration) -> Self {
        EmbeddingError::Resource(format!(
            "embedding did not complete within {:.1}s",
            elapsed.as_secs_f64()
        ))
    }
}

fn at_index(index: &Option<usize>) -> String {
    match index {
        Some(i) => format!(" at document {i}"),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, EmbeddingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_kind() {
        let err = EmbeddingError::invalid_input(Some(3), "null document");
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert_eq!(err.to_string(), "Invalid input at document 3: null document");
    }

    #[test]
    fn test_invalid_input_without_index() {
        let err = EmbeddingError::invalid_input(None, "expected a JSON array");
        assert_eq!(err.to_string(), "Invalid input: expected a JSON array");
    }

    #[test]
    fn test_resource_kinds() {
        assert_eq!(
            EmbeddingError::resource("CUDA unavailable").kind(),
            ErrorKind::Resource
        );
        assert_eq!(
            EmbeddingError::ModelNotFound(PathBuf::from("/nope/model.onnx")).kind(),
            ErrorKind::Resource
        );
        let shape = EmbeddingError::Shape {
            batch: 2,
            dim: 384,
            actual: vec![2, 7, 768],
        };
        assert_eq!(shape.kind(), ErrorKind::Resource);
    }

    #[test]
    fn test_timeout_is_resource() {
        let err = EmbeddingError::timeout(Duration::from_millis(2500));
        assert_eq!(err.kind(), ErrorKind::Resource);
        assert!(err.to_string().contains("2.5s"), "got: {err}");
    }
}
