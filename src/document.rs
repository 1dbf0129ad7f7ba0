// Document batches — the ordered input to the embedding extractor.
//
// Rust slices of String cannot hold a null, so the "null document" failure
// lives at the boundary where loosely typed input (JSON, optional values)
// becomes a batch. Once a DocumentBatch exists, every entry is valid text.

use serde_json::Value;

use crate::error::{EmbeddingError, Result};

/// An ordered, immutable sequence of text documents. Row `i` of the
/// resulting embedding matrix corresponds to document `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentBatch {
    docs: Vec<String>,
}

impl DocumentBatch {
    pub fn new(docs: Vec<String>) -> Self {
        Self { docs }
    }

    /// Build a batch from optional documents. A `None` anywhere rejects the
    /// whole batch.
    pub fn from_options<I>(docs: I) -> Result<Self>
    where
        I: IntoIterator<Item = Option<String>>,
    {
        docs.into_iter()
            .enumerate()
            .map(|(i, doc)| {
                doc.ok_or_else(|| EmbeddingError::invalid_input(Some(i), "document is null"))
            })
            .collect::<Result<Vec<_>>>()
            .map(Self::new)
    }

    /// Build a batch from a JSON array of strings.
    ///
    /// `null` entries and non-string entries (numbers, objects, nested
    /// arrays) are rejected with the index of the first offender.
    pub fn from_json(value: &Value) -> Result<Self> {
        let items = value.as_array().ok_or_else(|| {
            EmbeddingError::invalid_input(
                None,
                format!("expected a JSON array of strings, got {}", json_type(value)),
            )
        })?;

        let mut docs = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match item {
                Value::String(s) => docs.push(s.clone()),
                Value::Null => {
                    return Err(EmbeddingError::invalid_input(Some(i), "document is null"))
                }
                other => {
                    return Err(EmbeddingError::invalid_input(
                        Some(i),
                        format!("expected text, got {}", json_type(other)),
                    ))
                }
            }
        }

        Ok(Self::new(docs))
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(raw)
            .map_err(|e| EmbeddingError::invalid_input(None, format!("malformed JSON: {e}")))?;
        Self::from_json(&value)
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.docs.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.docs.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.docs
    }

    pub fn into_inner(self) -> Vec<String> {
        self.docs
    }
}

impl From<Vec<String>> for DocumentBatch {
    fn from(docs: Vec<String>) -> Self {
        Self::new(docs)
    }
}

impl From<&[&str]> for DocumentBatch {
    fn from(docs: &[&str]) -> Self {
        Self::new(docs.iter().map(|d| d.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for DocumentBatch {
    fn from(docs: [&str; N]) -> Self {
        Self::new(docs.iter().map(|d| d.to_string()).collect())
    }
}

impl FromIterator<String> for DocumentBatch {
    fn from_iter<T: IntoIterator<Item = String>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
