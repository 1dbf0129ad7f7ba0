// Input padding and output pooling for BERT-style encoders.
//
// Pure functions over flat row-major buffers so they can be tested without a
// model. The layouts match what the ONNX export consumes and produces:
//   inputs:  [batch, seq_len] i64
//   output:  last_hidden_state [batch, seq_len, dim] f32
//
// `embed_padded` is the whole post-tokenization path minus the model call,
// which it takes as a closure.

use super::model::Pooling;
use crate::error::{EmbeddingError, Result};

/// One tokenized document, borrowed from the tokenizer's encoding.
#[derive(Debug, Clone, Copy)]
pub struct TokenizedDoc<'a> {
    pub ids: &'a [u32],
    pub attention_mask: &'a [u32],
    pub type_ids: &'a [u32],
}

/// Right-padded model inputs for one forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBatch {
    pub batch_size: usize,
    pub max_len: usize,
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub token_type_ids: Vec<i64>,
}

/// Pad every document to the longest sequence in the batch. Padding
/// positions get `pad_id`, attention 0 and type 0.
pub fn pad_batch(docs: &[TokenizedDoc<'_>], pad_id: u32) -> PaddedBatch {
    let batch_size = docs.len();
    let max_len = docs.iter().map(|d| d.ids.len()).max().unwrap_or(0);

    let mut input_ids = Vec::with_capacity(batch_size * max_len);
    let mut attention_mask = Vec::with_capacity(batch_size * max_len);
    let mut token_type_ids = Vec::with_capacity(batch_size * max_len);

    for doc in docs {
        let seq_len = doc.ids.len();

        input_ids.extend(doc.ids.iter().map(|&id| id as i64));
        attention_mask.extend(doc.attention_mask.iter().map(|&m| m as i64));
        // Some tokenizers omit type ids; single-sentence input is all zeros anyway.
        if doc.type_ids.len() == seq_len {
            token_type_ids.extend(doc.type_ids.iter().map(|&t| t as i64));
        } else {
            token_type_ids.extend(std::iter::repeat_n(0i64, seq_len));
        }

        let pad_len = max_len - seq_len;
        input_ids.extend(std::iter::repeat_n(pad_id as i64, pad_len));
        attention_mask.extend(std::iter::repeat_n(0i64, pad_len));
        token_type_ids.extend(std::iter::repeat_n(0i64, pad_len));
    }

    PaddedBatch {
        batch_size,
        max_len,
        input_ids,
        attention_mask,
        token_type_ids,
    }
}

/// Raw encoder output: the reported shape and the flat row-major values.
pub type EncoderOutput = (Vec<i64>, Vec<f32>);

/// Run `forward` on a padded batch and reduce its last_hidden_state to one
/// `dim`-wide row per document, L2-normalized when `normalize` is set.
///
/// A batch with no tokens at all never reaches the model: each of its rows
/// is the zero vector. Output that is not `[batch, max_len, dim]` is an
/// `EmbeddingError::Shape`.
pub fn embed_padded<F>(
    padded: &PaddedBatch,
    dim: usize,
    pooling: Pooling,
    normalize: bool,
    forward: F,
) -> Result<Vec<f32>>
where
    F: FnOnce(&PaddedBatch) -> Result<EncoderOutput>,
{
    let (batch_size, max_len) = (padded.batch_size, padded.max_len);
    if max_len == 0 {
        return Ok(vec![0.0; batch_size * dim]);
    }

    let (shape, hidden) = forward(padded)?;

    let expected = [batch_size as i64, max_len as i64, dim as i64];
    if shape != expected || hidden.len() != batch_size * max_len * dim {
        return Err(EmbeddingError::Shape {
            batch: batch_size,
            dim,
            actual: shape,
        });
    }

    let mut pooled = pool(
        pooling,
        &hidden,
        &padded.attention_mask,
        batch_size,
        max_len,
        dim,
    );
    if normalize {
        l2_normalize_rows(&mut pooled, dim);
    }
    Ok(pooled)
}

/// Reduce `[batch, seq_len, dim]` hidden states to `[batch, dim]`.
pub fn pool(
    strategy: Pooling,
    hidden: &[f32],
    attention_mask: &[i64],
    batch_size: usize,
    seq_len: usize,
    dim: usize,
) -> Vec<f32> {
    match strategy {
        Pooling::Mean => mean_pool(hidden, attention_mask, batch_size, seq_len, dim),
        Pooling::Cls => cls_pool(hidden, batch_size, seq_len, dim),
    }
}

/// Mean pooling: average token embeddings weighted by the attention mask.
/// A row whose mask is all zeros pools to the zero vector.
pub fn mean_pool(
    hidden: &[f32],
    attention_mask: &[i64],
    batch_size: usize,
    seq_len: usize,
    dim: usize,
) -> Vec<f32> {
    let mut pooled = Vec::with_capacity(batch_size * dim);

    for i in 0..batch_size {
        // Accumulate in f64; long documents sum hundreds of tokens.
        let mut sum = vec![0.0_f64; dim];
        let mut mask_sum = 0.0_f64;

        for j in 0..seq_len {
            let mask_val = attention_mask[i * seq_len + j] as f64;
            if mask_val > 0.0 {
                mask_sum += mask_val;
                let offset = (i * seq_len + j) * dim;
                for (acc, &h) in sum.iter_mut().zip(&hidden[offset..offset + dim]) {
                    *acc += h as f64 * mask_val;
                }
            }
        }

        if mask_sum > 0.0 {
            for val in &mut sum {
                *val /= mask_sum;
            }
        }

        pooled.extend(sum.into_iter().map(|v| v as f32));
    }

    pooled
}

/// CLS pooling: take the first token's hidden state for each row.
pub fn cls_pool(hidden: &[f32], batch_size: usize, seq_len: usize, dim: usize) -> Vec<f32> {
    let mut pooled = Vec::with_capacity(batch_size * dim);
    for i in 0..batch_size {
        let offset = i * seq_len * dim;
        pooled.extend_from_slice(&hidden[offset..offset + dim]);
    }
    pooled
}

/// Scale each `dim`-wide row of `data` to unit L2 norm. Zero rows stay zero.
pub fn l2_normalize_rows(data: &mut [f32], dim: usize) {
    if dim == 0 {
        return;
    }
    for row in data.chunks_mut(dim) {
        let norm = row.iter().map(|&v| (v as f64) * (v as f64)).sum::<f64>().sqrt();
        if norm > f64::EPSILON {
            for v in row.iter_mut() {
                *v = (*v as f64 / norm) as f32;
            }
        }
    }
}
