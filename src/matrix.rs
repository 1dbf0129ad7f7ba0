// Embedding matrix — one row per document, one column per embedding dimension.
//
// Backed by a row-major ndarray so downstream clustering can borrow the
// buffer without copying. The shape is fixed at construction: a matrix whose
// buffer length disagrees with rows * dim cannot be built.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::{EmbeddingError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingMatrix {
    data: Array2<f32>,
}

impl EmbeddingMatrix {
    /// A matrix with zero rows and `dim` columns — the result of embedding
    /// an empty batch.
    pub fn empty(dim: usize) -> Self {
        Self {
            data: Array2::zeros((0, dim)),
        }
    }

    /// Build from a flat row-major buffer of `rows * dim` values.
    pub fn from_flat(rows: usize, dim: usize, values: Vec<f32>) -> Result<Self> {
        let len = values.len();
        let data = Array2::from_shape_vec((rows, dim), values).map_err(|e| {
            EmbeddingError::invalid_input(
                None,
                format!("buffer of {len} values does not fit shape ({rows}, {dim}): {e}"),
            )
        })?;
        Ok(Self { data })
    }

    /// Build from per-document vectors. Every vector must have the same length.
    pub fn from_rows(rows: Vec<Vec<f32>>, dim: usize) -> Result<Self> {
        let count = rows.len();
        let mut flat = Vec::with_capacity(count * dim);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != dim {
                return Err(EmbeddingError::invalid_input(
                    Some(i),
                    format!("row has {} values, expected {dim}", row.len()),
                ));
            }
            flat.extend(row);
        }
        Self::from_flat(count, dim, flat)
    }

    /// (rows, dim)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn dim(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    /// Embedding for document `index`, if it exists.
    pub fn row(&self, index: usize) -> Option<ArrayView1<'_, f32>> {
        (index < self.rows()).then(|| self.data.row(index))
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = ArrayView1<'_, f32>> {
        self.data.outer_iter()
    }

    /// Smallest component across the whole matrix. `None` when empty, NaN
    /// when any component is NaN.
    pub fn min(&self) -> Option<f32> {
        self.extreme(f32::min)
    }

    /// Largest component across the whole matrix. `None` when empty, NaN
    /// when any component is NaN.
    pub fn max(&self) -> Option<f32> {
        self.extreme(f32::max)
    }

    /// True when no component is NaN or infinite.
    pub fn all_finite(&self) -> bool {
        self.data.iter().all(|v| v.is_finite())
    }

    // f32::min/max return the other operand when one is NaN; a NaN must
    // poison the result so `min() > -5.0` style checks fail on it.
    fn extreme(&self, pick: fn(f32, f32) -> f32) -> Option<f32> {
        self.data.iter().copied().reduce(|a, b| {
            if a.is_nan() || b.is_nan() {
                f32::NAN
            } else {
                pick(a, b)
            }
        })
    }

    /// Row-major view of every component.
    pub fn as_slice(&self) -> &[f32] {
        // Always built through from_shape_vec/zeros, so standard layout holds.
        self.data.as_slice().unwrap_or_default()
    }

    pub fn view(&self) -> ndarray::ArrayView2<'_, f32> {
        self.data.view()
    }

    pub fn into_array(self) -> Array2<f32> {
        self.data
    }

    pub fn to_vec(&self) -> Vec<Vec<f32>> {
        self.iter_rows().map(|r| r.to_vec()).collect()
    }

    /// Centroid of all rows. A zero vector of length `dim` for an empty matrix.
    pub fn mean_row(&self) -> Array1<f32> {
        self.data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(self.dim()))
    }

    /// Cosine similarity between rows `a` and `b`, in -1.0..=1.0.
    ///
    /// Returns `None` if either index is out of range, and 0.0 when either
    /// row has zero magnitude.
    pub fn cosine_similarity(&self, a: usize, b: usize) -> Option<f32> {
        let (ra, rb) = (self.row(a)?, self.row(b)?);
        Some(cosine(ra, rb))
    }
}

fn cosine(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    let dot = a.dot(&b) as f64;
    let mag_a = (a.dot(&a) as f64).sqrt();
    let mag_b = (b.dot(&b) as f64).sqrt();

    let denom = mag_a * mag_b;
    if denom < f64::EPSILON {
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0) as f32
    }
}

impl Serialize for EmbeddingMatrix {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EmbeddingMatrix", 3)?;
        state.serialize_field("rows", &self.rows())?;
        state.serialize_field("dim", &self.dim())?;
        state.serialize_field("data", &self.to_vec())?;
        state.end()
    }
}
