//! Pairwise cosine similarity between customers

use ndarray::{Array1, Array2, ArrayView1, Axis};
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::ids::CustomerId;
use crate::matrix::InteractionMatrix;

/// Square customer x customer cosine similarity matrix
#[derive(Debug, Clone)]
pub struct SimilarityMatrix {
    labels: Vec<CustomerId>,
    index: HashMap<CustomerId, usize>,
    values: Array2<f64>,
}

impl SimilarityMatrix {
    /// Cosine similarity of every pair of interaction rows.
    ///
    /// A customer with an all-zero row has similarity 0 with everyone,
    /// itself included.
    pub fn compute(matrix: &InteractionMatrix) -> Self {
        let mut normalized = matrix.values().to_owned();
        for mut row in normalized.axis_iter_mut(Axis(0)) {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|v| v / norm);
            } else {
                row.fill(0.0);
            }
        }

        let mut values = normalized.dot(&normalized.t());
        values.mapv_inplace(|v| v.clamp(-1.0, 1.0));

        Self::from_parts(matrix.customers().to_vec(), values)
    }

    /// Wrap precomputed values; `values` must be `labels.len()` square
    pub fn from_dense(labels: Vec<CustomerId>, values: Vec<f64>) -> Result<Self> {
        let n = labels.len();
        let values = Array2::from_shape_vec((n, n), values)?;
        Ok(Self::from_parts(labels, values))
    }

    fn from_parts(labels: Vec<CustomerId>, values: Array2<f64>) -> Self {
        let index = labels
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();
        Self {
            labels,
            index,
            values,
        }
    }

    /// Row and column labels (identical)
    pub fn labels(&self) -> &[CustomerId] {
        &self.labels
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    pub fn get(&self, a: &CustomerId, b: &CustomerId) -> Option<f64> {
        let i = *self.index.get(a)?;
        let j = *self.index.get(b)?;
        Some(self.values[[i, j]])
    }

    pub fn row(&self, customer: &CustomerId) -> Option<ArrayView1<'_, f64>> {
        self.index.get(customer).map(|&i| self.values.row(i))
    }

    /// Similarity row for `customer`, laid out along `labels`.
    ///
    /// Labels this matrix does not know get similarity 0; an unknown
    /// customer yields an all-zero row.
    pub fn aligned_row(&self, customer: &CustomerId, labels: &[CustomerId]) -> Array1<f64> {
        let Some(row) = self.row(customer) else {
            return Array1::zeros(labels.len());
        };
        if self.labels == labels {
            return row.to_owned();
        }

        labels
            .iter()
            .map(|label| self.index.get(label).map_or(0.0, |&j| row[j]))
            .collect()
    }

    /// Check that both axes carry exactly the interaction matrix's row labels
    pub fn ensure_aligned(&self, matrix: &InteractionMatrix) -> Result<()> {
        let (rows, cols) = self.shape();
        if rows != cols || rows != self.labels.len() {
            return Err(Error::Misaligned(format!(
                "similarity matrix is {rows}x{cols} with {} labels",
                self.labels.len()
            )));
        }
        if self.labels != matrix.customers() {
            return Err(Error::Misaligned(format!(
                "similarity labels ({}) differ from interaction rows ({})",
                self.labels.len(),
                matrix.customers().len()
            )));
        }
        Ok(())
    }
}
