//! Face embedding vectors and the exact nearest-neighbour math over them.
//!
//! Similarity is derived from Euclidean distance as `1 - d² / 2`, which equals
//! cosine similarity when both vectors have unit length. Callers that disable
//! normalisation get scores outside `[-1, 1]` for non-unit vectors.

use ndarray::{Array2, ArrayView1, Axis};
use crate::common::{FaceRollError, Result};

pub type Embedding = Vec<f32>;

/// Length of every embedding produced by the recognition model.
pub const EMBEDDING_DIM: usize = 512;

pub fn validate_embedding(embedding: &[f32]) -> Result<()> {
    if embedding.len() != EMBEDDING_DIM {
        return Err(FaceRollError::InvalidArgument(format!(
            "Embedding must have {} dimensions, got {}", EMBEDDING_DIM, embedding.len()
        )));
    }
    if embedding.iter().any(|v| !v.is_finite()) {
        return Err(FaceRollError::InvalidArgument(
            "Embedding contains non-finite values".into()
        ));
    }
    Ok(())
}

pub fn l2_norm(embedding: &[f32]) -> f32 {
    embedding.iter().map(|x| x * x).sum::<f32>().sqrt()
}

pub fn l2_normalize(embedding: &[f32]) -> Result<Embedding> {
    let norm = l2_norm(embedding);
    if !norm.is_finite() {
        return Err(FaceRollError::InvalidArgument(
            "Embedding norm overflows; values are too large to normalize".into()
        ));
    }
    if norm == 0.0 {
        return Err(FaceRollError::InvalidArgument(
            "Cannot normalize a zero-length embedding".into()
        ));
    }
    Ok(embedding.iter().map(|x| x / norm).collect())
}

#[cfg(test)]
fn l2_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

pub fn similarity_from_distance(distance: f32) -> f32 {
    1.0 - (distance * distance) / 2.0
}

/// Dense `n x EMBEDDING_DIM` matrix of stored embeddings, rows in insertion order.
pub struct Gallery {
    matrix: Array2<f32>,
}

impl Gallery {
    pub fn from_rows(rows: &[Embedding]) -> Result<Self> {
        let mut flat = Vec::with_capacity(rows.len() * EMBEDDING_DIM);
        for row in rows {
            validate_embedding(row)?;
            flat.extend_from_slice(row);
        }
        let matrix = Array2::from_shape_vec((rows.len(), EMBEDDING_DIM), flat)
            .map_err(|e| FaceRollError::InvalidArgument(format!("Bad gallery shape: {}", e)))?;
        Ok(Self { matrix })
    }

    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Euclidean distance from `query` to every row.
    pub fn distances(&self, query: &[f32]) -> Result<Vec<f32>> {
        validate_embedding(query)?;
        if self.is_empty() {
            return Ok(Vec::new());
        }
        let query = ArrayView1::from(query);
        let diff = &self.matrix - &query;
        Ok(diff
            .mapv(|x| x * x)
            .sum_axis(Axis(1))
            .iter()
            .map(|d| d.sqrt())
            .collect())
    }

    /// Row indices and distances of the `k` closest rows, nearest first.
    /// Equal distances keep row order.
    pub fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        let distances = self.distances(query)?;
        let mut ranked: Vec<(usize, f32)> = distances.into_iter().enumerate().collect();
        ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
        ranked.truncate(k);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(index: usize) -> Embedding {
        let mut v = vec![0.0; EMBEDDING_DIM];
        v[index] = 1.0;
        v
    }

    #[test]
    fn self_similarity_is_exactly_one() {
        let v = l2_normalize(&vec![0.25; EMBEDDING_DIM]).unwrap();
        assert_eq!(l2_distance(&v, &v), 0.0);
        assert_eq!(similarity_from_distance(0.0), 1.0);
    }

    #[test]
    fn similarity_spans_cosine_range_for_unit_vectors() {
        let a = unit(0);
        let b: Embedding = a.iter().map(|x| -x).collect();
        assert!((similarity_from_distance(l2_distance(&a, &b)) + 1.0).abs() < 1e-6);
        assert!(similarity_from_distance(l2_distance(&a, &unit(1))).abs() < 1e-6);
    }

    #[test]
    fn similarity_decreases_with_distance() {
        let mut last = f32::INFINITY;
        for step in 0..=20 {
            let s = similarity_from_distance(step as f32 * 0.1);
            assert!(s < last);
            last = s;
        }
    }

    #[test]
    fn rejects_wrong_length_and_non_finite() {
        assert!(validate_embedding(&[0.0; 128]).is_err());
        let mut v = unit(3);
        v[7] = f32::NAN;
        assert!(validate_embedding(&v).is_err());
        assert!(l2_normalize(&vec![0.0; EMBEDDING_DIM]).is_err());
    }

    #[test]
    fn huge_finite_values_report_overflow() {
        let v = vec![1e30_f32; EMBEDDING_DIM];
        assert!(validate_embedding(&v).is_ok());

        let err = l2_normalize(&v).unwrap_err().to_string();
        assert!(err.contains("overflows"), "{err}");

        let zero = l2_normalize(&vec![0.0; EMBEDDING_DIM]).unwrap_err().to_string();
        assert!(zero.contains("zero-length"), "{zero}");
    }

    #[test]
    fn gallery_matches_scalar_distance() {
        let rows = vec![unit(0), unit(1), l2_normalize(&vec![1.0; EMBEDDING_DIM]).unwrap()];
        let gallery = Gallery::from_rows(&rows).unwrap();
        let query = unit(1);
        let distances = gallery.distances(&query).unwrap();
        for (row, d) in rows.iter().zip(&distances) {
            assert!((l2_distance(row, &query) - d).abs() < 1e-5);
        }
    }

    #[test]
    fn nearest_is_sorted_and_ties_keep_row_order() {
        let rows = vec![unit(5), unit(0), unit(5), unit(2)];
        let gallery = Gallery::from_rows(&rows).unwrap();

        let hits = gallery.nearest(&unit(5), 3).unwrap();
        assert_eq!(hits.iter().map(|h| h.0).collect::<Vec<_>>(), vec![0, 2, 1]);

        let all = gallery.nearest(&unit(5), 10).unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn empty_gallery_has_no_neighbours() {
        let gallery = Gallery::from_rows(&[]).unwrap();
        assert!(gallery.is_empty());
        assert!(gallery.nearest(&unit(0), 1).unwrap().is_empty());
    }
}
