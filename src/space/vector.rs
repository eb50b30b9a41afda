//! Dense `f32` vector space and its pivot index.

use xxhash_rust::xxh3::xxh3_64;

use crate::error::{NappError, Result};
use crate::pool::VectorPool;
use crate::types::DistanceMetric;

use super::{PivotIndex, Space};

/// Compute distance between two vectors using the specified metric.
/// Lower values indicate more similar vectors for all metrics.
pub fn compute_distance(a: &[f32], b: &[f32], metric: DistanceMetric) -> f32 {
    match metric {
        DistanceMetric::Cosine => cosine_distance(a, b),
        DistanceMetric::Euclidean => euclidean_distance(a, b),
        DistanceMetric::DotProduct => dot_product_distance(a, b),
    }
}

/// `1 - cos(a, b)`; 1.0 when either vector has zero norm.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    cosine_from_parts(dot, na, nb)
}

fn cosine_from_parts(dot: f32, norm_sq_a: f32, norm_sq_b: f32) -> f32 {
    let denom = (norm_sq_a * norm_sq_b).sqrt();
    if denom == 0.0 {
        return 1.0;
    }
    1.0 - (dot / denom).clamp(-1.0, 1.0)
}

pub fn squared_euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    squared_euclidean_distance(a, b).sqrt()
}

/// Negated inner product, so that larger similarity means smaller distance.
pub fn dot_product_distance(a: &[f32], b: &[f32]) -> f32 {
    -dot(a, b)
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Dense vectors compared with one of the [`DistanceMetric`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorSpace {
    metric: DistanceMetric,
    dimension: Option<usize>,
}

impl VectorSpace {
    pub fn new(metric: DistanceMetric) -> Self {
        Self {
            metric,
            dimension: None,
        }
    }

    /// Reject parsed vectors whose length differs from `dimension`.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Check a vector's length against the configured dimension.
    pub fn check_dimension(&self, v: &[f32]) -> Result<()> {
        match self.dimension {
            Some(expected) if expected != v.len() => Err(NappError::DimensionMismatch {
                expected,
                actual: v.len(),
            }),
            _ => Ok(()),
        }
    }
}

impl Space for VectorSpace {
    type Object = Vec<f32>;

    fn distance(&self, stored: &Vec<f32>, query: &Vec<f32>) -> f32 {
        compute_distance(stored, query, self.metric)
    }

    fn parse_object(&self, line: &str) -> Result<Vec<f32>> {
        let values = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|tok| !tok.is_empty())
            .map(|tok| {
                tok.parse::<f32>()
                    .map_err(|_| NappError::Parse(format!("invalid float '{tok}'")))
            })
            .collect::<Result<Vec<f32>>>()?;
        if values.is_empty() {
            return Err(NappError::Parse("empty vector".to_string()));
        }
        self.check_dimension(&values)?;
        Ok(values)
    }

    fn create_pivot_index(
        &self,
        pivots: &[Vec<f32>],
        hash_trick_dim: usize,
    ) -> Option<Box<dyn PivotIndex<Vec<f32>>>> {
        Some(Box::new(DensePivotIndex::new(self.metric, pivots, hash_trick_dim)))
    }

    fn synthesize_pivot(&self, sources: &[&Vec<f32>]) -> Option<Vec<f32>> {
        let dim = sources.first()?.len();
        if sources.iter().any(|s| s.len() != dim) {
            return None;
        }
        let mut centroid = vec![0.0f32; dim];
        for s in sources {
            for (c, x) in centroid.iter_mut().zip(s.iter()) {
                *c += x;
            }
        }
        let n = sources.len() as f32;
        centroid.iter_mut().for_each(|c| *c /= n);
        Some(centroid)
    }

    fn name(&self) -> String {
        format!("vector_{}", self.metric)
    }
}

/// Pivot distances from one row-major pivot matrix.
///
/// Euclidean distances are summed over coordinate differences. Cosine reuses
/// each pivot's cached squared norm. With `hash_trick_dim > 0` pivots and
/// objects are first folded into that many signed buckets (feature hashing),
/// trading accuracy for speed on high-dimensional inputs.
pub struct DensePivotIndex {
    metric: DistanceMetric,
    matrix: Vec<f32>,
    norms_sq: Vec<f32>,
    width: usize,
    num_pivots: usize,
    hash_trick_dim: usize,
    scratch: VectorPool<f32>,
}

impl DensePivotIndex {
    pub fn new(metric: DistanceMetric, pivots: &[Vec<f32>], hash_trick_dim: usize) -> Self {
        let raw_dim = pivots.iter().map(Vec::len).max().unwrap_or(0);
        let width = if hash_trick_dim > 0 { hash_trick_dim } else { raw_dim };

        let mut matrix = vec![0.0f32; width * pivots.len()];
        let mut norms_sq = Vec::with_capacity(pivots.len());
        for (row, p) in matrix.chunks_mut(width.max(1)).zip(pivots.iter()) {
            project(p, hash_trick_dim, row);
            norms_sq.push(dot(row, row));
        }

        Self {
            metric,
            matrix,
            norms_sq,
            width,
            num_pivots: pivots.len(),
            hash_trick_dim,
            scratch: VectorPool::new(0, width),
        }
    }
}

/// Copy `v` into `out`, folding dimensions into signed buckets when hashing.
fn project(v: &[f32], hash_trick_dim: usize, out: &mut [f32]) {
    out.iter_mut().for_each(|x| *x = 0.0);
    if hash_trick_dim == 0 {
        let n = v.len().min(out.len());
        out[..n].copy_from_slice(&v[..n]);
        return;
    }
    for (i, &x) in v.iter().enumerate() {
        let h = xxh3_64(&(i as u64).to_le_bytes());
        let bucket = (h % hash_trick_dim as u64) as usize;
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        out[bucket] += sign * x;
    }
}

impl PivotIndex<Vec<f32>> for DensePivotIndex {
    fn pivot_distances(&self, object: &Vec<f32>, out: &mut Vec<f32>) {
        out.clear();
        if self.num_pivots == 0 {
            return;
        }

        let mut scratch = None;
        let object: &[f32] = if self.hash_trick_dim == 0 {
            object
        } else {
            let buf = scratch.insert(self.scratch.acquire(self.width));
            buf.resize(self.width, 0.0);
            project(object, self.hash_trick_dim, buf);
            buf
        };
        let q_norm_sq = match self.metric {
            DistanceMetric::Cosine => dot(object, object),
            _ => 0.0,
        };

        for (row, &p_norm_sq) in self.matrix.chunks(self.width.max(1)).zip(&self.norms_sq) {
            let dist = match self.metric {
                DistanceMetric::Euclidean => squared_euclidean_distance(row, object).sqrt(),
                DistanceMetric::Cosine => cosine_from_parts(dot(row, object), p_norm_sq, q_norm_sq),
                DistanceMetric::DotProduct => -dot(row, object),
            };
            out.push(dist);
        }
    }

    fn num_pivots(&self) -> usize {
        self.num_pivots
    }

    fn describe(&self) -> String {
        if self.hash_trick_dim > 0 {
            format!(
                "dense pivot index ({} pivots, hashed to {} dims)",
                self.num_pivots, self.hash_trick_dim
            )
        } else {
            format!("dense pivot index ({} pivots, {} dims)", self.num_pivots, self.width)
        }
    }
}
