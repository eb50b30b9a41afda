//! Distance spaces the index can be built over.
//!
//! The index only needs a distance function between two objects. A space may
//! additionally provide a [`PivotIndex`] that computes the distances from one
//! object to every pivot faster than calling `distance` once per pivot.

pub mod vector;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

pub use vector::{DensePivotIndex, VectorSpace};

/// A (possibly non-metric) distance space over `Self::Object`.
pub trait Space: Send + Sync {
    type Object: Clone + Send + Sync + Serialize + DeserializeOwned + 'static;

    /// Distance from a stored object (or pivot) to a query object.
    ///
    /// The argument order matters for non-symmetric spaces: the index always
    /// passes the stored object first.
    fn distance(&self, stored: &Self::Object, query: &Self::Object) -> f32;

    /// Parse one object from a line of text (pivot files, CLI datasets).
    fn parse_object(&self, line: &str) -> Result<Self::Object>;

    /// Build a fast structure for distances to a fixed pivot set.
    ///
    /// Returns `None` when the space has no such structure; the index then
    /// falls back to brute-force evaluation.
    fn create_pivot_index(
        &self,
        _pivots: &[Self::Object],
        _hash_trick_dim: usize,
    ) -> Option<Box<dyn PivotIndex<Self::Object>>> {
        None
    }

    /// Synthesize a pivot from a group of objects (for example their
    /// centroid). Spaces that cannot do this return `None`.
    fn synthesize_pivot(&self, _sources: &[&Self::Object]) -> Option<Self::Object> {
        None
    }

    /// Short name for logs and method descriptions.
    fn name(&self) -> String;
}

/// Computes distances from one object to each pivot of a fixed set.
pub trait PivotIndex<O>: Send + Sync {
    /// Overwrite `out` with `num_pivots()` distances, in pivot order.
    fn pivot_distances(&self, object: &O, out: &mut Vec<f32>);

    fn num_pivots(&self) -> usize;

    fn describe(&self) -> String;
}
