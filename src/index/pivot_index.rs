//! Distances from an object to every pivot.

use tracing::info;

use crate::space::{PivotIndex, Space};

/// Brute-force pivot index: one `Space::distance` call per pivot.
pub struct DummyPivotIndex<'a, S: Space> {
    space: &'a S,
    pivots: Vec<S::Object>,
}

impl<'a, S: Space> DummyPivotIndex<'a, S> {
    pub fn new(space: &'a S, pivots: &[S::Object]) -> Self {
        Self {
            space,
            pivots: pivots.to_vec(),
        }
    }
}

impl<S: Space> PivotIndex<S::Object> for DummyPivotIndex<'_, S> {
    fn pivot_distances(&self, object: &S::Object, out: &mut Vec<f32>) {
        out.clear();
        out.extend(self.pivots.iter().map(|p| self.space.distance(p, object)));
    }

    fn num_pivots(&self) -> usize {
        self.pivots.len()
    }

    fn describe(&self) -> String {
        format!("dummy pivot index ({} pivots)", self.pivots.len())
    }
}

/// Pick the pivot index for a build: the space's fast structure when one
/// exists and it is not disabled, otherwise the brute-force fallback.
pub fn init_pivot_index<'a, S: Space>(
    space: &'a S,
    pivots: &[S::Object],
    hash_trick_dim: usize,
    disable_pivot_index: bool,
) -> Box<dyn PivotIndex<S::Object> + 'a> {
    if !disable_pivot_index {
        if let Some(fast) = space.create_pivot_index(pivots, hash_trick_dim) {
            info!(index = %fast.describe(), "created an efficient pivot index");
            return fast;
        }
        info!(space = %space.name(), "space has no efficient pivot index, falling back to brute force");
    }
    let dummy = DummyPivotIndex::new(space, pivots);
    info!(index = %dummy.describe(), "created a dummy pivot index");
    Box::new(dummy)
}
