//! Result sinks for k-NN and range queries.
//!
//! The index feeds `(id, distance)` pairs into a [`Query`]; the query decides
//! what to keep (top-k or within radius).

use std::collections::BinaryHeap;

use crate::types::{IdType, Neighbor};

/// A query object together with its result-collection policy.
pub trait Query<O> {
    fn object(&self) -> &O;

    /// Offer a candidate. Returns true when it was kept.
    fn check_and_add(&mut self, id: IdType, distance: f32) -> bool;

    fn kind(&self) -> &'static str;

    /// Account for exact distance evaluations done on behalf of this query.
    fn add_distance_computations(&mut self, n: u64);

    fn distance_computations(&self) -> u64;
}

/// Keeps the `k` closest candidates.
pub struct KnnQuery<'a, O> {
    object: &'a O,
    k: usize,
    heap: BinaryHeap<Neighbor>,
    distance_computations: u64,
}

impl<'a, O> KnnQuery<'a, O> {
    pub fn new(object: &'a O, k: usize) -> Self {
        Self {
            object,
            k,
            heap: BinaryHeap::with_capacity(k + 1),
            distance_computations: 0,
        }
    }

    /// Distance of the current k-th neighbor, or infinity while fewer than
    /// `k` results are held.
    pub fn radius(&self) -> f32 {
        if self.heap.len() < self.k {
            return f32::INFINITY;
        }
        self.heap.peek().map_or(f32::INFINITY, |n| n.distance)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Results sorted by ascending distance.
    pub fn results(&self) -> Vec<Neighbor> {
        let mut out: Vec<Neighbor> = self.heap.iter().copied().collect();
        out.sort_unstable();
        out
    }

    pub fn into_results(self) -> Vec<Neighbor> {
        self.heap.into_sorted_vec()
    }
}

impl<O> Query<O> for KnnQuery<'_, O> {
    fn object(&self) -> &O {
        self.object
    }

    fn check_and_add(&mut self, id: IdType, distance: f32) -> bool {
        if self.k == 0 {
            return false;
        }
        let candidate = Neighbor::new(id, distance);
        if self.heap.len() < self.k {
            self.heap.push(candidate);
            return true;
        }
        match self.heap.peek() {
            Some(worst) if candidate < *worst => {
                self.heap.pop();
                self.heap.push(candidate);
                true
            }
            _ => false,
        }
    }

    fn kind(&self) -> &'static str {
        "knn"
    }

    fn add_distance_computations(&mut self, n: u64) {
        self.distance_computations += n;
    }

    fn distance_computations(&self) -> u64 {
        self.distance_computations
    }
}

/// Keeps every candidate within `radius` (inclusive).
pub struct RangeQuery<'a, O> {
    object: &'a O,
    radius: f32,
    results: Vec<Neighbor>,
    distance_computations: u64,
}

impl<'a, O> RangeQuery<'a, O> {
    pub fn new(object: &'a O, radius: f32) -> Self {
        Self {
            object,
            radius,
            results: Vec::new(),
            distance_computations: 0,
        }
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results sorted by ascending distance.
    pub fn results(&self) -> Vec<Neighbor> {
        let mut out = self.results.clone();
        out.sort_unstable();
        out
    }

    pub fn into_results(mut self) -> Vec<Neighbor> {
        self.results.sort_unstable();
        self.results
    }
}

impl<O> Query<O> for RangeQuery<'_, O> {
    fn object(&self) -> &O {
        self.object
    }

    fn check_and_add(&mut self, id: IdType, distance: f32) -> bool {
        if distance <= self.radius {
            self.results.push(Neighbor::new(id, distance));
            true
        } else {
            false
        }
    }

    fn kind(&self) -> &'static str {
        "range"
    }

    fn add_distance_computations(&mut self, n: u64) {
        self.distance_computations += n;
    }

    fn distance_computations(&self) -> u64 {
        self.distance_computations
    }
}
