use std::collections::HashSet;

use napp::space::Space;
use napp::types::{IdType, Neighbor};

/// Exact k nearest neighbors by full scan.
pub fn brute_force_knn<S: Space>(
    space: &S,
    data: &[S::Object],
    query: &S::Object,
    k: usize,
) -> Vec<Neighbor> {
    let mut all: Vec<Neighbor> = data
        .iter()
        .enumerate()
        .map(|(id, obj)| Neighbor::new(id as IdType, space.distance(obj, query)))
        .collect();
    all.sort_unstable();
    all.truncate(k);
    all
}

/// Compute recall@k: what fraction of the true top-k are in the returned results.
pub fn recall_at_k(results: &[Neighbor], ground_truth: &[Neighbor], k: usize) -> f64 {
    let k = k.min(ground_truth.len());
    if k == 0 {
        return 1.0;
    }
    let truth: HashSet<IdType> = ground_truth.iter().take(k).map(|n| n.id).collect();
    let found: HashSet<IdType> = results.iter().take(k).map(|n| n.id).collect();
    truth.intersection(&found).count() as f64 / k as f64
}

/// Assert that recall@k meets a minimum threshold.
pub fn assert_recall_at_k(results: &[Neighbor], ground_truth: &[Neighbor], k: usize, min_recall: f64) {
    let recall = recall_at_k(results, ground_truth, k);
    assert!(
        recall >= min_recall,
        "recall@{k} = {recall:.3}, expected >= {min_recall:.3}"
    );
}

/// Assert that results are sorted by ascending distance.
pub fn assert_sorted_by_distance(results: &[Neighbor]) {
    for w in results.windows(2) {
        assert!(
            w[0].distance <= w[1].distance,
            "results out of order: {:?} before {:?}",
            w[0],
            w[1]
        );
    }
}

/// Assert that `ids` is strictly increasing (sorted, no duplicates).
pub fn assert_strictly_increasing(ids: &[IdType]) {
    assert!(
        ids.windows(2).all(|w| w[0] < w[1]),
        "ids are not strictly increasing: {ids:?}"
    );
}
