use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generate `n` random vectors of dimension `dims` with uniform f32 values in [-1, 1].
pub fn random_vectors(n: usize, dims: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

/// Generate vectors clustered around `n_clusters` random unit centroids.
/// Returns (vectors, centroids); vectors of cluster `c` occupy positions
/// `c * n_per_cluster .. (c + 1) * n_per_cluster`.
pub fn clustered_vectors(
    n_clusters: usize,
    n_per_cluster: usize,
    dims: usize,
    noise: f32,
) -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
    let mut rng = StdRng::seed_from_u64(123);

    let centroids: Vec<Vec<f32>> = (0..n_clusters)
        .map(|_| {
            let v: Vec<f32> = (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            v.iter().map(|x| x / norm).collect()
        })
        .collect();

    let mut vectors = Vec::with_capacity(n_clusters * n_per_cluster);
    for centroid in &centroids {
        for _ in 0..n_per_cluster {
            vectors.push(
                centroid
                    .iter()
                    .map(|&c| c + rng.gen_range(-noise..noise))
                    .collect(),
            );
        }
    }

    (vectors, centroids)
}

/// Write vectors to a text file, one per line, in the format the spaces parse.
pub fn write_vector_file(path: &std::path::Path, vectors: &[Vec<f32>]) {
    let text: String = vectors
        .iter()
        .map(|v| {
            let line: Vec<String> = v.iter().map(|x| x.to_string()).collect();
            line.join(" ") + "\n"
        })
        .collect();
    std::fs::write(path, text).unwrap();
}
