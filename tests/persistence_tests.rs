mod common;

use common::vectors::random_vectors;

use napp::config::{IndexParams, QueryParams, SearchAlgorithm};
use napp::error::NappError;
use napp::index::NappIndex;
use napp::query::{KnnQuery, RangeQuery};
use napp::space::VectorSpace;
use napp::types::{DistanceMetric, Neighbor};

fn params() -> IndexParams {
    IndexParams {
        num_pivot: 16,
        num_prefix: 4,
        pivot_comb_qty: 2,
        index_thread_qty: 2,
        ..Default::default()
    }
}

fn knn_all(index: &NappIndex<'_, VectorSpace>, queries: &[Vec<f32>]) -> Vec<Vec<Neighbor>> {
    queries
        .iter()
        .map(|q| {
            let mut query = KnnQuery::new(q, 10);
            index.search_knn(&mut query).unwrap();
            query.into_results()
        })
        .collect()
}

#[test]
fn test_save_load_round_trip() {
    let space = VectorSpace::new(DistanceMetric::Euclidean);
    let data = random_vectors(800, 8, 42);
    let queries = random_vectors(25, 8, 4242);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("napp.idx");

    let mut original = NappIndex::new(false, &space, &data);
    original
        .create_index(&IndexParams {
            query: QueryParams {
                algorithm: SearchAlgorithm::StoreSort,
                db_scan_frac: 0.2,
                ..Default::default()
            },
            ..params()
        })
        .unwrap();
    original.save_index(&path).unwrap();

    let mut loaded = NappIndex::new(false, &space, &data);
    loaded.load_index(&path).unwrap();

    assert_eq!(loaded.params(), original.params());
    assert_eq!(loaded.total_postings(), original.total_postings());
    assert_eq!(loaded.pivot_positions(), original.pivot_positions());
    for comb in 0..120 {
        assert_eq!(loaded.posting_list(comb), original.posting_list(comb));
    }
    assert_eq!(knn_all(&loaded, &queries), knn_all(&original, &queries));

    let mut a = RangeQuery::new(&data[5], 0.8);
    let mut b = RangeQuery::new(&data[5], 0.8);
    original.search_range(&mut a).unwrap();
    loaded.search_range(&mut b).unwrap();
    assert_eq!(a.results(), b.results());
}

#[test]
fn test_loaded_index_accepts_new_query_params() {
    let space = VectorSpace::new(DistanceMetric::Euclidean);
    let data = random_vectors(500, 8, 9);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("napp.idx");

    let mut original = NappIndex::new(false, &space, &data);
    original.create_index(&params()).unwrap();
    original.save_index(&path).unwrap();

    let mut loaded = NappIndex::new(false, &space, &data);
    loaded.load_index(&path).unwrap();
    let qp = QueryParams {
        min_times: 1,
        algorithm: SearchAlgorithm::Merge,
        ..Default::default()
    };
    loaded.set_query_time_params(&qp).unwrap();
    original.set_query_time_params(&qp).unwrap();
    assert_eq!(
        loaded.candidate_ids(&data[3]).unwrap(),
        original.candidate_ids(&data[3]).unwrap()
    );
}

#[test]
fn test_load_rejects_corrupt_file() {
    let space = VectorSpace::new(DistanceMetric::Euclidean);
    let data = random_vectors(300, 8, 1);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("napp.idx");

    let mut index = NappIndex::new(false, &space, &data);
    index.create_index(&params()).unwrap();
    index.save_index(&path).unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0x5a;
    std::fs::write(&path, &bytes).unwrap();

    let mut loaded = NappIndex::new(false, &space, &data);
    let err = loaded.load_index(&path).unwrap_err();
    assert!(matches!(err, NappError::ChecksumMismatch { .. }), "got {err}");
    assert!(!loaded.is_built());
}

#[test]
fn test_load_rejects_other_dataset_or_space() {
    let space = VectorSpace::new(DistanceMetric::Euclidean);
    let data = random_vectors(300, 8, 1);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("napp.idx");

    let mut index = NappIndex::new(false, &space, &data);
    index.create_index(&params()).unwrap();
    index.save_index(&path).unwrap();

    let smaller = random_vectors(299, 8, 1);
    let mut loaded = NappIndex::new(false, &space, &smaller);
    assert!(matches!(loaded.load_index(&path), Err(NappError::Format(_))));

    let cosine = VectorSpace::new(DistanceMetric::Cosine);
    let mut loaded = NappIndex::new(false, &cosine, &data);
    assert!(matches!(loaded.load_index(&path), Err(NappError::Format(_))));
}

#[test]
fn test_lifecycle_errors() {
    let space = VectorSpace::new(DistanceMetric::Euclidean);
    let data = random_vectors(300, 8, 1);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("napp.idx");

    let index = NappIndex::new(false, &space, &data);
    assert!(matches!(index.save_index(&path), Err(NappError::IndexNotBuilt)));
    assert!(!path.exists());

    let mut missing = NappIndex::new(false, &space, &data);
    assert!(matches!(
        missing.load_index(dir.path().join("absent.idx")),
        Err(NappError::Io(_))
    ));

    let mut built = NappIndex::new(false, &space, &data);
    built.create_index(&params()).unwrap();
    built.save_index(&path).unwrap();
    assert!(matches!(built.load_index(&path), Err(NappError::IndexAlreadyBuilt)));
}
