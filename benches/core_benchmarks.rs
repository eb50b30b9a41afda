//! Build and query benchmarks on synthetic data.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::prelude::*;

use napp::config::{IndexParams, QueryParams, SearchAlgorithm};
use napp::index::{CombinationSpace, NappIndex};
use napp::query::KnnQuery;
use napp::space::VectorSpace;
use napp::types::DistanceMetric;

fn random_vectors(n: usize, dim: usize, seed: u64) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

fn params(threads: usize) -> IndexParams {
    IndexParams {
        num_pivot: 128,
        num_prefix: 8,
        pivot_comb_qty: 2,
        index_thread_qty: threads,
        ..Default::default()
    }
}

fn bench_fill_ids(c: &mut Criterion) {
    let mut group = c.benchmark_group("fill_ids");
    let perm: Vec<u32> = (0..256).rev().collect();
    for (arity, prefix) in [(1usize, 32usize), (2, 32), (3, 16)] {
        let space = CombinationSpace::new(256, arity).unwrap();
        let mut ids = Vec::new();
        group.bench_with_input(
            BenchmarkId::new(format!("arity{arity}"), prefix),
            &prefix,
            |b, &prefix| b.iter(|| space.fill_ids(black_box(&perm), prefix, &mut ids).unwrap()),
        );
    }
    group.finish();
}

fn bench_build(c: &mut Criterion) {
    let space = VectorSpace::new(DistanceMetric::Euclidean);
    let data = random_vectors(20_000, 32, 42);
    let mut group = c.benchmark_group("build");
    group.sample_size(10);
    group.throughput(Throughput::Elements(data.len() as u64));
    for threads in [1, 4] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let mut index = NappIndex::new(false, &space, &data);
                index.create_index(&params(threads)).unwrap();
                black_box(index.total_postings())
            })
        });
    }
    group.finish();
}

fn bench_search(c: &mut Criterion) {
    let space = VectorSpace::new(DistanceMetric::Euclidean);
    let data = random_vectors(20_000, 32, 42);
    let queries = random_vectors(100, 32, 7);
    let mut index = NappIndex::new(false, &space, &data);
    index.create_index(&params(4)).unwrap();

    let mut group = c.benchmark_group("search_knn10");
    group.throughput(Throughput::Elements(queries.len() as u64));
    for algorithm in SearchAlgorithm::ALL {
        index
            .set_query_time_params(&QueryParams {
                algorithm,
                db_scan_frac: 0.05,
                ..Default::default()
            })
            .unwrap();
        group.bench_function(BenchmarkId::from_parameter(algorithm), |b| {
            b.iter(|| {
                for q in &queries {
                    let mut query = KnnQuery::new(q, 10);
                    index.search_knn(&mut query).unwrap();
                    black_box(query.len());
                }
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_fill_ids, bench_build, bench_search);
criterion_main!(benches);
