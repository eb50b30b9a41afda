use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use hdrhistogram::Histogram;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use napp::config::Config;
use napp::index::{AnnIndex, NappIndex};
use napp::metrics;
use napp::query::{KnnQuery, Query, RangeQuery};
use napp::space::{Space, VectorSpace};
use napp::types::{DistanceMetric, IdType, Neighbor};

/// Build a pivot-neighborhood index over a vector file and query it.
#[derive(Parser, Debug)]
#[command(name = "napp", version, about)]
struct Args {
    /// Dataset, one vector per line (whitespace or comma separated).
    #[arg(long)]
    data: PathBuf,

    /// Query vectors in the same format. Defaults to the first
    /// `--query-qty` dataset vectors.
    #[arg(long)]
    queries: Option<PathBuf>,

    #[arg(long, default_value_t = 100)]
    query_qty: usize,

    /// TOML config file (falls back to NAPP_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "euclidean")]
    metric: DistanceMetric,

    /// Index parameters, e.g. `numPivot=512,numPrefix=32,pivotCombQty=2`.
    #[arg(long)]
    index_params: Option<String>,

    /// Query-time parameters, e.g. `dbScanFrac=0.05,minTimes=2,algorithm=scan`.
    #[arg(long)]
    query_params: Option<String>,

    #[arg(long, default_value_t = 10)]
    k: usize,

    /// Run range queries with this radius instead of k-NN queries.
    #[arg(long)]
    range: Option<f32>,

    /// Load a saved index instead of building one.
    #[arg(long)]
    load: Option<PathBuf>,

    /// Save the index after building it.
    #[arg(long)]
    save: Option<PathBuf>,

    /// Log build progress.
    #[arg(long)]
    progress: bool,

    /// Include per-query neighbors in the report.
    #[arg(long)]
    print_results: bool,

    /// Print Prometheus metrics to stderr on exit.
    #[arg(long)]
    metrics: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    timestamp: String,
    method: String,
    objects: usize,
    queries: usize,
    mode: String,
    recall: f64,
    avg_candidates: f64,
    build_ms: u64,
    latency: serde_json::Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    results: Vec<Vec<Neighbor>>,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(params) = &args.index_params {
        config.index.apply_str(params)?;
    }
    if let Some(params) = &args.query_params {
        config.index.query.apply_str(params)?;
    }
    config.index.validate()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    match config.logging.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    metrics::init();

    let space = VectorSpace::new(args.metric);
    let data = read_vectors(&space, &args.data)?;
    let queries = match &args.queries {
        Some(path) => read_vectors(&space, path)?,
        None => data.iter().take(args.query_qty).cloned().collect(),
    };
    tracing::info!(objects = data.len(), queries = queries.len(), "napp starting");

    let mut index = NappIndex::new(args.progress, &space, &data);
    let build_start = Instant::now();
    match &args.load {
        Some(path) => {
            index.load_index(path)?;
            if let Some(params) = &args.query_params {
                let mut query = index.query_params().clone();
                query.apply_str(params)?;
                index.set_query_time_params(&query)?;
            }
        }
        None => {
            index.create_index(&config.index)?;
            if let Some(path) = &args.save {
                index.save_index(path)?;
            }
        }
    }
    let build_ms = build_start.elapsed().as_millis() as u64;

    let (mode, outcome) = match args.range {
        Some(radius) => (
            format!("range({radius})"),
            run_range(&index, &space, &data, &queries, radius)?,
        ),
        None => (
            format!("knn({})", args.k),
            run_knn(&index, &space, &data, &queries, args.k)?,
        ),
    };

    let report = Report {
        timestamp: chrono::Utc::now().to_rfc3339(),
        method: index.str_desc(),
        objects: data.len(),
        queries: queries.len(),
        mode,
        recall: outcome.recall,
        avg_candidates: index.stats().avg_candidates(),
        build_ms,
        latency: latency_stats(&outcome.latency),
        results: if args.print_results {
            outcome.results
        } else {
            Vec::new()
        },
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if args.metrics {
        eprintln!("{}", metrics::gather_text());
    }
    Ok(())
}

struct Outcome {
    recall: f64,
    latency: Histogram<u64>,
    results: Vec<Vec<Neighbor>>,
}

fn run_knn<I: AnnIndex<Vec<f32>>>(
    index: &I,
    space: &VectorSpace,
    data: &[Vec<f32>],
    queries: &[Vec<f32>],
    k: usize,
) -> anyhow::Result<Outcome> {
    let mut latency = Histogram::<u64>::new(3)?;
    let mut recall_sum = 0.0;
    let mut results = Vec::with_capacity(queries.len());

    for q in queries {
        let mut query = KnnQuery::new(q, k);
        let t = Instant::now();
        index.search_knn(&mut query)?;
        latency.record(t.elapsed().as_micros() as u64).ok();

        let found = query.into_results();
        let truth = brute_force(space, data, q, |_| true, k);
        recall_sum += recall(&found, &truth);
        results.push(found);
    }

    Ok(Outcome {
        recall: mean(recall_sum, queries.len()),
        latency,
        results,
    })
}

fn run_range<I: AnnIndex<Vec<f32>>>(
    index: &I,
    space: &VectorSpace,
    data: &[Vec<f32>],
    queries: &[Vec<f32>],
    radius: f32,
) -> anyhow::Result<Outcome> {
    let mut latency = Histogram::<u64>::new(3)?;
    let mut recall_sum = 0.0;
    let mut results = Vec::with_capacity(queries.len());

    for q in queries {
        let mut query = RangeQuery::new(q, radius);
        let t = Instant::now();
        index.search_range(&mut query)?;
        latency.record(t.elapsed().as_micros() as u64).ok();
        tracing::debug!(
            distance_computations = query.distance_computations(),
            found = query.len(),
            "range query done"
        );

        let found = query.into_results();
        let truth = brute_force(space, data, q, |d| d <= radius, data.len());
        recall_sum += recall(&found, &truth);
        results.push(found);
    }

    Ok(Outcome {
        recall: mean(recall_sum, queries.len()),
        latency,
        results,
    })
}

/// Exact neighbors by full scan, used as ground truth.
fn brute_force(
    space: &VectorSpace,
    data: &[Vec<f32>],
    q: &Vec<f32>,
    keep: impl Fn(f32) -> bool,
    limit: usize,
) -> Vec<Neighbor> {
    let mut all: Vec<Neighbor> = data
        .iter()
        .enumerate()
        .map(|(id, v)| Neighbor::new(id as IdType, space.distance(v, q)))
        .filter(|n| keep(n.distance))
        .collect();
    all.sort_unstable();
    all.truncate(limit);
    all
}

fn recall(found: &[Neighbor], truth: &[Neighbor]) -> f64 {
    if truth.is_empty() {
        return 1.0;
    }
    let found: HashSet<IdType> = found.iter().map(|n| n.id).collect();
    let hits = truth.iter().filter(|n| found.contains(&n.id)).count();
    hits as f64 / truth.len() as f64
}

fn mean(sum: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn latency_stats(hist: &Histogram<u64>) -> serde_json::Value {
    serde_json::json!({
        "p50_ms": hist.value_at_quantile(0.50) as f64 / 1000.0,
        "p95_ms": hist.value_at_quantile(0.95) as f64 / 1000.0,
        "p99_ms": hist.value_at_quantile(0.99) as f64 / 1000.0,
        "max_ms": hist.max() as f64 / 1000.0,
        "mean_ms": hist.mean() / 1000.0,
        "count": hist.len(),
    })
}

fn read_vectors(space: &VectorSpace, path: &Path) -> anyhow::Result<Vec<Vec<f32>>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let mut out = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let v = space
            .parse_object(line)
            .with_context(|| format!("{}:{}", path.display(), lineno + 1))?;
        out.push(v);
    }
    anyhow::ensure!(!out.is_empty(), "{} holds no vectors", path.display());
    Ok(out)
}
