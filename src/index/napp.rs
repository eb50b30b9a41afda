//! The pivot-neighborhood inverted index.
//!
//! Every dataset object is described by the pivots closest to it. All
//! `pivot_comb_qty`-subsets of its `num_prefix` nearest pivots become keys of
//! posting lists that contain the object. A query computes the same subsets
//! for its own nearest `num_prefix_search` pivots, collects the objects that
//! share at least `min_times` of them, and ranks those candidates by exact
//! distance.

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use tracing::{debug, info, instrument};

use crate::config::{IndexParams, QueryParams};
use crate::error::{NappError, Result};
use crate::metrics;
use crate::query::{KnnQuery, Query, RangeQuery};
use crate::space::{PivotIndex, Space};
use crate::types::{CombId, IdType};

use super::builder::{build_posting_lists, BuildContext, ProgressTracker};
use super::candidates::{generate, select_lists, CandidatePools};
use super::combination::{permutation, CombinationSpace};
use super::persistence::{self, IndexFileRef, IndexMeta};
use super::pivot_index::init_pivot_index;
use super::pivots::{select_pivots, PivotSet};
use super::posting::PostingLists;
use super::stats::{pivot_usage, QuerySample, SearchStats, StatsSnapshot};

/// State that only exists once `create_index` or `load_index` succeeded.
struct Built<'a, O> {
    pivots: PivotSet<O>,
    pivot_index: Box<dyn PivotIndex<O> + 'a>,
    comb: CombinationSpace,
    postings: PostingLists,
}

/// Approximate k-NN and range search over `data` in `space`.
///
/// The index borrows the dataset; object ids are positions in `data`.
pub struct NappIndex<'a, S: Space> {
    space: &'a S,
    data: &'a [S::Object],
    print_progress: bool,
    params: IndexParams,
    built: Option<Built<'a, S::Object>>,
    pools: CandidatePools,
    stats: SearchStats,
}

impl<'a, S: Space> NappIndex<'a, S> {
    pub fn new(print_progress: bool, space: &'a S, data: &'a [S::Object]) -> Self {
        Self {
            space,
            data,
            print_progress,
            params: IndexParams::default(),
            built: None,
            pools: CandidatePools::new(),
            stats: SearchStats::default(),
        }
    }

    /// Select pivots and build all posting lists.
    ///
    /// On error the index stays unbuilt and may be built again.
    #[instrument(skip(self, params), fields(objects = self.data.len()))]
    pub fn create_index(&mut self, params: &IndexParams) -> Result<()> {
        if self.built.is_some() {
            return Err(NappError::IndexAlreadyBuilt);
        }
        params.validate()?;
        if self.data.len() > IdType::MAX as usize {
            return Err(NappError::invalid(
                "data",
                format!("{} objects do not fit 32-bit object ids", self.data.len()),
            ));
        }
        let comb = CombinationSpace::new(params.num_pivot, params.pivot_comb_qty)?;
        let start = Instant::now();

        let pivots = select_pivots(self.space, self.data, params)?;
        let pivot_index = init_pivot_index(
            self.space,
            &pivots.objects,
            params.hash_trick_dim,
            params.disable_pivot_index,
        );

        let progress = self
            .print_progress
            .then(|| ProgressTracker::new(self.data.len() as u64));
        let postings = {
            let ctx = BuildContext {
                data: self.data,
                pivot_index: pivot_index.as_ref(),
                comb,
                num_prefix: params.num_prefix,
                thread_qty: params.index_thread_qty,
                flush_doc_qty: params.flush_doc_qty,
                single_mutex_flush: params.single_mutex_flush,
                progress: progress.as_ref(),
            };
            build_posting_lists(&ctx)?
        };

        let elapsed = start.elapsed();
        metrics::BUILD_DURATION.observe(elapsed.as_secs_f64());
        info!(
            lists = postings.len(),
            postings = postings.total(),
            pivots = pivots.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "index built"
        );

        let built = Built {
            pivots,
            pivot_index,
            comb,
            postings,
        };
        self.params = params.clone();
        self.log_expectations(&built);
        if params.print_pivot_stat > 0 {
            log_pivot_stats(&built, params.print_pivot_stat);
        }
        self.built = Some(built);
        Ok(())
    }

    /// Replace the query-time knobs of a built index. Posting lists are
    /// untouched, and the current knobs are kept when `params` is invalid.
    /// Before the build, query knobs are passed in `IndexParams::query`.
    pub fn set_query_time_params(&mut self, params: &QueryParams) -> Result<()> {
        let built = self.built.as_ref().ok_or(NappError::IndexNotBuilt)?;
        params.validate(self.params.num_pivot, self.params.pivot_comb_qty)?;
        self.params.query = params.clone();
        self.log_expectations(built);
        Ok(())
    }

    pub fn search_knn(&self, query: &mut KnnQuery<'_, S::Object>) -> Result<()> {
        self.gen_search(query)
    }

    pub fn search_range(&self, query: &mut RangeQuery<'_, S::Object>) -> Result<()> {
        self.gen_search(query)
    }

    fn gen_search<Q: Query<S::Object>>(&self, query: &mut Q) -> Result<()> {
        let built = self.built.as_ref().ok_or(NappError::IndexNotBuilt)?;
        let start = Instant::now();

        let mut candidates = self.pools.ids.acquire(0);
        let mut sample = self.collect_candidates(built, query.object(), &mut candidates)?;

        let rerank_start = Instant::now();
        for &id in candidates.iter() {
            let distance = self.space.distance(&self.data[id as usize], query.object());
            query.check_and_add(id, distance);
        }
        query.add_distance_computations(candidates.len() as u64);
        sample.rerank = rerank_start.elapsed();

        let algorithm = self.params.query.algorithm.to_string();
        metrics::QUERIES_TOTAL.with_label_values(&[query.kind()]).inc();
        metrics::QUERY_DURATION
            .with_label_values(&[&algorithm])
            .observe(start.elapsed().as_secs_f64());
        metrics::POSTINGS_SCANNED_TOTAL.inc_by(sample.postings_scanned);
        metrics::CANDIDATES_TOTAL.inc_by(sample.candidates);
        metrics::DISTANCE_COMPUTATIONS_TOTAL.inc_by(sample.candidates);
        self.stats.record(&sample);
        Ok(())
    }

    /// Fill `out` with the candidates of `object`, ascending.
    fn collect_candidates(
        &self,
        built: &Built<'a, S::Object>,
        object: &S::Object,
        out: &mut Vec<IdType>,
    ) -> Result<QuerySample> {
        let qp = &self.params.query;
        let num_pivot = built.comb.num_pivot();
        let prefix = self.params.effective_prefix_search();
        let mut sample = QuerySample::default();

        let ids_start = Instant::now();
        let mut dists = self.pools.dists.acquire(num_pivot);
        built.pivot_index.pivot_distances(object, &mut dists);
        if dists.len() != num_pivot {
            return Err(NappError::Consistency(format!(
                "pivot index returned {} distances for {num_pivot} pivots",
                dists.len()
            )));
        }
        let mut perm = self.pools.counters.acquire(num_pivot);
        permutation(&dists, &mut perm);
        let mut query_ids = self.pools.comb_ids.acquire(built.comb.ids_per_prefix(prefix));
        let n = built.comb.fill_ids(&perm, prefix, &mut query_ids)?;
        sample.ids_gen = ids_start.elapsed();

        let gen_start = Instant::now();
        let mut selected = self.pools.comb_ids.acquire(n);
        let budget = scan_budget(qp, built.postings.total());
        sample.postings_scanned = select_lists(&built.postings, &query_ids[..n], budget, &mut selected);
        sample.lists_consulted = selected.len() as u64;

        let min_times = if qp.skip_checking { 1 } else { qp.min_times };
        generate(
            qp.algorithm,
            &built.postings,
            &selected,
            min_times,
            self.data.len(),
            &self.pools,
            out,
        );
        sample.candidate_gen = gen_start.elapsed();
        sample.candidates = out.len() as u64;
        Ok(sample)
    }

    /// Candidate ids (ascending) the current query-time params produce for
    /// `object`, before re-ranking.
    pub fn candidate_ids(&self, object: &S::Object) -> Result<Vec<IdType>> {
        let built = self.built.as_ref().ok_or(NappError::IndexNotBuilt)?;
        let mut out = Vec::new();
        self.collect_candidates(built, object, &mut out)?;
        Ok(out)
    }

    /// Combination ids of the `prefix` pivots nearest to `object`, in the
    /// order queries visit them.
    pub fn signature(&self, object: &S::Object, prefix: usize) -> Result<Vec<CombId>> {
        let built = self.built.as_ref().ok_or(NappError::IndexNotBuilt)?;
        let mut dists = Vec::with_capacity(built.comb.num_pivot());
        built.pivot_index.pivot_distances(object, &mut dists);
        let mut perm = Vec::new();
        permutation(&dists, &mut perm);
        let mut ids = Vec::new();
        let n = built.comb.fill_ids(&perm, prefix, &mut ids)?;
        ids.truncate(n);
        Ok(ids)
    }

    /// Serialize pivots, posting lists and parameters to `path`.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn save_index(&self, path: impl AsRef<Path>) -> Result<()> {
        let built = self.built.as_ref().ok_or(NappError::IndexNotBuilt)?;
        let meta = IndexMeta {
            params: self.params.clone(),
            data_len: self.data.len() as u64,
            num_posting_lists: built.postings.len() as u64,
            total_postings: built.postings.total(),
            space: self.space.name(),
            pivot_source: built.pivots.source,
            created_at: Utc::now(),
        };
        let bytes = persistence::encode(&IndexFileRef {
            meta: &meta,
            pivots: &built.pivots.objects,
            pivot_pos: &built.pivots.positions,
            posting_lists: built.postings.as_slice(),
        })?;
        persistence::write_atomic(path.as_ref(), &bytes)?;
        info!(bytes = bytes.len(), lists = meta.num_posting_lists, "index saved");
        Ok(())
    }

    /// Restore an index saved over the same dataset.
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn load_index(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if self.built.is_some() {
            return Err(NappError::IndexAlreadyBuilt);
        }
        let bytes = std::fs::read(path.as_ref())?;
        let file = persistence::decode::<S::Object>(&bytes)?;
        let comb = file.validate(self.data.len())?;
        if file.meta.space != self.space.name() {
            return Err(NappError::Format(format!(
                "index was built in space '{}', loading into '{}'",
                file.meta.space,
                self.space.name()
            )));
        }

        let params = file.meta.params;
        let pivots = PivotSet {
            objects: file.pivots,
            positions: file.pivot_pos,
            source: file.meta.pivot_source,
        };
        let pivot_index = init_pivot_index(
            self.space,
            &pivots.objects,
            params.hash_trick_dim,
            params.disable_pivot_index,
        );
        let built = Built {
            pivots,
            pivot_index,
            comb,
            postings: PostingLists::from_lists(file.posting_lists),
        };
        info!(
            lists = built.postings.len(),
            postings = built.postings.total(),
            created_at = %file.meta.created_at,
            "index loaded"
        );
        self.params = params;
        self.log_expectations(&built);
        self.built = Some(built);
        Ok(())
    }

    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    pub fn params(&self) -> &IndexParams {
        &self.params
    }

    pub fn query_params(&self) -> &QueryParams {
        &self.params.query
    }

    pub fn data_len(&self) -> usize {
        self.data.len()
    }

    pub fn num_posting_lists(&self) -> usize {
        self.built.as_ref().map_or(0, |b| b.postings.len())
    }

    pub fn total_postings(&self) -> u64 {
        self.built.as_ref().map_or(0, |b| b.postings.total())
    }

    /// Sorted object ids stored under `comb`.
    pub fn posting_list(&self, comb: CombId) -> &[IdType] {
        self.built
            .as_ref()
            .map(|b| b.postings.get(comb))
            .unwrap_or(&[])
    }

    /// Dataset positions of sampled pivots.
    pub fn pivot_positions(&self) -> &[IdType] {
        self.built
            .as_ref()
            .map(|b| b.pivots.positions.as_slice())
            .unwrap_or(&[])
    }

    pub fn pivots(&self) -> &[S::Object] {
        self.built
            .as_ref()
            .map(|b| b.pivots.objects.as_slice())
            .unwrap_or(&[])
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn str_desc(&self) -> String {
        let p = &self.params;
        format!(
            "napp: space={} num_pivot={} num_prefix={} num_prefix_search={} pivot_comb_qty={} \
             min_times={} knn_amp={} db_scan_frac={} algorithm={} skip_checking={}",
            self.space.name(),
            p.num_pivot,
            p.num_prefix,
            p.effective_prefix_search(),
            p.pivot_comb_qty,
            p.query.min_times,
            p.query.knn_amp,
            p.query.db_scan_frac,
            p.query.algorithm,
            p.query.skip_checking,
        )
    }

    fn log_expectations(&self, built: &Built<'a, S::Object>) {
        let lists = built.postings.len().max(1) as f64;
        let avg_post_size = built.postings.total() as f64 / lists;
        let per_query = built.comb.ids_per_prefix(self.params.effective_prefix_search()) as f64;
        debug!(
            expected_avg_post_size = avg_post_size,
            expected_postings_per_query = per_query * avg_post_size,
            budget = scan_budget(&self.params.query, built.postings.total()),
            "query-time expectations"
        );
    }
}

impl<S: Space> Drop for NappIndex<'_, S> {
    fn drop(&mut self) {
        self.stats.log_summary();
    }
}

/// Posting entries a query may consume:
/// `ceil(db_scan_frac * total * knn_amp)`, capped at `total`.
pub fn scan_budget(params: &QueryParams, total: u64) -> u64 {
    let budget = (params.db_scan_frac as f64 * total as f64 * params.knn_amp as f64).ceil();
    if budget >= total as f64 {
        total
    } else {
        budget as u64
    }
}

fn log_pivot_stats<O>(built: &Built<'_, O>, level: u32) {
    let s = built.postings.stats();
    info!(
        lists = s.lists,
        total = s.total,
        empty = s.empty,
        min = s.min,
        max = s.max,
        avg = s.avg,
        "posting list statistics"
    );
    if level < 2 {
        return;
    }
    for (pivot, usage) in pivot_usage(&built.postings, &built.comb).into_iter().enumerate() {
        info!(pivot, postings = usage, "pivot usage");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::VectorSpace;
    use crate::types::DistanceMetric;

    fn grid(n: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| vec![(i % 10) as f32, (i / 10) as f32])
            .collect()
    }

    fn params() -> IndexParams {
        IndexParams {
            num_pivot: 8,
            num_prefix: 3,
            pivot_comb_qty: 2,
            index_thread_qty: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_scan_budget() {
        let mut q = QueryParams {
            db_scan_frac: 0.25,
            ..Default::default()
        };
        assert_eq!(scan_budget(&q, 100), 25);
        assert_eq!(scan_budget(&q, 3), 1);
        q.knn_amp = 8;
        assert_eq!(scan_budget(&q, 100), 100);
    }

    #[test]
    fn test_search_requires_build() {
        let space = VectorSpace::new(DistanceMetric::Euclidean);
        let data = grid(10);
        let index = NappIndex::new(false, &space, &data);
        let mut q = KnnQuery::new(&data[0], 1);
        assert!(matches!(index.search_knn(&mut q), Err(NappError::IndexNotBuilt)));
        assert!(index.candidate_ids(&data[0]).is_err());
    }

    #[test]
    fn test_query_params_require_build() {
        let space = VectorSpace::new(DistanceMetric::Euclidean);
        let data = grid(100);
        let mut index = NappIndex::new(false, &space, &data);
        let early = QueryParams {
            min_times: 1,
            ..Default::default()
        };
        assert!(matches!(
            index.set_query_time_params(&early),
            Err(NappError::IndexNotBuilt)
        ));

        let mut p = params();
        p.query.min_times = 3;
        index.create_index(&p).unwrap();
        assert_eq!(index.query_params().min_times, 3);
        index.set_query_time_params(&early).unwrap();
        assert_eq!(index.query_params().min_times, 1);
    }

    #[test]
    fn test_build_twice_rejected() {
        let space = VectorSpace::new(DistanceMetric::Euclidean);
        let data = grid(100);
        let mut index = NappIndex::new(false, &space, &data);
        index.create_index(&params()).unwrap();
        assert_eq!(index.num_posting_lists(), 28);
        assert_eq!(index.total_postings(), 300);
        assert!(matches!(
            index.create_index(&params()),
            Err(NappError::IndexAlreadyBuilt)
        ));
    }

    #[test]
    fn test_invalid_query_params_keep_previous() {
        let space = VectorSpace::new(DistanceMetric::Euclidean);
        let data = grid(100);
        let mut index = NappIndex::new(false, &space, &data);
        index.create_index(&params()).unwrap();

        let bad = QueryParams {
            min_times: 0,
            ..Default::default()
        };
        assert!(index.set_query_time_params(&bad).unwrap_err().is_config_error());
        assert_eq!(index.query_params().min_times, 2);
    }

    #[test]
    fn test_signature_order_starts_with_nearest_pivots() {
        let space = VectorSpace::new(DistanceMetric::Euclidean);
        let data = grid(100);
        let mut index = NappIndex::new(false, &space, &data);
        index.create_index(&params()).unwrap();

        let pivot = index.pivots()[0].clone();
        let sig = index.signature(&pivot, 3).unwrap();
        assert_eq!(sig.len(), 3);
        // The first id pairs the two nearest pivots, one of which is the
        // pivot itself.
        let comb = CombinationSpace::new(8, 2).unwrap();
        assert!(comb.decode(sig[0]).unwrap().contains(&0));
    }

    #[test]
    fn test_pivot_stat_levels_do_not_change_lists() {
        let space = VectorSpace::new(DistanceMetric::Euclidean);
        let data = grid(100);
        let mut quiet = NappIndex::new(false, &space, &data);
        quiet.create_index(&params()).unwrap();
        let mut loud = NappIndex::new(true, &space, &data);
        loud.create_index(&IndexParams {
            print_pivot_stat: 2,
            ..params()
        })
        .unwrap();
        for comb in 0..28 {
            assert_eq!(quiet.posting_list(comb), loud.posting_list(comb));
        }
        assert!(loud.str_desc().contains("num_pivot=8"));
    }
}
