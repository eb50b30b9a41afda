//! Best-effort query statistics. Nothing here affects results.

use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use crate::types::CombId;

use super::combination::CombinationSpace;
use super::posting::PostingLists;

/// Per-query measurements, merged into [`SearchStats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QuerySample {
    pub ids_gen: Duration,
    pub candidate_gen: Duration,
    pub rerank: Duration,
    pub postings_scanned: u64,
    pub lists_consulted: u64,
    pub candidates: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSnapshot {
    pub queries: u64,
    pub postings_scanned: u64,
    pub lists_consulted: u64,
    pub candidates: u64,
    pub ids_gen: Duration,
    pub candidate_gen: Duration,
    pub rerank: Duration,
}

impl StatsSnapshot {
    pub fn avg_candidates(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.candidates as f64 / self.queries as f64
        }
    }
}

/// Aggregate of all queries answered by one index.
#[derive(Default)]
pub struct SearchStats {
    inner: Mutex<StatsSnapshot>,
}

impl SearchStats {
    pub fn record(&self, sample: &QuerySample) {
        let mut s = self.inner.lock();
        s.queries += 1;
        s.postings_scanned += sample.postings_scanned;
        s.lists_consulted += sample.lists_consulted;
        s.candidates += sample.candidates;
        s.ids_gen += sample.ids_gen;
        s.candidate_gen += sample.candidate_gen;
        s.rerank += sample.rerank;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        *self.inner.lock()
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        if s.queries == 0 {
            return;
        }
        let per_query = |d: Duration| d.as_secs_f64() * 1e3 / s.queries as f64;
        info!(
            queries = s.queries,
            avg_postings_scanned = s.postings_scanned as f64 / s.queries as f64,
            avg_lists_consulted = s.lists_consulted as f64 / s.queries as f64,
            avg_candidates = s.avg_candidates(),
            ids_gen_ms = per_query(s.ids_gen),
            candidate_gen_ms = per_query(s.candidate_gen),
            rerank_ms = per_query(s.rerank),
            "query statistics"
        );
    }
}

/// Number of posting entries that reference each pivot.
pub fn pivot_usage(postings: &PostingLists, comb: &CombinationSpace) -> Vec<u64> {
    let mut usage = vec![0u64; comb.num_pivot()];
    for (id, list) in postings.as_slice().iter().enumerate() {
        if list.is_empty() {
            continue;
        }
        if let Ok(pivots) = comb.decode(id as CombId) {
            for p in pivots {
                usage[p as usize] += list.len() as u64;
            }
        }
    }
    usage
}
