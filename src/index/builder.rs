//! Multi-threaded bulk construction of the posting lists.
//!
//! The dataset is split into contiguous shards, one per worker. Each worker
//! computes the signature of its objects, appends the object id to
//! thread-local temporary lists, and flushes them into the shared store every
//! `flush_doc_qty` objects and at the end of its shard.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::{NappError, Result};
use crate::space::PivotIndex;
use crate::types::{CombId, IdType};

use super::combination::{permutation, CombinationSpace};
use super::posting::{PostingLists, SharedPostingLists};

/// Objects processed between two progress updates of a worker.
const PROGRESS_BATCH: u64 = 1024;

/// Build-wide progress counter, logged every 10%.
pub struct ProgressTracker {
    state: Mutex<ProgressState>,
}

struct ProgressState {
    done: u64,
    total: u64,
    next_report_pct: u64,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        Self {
            state: Mutex::new(ProgressState {
                done: 0,
                total,
                next_report_pct: 10,
            }),
        }
    }

    pub fn advance(&self, n: u64) {
        let mut st = self.state.lock();
        st.done = (st.done + n).min(st.total);
        if st.total == 0 {
            return;
        }
        let pct = st.done * 100 / st.total;
        if pct >= st.next_report_pct {
            info!(done = st.done, total = st.total, percent = pct, "indexing progress");
            st.next_report_pct = (pct / 10 + 1) * 10;
        }
    }

    pub fn done(&self) -> u64 {
        self.state.lock().done
    }
}

/// Everything the workers share.
pub struct BuildContext<'a, O> {
    pub data: &'a [O],
    pub pivot_index: &'a dyn PivotIndex<O>,
    pub comb: CombinationSpace,
    pub num_prefix: usize,
    pub thread_qty: usize,
    pub flush_doc_qty: usize,
    pub single_mutex_flush: bool,
    pub progress: Option<&'a ProgressTracker>,
}

/// Contiguous, non-overlapping shards covering `0..n`.
pub fn shard_ranges(n: usize, parts: usize) -> Vec<Range<usize>> {
    let parts = parts.max(1);
    (0..parts)
        .map(|i| (i * n / parts)..((i + 1) * n / parts))
        .collect()
}

/// Build the frozen posting lists for `ctx.data`.
///
/// Fails without a partially built result if any worker hits an invariant
/// violation, and checks afterwards that every object contributed exactly
/// `C(num_prefix, arity)` postings.
pub fn build_posting_lists<O: Sync>(ctx: &BuildContext<'_, O>) -> Result<PostingLists> {
    let max_post_qty = ctx.comb.size();
    let shared = SharedPostingLists::new(max_post_qty, ctx.single_mutex_flush);
    let abort = AtomicBool::new(false);

    let thread_qty = ctx.thread_qty.clamp(1, ctx.data.len().max(1));
    let shards = shard_ranges(ctx.data.len(), thread_qty);
    debug!(
        threads = thread_qty,
        lists = max_post_qty,
        locking = if ctx.single_mutex_flush { "single" } else { "per_list" },
        "starting posting list build"
    );

    let results: Vec<Result<()>> = std::thread::scope(|s| {
        let handles: Vec<_> = shards
            .into_iter()
            .enumerate()
            .map(|(thread_id, shard)| {
                let shared = &shared;
                let abort = &abort;
                s.spawn(move || {
                    let res = index_shard(ctx, shared, shard, thread_id, abort);
                    if res.is_err() {
                        abort.store(true, Ordering::Relaxed);
                    }
                    res
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(NappError::Internal("index worker panicked".to_string())))
            })
            .collect()
    });
    for res in results {
        res?;
    }

    let lists = shared.freeze();
    let expected = ctx.data.len() as u64 * ctx.comb.ids_per_prefix(ctx.num_prefix) as u64;
    if lists.total() != expected {
        return Err(NappError::Consistency(format!(
            "posting lists hold {} entries, expected {expected}",
            lists.total()
        )));
    }
    Ok(lists)
}

fn index_shard<O>(
    ctx: &BuildContext<'_, O>,
    shared: &SharedPostingLists,
    shard: Range<usize>,
    thread_id: usize,
    abort: &AtomicBool,
) -> Result<()> {
    let num_pivot = ctx.comb.num_pivot();
    let mut tmp: Vec<Vec<IdType>> = vec![Vec::new(); ctx.comb.size()];
    let mut dists: Vec<f32> = Vec::with_capacity(num_pivot);
    let mut perm: Vec<u32> = Vec::with_capacity(num_pivot);
    let mut ids: Vec<CombId> = Vec::new();

    let mut doc_qty = 0usize;
    let mut unreported = 0u64;
    let shard_len = shard.len();

    for id in shard {
        if abort.load(Ordering::Relaxed) {
            return Ok(());
        }

        ctx.pivot_index.pivot_distances(&ctx.data[id], &mut dists);
        if dists.len() != num_pivot {
            return Err(NappError::Consistency(format!(
                "pivot index returned {} distances for {num_pivot} pivots",
                dists.len()
            )));
        }
        permutation(&dists, &mut perm);

        let n = ctx.comb.fill_ids(&perm, ctx.num_prefix, &mut ids)?;
        for &comb in &ids[..n] {
            tmp[comb as usize].push(id as IdType);
        }

        doc_qty += 1;
        if doc_qty >= ctx.flush_doc_qty {
            shared.flush(&mut tmp)?;
            doc_qty = 0;
        }

        unreported += 1;
        if unreported >= PROGRESS_BATCH {
            if let Some(p) = ctx.progress {
                p.advance(unreported);
            }
            unreported = 0;
        }
    }

    shared.flush(&mut tmp)?;
    if let Some(p) = ctx.progress {
        p.advance(unreported);
    }
    debug!(thread_id, objects = shard_len, "index worker finished");
    Ok(())
}
