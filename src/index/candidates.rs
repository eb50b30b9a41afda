//! Candidate generation from the query's posting lists.
//!
//! All strategies return the ids, ascending, that occur in at least
//! `min_times` of the selected lists. They differ only in time and memory:
//!
//! * `Merge`: fold the sorted lists one at a time into a running
//!   `(id, count)` array.
//! * `Scan`: dense per-object counters, swept once at the end.
//! * `PriorityQueue`: k-way merge through a heap holding one cursor per list.
//! * `StoreSort`: concatenate all entries, sort, count runs.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::config::SearchAlgorithm;
use crate::pool::VectorPool;
use crate::types::{CombId, IdType};

use super::posting::PostingLists;

/// Reusable buffers for candidate generation, shared by all queries.
pub struct CandidatePools {
    pub comb_ids: VectorPool<CombId>,
    pub ids: VectorPool<IdType>,
    pub counters: VectorPool<u32>,
    pub pairs: VectorPool<(IdType, u32)>,
    pub dists: VectorPool<f32>,
}

impl CandidatePools {
    pub fn new() -> Self {
        Self {
            comb_ids: VectorPool::default(),
            ids: VectorPool::default(),
            counters: VectorPool::default(),
            pairs: VectorPool::default(),
            dists: VectorPool::default(),
        }
    }
}

impl Default for CandidatePools {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the lists a query may consult under a budget of `budget` entries.
///
/// Lists are taken in the order of `query_ids`, each one whole, until the
/// consumed entries reach the budget. A larger budget therefore always
/// selects a superset (a longer prefix) of the lists a smaller one selects.
/// Returns the number of entries consumed.
pub fn select_lists(
    postings: &PostingLists,
    query_ids: &[CombId],
    budget: u64,
    selected: &mut Vec<CombId>,
) -> u64 {
    selected.clear();
    let mut consumed = 0u64;
    for &comb in query_ids {
        if consumed >= budget {
            break;
        }
        selected.push(comb);
        consumed += postings.get(comb).len() as u64;
    }
    consumed
}

/// Collect candidates from `selected` lists into `out` (cleared first).
pub fn generate(
    algorithm: SearchAlgorithm,
    postings: &PostingLists,
    selected: &[CombId],
    min_times: usize,
    data_len: usize,
    pools: &CandidatePools,
    out: &mut Vec<IdType>,
) {
    out.clear();
    if selected.is_empty() {
        return;
    }
    let min_times = min_times.max(1) as u32;
    match algorithm {
        SearchAlgorithm::Merge => merge(postings, selected, min_times, pools, out),
        SearchAlgorithm::Scan => scan(postings, selected, min_times, data_len, pools, out),
        SearchAlgorithm::PriorityQueue => priority_queue(postings, selected, min_times, pools, out),
        SearchAlgorithm::StoreSort => store_sort(postings, selected, min_times, pools, out),
    }
}

fn merge(
    postings: &PostingLists,
    selected: &[CombId],
    min_times: u32,
    pools: &CandidatePools,
    out: &mut Vec<IdType>,
) {
    let total: usize = selected.iter().map(|&c| postings.get(c).len()).sum();
    let mut acc = pools.pairs.acquire(total);
    let mut next = pools.pairs.acquire(total);

    for &comb in selected {
        let list = postings.get(comb);
        next.clear();
        let (mut i, mut j) = (0, 0);
        while i < acc.len() && j < list.len() {
            let (id, cnt) = acc[i];
            if id < list[j] {
                next.push((id, cnt));
                i += 1;
            } else if id > list[j] {
                next.push((list[j], 1));
                j += 1;
            } else {
                next.push((id, cnt + 1));
                i += 1;
                j += 1;
            }
        }
        next.extend_from_slice(&acc[i..]);
        next.extend(list[j..].iter().map(|&id| (id, 1)));
        std::mem::swap(&mut *acc, &mut *next);
    }

    out.extend(
        acc.iter()
            .filter(|&&(_, cnt)| cnt >= min_times)
            .map(|&(id, _)| id),
    );
}

fn scan(
    postings: &PostingLists,
    selected: &[CombId],
    min_times: u32,
    data_len: usize,
    pools: &CandidatePools,
    out: &mut Vec<IdType>,
) {
    let mut counters = pools.counters.acquire_filled(data_len, 0);
    for &comb in selected {
        for &id in postings.get(comb) {
            if let Some(c) = counters.get_mut(id as usize) {
                *c += 1;
            }
        }
    }
    out.extend(
        counters
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c >= min_times)
            .map(|(id, _)| id as IdType),
    );
}

fn priority_queue(
    postings: &PostingLists,
    selected: &[CombId],
    min_times: u32,
    pools: &CandidatePools,
    out: &mut Vec<IdType>,
) {
    // One cursor per list; the heap holds (next id, list slot).
    let mut cursors = pools.counters.acquire_filled(selected.len(), 0);
    let mut heap: BinaryHeap<Reverse<(IdType, u32)>> = BinaryHeap::with_capacity(selected.len());
    for (slot, &comb) in selected.iter().enumerate() {
        if let Some(&first) = postings.get(comb).first() {
            heap.push(Reverse((first, slot as u32)));
        }
    }

    let mut current: Option<(IdType, u32)> = None;
    while let Some(Reverse((id, slot))) = heap.pop() {
        match current {
            Some((cur, cnt)) if cur == id => current = Some((cur, cnt + 1)),
            _ => {
                if let Some((cur, cnt)) = current {
                    if cnt >= min_times {
                        out.push(cur);
                    }
                }
                current = Some((id, 1));
            }
        }

        let slot = slot as usize;
        cursors[slot] += 1;
        let list = postings.get(selected[slot]);
        if let Some(&next) = list.get(cursors[slot] as usize) {
            heap.push(Reverse((next, slot as u32)));
        }
    }
    if let Some((cur, cnt)) = current {
        if cnt >= min_times {
            out.push(cur);
        }
    }
}

fn store_sort(
    postings: &PostingLists,
    selected: &[CombId],
    min_times: u32,
    pools: &CandidatePools,
    out: &mut Vec<IdType>,
) {
    let total: usize = selected.iter().map(|&c| postings.get(c).len()).sum();
    let mut all = pools.ids.acquire(total);
    for &comb in selected {
        all.extend_from_slice(postings.get(comb));
    }
    all.sort_unstable();

    let mut i = 0;
    while i < all.len() {
        let id = all[i];
        let mut j = i + 1;
        while j < all.len() && all[j] == id {
            j += 1;
        }
        if (j - i) as u32 >= min_times {
            out.push(id);
        }
        i = j;
    }
}
