//! Posting lists keyed by combination id.
//!
//! During a build the lists live in [`SharedPostingLists`], guarded either by
//! one lock per list or by a single lock for all of them. Once every worker
//! has flushed, the store is frozen into [`PostingLists`], plain vectors that
//! queries read without synchronization.

use parking_lot::Mutex;

use crate::error::{NappError, Result};
use crate::metrics;
use crate::types::{CombId, IdType};

/// Append-only posting lists shared by build workers.
pub enum SharedPostingLists {
    PerList(Vec<Mutex<Vec<IdType>>>),
    Single(Mutex<Vec<Vec<IdType>>>),
}

impl SharedPostingLists {
    pub fn new(qty: usize, single_mutex: bool) -> Self {
        if single_mutex {
            SharedPostingLists::Single(Mutex::new(vec![Vec::new(); qty]))
        } else {
            SharedPostingLists::PerList((0..qty).map(|_| Mutex::new(Vec::new())).collect())
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SharedPostingLists::PerList(lists) => lists.len(),
            SharedPostingLists::Single(lists) => lists.lock().len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append every temporary list to its shared counterpart and clear the
    /// temporary lists. Their capacity is kept for the next window.
    pub fn flush(&self, tmp: &mut [Vec<IdType>]) -> Result<()> {
        if tmp.len() != self.len() {
            return Err(NappError::Consistency(format!(
                "temporary posting lists hold {} slots, shared store has {}",
                tmp.len(),
                self.len()
            )));
        }

        match self {
            SharedPostingLists::PerList(lists) => {
                for (shared, local) in lists.iter().zip(tmp.iter_mut()) {
                    if local.is_empty() {
                        continue;
                    }
                    shared.lock().extend_from_slice(local);
                    local.clear();
                }
                metrics::POSTING_FLUSHES_TOTAL
                    .with_label_values(&["per_list"])
                    .inc();
            }
            SharedPostingLists::Single(lists) => {
                let mut lists = lists.lock();
                for (shared, local) in lists.iter_mut().zip(tmp.iter_mut()) {
                    if local.is_empty() {
                        continue;
                    }
                    shared.extend_from_slice(local);
                    local.clear();
                }
                metrics::POSTING_FLUSHES_TOTAL
                    .with_label_values(&["single"])
                    .inc();
            }
        }
        Ok(())
    }

    /// Release the locks and sort every list by object id.
    pub fn freeze(self) -> PostingLists {
        let lists: Vec<Vec<IdType>> = match self {
            SharedPostingLists::PerList(lists) => lists.into_iter().map(|l| l.into_inner()).collect(),
            SharedPostingLists::Single(lists) => lists.into_inner(),
        };
        let mut frozen = PostingLists::from_lists(lists);
        frozen.sort_all();
        frozen
    }
}

/// Read-only posting lists of a built index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostingLists {
    lists: Vec<Vec<IdType>>,
    total: u64,
}

impl PostingLists {
    pub fn from_lists(lists: Vec<Vec<IdType>>) -> Self {
        let total = lists.iter().map(|l| l.len() as u64).sum();
        Self { lists, total }
    }

    fn sort_all(&mut self) {
        for list in &mut self.lists {
            list.sort_unstable();
        }
    }

    /// Number of lists (one per combination id).
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Total number of entries over all lists.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn get(&self, comb: CombId) -> &[IdType] {
        self.lists.get(comb as usize).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn as_slice(&self) -> &[Vec<IdType>] {
        &self.lists
    }

    pub fn stats(&self) -> PostingStats {
        let mut stats = PostingStats {
            lists: self.lists.len(),
            total: self.total,
            empty: 0,
            min: usize::MAX,
            max: 0,
            avg: 0.0,
        };
        for l in &self.lists {
            if l.is_empty() {
                stats.empty += 1;
            }
            stats.min = stats.min.min(l.len());
            stats.max = stats.max.max(l.len());
        }
        if self.lists.is_empty() {
            stats.min = 0;
        } else {
            stats.avg = self.total as f64 / self.lists.len() as f64;
        }
        stats
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostingStats {
    pub lists: usize,
    pub total: u64,
    pub empty: usize,
    pub min: usize,
    pub max: usize,
    pub avg: f64,
}
