//! Pivot permutations and dense combination ids.
//!
//! An unordered set of `k` distinct pivot indices `a < b < c` is ranked with
//! the combinatorial number system:
//!
//! ```text
//! k = 1:  a
//! k = 2:  a + C(b, 2)
//! k = 3:  a + C(b, 2) + C(c, 3)
//! ```
//!
//! which maps the `C(n, k)` subsets of `0..n` onto `0..C(n, k)` without gaps.

use crate::error::{NappError, Result};
use crate::types::CombId;

/// `C(n, k)`, saturating at `u64::MAX`.
pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
        if acc > u64::MAX as u128 {
            return u64::MAX;
        }
    }
    acc as u64
}

/// Rank pivots by ascending distance. Equal distances keep the lower pivot
/// index first, so the permutation is a pure function of `dists`.
pub fn permutation(dists: &[f32], perm: &mut Vec<u32>) {
    perm.clear();
    perm.extend(0..dists.len() as u32);
    perm.sort_unstable_by(|&a, &b| {
        dists[a as usize]
            .total_cmp(&dists[b as usize])
            .then_with(|| a.cmp(&b))
    });
}

/// The id space of all `arity`-subsets of `num_pivot` pivots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CombinationSpace {
    num_pivot: usize,
    arity: usize,
    size: u64,
}

impl CombinationSpace {
    pub fn new(num_pivot: usize, arity: usize) -> Result<Self> {
        if !(1..=3).contains(&arity) {
            return Err(NappError::invalid(
                "pivot_comb_qty",
                format!("illegal number of pivots in the combinations {arity}, must be >0 and <=3"),
            ));
        }
        if num_pivot < arity {
            return Err(NappError::invalid(
                "num_pivot",
                format!("{num_pivot} pivots cannot form combinations of {arity}"),
            ));
        }
        let size = binomial(num_pivot, arity);
        if size > u32::MAX as u64 {
            return Err(NappError::invalid(
                "num_pivot",
                format!("{size} posting lists do not fit 32-bit combination ids"),
            ));
        }
        Ok(Self {
            num_pivot,
            arity,
            size,
        })
    }

    pub fn num_pivot(&self) -> usize {
        self.num_pivot
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Number of posting lists.
    pub fn size(&self) -> usize {
        self.size as usize
    }

    fn check_pivot(&self, p: u32) -> Result<()> {
        if (p as usize) < self.num_pivot {
            Ok(())
        } else {
            Err(NappError::PivotOutOfRange {
                pivot_id: p,
                num_pivot: self.num_pivot,
            })
        }
    }

    fn check_bound(&self, id: u64) -> Result<CombId> {
        if id < self.size {
            Ok(id as CombId)
        } else {
            Err(NappError::CombinationOutOfRange {
                comb_id: id,
                bound: self.size,
            })
        }
    }

    pub fn id1(&self, p: u32) -> Result<CombId> {
        self.check_pivot(p)?;
        self.check_bound(p as u64)
    }

    /// Id of the unordered pair `{p1, p2}`; the pivots must differ.
    pub fn id2(&self, p1: u32, p2: u32) -> Result<CombId> {
        let (a, b) = if p1 < p2 { (p1, p2) } else { (p2, p1) };
        if a == b {
            return Err(NappError::Consistency(format!(
                "pivot pair ({p1}, {p2}) is not made of distinct pivots"
            )));
        }
        self.check_pivot(b)?;
        let (a, b) = (a as u64, b as u64);
        self.check_bound(a + b * (b - 1) / 2)
    }

    /// Id of the unordered triple `{p1, p2, p3}`; the pivots must be distinct.
    pub fn id3(&self, p1: u32, p2: u32, p3: u32) -> Result<CombId> {
        let mut p = [p1, p2, p3];
        p.sort_unstable();
        if !(p[0] < p[1] && p[1] < p[2]) {
            return Err(NappError::Consistency(format!(
                "pivot triple ({p1}, {p2}, {p3}) is not made of distinct pivots"
            )));
        }
        self.check_pivot(p[2])?;
        let (a, b, c) = (p[0] as u64, p[1] as u64, p[2] as u64);
        self.check_bound(a + b * (b - 1) / 2 + c * (c - 1) * (c - 2) / 6)
    }

    /// Pivot indices of `id`, ascending. Inverse of `id1`/`id2`/`id3`.
    pub fn decode(&self, id: CombId) -> Result<Vec<u32>> {
        let mut rest = self.check_bound(id as u64)? as u64;
        let mut out = vec![0u32; self.arity];
        let mut upper = self.num_pivot;
        for k in (1..=self.arity).rev() {
            // Largest c with C(c, k) <= rest.
            let mut c = upper;
            while c > 0 && binomial(c - 1, k) > rest {
                c -= 1;
            }
            let c = c.saturating_sub(1);
            rest -= binomial(c, k);
            out[k - 1] = c as u32;
            upper = c;
        }
        Ok(out)
    }

    /// Number of ids a prefix of `prefix` pivots produces.
    pub fn ids_per_prefix(&self, prefix: usize) -> usize {
        binomial(prefix, self.arity) as usize
    }

    /// Write the ids of every `arity`-subset of `perm[..prefix]` into `ids`
    /// and return how many were written.
    ///
    /// `ids` only ever grows, so a buffer can be reused across calls; entries
    /// past the returned count are stale. Ids come out in colexicographic
    /// order of prefix positions, so combinations of the nearest pivots come
    /// first.
    pub fn fill_ids(&self, perm: &[u32], prefix: usize, ids: &mut Vec<CombId>) -> Result<usize> {
        if prefix > perm.len() || prefix > self.num_pivot {
            return Err(NappError::Consistency(format!(
                "prefix {prefix} exceeds permutation length {}",
                perm.len()
            )));
        }
        let need = self.ids_per_prefix(prefix);
        if ids.len() < need {
            ids.resize(need, 0);
        }

        let prefix = &perm[..prefix];
        let mut n = 0;
        match self.arity {
            1 => {
                for &a in prefix {
                    ids[n] = self.id1(a)?;
                    n += 1;
                }
            }
            2 => {
                for (j, &b) in prefix.iter().enumerate() {
                    for &a in &prefix[..j] {
                        ids[n] = self.id2(a, b)?;
                        n += 1;
                    }
                }
            }
            _ => {
                for (k, &c) in prefix.iter().enumerate() {
                    for (j, &b) in prefix[..k].iter().enumerate() {
                        for &a in &prefix[..j] {
                            ids[n] = self.id3(a, b, c)?;
                            n += 1;
                        }
                    }
                }
            }
        }
        debug_assert_eq!(n, need);
        Ok(n)
    }
}
