//! Long-match and maximal-match enumeration over `(y, a, d)` at a single
//! column. Durbin's Algorithms 3 and 4, reshaped as sink-based reporters
//! (see DESIGN.md) rather than functions with side-effecting I/O.
//!
//! Both reporters are fed the permutation state as it stood *before*
//! folding column `k` in, together with the column itself: `a`/`d`
//! reflect the sort order built from sites `0..k`, and `y` is site `k`
//! read in that order. That is exactly the state `PrefixSort::step`
//! consumes to produce the sort order for `k+1`, so callers report
//! matches and then advance, never the other way around.

use std::collections::HashSet;

/// One reported shared substring between two haplotypes, in the
/// haplotype's own index space (not sort order), over `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub hap_i: u32,
    pub hap_j: u32,
    pub start: u32,
    pub end: u32,
}

impl Match {
    pub(crate) fn new(hap_i: u32, hap_j: u32, start: u32, end: u32) -> Self {
        debug_assert_ne!(hap_i, hap_j, "self-match reported");
        debug_assert!(start < end, "zero-length match reported");
        Self {
            hap_i,
            hap_j,
            start,
            end,
        }
    }
}

/// Report every pair of haplotypes whose shared suffix ending at column
/// `k` is at least `threshold` long and ends here — either because the
/// alleles at `k` differ (the match cannot be extended further) or, for
/// the single terminal call made after the last site (`k == N`,
/// `is_internal = false`), because the panel itself has ended.
///
/// `a`/`d` are the state before folding in column `k`; `y` is column `k`
/// read in that order. Runs are partitioned on `d[i] <= k - threshold`,
/// not `d[i] <= threshold`: that is what guarantees every pair found
/// within a run already has a shared suffix of at least `threshold`,
/// since the divergence between any two run members is itself bounded
/// by that cutoff.
pub fn report_long_matches(
    threshold: u32,
    y: &[u8],
    a: &[u32],
    d: &[u32],
    k: usize,
    is_internal: bool,
    mut sink: impl FnMut(Match),
) {
    let m = a.len();
    debug_assert!(y.len() >= m);
    debug_assert_eq!(d.len(), m + 1);
    let end = k as u32;
    let cutoff = end as i64 - threshold as i64;

    let mut i0 = 0usize;
    while i0 < m {
        let mut i1 = i0 + 1;
        while i1 < m && (d[i1] as i64) <= cutoff {
            i1 += 1;
        }
        for ia in i0..i1 {
            let mut dmin = 0u32;
            for ib in (ia + 1)..i1 {
                if d[ib] > dmin {
                    dmin = d[ib];
                }
                let ends_here = !is_internal || y[ia] != y[ib];
                if ends_here && dmin < end {
                    sink(Match::new(a[ia], a[ib], dmin, end));
                }
            }
        }
        i0 = i1;
    }
}

/// Report every pair of haplotypes whose shared suffix at column `k` is
/// maximal: neither endpoint can be extended by one more position
/// without breaking equality. `is_internal` is `true` for ordinary
/// calls made during construction (column `k < N`); pass `false` for
/// the single terminal call made after the last site (`k == N`) to
/// flush matches that the "might still extend" check would otherwise
/// suppress forever, since there is no further column to extend into.
///
/// `a`/`d` are the state before folding in column `k`; `y` is column `k`
/// read in that order (ignored when `is_internal` is `false`).
///
/// The terminal call can independently rediscover the same unordered
/// pair from both its left and right neighbor's perspective, since the
/// extend-suppression check that normally breaks that symmetry needs a
/// next column that does not exist there. Callers that need the
/// no-duplicate property across a terminal flush should route through
/// [`DedupSink`].
pub fn report_maximal_matches(
    y: &[u8],
    a: &[u32],
    d: &[u32],
    k: usize,
    is_internal: bool,
    mut sink: impl FnMut(Match),
) {
    let m = a.len();
    debug_assert_eq!(d.len(), m + 1);
    let end = k as u32;

    for i in 0..m {
        let mut extends = false;

        let mut lo: isize = i as isize - 1;
        while lo >= 0 && d[(lo + 1) as usize] <= d[i] {
            if is_internal && y[lo as usize] == y[i] {
                extends = true;
                break;
            }
            lo -= 1;
        }
        if extends {
            continue;
        }

        let mut hi = i + 1;
        while hi < m && d[hi] <= d[i + 1] {
            if is_internal && y[hi] == y[i] {
                extends = true;
                break;
            }
            hi += 1;
        }
        if extends {
            continue;
        }

        let left_start = d[i];
        for j in (lo + 1) as usize..i {
            if left_start < end {
                sink(Match::new(a[i], a[j], left_start, end));
            }
        }
        let right_start = d[i + 1];
        for j in (i + 1)..hi {
            if right_start < end {
                sink(Match::new(a[i], a[j], right_start, end));
            }
        }
    }
}

/// Wraps a sink, dropping any `Match` whose unordered pair and span was
/// already emitted. Needed at the terminal [`report_maximal_matches`]
/// call, where a pair can legitimately be discovered from both
/// endpoints' scans.
pub struct DedupSink<F: FnMut(Match)> {
    seen: HashSet<(u32, u32, u32, u32)>,
    inner: F,
}

impl<F: FnMut(Match)> DedupSink<F> {
    pub fn new(inner: F) -> Self {
        Self {
            seen: HashSet::new(),
            inner,
        }
    }

    pub fn emit(&mut self, m: Match) {
        let key = (m.hap_i.min(m.hap_j), m.hap_i.max(m.hap_j), m.start, m.end);
        if self.seen.insert(key) {
            (self.inner)(m);
        }
    }
}
