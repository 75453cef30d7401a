//! External haplotype matching (Durbin's Algorithm 5): find, for a
//! query haplotype not in the panel, the panel haplotypes it matches
//! over maximal intervals, without re-sorting the panel.
//!
//! `PanelIndex` and [`match_streaming`] share one step function
//! (`collapse_and_walk`) over per-site `(a, d, rank)` triples so the
//! precomputed and streaming entry points cannot drift apart in what
//! they consider a match. The query's own index is reported as `m()`,
//! one past the panel's own haplotype indices.

use crate::config::Options;
use crate::error::{PbwtError, Result};
use crate::matches::Match;
use crate::panel::Panel;

/// Rank of each sort position's allele-0 count at one site, used to
/// narrow a query range through that site without retaining `a`.
#[derive(Debug, Clone)]
struct SiteRank {
    /// `u[i]` = number of zero alleles among sort positions `0..i`;
    /// `u[m]` is the total zero count.
    u: Vec<u32>,
}

impl SiteRank {
    fn build(y: &[u8], m: usize) -> SiteRank {
        let mut u = vec![0u32; m + 1];
        let mut zeros = 0u32;
        for i in 0..m {
            u[i] = zeros;
            if y[i] == 0 {
                zeros += 1;
            }
        }
        u[m] = zeros;
        SiteRank { u }
    }

    /// Map `[f, g)` through this site's split for `allele`.
    fn step(&self, f: usize, g: usize, allele: u8) -> (usize, usize) {
        let zero_total = self.u[self.u.len() - 1] as usize;
        if allele == 0 {
            (self.u[f] as usize, self.u[g] as usize)
        } else {
            let ones_before = |pos: usize| pos - self.u[pos] as usize;
            (zero_total + ones_before(f), zero_total + ones_before(g))
        }
    }
}

/// One site's worth of state the collapse/recovery walk needs: the
/// permutation and divergence arrays *before* folding this site in
/// (matching `matches.rs`'s convention), plus the rank table derived
/// from the same column.
struct SiteState<'a> {
    a: &'a [u32],
    d: &'a [u32],
    rank: &'a SiteRank,
}

/// Run Durbin's Algorithm 5 against `sites[0..n]` plus the panel's
/// final (post-last-site) permutation, which stands in for the `n`-th
/// site's "before" state in the terminal flush, exactly as
/// `matches.rs`'s terminal calls reuse the last `step`'s output.
fn collapse_and_walk(
    query: &[u8],
    m: usize,
    sites: &[SiteState],
    final_a: &[u32],
    final_d: &[u32],
) -> Vec<Match> {
    let n = sites.len();
    let query_id = m as u32;
    let mut out = Vec::new();
    if m == 0 {
        return out;
    }

    let mut f = 0usize;
    let mut g = m;
    let mut start = 0usize;

    let a_for = |k: usize| -> &[u32] {
        if k < n {
            sites[k].a
        } else {
            final_a
        }
    };
    let d_for = |k: usize| -> &[u32] {
        if k < n {
            sites[k].d
        } else {
            final_d
        }
    };

    for k in 0..n {
        let allele = query[k];
        let (fp, gp) = sites[k].rank.step(f, g, allele);

        if fp == gp {
            if (start as u32) < k as u32 {
                let a = a_for(k);
                for i in f..g {
                    out.push(Match::new(a[i], query_id, start as u32, k as u32));
                }
            }

            // Recover a non-empty range by taking whichever neighbor
            // just outside the old range shares the longer history
            // (smaller divergence), then re-apply this site's split to
            // that single-element range.
            let d = d_for(k);
            let left = (f > 0).then(|| (f - 1, d[f]));
            let right = (g < m).then(|| (g, d[g]));
            let chosen = match (left, right) {
                (Some(l), Some(r)) => Some(if l.1 <= r.1 { l } else { r }),
                (Some(l), None) => Some(l),
                (None, Some(r)) => Some(r),
                (None, None) => None,
            };
            match chosen {
                Some((pos, div)) => {
                    let (nf, ng) = sites[k].rank.step(pos, pos + 1, allele);
                    if nf < ng {
                        f = nf;
                        g = ng;
                        start = div as usize;
                    } else {
                        // Even the closest neighbor disagrees with the
                        // query at this site; there is nothing left to
                        // extend from until the next site.
                        f = 0;
                        g = 0;
                        start = k + 1;
                    }
                }
                None => {
                    f = 0;
                    g = 0;
                    start = k + 1;
                }
            }
        } else {
            f = fp;
            g = gp;
        }
    }

    if (start as u32) < n as u32 {
        let a_last = a_for(n);
        for i in f..g {
            out.push(Match::new(a_last[i], query_id, start as u32, n as u32));
        }
    }
    out
}

/// All per-site arrays precomputed over a whole panel, `O(N*M)`
/// storage. Only practical for modest panels; large panels should use
/// [`match_streaming`] instead.
pub struct PanelIndex {
    m: usize,
    n: usize,
    a: Vec<Vec<u32>>,
    d: Vec<Vec<u32>>,
    rank: Vec<SiteRank>,
    final_a: Vec<u32>,
    final_d: Vec<u32>,
}

impl PanelIndex {
    pub fn build(panel: &Panel) -> Result<PanelIndex> {
        let m = panel.m();
        let n = panel.n();
        let mut a = Vec::with_capacity(n);
        let mut d = Vec::with_capacity(n);
        let mut rank = Vec::with_capacity(n);
        panel.iterate_columns(|_k, col, pre_a, pre_d| {
            a.push(pre_a.to_vec());
            d.push(pre_d.to_vec());
            rank.push(SiteRank::build(col, m));
            Ok(())
        })?;
        Ok(PanelIndex {
            m,
            n,
            a,
            d,
            rank,
            final_a: panel.current_a().to_vec(),
            final_d: panel.current_d().to_vec(),
        })
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Match `query` (one allele per site, `query.len() == n()`) against
    /// the indexed panel.
    pub fn match_query(&self, query: &[u8]) -> Result<Vec<Match>> {
        if query.len() != self.n {
            return Err(PbwtError::shape(
                "match_query",
                format!("query has {} alleles, panel has {} sites", query.len(), self.n),
            ));
        }
        let sites: Vec<SiteState> = (0..self.n)
            .map(|k| SiteState {
                a: &self.a[k],
                d: &self.d[k],
                rank: &self.rank[k],
            })
            .collect();
        Ok(collapse_and_walk(query, self.m, &sites, &self.final_a, &self.final_d))
    }
}

/// Streaming variant of [`PanelIndex::match_query`]: derives the same
/// per-site state by decoding the panel's column stream once, without
/// retaining a `PanelIndex`.
pub fn match_streaming(panel: &Panel, query: &[u8], _opts: &Options) -> Result<Vec<Match>> {
    let m = panel.m();
    let n = panel.n();
    if query.len() != n {
        return Err(PbwtError::shape(
            "match_streaming",
            format!("query has {} alleles, panel has {n} sites", query.len()),
        ));
    }

    let mut a_cols = Vec::with_capacity(n);
    let mut d_cols = Vec::with_capacity(n);
    let mut rank_cols = Vec::with_capacity(n);
    panel.iterate_columns(|_k, col, pre_a, pre_d| {
        a_cols.push(pre_a.to_vec());
        d_cols.push(pre_d.to_vec());
        rank_cols.push(SiteRank::build(col, m));
        Ok(())
    })?;

    let sites: Vec<SiteState> = (0..n)
        .map(|k| SiteState {
            a: &a_cols[k],
            d: &d_cols[k],
            rank: &rank_cols[k],
        })
        .collect();
    Ok(collapse_and_walk(
        query,
        m,
        &sites,
        panel.current_a(),
        panel.current_d(),
    ))
}
