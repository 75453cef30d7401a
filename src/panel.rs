//! The `Panel` container: owns a panel's encoded column stream, site
//! metadata and prefix-sort scratch state, and wires the codec
//! (`codec.rs`) to the updater (`sort.rs`) one column at a time.

use crate::codec;
use crate::config::Options;
use crate::error::{PbwtError, Result};
use crate::sort::PrefixSort;

/// Per-site metadata: physical position and derived allele count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteRecord {
    pub x: i64,
    pub f: u32,
}

/// A PBWT panel under construction or held for querying: the RLE-coded
/// column stream plus the site records needed to interpret it.
#[derive(Debug, Clone)]
pub struct Panel {
    m: usize,
    n: usize,
    sites: Vec<SiteRecord>,
    stream: Vec<u8>,
    sort: PrefixSort,
    y: Vec<u8>,
}

impl Panel {
    /// A panel with no sites yet, ready for `append_column`. Requires
    /// at least two haplotypes; a single haplotype has no prefix
    /// structure to sort.
    pub fn new(m: usize) -> Result<Panel> {
        if m < 2 {
            return Err(PbwtError::argument(format!(
                "panel requires at least 2 haplotypes, got {m}"
            )));
        }
        Ok(Panel {
            m,
            n: 0,
            sites: Vec::new(),
            stream: Vec::new(),
            sort: PrefixSort::new(m),
            y: vec![0u8; m + 1],
        })
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn sites(&self) -> &[SiteRecord] {
        &self.sites
    }

    pub fn stream_len(&self) -> usize {
        self.stream.len()
    }

    pub fn stream(&self) -> &[u8] {
        &self.stream
    }

    /// Current permutation, useful for callers driving the match
    /// reporters live during construction (`a`/`d` as they stand
    /// *before* this call — see `matches.rs`).
    pub fn current_a(&self) -> &[u32] {
        self.sort.a()
    }

    pub fn current_d(&self) -> &[u32] {
        self.sort.d()
    }

    /// Fold in one more site. `raw` holds `m` alleles in original
    /// haplotype order (not sort order); `x` is the site's physical
    /// position, defaulting to its 0-based site index when omitted.
    pub fn append_column(&mut self, raw: &[u8], x: Option<i64>, opts: &Options) -> Result<()> {
        if raw.len() != self.m {
            return Err(PbwtError::shape(
                "append_column",
                format!("expected {} alleles, got {}", self.m, raw.len()),
            ));
        }
        let mut ones = 0u32;
        {
            let a = self.sort.a();
            for i in 0..self.m {
                let hap = a[i] as usize;
                let v = raw[hap];
                if v > 1 {
                    return Err(PbwtError::format(
                        "append_column",
                        format!("allele {v} at haplotype {hap} is not 0/1"),
                    ));
                }
                self.y[i] = v;
                ones += v as u32;
            }
        }
        self.y[self.m] = codec::Y_SENTINEL;

        let before = self.stream.len();
        codec::encode(&self.y, self.m, &mut self.stream);
        if opts.check {
            let mut check_col = vec![0u8; self.m];
            let (read, check_ones) = codec::decode(&self.stream[before..], self.m, &mut check_col);
            if read != self.stream.len() - before
                || check_ones != ones as usize
                || check_col.as_slice() != &self.y[..self.m]
            {
                return Err(PbwtError::invariant(
                    self.n,
                    "encode/decode round trip mismatch",
                ));
            }
        }

        self.sort.step(&self.y);
        if opts.check && !self.sort.is_permutation() {
            return Err(PbwtError::invariant(
                self.n,
                "prefix-sort permutation invariant violated",
            ));
        }

        self.sites.push(SiteRecord {
            x: x.unwrap_or(self.n as i64),
            f: ones,
        });
        self.n += 1;
        Ok(())
    }

    /// Stream decoded `(k, y, a, d)` triples in site order, where `a`/`d`
    /// are the permutation state *before* folding in column `k` and `y`
    /// is column `k` read in that order — the convention
    /// `matches.rs`'s reporters expect. Re-derives `(a, d)` from
    /// scratch by replaying the whole stream; does not mutate `self`.
    pub fn iterate_columns(
        &self,
        mut visitor: impl FnMut(usize, &[u8], &[u32], &[u32]) -> Result<()>,
    ) -> Result<()> {
        let mut sort = PrefixSort::new(self.m);
        let mut y = vec![0u8; self.m + 1];
        let mut pos = 0usize;
        for k in 0..self.n {
            let (read, _ones) = codec::decode(&self.stream[pos..], self.m, &mut y[..self.m]);
            pos += read;
            y[self.m] = codec::Y_SENTINEL;
            visitor(k, &y, sort.a(), sort.d())?;
            sort.step(&y);
        }
        Ok(())
    }

    /// Keep haplotypes `[start, start+count)`, re-deriving `(a, d)` by
    /// reconstructing over the selected columns. Consumes `self`: the
    /// subsample and the original panel cannot coexist since the
    /// original's RLE stream is already positioned per the full
    /// haplotype count.
    pub fn subsample_individuals(self, start: usize, count: usize, opts: &Options) -> Result<Panel> {
        if count < 2 {
            return Err(PbwtError::argument(
                "subsample_individuals requires at least 2 haplotypes",
            ));
        }
        let in_range = matches!(start.checked_add(count), Some(end) if end <= self.m);
        if !in_range {
            return Err(PbwtError::argument(format!(
                "subsample range [{start}, {}) out of bounds for {} haplotypes",
                start + count,
                self.m
            )));
        }
        let matrix = crate::haplotype::HaplotypeMatrix::from_panel(&self)?;
        let mut out = Panel::new(count)?;
        let mut raw = vec![0u8; count];
        for k in 0..self.n {
            for (j, hap) in (start..start + count).enumerate() {
                raw[j] = matrix.allele(hap, k);
            }
            out.append_column(&raw, Some(self.sites[k].x), opts)?;
        }
        Ok(out)
    }

    /// Overwrite each site's `x` from `xs`, read from a companion sites
    /// file. `xs.len()` must equal `n()`; callers that already dropped
    /// a mismatched sites file (see `io::read_sites`) never call this.
    pub fn set_site_positions(&mut self, xs: &[i64]) -> Result<()> {
        if xs.len() != self.n {
            return Err(PbwtError::shape(
                "set_site_positions",
                format!("{} positions, panel has {} sites", xs.len(), self.n),
            ));
        }
        for (site, &x) in self.sites.iter_mut().zip(xs) {
            site.x = x;
        }
        Ok(())
    }

    /// Keep sites whose 1-frequency (`f / m`) strictly exceeds `fmin`,
    /// then deterministically retain an approximate `frac` of those
    /// (systematic striding rather than random sampling — this spec
    /// carries no RNG). Consumes `self` for the same reason as
    /// `subsample_individuals`.
    pub fn subsample_sites(self, fmin: f64, frac: f64, opts: &Options) -> Result<Panel> {
        if !(0.0..=1.0).contains(&frac) {
            return Err(PbwtError::argument("subsample_sites: frac must lie in [0, 1]"));
        }
        if !(0.0..=1.0).contains(&fmin) {
            return Err(PbwtError::argument("subsample_sites: fmin must lie in [0, 1]"));
        }
        let matrix = crate::haplotype::HaplotypeMatrix::from_panel(&self)?;
        let mut out = Panel::new(self.m)?;
        let mut raw = vec![0u8; self.m];
        let mut acc = 0.0f64;
        for k in 0..self.n {
            let site = self.sites[k];
            let freq = site.f as f64 / self.m as f64;
            if freq <= fmin {
                continue;
            }
            acc += frac;
            if acc < 1.0 {
                continue;
            }
            acc -= 1.0;
            for hap in 0..self.m {
                raw[hap] = matrix.allele(hap, k);
            }
            out.append_column(&raw, Some(site.x), opts)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(columns: &[&[u8]], opts: &Options) -> Panel {
        let m = columns[0].len();
        let mut panel = Panel::new(m).unwrap();
        for col in columns {
            panel.append_column(col, None, opts).unwrap();
        }
        panel
    }

    #[test]
    fn rejects_too_few_haplotypes() {
        assert!(Panel::new(1).is_err());
        assert!(Panel::new(0).is_err());
        assert!(Panel::new(2).is_ok());
    }

    #[test]
    fn append_column_tracks_shape_and_frequency() {
        let opts = Options::new();
        let mut panel = Panel::new(3).unwrap();
        panel.append_column(&[0, 1, 1], Some(42), &opts).unwrap();
        assert_eq!(panel.n(), 1);
        assert_eq!(panel.sites()[0], SiteRecord { x: 42, f: 2 });
    }

    #[test]
    fn append_column_defaults_x_to_site_index() {
        let opts = Options::new();
        let mut panel = Panel::new(2).unwrap();
        panel.append_column(&[0, 1], None, &opts).unwrap();
        panel.append_column(&[1, 1], None, &opts).unwrap();
        assert_eq!(panel.sites()[0].x, 0);
        assert_eq!(panel.sites()[1].x, 1);
    }

    #[test]
    fn append_column_rejects_wrong_length() {
        let opts = Options::new();
        let mut panel = Panel::new(3).unwrap();
        assert!(panel.append_column(&[0, 1], None, &opts).is_err());
    }

    #[test]
    fn append_column_rejects_non_binary_allele() {
        let opts = Options::new();
        let mut panel = Panel::new(2).unwrap();
        assert!(panel.append_column(&[0, 2], None, &opts).is_err());
    }

    #[test]
    fn iterate_columns_replays_in_site_order() {
        let opts = Options::new();
        let columns: [&[u8]; 3] = [&[0, 1, 0], &[1, 1, 0], &[0, 0, 1]];
        let panel = build(&columns, &opts);

        let mut seen_k = Vec::new();
        panel
            .iterate_columns(|k, _y, a, d| {
                seen_k.push(k);
                assert_eq!(a.len(), 3);
                assert_eq!(d.len(), 4);
                Ok(())
            })
            .unwrap();
        assert_eq!(seen_k, vec![0, 1, 2]);
    }

    #[test]
    fn subsample_individuals_keeps_selected_range() {
        let opts = Options::new();
        let columns: [&[u8]; 2] = [&[0, 1, 1, 0], &[1, 0, 1, 1]];
        let panel = build(&columns, &opts);
        let sub = panel.subsample_individuals(1, 2, &opts).unwrap();
        assert_eq!(sub.m(), 2);
        assert_eq!(sub.n(), 2);

        let matrix = crate::haplotype::HaplotypeMatrix::from_panel(&sub).unwrap();
        assert_eq!(matrix.row(0), &[1, 0]); // original haplotype 1
        assert_eq!(matrix.row(1), &[1, 1]); // original haplotype 2
    }

    #[test]
    fn subsample_individuals_rejects_out_of_range() {
        let opts = Options::new();
        let columns: [&[u8]; 1] = [&[0, 1, 1]];
        let panel = build(&columns, &opts);
        assert!(panel.clone().subsample_individuals(2, 2, &opts).is_err());
        assert!(panel.subsample_individuals(0, 1, &opts).is_err());
    }

    #[test]
    fn set_site_positions_overwrites_x_and_rejects_length_mismatch() {
        let opts = Options::new();
        let columns: [&[u8]; 2] = [&[0, 1], &[1, 0]];
        let mut panel = build(&columns, &opts);
        panel.set_site_positions(&[100, 200]).unwrap();
        assert_eq!(panel.sites()[0].x, 100);
        assert_eq!(panel.sites()[1].x, 200);
        assert!(panel.set_site_positions(&[1]).is_err());
    }

    #[test]
    fn subsample_sites_filters_by_frequency_and_keeps_all_at_frac_one() {
        let opts = Options::new();
        // site0: f=0 (freq=0) ; site1: f=2 (freq=0.5) ; site2: f=1 (freq=0.25)
        let columns: [&[u8]; 3] = [&[0, 0, 0, 0], &[1, 1, 0, 0], &[1, 0, 0, 0]];
        let panel = build(&columns, &opts);
        let sub = panel.subsample_sites(0.3, 1.0, &opts).unwrap();
        assert_eq!(sub.n(), 1);
        assert_eq!(sub.sites()[0].x, 1);
    }

    #[test]
    fn subsample_sites_scenario_s5_threshold() {
        // M=4; f values 0,1,2,3,4 across five sites. `fmin=0.5, frac=1.0`
        // must keep exactly the sites whose 1-frequency strictly exceeds
        // 0.5*M = 2, i.e. f=3 and f=4.
        let opts = Options::new();
        let columns: [&[u8]; 5] = [
            &[0, 0, 0, 0],
            &[1, 0, 0, 0],
            &[1, 1, 0, 0],
            &[1, 1, 1, 0],
            &[1, 1, 1, 1],
        ];
        let panel = build(&columns, &opts);
        let sub = panel.subsample_sites(0.5, 1.0, &opts).unwrap();
        assert_eq!(sub.n(), 2);
        assert_eq!(sub.sites()[0].x, 3);
        assert_eq!(sub.sites()[1].x, 4);
    }
}
