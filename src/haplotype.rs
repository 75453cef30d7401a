//! On-demand haplotype matrix, built by decoding a [`Panel`]'s column
//! stream and inverting each site's permutation back into haplotype
//! order. Used by check mode and by the `-haps` export; grounded in
//! spec.md's note that this exists only for those two callers and
//! should not be tied to the panel's own lifetime.

use std::io::Write;
use std::rc::Rc;

use crate::error::Result;
use crate::panel::Panel;

/// `M x N` alleles, one row per haplotype, one column per site.
#[derive(Debug)]
pub struct HaplotypeMatrix {
    m: usize,
    n: usize,
    data: Vec<u8>,
}

impl HaplotypeMatrix {
    /// Decode every column of `panel` and place each haplotype's allele
    /// at `[hap][site]`, undoing the sort-order permutation recorded at
    /// that site.
    pub fn from_panel(panel: &Panel) -> Result<Rc<HaplotypeMatrix>> {
        let m = panel.m();
        let n = panel.n();
        let mut data = vec![0u8; m * n];
        panel.iterate_columns(|k, y, a, _d| {
            for i in 0..m {
                data[a[i] as usize * n + k] = y[i];
            }
            Ok(())
        })?;
        Ok(Rc::new(HaplotypeMatrix { m, n, data }))
    }

    pub fn m(&self) -> usize {
        self.m
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn allele(&self, hap: usize, site: usize) -> u8 {
        self.data[hap * self.n + site]
    }

    /// All `N` alleles for one haplotype, in site order.
    pub fn row(&self, hap: usize) -> &[u8] {
        &self.data[hap * self.n..(hap + 1) * self.n]
    }

    /// Write the `-haps` text format: one line per site, one
    /// `'0'`/`'1'` character per haplotype, haplotypes in their
    /// original column order.
    pub fn write_haps<W: Write>(&self, mut out: W) -> Result<()> {
        let mut line = Vec::with_capacity(self.m + 1);
        for site in 0..self.n {
            line.clear();
            for hap in 0..self.m {
                line.push(if self.allele(hap, site) == 1 { b'1' } else { b'0' });
            }
            line.push(b'\n');
            out.write_all(&line)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Options;
    use crate::panel::Panel;

    fn build_panel(columns: &[&[u8]]) -> Panel {
        let m = columns[0].len();
        let mut panel = Panel::new(m).unwrap();
        let opts = Options::new();
        for col in columns {
            panel.append_column(col, None, &opts).unwrap();
        }
        panel
    }

    #[test]
    fn round_trips_original_haplotypes() {
        // haplotype0 = 0,1,0 ; haplotype1 = 0,0,1 ; haplotype2 = 1,1,1
        let columns: [&[u8]; 3] = [&[0, 0, 1], &[1, 0, 1], &[0, 1, 1]];
        let panel = build_panel(&columns);
        let matrix = HaplotypeMatrix::from_panel(&panel).unwrap();
        assert_eq!(matrix.row(0), &[0, 1, 0]);
        assert_eq!(matrix.row(1), &[0, 0, 1]);
        assert_eq!(matrix.row(2), &[1, 1, 1]);
    }

    #[test]
    fn write_haps_emits_one_line_per_site() {
        let columns: [&[u8]; 2] = [&[0, 1], &[1, 1]];
        let panel = build_panel(&columns);
        let matrix = HaplotypeMatrix::from_panel(&panel).unwrap();
        let mut out = Vec::new();
        matrix.write_haps(&mut out).unwrap();
        assert_eq!(out, b"01\n11\n");
    }
}
