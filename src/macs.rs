//! MaCS-style ingestion: turns a `COMMAND:`/`SEED:`/`SITE:` token stream
//! into a [`Panel`], one site per `SITE:` line.
//!
//! Per-line tokenization walks whitespace-delimited fields with
//! `memchr` rather than allocating a `Vec` of `&str` per line, the same
//! style `grit_genomics::streaming::parsing` uses for BED fields.

use std::io::BufRead;

use memchr::memchr2;

use crate::config::Options;
use crate::error::{PbwtError, Result};
use crate::panel::Panel;

const INVALID: u8 = 0xFF;

const fn build_allele_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    table[b'0' as usize] = 0;
    table[b'1' as usize] = 1;
    table
}

static ALLELE_TABLE: [u8; 256] = build_allele_table();

fn skip_ws(s: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < s.len() && (s[i] == b' ' || s[i] == b'\t') {
        i += 1;
    }
    &s[i..]
}

/// Split off the next whitespace-delimited field, returning it along
/// with whatever remains of the line.
fn next_field(s: &[u8]) -> Option<(&[u8], &[u8])> {
    let s = skip_ws(s);
    if s.is_empty() {
        return None;
    }
    let end = memchr2(b' ', b'\t', s).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

fn parse_u64(field: &[u8]) -> Option<u64> {
    if field.is_empty() {
        return None;
    }
    let mut n = 0u64;
    for &b in field {
        let d = b.wrapping_sub(b'0');
        if d > 9 {
            return None;
        }
        n = n.wrapping_mul(10).wrapping_add(d as u64);
    }
    Some(n)
}

fn parse_f64(field: &[u8]) -> Option<f64> {
    std::str::from_utf8(field).ok()?.parse().ok()
}

/// Parse `COMMAND: <cmd> <M> <L> …`, returning `(M, L)`. Everything
/// after `L` is ignored.
fn parse_command_line(line: &[u8]) -> Result<(usize, f64)> {
    let rest = line
        .strip_prefix(b"COMMAND:")
        .ok_or_else(|| PbwtError::format("macs::ingest", "missing COMMAND: header"))?;
    let (_cmd, rest) = next_field(rest)
        .ok_or_else(|| PbwtError::format("macs::ingest", "COMMAND: header missing <cmd>"))?;
    let (m_field, rest) = next_field(rest)
        .ok_or_else(|| PbwtError::format("macs::ingest", "COMMAND: header missing M"))?;
    let (l_field, _rest) = next_field(rest)
        .ok_or_else(|| PbwtError::format("macs::ingest", "COMMAND: header missing L"))?;
    let m = parse_u64(m_field)
        .ok_or_else(|| PbwtError::format("macs::ingest", "M is not a non-negative integer"))?
        as usize;
    let l = parse_f64(l_field)
        .ok_or_else(|| PbwtError::format("macs::ingest", "L is not numeric"))?;
    Ok((m, l))
}

/// Parse `SITE: <num> <p> <time> <M chars in {'0','1'}>`, returning the
/// scaled position `x = floor(L * p)` and the raw allele bytes.
fn parse_site_line<'a>(line: &'a [u8], l: f64, m: usize) -> Result<(i64, &'a [u8])> {
    let rest = line
        .strip_prefix(b"SITE:")
        .ok_or_else(|| PbwtError::format("macs::ingest", "expected SITE: line"))?;
    let (_num, rest) = next_field(rest)
        .ok_or_else(|| PbwtError::format("macs::ingest", "SITE: line missing site number"))?;
    let (p_field, rest) = next_field(rest)
        .ok_or_else(|| PbwtError::format("macs::ingest", "SITE: line missing position"))?;
    let (_time, rest) = next_field(rest)
        .ok_or_else(|| PbwtError::format("macs::ingest", "SITE: line missing time"))?;
    let (alleles, _rest) = next_field(rest)
        .ok_or_else(|| PbwtError::format("macs::ingest", "SITE: line missing allele field"))?;
    if alleles.len() != m {
        return Err(PbwtError::shape(
            "macs::ingest",
            format!("allele field has {} characters, expected {m}", alleles.len()),
        ));
    }
    let p = parse_f64(p_field)
        .ok_or_else(|| PbwtError::format("macs::ingest", "position is not numeric"))?;
    let x = (l * p).floor() as i64;
    Ok((x, alleles))
}

/// Consume a MaCS token stream and build a [`Panel`] from its `SITE:`
/// lines. The `COMMAND:` line supplies `M` and the coordinate scale
/// `L`; the `SEED:` line is read and discarded.
pub fn ingest<R: BufRead>(r: R, opts: &Options) -> Result<Panel> {
    ingest_with_hook(r, opts, |_panel| Ok(()))
}

/// Like [`ingest`], but `on_site` runs after every appended site and
/// can observe the panel so far — used by the CLI to drive checkpoint
/// rotation during a long ingestion without buffering the whole input.
pub fn ingest_with_hook<R: BufRead>(
    mut r: R,
    opts: &Options,
    mut on_site: impl FnMut(&Panel) -> Result<()>,
) -> Result<Panel> {
    let mut line = String::new();
    r.read_line(&mut line)?;
    let (m, l) = parse_command_line(line.trim_end().as_bytes())?;

    line.clear();
    r.read_line(&mut line)?;
    if !line.trim_start().starts_with("SEED:") {
        return Err(PbwtError::format("macs::ingest", "expected SEED: line"));
    }

    let mut panel = Panel::new(m)?;
    let mut raw = vec![0u8; m];
    loop {
        line.clear();
        let read = r.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        let (x, alleles) = parse_site_line(trimmed.as_bytes(), l, m)?;
        for (i, &byte) in alleles.iter().enumerate() {
            let v = ALLELE_TABLE[byte as usize];
            if v == INVALID {
                return Err(PbwtError::format(
                    "macs::ingest",
                    format!("non-binary character {:?} in allele field", byte as char),
                ));
            }
            raw[i] = v;
        }
        panel.append_column(&raw, Some(x), opts)?;
        on_site(&panel)?;
    }
    Ok(panel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingests_a_small_macs_stream() {
        let input = "COMMAND: macs 4 1000 -t 0.001\n\
                      SEED: 12345\n\
                      SITE: 0 0.100 0.5 0011\n\
                      SITE: 1 0.250 0.6 0101\n";
        let opts = Options::new();
        let panel = ingest(input.as_bytes(), &opts).unwrap();
        assert_eq!(panel.m(), 4);
        assert_eq!(panel.n(), 2);
        assert_eq!(panel.sites()[0].x, 100);
        assert_eq!(panel.sites()[1].x, 250);

        let matrix = crate::haplotype::HaplotypeMatrix::from_panel(&panel).unwrap();
        assert_eq!(matrix.row(0), &[0, 0]);
        assert_eq!(matrix.row(2), &[1, 0]);
    }

    #[test]
    fn rejects_non_binary_allele_character() {
        let input = "COMMAND: macs 2 100\nSEED: 1\nSITE: 0 0.5 0.1 0x\n";
        let opts = Options::new();
        assert!(ingest(input.as_bytes(), &opts).is_err());
    }

    #[test]
    fn rejects_wrong_allele_field_width() {
        let input = "COMMAND: macs 3 100\nSEED: 1\nSITE: 0 0.5 0.1 01\n";
        let opts = Options::new();
        assert!(ingest(input.as_bytes(), &opts).is_err());
    }

    #[test]
    fn missing_command_header_is_a_format_error() {
        let input = "SEED: 1\nSITE: 0 0.5 0.1 01\n";
        let opts = Options::new();
        assert!(ingest(input.as_bytes(), &opts).is_err());
    }
}
