//! Command-line driver: a single configurable pipeline over one panel,
//! not a dispatch over verbs — every flag below can be combined in the
//! same invocation, and they run in a fixed order regardless of argv
//! position.

use std::io::BufReader;
use std::path::PathBuf;
use std::process;

use clap::Parser;

use pbwt::config::Options;
use pbwt::error::Result;
use pbwt::haplotype::HaplotypeMatrix;
use pbwt::io::{open_reader, open_writer, CheckpointWriter};
use pbwt::matches::{report_long_matches, report_maximal_matches, DedupSink};
use pbwt::panel::Panel;

#[derive(Parser)]
#[command(name = "pbwt")]
#[command(author = "Manish Kumar Bobbili")]
#[command(version)]
#[command(about = "Positional Burrows-Wheeler Transform engine for bi-allelic haplotype panels", long_about = None)]
struct Cli {
    /// Re-validate invariants as the panel is built and queried.
    #[arg(long)]
    check: bool,

    /// Emit extra summary lines to stderr.
    #[arg(long)]
    stats: bool,

    /// Ingest a MaCS-format stream (use - for stdin).
    #[arg(long, value_name = "FILE")]
    macs: Option<PathBuf>,

    /// Read a binary panel (use - for stdin).
    #[arg(long, value_name = "FILE")]
    read: Option<PathBuf>,

    /// Write the resulting binary panel (use - for stdout).
    #[arg(long, value_name = "FILE")]
    write: Option<PathBuf>,

    /// Read a companion sites file.
    #[arg(long = "read-sites", value_name = "FILE")]
    read_sites: Option<PathBuf>,

    /// Write the sites file (use - for stdout).
    #[arg(long = "write-sites", value_name = "FILE")]
    write_sites: Option<PathBuf>,

    /// Emit the haplotype matrix (use - for stdout).
    #[arg(long, value_name = "FILE")]
    haps: Option<PathBuf>,

    /// Rotate a checkpoint snapshot every N sites during ingestion; 0 disables.
    #[arg(long, default_value_t = 0)]
    checkpoint: usize,

    /// Keep haplotypes [START, START+N).
    #[arg(long, num_args = 2, value_names = ["START", "N"])]
    subsample: Option<Vec<usize>>,

    /// Keep sites whose 1-frequency strictly exceeds FMIN, then a FRAC fraction of those.
    #[arg(long, num_args = 2, value_names = ["FMIN", "FRAC"])]
    subsites: Option<Vec<f64>>,

    /// Report all matches of at least this length.
    #[arg(long = "long-within", value_name = "L")]
    long_within: Option<u32>,

    /// Report maximal matches.
    #[arg(long = "maximal-within")]
    maximal_within: bool,

    /// Match haplotypes from a second panel file against the current one.
    #[arg(long, value_name = "FILE")]
    test: Option<PathBuf>,
}

fn load_panel(cli: &Cli, opts: &Options) -> Result<Panel> {
    if let Some(path) = &cli.macs {
        let reader = BufReader::new(open_reader(path)?);
        if cli.checkpoint > 0 {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
            let dir = dir.map(|p| p.to_path_buf()).unwrap_or_else(|| PathBuf::from("."));
            let mut checkpointer = CheckpointWriter::new(dir, "pbwt");
            let mut since_last = 0usize;
            return pbwt::macs::ingest_with_hook(reader, opts, |panel| {
                since_last += 1;
                if since_last >= cli.checkpoint {
                    since_last = 0;
                    checkpointer.write(panel)?;
                }
                Ok(())
            });
        }
        return pbwt::macs::ingest(reader, opts);
    }
    if let Some(path) = &cli.read {
        if pbwt::io::is_stdio_path(path) {
            let reader = open_reader(path)?;
            return pbwt::io::read_panel(reader);
        }
        return pbwt::io::read_panel_mmap(path);
    }
    Err(pbwt::PbwtError::argument(
        "one of --macs or --read is required to obtain a panel",
    ))
}

fn run_matches(panel: &Panel, cli: &Cli) -> Result<()> {
    if cli.long_within.is_none() && !cli.maximal_within {
        return Ok(());
    }
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let n = panel.n();

    if let Some(threshold) = cli.long_within {
        panel.iterate_columns(|k, y, a, d| {
            report_long_matches(threshold, y, a, d, k, true, |m| {
                print_match(&mut out, &m);
            });
            Ok(())
        })?;
        let sentinel = vec![0u8; panel.m() + 1];
        report_long_matches(threshold, &sentinel, panel.current_a(), panel.current_d(), n, false, |m| {
            print_match(&mut out, &m);
        });
    }

    if cli.maximal_within {
        let mut dedup = DedupSink::new(|m| print_match(&mut out, &m));
        panel.iterate_columns(|k, y, a, d| {
            report_maximal_matches(y, a, d, k, true, |m| dedup.emit(m));
            Ok(())
        })?;
        let sentinel = vec![0u8; panel.m() + 1];
        report_maximal_matches(&sentinel, panel.current_a(), panel.current_d(), n, false, |m| {
            dedup.emit(m)
        });
    }
    Ok(())
}

fn print_match<W: std::io::Write>(out: &mut W, m: &pbwt::matches::Match) {
    use std::io::Write;
    let _ = writeln!(out, "{}\t{}\t{}\t{}", m.hap_i, m.hap_j, m.start, m.end);
}

fn run_test_matching(panel: &Panel, cli: &Cli) -> Result<()> {
    let Some(path) = &cli.test else { return Ok(()) };
    let reader = open_reader(path)?;
    let query_panel = pbwt::io::read_panel(reader)?;
    let query_matrix = HaplotypeMatrix::from_panel(&query_panel)?;
    let index = pbwt::matcher::PanelIndex::build(panel)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for hap in 0..query_matrix.m() {
        let matches = index.match_query(query_matrix.row(hap))?;
        for m in matches {
            print_match(&mut out, &m);
        }
    }
    Ok(())
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let opts = Options::new().with_check(cli.check).with_stats(cli.stats);

    let mut panel = load_panel(&cli, &opts)?;

    if let Some(path) = &cli.read_sites {
        let reader = open_reader(path)?;
        if let Some(xs) = pbwt::io::read_sites(reader, panel.n())? {
            panel.set_site_positions(&xs)?;
        }
    }

    if let Some(values) = &cli.subsample {
        let (start, count) = (values[0], values[1]);
        panel = panel.subsample_individuals(start, count, &opts)?;
    }

    if let Some(values) = &cli.subsites {
        let (fmin, frac) = (values[0], values[1]);
        panel = panel.subsample_sites(fmin, frac, &opts)?;
    }

    if cli.stats {
        eprintln!(
            "panel: {} haplotypes, {} sites, {} stream bytes",
            panel.m(),
            panel.n(),
            panel.stream_len()
        );
    }

    run_matches(&panel, &cli)?;
    run_test_matching(&panel, &cli)?;

    if let Some(path) = &cli.write_sites {
        let writer = open_writer(path)?;
        pbwt::io::write_sites(panel.sites(), writer)?;
    }

    if let Some(path) = &cli.write {
        let writer = open_writer(path)?;
        pbwt::io::write_panel(&panel, writer)?;
    }

    if let Some(path) = &cli.haps {
        let writer = open_writer(path)?;
        let matrix = HaplotypeMatrix::from_panel(&panel)?;
        matrix.write_haps(writer)?;
    }

    Ok(())
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
