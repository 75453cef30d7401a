//! End-to-end CLI tests driving the `pbwt` binary as a subprocess.

use std::io::Write;
use std::process::Command;

use serial_test::serial;

fn bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_pbwt"))
}

const MACS_FIXTURE: &str = "COMMAND: macs 4 5 -t 0.001\n\
SEED: 12345\n\
SITE: 0 0.0 0.5 0010\n\
SITE: 1 0.2 0.5 0010\n\
SITE: 2 0.4 0.5 0010\n\
SITE: 3 0.6 0.5 0010\n\
SITE: 4 0.8 0.5 0011\n";

fn write_fixture(dir: &std::path::Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    path
}

fn has_pair(stdout: &str, end: u32) -> bool {
    stdout.lines().any(|line| {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != 4 {
            return false;
        }
        let (a, b, _s, e) = (fields[0], fields[1], fields[2], fields[3]);
        let pair_is_0_1 = (a == "0" && b == "1") || (a == "1" && b == "0");
        pair_is_0_1 && e.parse::<u32>().unwrap() == end
    })
}

#[test]
#[serial]
fn macs_ingest_and_long_within_reports_s1_pair() {
    let dir = tempfile::tempdir().unwrap();
    let macs_path = write_fixture(dir.path(), "panel.macs", MACS_FIXTURE);

    let output = bin()
        .arg("--macs")
        .arg(&macs_path)
        .arg("--check")
        .arg("--long-within")
        .arg("5")
        .output()
        .unwrap();

    assert!(output.status.success(), "{:?}", output);
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(has_pair(&stdout, 5), "stdout was: {stdout}");
}

#[test]
#[serial]
fn write_then_read_round_trips_through_cli() {
    let dir = tempfile::tempdir().unwrap();
    let macs_path = write_fixture(dir.path(), "panel.macs", MACS_FIXTURE);
    let panel_path = dir.path().join("panel.pbwt");
    let sites_path = dir.path().join("panel.sites");
    let haps_path = dir.path().join("panel.haps");

    let status = bin()
        .arg("--macs")
        .arg(&macs_path)
        .arg("--write")
        .arg(&panel_path)
        .arg("--write-sites")
        .arg(&sites_path)
        .arg("--haps")
        .arg(&haps_path)
        .status()
        .unwrap();
    assert!(status.success());
    assert!(panel_path.exists());

    let sites = std::fs::read_to_string(&sites_path).unwrap();
    assert_eq!(sites, "0\n1\n2\n3\n4\n");

    let haps = std::fs::read_to_string(&haps_path).unwrap();
    assert_eq!(haps.lines().count(), 5);

    // Re-read the written panel and re-write it; bytes must match (S6).
    let reread_path = dir.path().join("panel2.pbwt");
    let status = bin()
        .arg("--read")
        .arg(&panel_path)
        .arg("--write")
        .arg(&reread_path)
        .status()
        .unwrap();
    assert!(status.success());

    let first = std::fs::read(&panel_path).unwrap();
    let second = std::fs::read(&reread_path).unwrap();
    assert_eq!(first, second);
}

#[test]
#[serial]
fn subsample_and_subsites_flags_shrink_the_panel() {
    let dir = tempfile::tempdir().unwrap();
    let macs_path = write_fixture(dir.path(), "panel.macs", MACS_FIXTURE);
    let haps_path = dir.path().join("sub.haps");

    let status = bin()
        .arg("--macs")
        .arg(&macs_path)
        .arg("--subsample")
        .arg("0")
        .arg("2")
        .arg("--haps")
        .arg(&haps_path)
        .status()
        .unwrap();
    assert!(status.success());

    let haps = std::fs::read_to_string(&haps_path).unwrap();
    for line in haps.lines() {
        assert_eq!(line.len(), 2, "expected 2 haplotypes after --subsample 0 2");
    }
}

#[test]
#[serial]
fn missing_source_flag_is_a_clean_error_exit() {
    let output = bin().arg("--stats").output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Error"));
}
