//! Binary panel framing, sites file I/O, and checkpoint rotation.
//!
//! Integer fields are written little-endian, a deliberate deviation
//! from host byte order so a panel written on one machine reads back
//! identically on another.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use crate::config::Options;
use crate::error::{PbwtError, Result};
use crate::panel::{Panel, SiteRecord};

const TAG_CURRENT: &[u8; 4] = b"PBWT";
const TAG_LEGACY: &[u8; 4] = b"GBWT";
const HEADER_LEN: usize = 16;

/// Write the binary panel frame: 4-byte tag, `M`, `N`, stream length as
/// little-endian `u32`, then the raw codec stream.
pub fn write_panel<W: Write>(panel: &Panel, mut w: W) -> Result<()> {
    let m = u32::try_from(panel.m())
        .map_err(|_| PbwtError::shape("write_panel", "M exceeds u32 range"))?;
    let n = u32::try_from(panel.n())
        .map_err(|_| PbwtError::shape("write_panel", "N exceeds u32 range"))?;
    let stream = panel.stream();
    let len = u32::try_from(stream.len())
        .map_err(|_| PbwtError::shape("write_panel", "stream length exceeds u32 range"))?;

    w.write_all(TAG_CURRENT)?;
    w.write_all(&m.to_le_bytes())?;
    w.write_all(&n.to_le_bytes())?;
    w.write_all(&len.to_le_bytes())?;
    w.write_all(stream)?;
    Ok(())
}

/// Read a binary panel frame, re-deriving `(a, d)` by replaying the
/// decoded columns through a fresh panel rather than trusting stored
/// sort state (none is stored).
pub fn read_panel<R: Read>(mut r: R) -> Result<Panel> {
    let mut buf = Vec::new();
    r.read_to_end(&mut buf)?;
    read_panel_from_bytes(&buf)
}

/// Read a binary panel frame directly out of a memory-mapped file,
/// avoiding a full-file copy into a heap buffer for large panels. The
/// mapping is dropped once decoding finishes; the returned `Panel` owns
/// its own storage.
pub fn read_panel_mmap(path: &Path) -> Result<Panel> {
    let file = File::open(path)?;
    // Safety: the file is not expected to be mutated by another process
    // while this read is in progress; `memmap2::Mmap::map` is unsafe
    // because the crate cannot enforce that.
    let mmap = unsafe { memmap2::Mmap::map(&file)? };
    read_panel_from_bytes(&mmap)
}

fn read_panel_from_bytes(bytes: &[u8]) -> Result<Panel> {
    if bytes.len() < HEADER_LEN {
        return Err(PbwtError::format("read_panel", "truncated before header"));
    }
    let (header, rest) = bytes.split_at(HEADER_LEN);

    let tag = &header[0..4];
    if tag != TAG_CURRENT && tag != TAG_LEGACY {
        return Err(PbwtError::format(
            "read_panel",
            format!("unrecognized tag {:?}", String::from_utf8_lossy(tag)),
        ));
    }
    let m = u32::from_le_bytes(header[4..8].try_into().unwrap()) as usize;
    let n = u32::from_le_bytes(header[8..12].try_into().unwrap()) as usize;
    let stream_len = u32::from_le_bytes(header[12..16].try_into().unwrap()) as usize;

    if rest.len() < stream_len {
        return Err(PbwtError::format(
            "read_panel",
            "truncated before end of stream",
        ));
    }
    let stream = &rest[..stream_len];

    let mut panel = Panel::new(m)?;
    let opts = Options::new();
    let mut pos = 0usize;
    let mut col = vec![0u8; m];
    for _ in 0..n {
        let (read, _ones) = crate::codec::decode(&stream[pos..], m, &mut col);
        pos += read;
        panel.append_column(&col, None, &opts)?;
    }
    if pos != stream.len() {
        return Err(PbwtError::format(
            "read_panel",
            format!("{} trailing stream bytes after N columns", stream.len() - pos),
        ));
    }
    Ok(panel)
}

/// Write one decimal `x` per line, `N` lines total.
pub fn write_sites<W: Write>(sites: &[SiteRecord], mut w: W) -> Result<()> {
    let mut buf = itoa::Buffer::new();
    for site in sites {
        w.write_all(buf.format(site.x).as_bytes())?;
        w.write_all(b"\n")?;
    }
    Ok(())
}

/// Read a sites file and pair each line's `x` with `f` recovered from
/// `panel`'s own records (the sites file carries no frequency column).
/// Returns `Ok(None)` rather than an error when the line count doesn't
/// match `expected_n`, per the shape-mismatch policy: the caller keeps
/// the panel and drops only the companion data.
pub fn read_sites<R: Read>(r: R, expected_n: usize) -> Result<Option<Vec<i64>>> {
    let reader = BufReader::new(r);
    let mut xs = Vec::with_capacity(expected_n);
    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let x: i64 = trimmed
            .parse()
            .map_err(|_| PbwtError::format("read_sites", format!("not an integer: {trimmed:?}")))?;
        xs.push(x);
    }
    if xs.len() != expected_n {
        eprintln!(
            "sites file has {} lines, expected {expected_n}; dropping site metadata",
            xs.len()
        );
        return Ok(None);
    }
    Ok(Some(xs))
}

/// Rotates panel+sites snapshots between `<stem>_A.{pbwt,sites}` and
/// `<stem>_B.{pbwt,sites}`, writing each half through a `NamedTempFile`
/// in the target directory and persisting only after a full write
/// succeeds, so a crash mid-write leaves the other slot's prior
/// snapshot intact.
pub struct CheckpointWriter {
    dir: PathBuf,
    stem: String,
    next_is_a: bool,
}

impl CheckpointWriter {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
            next_is_a: true,
        }
    }

    fn slot_paths(&self, slot: char) -> (PathBuf, PathBuf) {
        (
            self.dir.join(format!("{}_{}.pbwt", self.stem, slot)),
            self.dir.join(format!("{}_{}.sites", self.stem, slot)),
        )
    }

    /// Write `panel` into the next slot in rotation, atomically.
    pub fn write(&mut self, panel: &Panel) -> Result<()> {
        let slot = if self.next_is_a { 'A' } else { 'B' };
        let (pbwt_path, sites_path) = self.slot_paths(slot);
        self.next_is_a = !self.next_is_a;

        atomic_write(&self.dir, &pbwt_path, |w| write_panel(panel, w))?;
        atomic_write(&self.dir, &sites_path, |w| write_sites(panel.sites(), w))?;
        Ok(())
    }
}

fn atomic_write<F>(dir: &Path, target: &Path, body: F) -> Result<()>
where
    F: FnOnce(&mut File) -> Result<()>,
{
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    body(tmp.as_file_mut())?;
    tmp.as_file_mut().flush()?;
    tmp.persist(target)
        .map_err(|e| PbwtError::Io(e.error))?;
    Ok(())
}

/// `"-"` is the conventional stdin/stdout path; anything else is a real
/// file path.
pub fn is_stdio_path(path: &Path) -> bool {
    path.to_string_lossy() == "-"
}

pub fn open_reader(path: &Path) -> Result<Box<dyn Read>> {
    if is_stdio_path(path) {
        Ok(Box::new(io::stdin()))
    } else {
        Ok(Box::new(File::open(path)?))
    }
}

pub fn open_writer(path: &Path) -> Result<Box<dyn Write>> {
    if is_stdio_path(path) {
        Ok(Box::new(io::stdout()))
    } else {
        Ok(Box::new(File::create(path)?))
    }
}
