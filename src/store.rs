//! On-disk layout: `<raw>/<source>.html`, `<out>/<source>-tweets.json`,
//! `<out>/<source>-stats.json`.

use core::fmt;
use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::{record::RecordCollection, stats::Stats};

/// The extractor was asked for a source that was never fetched.
#[derive(Debug)]
pub struct SnapshotMissing {
    pub source: String,
    pub path: PathBuf,
}

impl fmt::Display for SnapshotMissing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no snapshot for {} at {}, run fetch first",
            self.source,
            self.path.display()
        )
    }
}

impl core::error::Error for SnapshotMissing {}

pub fn snapshot_path(raw_dir: &Path, source: &str) -> PathBuf {
    raw_dir.join(format!("{source}.html"))
}

pub fn records_path(out_dir: &Path, source: &str) -> PathBuf {
    out_dir.join(format!("{source}-tweets.json"))
}

pub fn stats_path(out_dir: &Path, source: &str) -> PathBuf {
    out_dir.join(format!("{source}-stats.json"))
}

pub fn save_snapshot(raw_dir: &Path, source: &str, markup: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(raw_dir)?;
    let path = snapshot_path(raw_dir, source);
    fs::write(&path, markup.as_bytes())?;
    tracing::debug!(target: "store", "wrote {} bytes to {}", markup.len(), path.display());
    Ok(path)
}

pub fn load_snapshot(raw_dir: &Path, source: &str) -> anyhow::Result<String> {
    let path = snapshot_path(raw_dir, source);
    match fs::read(&path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SnapshotMissing {
            source: source.to_owned(),
            path,
        }
        .into()),
        Err(e) => Err(anyhow::Error::new(e).context(format!("reading {}", path.display()))),
    }
}

/// `None` on the first run for this source.
pub fn load_records(out_dir: &Path, source: &str) -> anyhow::Result<Option<RecordCollection>> {
    let path = records_path(out_dir, source);
    let file = match File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(anyhow::Error::new(e).context(format!("opening {}", path.display()))),
    };
    let reader = BufReader::new(file);
    let records = serde_json::from_reader(reader)
        .map_err(|e| anyhow::anyhow!("malformed record collection {}: {e}", path.display()))?;
    Ok(Some(records))
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value)?;
    writer.flush()?;
    tracing::debug!(target: "store", "wrote {}", path.display());
    Ok(())
}

pub fn save_records(out_dir: &Path, source: &str, records: &RecordCollection) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir)?;
    save_json(&records_path(out_dir, source), records)
}

pub fn save_stats(out_dir: &Path, source: &str, stats: &Stats) -> anyhow::Result<()> {
    fs::create_dir_all(out_dir)?;
    save_json(&stats_path(out_dir, source), stats)
}
