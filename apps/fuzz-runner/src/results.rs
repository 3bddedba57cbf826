//! `summary.json` and `anomalies.jsonl` on disk.

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use fuzz_engine::{AnomalyRecord, Summary};
use serde::Serialize;
use tracing::warn;

pub const SUMMARY_FILE: &str = "summary.json";
pub const ANOMALIES_FILE: &str = "anomalies.jsonl";

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let data = serde_json::to_vec_pretty(value)?;
    fs::write(path, data).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

pub fn write_summary(path: &Path, summary: &Summary) -> Result<()> {
    write_json(path, summary)
}

pub fn read_summary(path: &Path) -> Result<Summary> {
    let text = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("parse {:?}", path))
}

/// One JSON object per line.
pub fn write_anomalies(path: &Path, records: &[AnomalyRecord]) -> Result<()> {
    ensure_parent(path)?;
    let file = fs::File::create(path).with_context(|| format!("create {:?}", path))?;
    let mut w = BufWriter::new(file);
    for rec in records {
        serde_json::to_writer(&mut w, rec)?;
        w.write_all(b"\n")?;
    }
    w.flush().with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Missing file reads as empty. Blank lines are skipped; malformed lines are
/// logged and skipped.
pub fn load_anomalies(path: &Path) -> Result<Vec<AnomalyRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let text = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    let mut out = Vec::new();
    for (i, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str(line) {
            Ok(rec) => out.push(rec),
            Err(e) => warn!(line = i + 1, error = %e, "skipping malformed anomaly line"),
        }
    }
    Ok(out)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;
        }
    }
    Ok(())
}
