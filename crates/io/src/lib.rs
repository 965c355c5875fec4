use anyhow::{Context, Result};
use std::{fs::File, io::{BufRead, BufReader, BufWriter, Write}, path::Path};
use serde::{Serialize, Deserialize};
use model::*;
use vbt_ingest_core::{Inbound, Payload};

/// Reads a capture: one inbound item (payload or command) per line.
pub fn import_capture_ndjson(path: &Path) -> Result<Vec<Inbound>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = BufReader::new(f);
    let mut items = vec![];
    for (n, line) in rdr.lines().enumerate() {
        let s = line?;
        if s.trim().is_empty() { continue; }
        let item: Inbound = serde_json::from_str(&s)
            .with_context(|| format!("{}:{}", path.display(), n + 1))?;
        items.push(item);
    }
    Ok(items)
}

pub fn export_capture_ndjson(items: &[Inbound], path: &Path) -> Result<()> {
    let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut w = BufWriter::new(f);
    for item in items {
        let s = serde_json::to_string(item)?;
        writeln!(w, "{}", s)?;
    }
    w.flush()?;
    Ok(())
}

/// Reads a firmware serial log as data-channel payloads. The CSV header and
/// any status lines (anything not starting with a digit) are skipped.
pub fn import_serial_log(path: &Path) -> Result<Vec<Inbound>> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let rdr = BufReader::new(f);
    let mut items = vec![];
    for line in rdr.lines() {
        let s = line?;
        let s = s.trim();
        if !s.starts_with(|c: char| c.is_ascii_digit()) { continue; }
        items.push(Inbound::Payload(Payload::data(s.as_bytes().to_vec())));
    }
    Ok(items)
}

pub fn export_reps_csv(summary: &SetSummary, path: &Path) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    for r in &summary.reps {
        w.serialize(RepRow {
            set_id: summary.id.simple().to_string(),
            rep: r.rep_number,
            duration_ms: r.duration_ms,
            mean_velocity_mps: r.mean_velocity_mps,
            peak_velocity_mps: r.peak_velocity_mps,
            mean_abs_accel_mps2: r.mean_abs_accel_mps2,
        })?;
    }
    w.flush()?;
    Ok(())
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct RepRow {
    set_id: String,
    rep: u32,
    duration_ms: u64,
    mean_velocity_mps: f64,
    peak_velocity_mps: f64,
    mean_abs_accel_mps2: Option<f64>,
}
