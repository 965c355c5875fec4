use model::{Reading, RepRecord, SetSummary, SummarySource};
use uuid::Uuid;

use crate::segmentation::{segment_reps, RepWindow};

pub fn rep_record(w: &RepWindow<'_>) -> RepRecord {
    let n = w.samples.len().max(1) as f64;
    let mean = w.samples.iter().map(|r| r.vertical_velocity_mps).sum::<f64>() / n;
    let peak = w
        .samples
        .iter()
        .map(|r| r.vertical_velocity_mps)
        .fold(f64::NEG_INFINITY, f64::max);

    let first = w.samples.first().map(|r| r.t_ms).unwrap_or(0);
    let last = w.samples.last().map(|r| r.t_ms).unwrap_or(first);

    let accels: Vec<f64> = w
        .samples
        .iter()
        .filter_map(|r| r.vertical_accel_mps2)
        .map(f64::abs)
        .collect();
    let mean_abs_accel = if accels.is_empty() {
        None
    } else {
        Some(accels.iter().sum::<f64>() / accels.len() as f64)
    };

    RepRecord {
        rep_number: w.rep_number,
        duration_ms: last.saturating_sub(first),
        mean_velocity_mps: mean,
        peak_velocity_mps: if peak.is_finite() { peak } else { 0.0 },
        mean_abs_accel_mps2: mean_abs_accel,
    }
}

/// Reduces a set buffer to a summary. An empty buffer means no set at all.
///
/// Each rep weighs the same in the set mean regardless of how many samples it
/// produced, and the set duration spans the whole buffer, eccentric phases and
/// pauses included.
pub fn summarize_set(buffer: &[Reading], start_rep_offset: u32) -> Option<SetSummary> {
    let first = buffer.first()?;
    let last = buffer.last()?;

    let reps: Vec<RepRecord> = segment_reps(buffer, start_rep_offset)
        .iter()
        .map(rep_record)
        .collect();

    let (mean, peak, avg_dur) = if reps.is_empty() {
        (0.0, 0.0, None)
    } else {
        let n = reps.len() as f64;
        let mean = reps.iter().map(|r| r.mean_velocity_mps).sum::<f64>() / n;
        let peak = reps.iter().map(|r| r.peak_velocity_mps).fold(f64::NEG_INFINITY, f64::max);
        let avg_dur = reps.iter().map(|r| r.duration_ms as f64).sum::<f64>() / n;
        (mean, peak, Some(avg_dur))
    };

    Some(SetSummary {
        id: Uuid::new_v4(),
        source: SummarySource::Host,
        total_reps: reps.len() as u32,
        set_duration_ms: last.t_ms.saturating_sub(first.t_ms),
        mean_velocity_mps: mean,
        peak_velocity_mps: peak,
        avg_rep_duration_ms: avg_dur,
        reps,
    })
}
