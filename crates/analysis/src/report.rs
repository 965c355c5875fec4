use model::SetSummary;
use serde_json::{json, Value};

use crate::strength::estimate_strength;

/// Display-ready report for one completed set.
pub fn set_report(summary: &SetSummary, load_kg: Option<f64>) -> Value {
    let reps: Vec<Value> = summary
        .reps
        .iter()
        .map(|r| {
            json!({
                "rep": r.rep_number,
                "duration_ms": r.duration_ms,
                "mean_velocity_mps": r.mean_velocity_mps,
                "peak_velocity_mps": r.peak_velocity_mps,
                "mean_abs_accel_mps2": r.mean_abs_accel_mps2,
            })
        })
        .collect();

    let strength = match load_kg {
        Some(load) => json!(estimate_strength(summary, load)),
        None => Value::Null,
    };

    json!({
        "set_id": summary.id.simple().to_string(),
        "source": summary.source,
        "total_reps": summary.total_reps,
        "set_duration_s": summary.set_duration_ms as f64 / 1000.0,
        "mean_velocity_mps": summary.mean_velocity_mps,
        "peak_velocity_mps": summary.peak_velocity_mps,
        "avg_rep_duration_ms": summary.avg_rep_duration_ms,
        "reps": reps,
        "strength": strength
    })
}
