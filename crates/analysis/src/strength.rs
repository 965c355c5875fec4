//! Velocity-loss RIR and 1RM estimates. All functions are total: invalid
//! inputs give `0` or `None`, never a panic.

use model::{SetSummary, StrengthEstimate};

/// (upper bound of velocity loss %, reps in reserve)
const RIR_STEPS: [(f64, u8); 5] = [(5.0, 5), (10.0, 4), (15.0, 3), (20.0, 2), (30.0, 1)];

/// Drop from the best to the last per-rep velocity, in percent.
pub fn velocity_loss_pct(rep_velocities: &[f64]) -> Option<f64> {
    if rep_velocities.len() < 2 {
        return None;
    }
    let best = rep_velocities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let last = *rep_velocities.last()?;
    if best.is_nan() || best <= 0.0 || !last.is_finite() {
        return None;
    }
    Some((best - last) / best * 100.0)
}

pub fn estimate_rir(velocity_loss_pct: f64) -> u8 {
    if velocity_loss_pct.is_nan() {
        return 0;
    }
    let pct = velocity_loss_pct.clamp(0.0, 100.0);
    RIR_STEPS
        .iter()
        .find(|(bound, _)| pct < *bound)
        .map(|(_, rir)| *rir)
        .unwrap_or(0)
}

pub fn epley_1rm(load_kg: f64, reps: u32) -> f64 {
    if load_kg.is_nan() || load_kg <= 0.0 || reps == 0 {
        return 0.0;
    }
    load_kg * (1.0 + reps as f64 / 30.0)
}

pub fn brzycki_1rm(load_kg: f64, reps: u32) -> f64 {
    if load_kg.is_nan() || load_kg <= 0.0 || reps == 0 {
        return 0.0;
    }
    let denom = 37.0 - reps as f64;
    if denom <= 0.0 {
        return 0.0;
    }
    load_kg * 36.0 / denom
}

/// Lowest of the formula outputs that produced a value.
pub fn conservative_1rm(estimates: &[f64]) -> Option<f64> {
    estimates
        .iter()
        .copied()
        .filter(|v| *v > 0.0)
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
}

/// RIR is counted as extra reps toward failure. A set with fewer than two
/// reps has no measurable velocity loss and is scored with zero RIR.
pub fn estimate_strength(summary: &SetSummary, load_kg: f64) -> StrengthEstimate {
    let loss = velocity_loss_pct(&summary.rep_mean_velocities());
    let rir = loss.map(estimate_rir);
    let rir_used = rir.unwrap_or(0);
    let reps_for_estimate = summary.total_reps + rir_used as u32;

    let epley = epley_1rm(load_kg, reps_for_estimate);
    let brzycki = brzycki_1rm(load_kg, reps_for_estimate);

    StrengthEstimate {
        load_kg,
        total_reps: summary.total_reps,
        velocity_loss_pct: loss,
        rir_estimate: rir,
        rir_used,
        reps_for_estimate,
        epley_1rm: epley,
        brzycki_1rm: brzycki,
        conservative_1rm: conservative_1rm(&[epley, brzycki]),
    }
}

/// Parses the persisted load setting ("100", "82.5", "82,5").
pub fn parse_load_kg(s: &str) -> Option<f64> {
    let v: f64 = s.trim().replace(',', ".").parse().ok()?;
    (v.is_finite() && v > 0.0).then_some(v)
}
