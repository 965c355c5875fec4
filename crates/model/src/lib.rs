use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const STANDARD_GRAVITY: f64 = 9.80665;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
pub struct ImuAxes {
    pub ax: i16,
    pub ay: i16,
    pub az: i16,
    pub gx: i16,
    pub gy: i16,
    pub gz: i16,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Reading {
    pub t_ms: u64,
    // positive = concentric (bar moving up)
    pub vertical_velocity_mps: f64,
    #[serde(default)]
    pub vertical_accel_mps2: Option<f64>,
    // 0 = no rep yet
    pub rep_id: u32,
    /// `None` when the wire format has no calibration flag.
    #[serde(default)]
    pub calibrating: Option<bool>,
    #[serde(default)]
    pub axes: Option<ImuAxes>,
}

impl Reading {
    pub fn is_calibrating(&self) -> bool {
        self.calibrating.unwrap_or(false)
    }

    pub fn is_concentric(&self) -> bool {
        self.vertical_velocity_mps > 0.0
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct RepRecord {
    // 1-based within the set
    pub rep_number: u32,
    pub duration_ms: u64,
    pub mean_velocity_mps: f64,
    pub peak_velocity_mps: f64,
    #[serde(default)]
    pub mean_abs_accel_mps2: Option<f64>,
}

/// Where a set summary was computed.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    /// Segmented and aggregated from buffered readings on the host.
    #[default]
    Host,
    /// Relayed from the sensor over the metric channel.
    Device,
}

impl std::str::FromStr for SummarySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "host" => Ok(Self::Host),
            "device" => Ok(Self::Device),
            other => Err(format!("unknown summary source {other:?} (host, device)")),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct SetSummary {
    #[serde(with = "uuid::serde::simple")]
    pub id: Uuid,
    pub source: SummarySource,
    pub total_reps: u32,
    pub set_duration_ms: u64,
    // mean of per-rep means
    pub mean_velocity_mps: f64,
    // max of per-rep peaks
    pub peak_velocity_mps: f64,
    #[serde(default)]
    pub avg_rep_duration_ms: Option<f64>,
    #[serde(default)]
    pub reps: Vec<RepRecord>,
}

impl SetSummary {
    pub fn rep_mean_velocities(&self) -> Vec<f64> {
        self.reps.iter().map(|r| r.mean_velocity_mps).collect()
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Rep { record: RepRecord, total_reps: u32 },
    SetSummary(SetSummary),
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct StrengthEstimate {
    pub load_kg: f64,
    pub total_reps: u32,
    pub velocity_loss_pct: Option<f64>,
    pub rir_estimate: Option<u8>,
    pub rir_used: u8,
    pub reps_for_estimate: u32,
    pub epley_1rm: f64,
    pub brzycki_1rm: f64,
    pub conservative_1rm: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calibrating_defaults_to_false() {
        let r = Reading { t_ms: 10, rep_id: 1, ..Reading::default() };
        assert!(!r.is_calibrating());
        let r = Reading { calibrating: Some(true), ..r };
        assert!(r.is_calibrating());
    }

    #[test]
    fn zero_velocity_is_not_concentric() {
        let r = Reading { vertical_velocity_mps: 0.0, ..Reading::default() };
        assert!(!r.is_concentric());
        let r = Reading { vertical_velocity_mps: 0.01, ..r };
        assert!(r.is_concentric());
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let ev = Event::Rep {
            record: RepRecord {
                rep_number: 2,
                duration_ms: 640,
                mean_velocity_mps: 0.45,
                peak_velocity_mps: 0.71,
                mean_abs_accel_mps2: None,
            },
            total_reps: 2,
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "rep");
        assert_eq!(v["total_reps"], 2);
        let back: Event = serde_json::from_value(v).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn summary_reading_without_optional_fields() {
        let json = r#"{"t_ms":5,"vertical_velocity_mps":0.2,"rep_id":3}"#;
        let r: Reading = serde_json::from_str(json).unwrap();
        assert_eq!(r.rep_id, 3);
        assert_eq!(r.calibrating, None);
        assert_eq!(r.axes, None);
    }
}
