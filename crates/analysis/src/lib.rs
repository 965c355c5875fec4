//! Set analysis: rep segmentation, per-rep and per-set aggregation and
//! strength estimation.

pub mod aggregate;
pub mod report;
pub mod segmentation;
pub mod strength;

pub use aggregate::{rep_record, summarize_set};
pub use report::set_report;
pub use segmentation::{segment_reps, RepWindow};
pub use strength::{
    brzycki_1rm, conservative_1rm, epley_1rm, estimate_rir, estimate_strength, parse_load_kg,
    velocity_loss_pct,
};
