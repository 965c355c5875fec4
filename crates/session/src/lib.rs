//! Set capture state machine for a wearable barbell sensor.
//!
//! The session is fed raw payloads and user commands strictly in arrival
//! order. Readings are buffered while a set is active; on stop the buffer is
//! segmented into reps and reduced to a [`SetSummary`](model::SetSummary), or
//! the device's own summary is awaited, depending on
//! [`SessionConfig::summary_source`].

pub mod codec;
pub mod config;
pub mod machine;

pub use codec::{decoder_for, SniffingDecoder, WireFormat};
pub use config::SessionConfig;
pub use machine::{CommandError, LifecycleState, Pending, Session, SessionError};
