use serde::{Deserialize, Serialize};

use model::SummarySource;

use crate::codec::WireFormat;

pub const DEFAULT_RECENT_REP_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub wire_format: WireFormat,
    /// Which side closes out a set. Events from the other side are ignored.
    pub summary_source: SummarySource,
    pub recent_rep_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            wire_format: WireFormat::Auto,
            summary_source: SummarySource::Host,
            recent_rep_capacity: DEFAULT_RECENT_REP_CAPACITY,
        }
    }
}

impl SessionConfig {
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Relay firmware: raw binary samples, device-computed sets.
    pub fn relay() -> Self {
        Self {
            wire_format: WireFormat::Binary,
            summary_source: SummarySource::Device,
            ..Self::default()
        }
    }

    /// Streaming firmware: velocity CSV frames, sets closed on the host.
    pub fn streaming() -> Self {
        Self {
            wire_format: WireFormat::Text,
            summary_source: SummarySource::Host,
            ..Self::default()
        }
    }
}
