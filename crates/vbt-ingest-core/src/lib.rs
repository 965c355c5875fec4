//! Collaborator-facing types and traits shared by the VBT decoders and session

use bytes::Bytes;
use serde::{Serialize, Deserialize};
use std::time::Duration;

pub use model::{Event, Reading};

/// Notification channel a payload arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    /// Per-sample readings.
    Data,
    /// Rep and set-summary events.
    Metric,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payload {
    pub channel: Channel,
    pub bytes: Bytes,
}

impl Payload {
    pub fn data(bytes: impl Into<Bytes>) -> Self {
        Self { channel: Channel::Data, bytes: bytes.into() }
    }

    pub fn metric(bytes: impl Into<Bytes>) -> Self {
        Self { channel: Channel::Metric, bytes: bytes.into() }
    }
}

/// User intents relayed by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Calibrate,
    StartSet,
    StopSet,
    Disconnect,
}

/// Everything the core consumes, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inbound {
    Payload(Payload),
    Command(Command),
}

/// Outbound control bytes written to the sensor's control characteristic.
///
/// Calibration has its own opcode; older firmware overloaded `0x01` for both
/// calibration and start of capture.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlOpcode {
    StartCapture = 0x01,
    StopCapture = 0x02,
    Calibrate = 0x03,
}

impl ControlOpcode {
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,
    #[error("frame too short: need {needed} bytes, got {got}")]
    TooShort { needed: usize, got: usize },
    #[error("unknown frame tag 0x{0:02X}")]
    UnknownTag(u8),
    #[error("payload is not valid ASCII text")]
    NotText,
    #[error("expected {expected} fields, got {got}")]
    FieldCount { expected: &'static str, got: usize },
    #[error("field {index} is not numeric: {value:?}")]
    InvalidField { index: usize, value: String },
    #[error("{0} frames carry no events")]
    Unsupported(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("{0}")]
    Msg(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A wire-format strategy. Implementations never panic on arbitrary input.
pub trait Decoder: Send + Sync {
    fn decode_reading(&self, buf: &[u8]) -> Result<Reading, DecodeError>;
    fn decode_event(&self, buf: &[u8]) -> Result<Event, DecodeError>;
}

/// Outbound half of the device link, owned by exactly one session at a time.
pub trait ControlTransport: Send {
    fn send_control(&mut self, opcode: ControlOpcode) -> Result<(), IngestError>;
}

pub type InboundTx = crossbeam_channel::Sender<Inbound>;
pub type InboundRx = crossbeam_channel::Receiver<Inbound>;

/// Trait for anything that produces inbound items (live link or recording)
#[async_trait::async_trait]
pub trait PayloadSource: Send + Sync {
    async fn run(&self, tx: InboundTx) -> Result<(), IngestError>;
}

pub fn channel() -> (InboundTx, InboundRx) {
    crossbeam_channel::unbounded()
}

/// Replays recorded inbound items, optionally paced between payloads.
pub struct ReplaySource {
    items: Vec<Inbound>,
    pace: Option<Duration>,
}

impl ReplaySource {
    pub fn new(items: Vec<Inbound>) -> Self { Self { items, pace: None } }

    pub fn paced(mut self, pace: Duration) -> Self {
        self.pace = Some(pace);
        self
    }
}

#[async_trait::async_trait]
impl PayloadSource for ReplaySource {
    async fn run(&self, tx: InboundTx) -> Result<(), IngestError> {
        for item in &self.items {
            let is_payload = matches!(item, Inbound::Payload(_));
            tx.send(item.clone())
                .map_err(|_| IngestError::Msg("inbound receiver dropped".into()))?;
            if let (true, Some(pace)) = (is_payload, self.pace) {
                tokio::time::sleep(pace).await;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcodes_are_distinct_bytes() {
        assert_eq!(ControlOpcode::StartCapture.as_byte(), 0x01);
        assert_eq!(ControlOpcode::StopCapture.as_byte(), 0x02);
        assert_eq!(ControlOpcode::Calibrate.as_byte(), 0x03);
    }

    #[test]
    fn inbound_json_shape() {
        let cmd: Inbound = serde_json::from_str(r#"{"command":"start_set"}"#).unwrap();
        assert_eq!(cmd, Inbound::Command(Command::StartSet));

        let p: Inbound =
            serde_json::from_str(r#"{"payload":{"channel":"metric","bytes":[161,1]}}"#).unwrap();
        assert_eq!(p, Inbound::Payload(Payload::metric(vec![0xA1u8, 0x01])));
    }

    #[tokio::test]
    async fn replay_source_preserves_order() {
        let items = vec![
            Inbound::Command(Command::StartSet),
            Inbound::Payload(Payload::data(&b"0,0.0,0.1,1"[..])),
            Inbound::Command(Command::StopSet),
        ];
        let (tx, rx) = channel();
        ReplaySource::new(items.clone())
            .paced(Duration::from_millis(1))
            .run(tx)
            .await
            .unwrap();
        let got: Vec<Inbound> = rx.try_iter().collect();
        assert_eq!(got, items);
    }

    #[tokio::test]
    async fn replay_source_reports_dropped_receiver() {
        let (tx, rx) = channel();
        drop(rx);
        let src = ReplaySource::new(vec![Inbound::Command(Command::Calibrate)]);
        assert!(matches!(src.run(tx).await, Err(IngestError::Msg(_))));
    }
}
