use std::collections::VecDeque;

use serde::Serialize;
use tracing::{debug, info, warn};

use analysis::summarize_set;
use model::{Event, Reading, RepRecord, SetSummary, SummarySource};
use vbt_ingest_core::{
    Channel, Command, ControlOpcode, ControlTransport, DecodeError, Decoder, Inbound, IngestError,
    Payload,
};

use crate::codec::{decoder_for, WireFormat};
use crate::config::SessionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    Calibrating,
    Active,
}

/// An optimistic flip that the device has not confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Pending {
    #[default]
    None,
    /// Calibrate was sent; no reading has reported the calibrating flag yet.
    CalibrationAck,
    /// Stop was sent; the device has not pushed its set summary yet.
    Summary,
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{command:?} is not allowed while {state:?}")]
    IllegalTransition { command: Command, state: LifecycleState },
    #[error("{command:?} is not allowed until the device sends the previous set summary")]
    AwaitingSummary { command: Command },
    #[error("no device connected")]
    NotConnected,
    #[error("control write failed: {0}")]
    Transport(#[from] IngestError),
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Capture state for one device connection.
///
/// Owns the control transport exclusively; `reset` gives it back. A reconnect
/// goes through `connect`, which discards everything from the previous link.
pub struct Session<T: ControlTransport> {
    config: SessionConfig,
    decoder: Box<dyn Decoder>,
    transport: Option<T>,
    state: LifecycleState,
    pending: Pending,
    start_rep_offset: u32,
    buffer: Vec<Reading>,
    latest: Option<Reading>,
    current_rep: u32,
    // newest first
    recent_reps: VecDeque<RepRecord>,
    summary: Option<SetSummary>,
}

impl<T: ControlTransport> Session<T> {
    pub fn new(config: SessionConfig) -> Self {
        let decoder = decoder_for(config.wire_format);
        Self {
            config,
            decoder,
            transport: None,
            state: LifecycleState::Idle,
            pending: Pending::None,
            start_rep_offset: 0,
            buffer: Vec::new(),
            latest: None,
            current_rep: 0,
            recent_reps: VecDeque::new(),
            summary: None,
        }
    }

    /// Starts a fresh session on `transport`, returning the previous link if any.
    pub fn connect(&mut self, transport: T) -> Option<T> {
        let previous = self.reset();
        self.transport = Some(transport);
        info!("device connected");
        previous
    }

    /// Drops all capture state and releases the transport. An unfinished set
    /// is discarded, not summarised.
    pub fn reset(&mut self) -> Option<T> {
        if self.state == LifecycleState::Active {
            info!(buffered = self.buffer.len(), "discarding unfinished set");
        }
        self.state = LifecycleState::Idle;
        self.pending = Pending::None;
        self.start_rep_offset = 0;
        self.buffer.clear();
        self.latest = None;
        self.current_rep = 0;
        self.recent_reps.clear();
        self.summary = None;
        self.transport.take()
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn pending(&self) -> Pending {
        self.pending
    }

    pub fn latest_reading(&self) -> Option<&Reading> {
        self.latest.as_ref()
    }

    pub fn current_rep(&self) -> u32 {
        self.current_rep
    }

    pub fn start_rep_offset(&self) -> u32 {
        self.start_rep_offset
    }

    pub fn recent_reps(&self) -> impl Iterator<Item = &RepRecord> {
        self.recent_reps.iter()
    }

    pub fn current_summary(&self) -> Option<&SetSummary> {
        self.summary.as_ref()
    }

    pub fn buffered(&self) -> &[Reading] {
        &self.buffer
    }

    fn require(&self, command: Command, allowed: LifecycleState) -> Result<(), CommandError> {
        if self.transport.is_none() {
            return Err(CommandError::NotConnected);
        }
        if self.state != allowed {
            debug!(?command, state = ?self.state, "command rejected");
            return Err(CommandError::IllegalTransition { command, state: self.state });
        }
        if self.pending == Pending::Summary {
            debug!(?command, "command rejected, set summary outstanding");
            return Err(CommandError::AwaitingSummary { command });
        }
        Ok(())
    }

    fn send(&mut self, opcode: ControlOpcode) -> Result<(), CommandError> {
        let transport = self.transport.as_mut().ok_or(CommandError::NotConnected)?;
        transport.send_control(opcode).map_err(|e| {
            warn!(?opcode, error = %e, "control write failed");
            CommandError::Transport(e)
        })
    }

    pub fn calibrate(&mut self) -> Result<(), CommandError> {
        self.require(Command::Calibrate, LifecycleState::Idle)?;
        self.send(ControlOpcode::Calibrate)?;
        // raw frames carry no calibrating flag and only stream during a set
        if self.config.wire_format == WireFormat::Binary {
            info!("calibration sent");
            return Ok(());
        }
        self.state = LifecycleState::Calibrating;
        self.pending = Pending::CalibrationAck;
        info!("calibration requested");
        Ok(())
    }

    pub fn start_set(&mut self) -> Result<(), CommandError> {
        self.require(Command::StartSet, LifecycleState::Idle)?;
        self.send(ControlOpcode::StartCapture)?;
        self.start_rep_offset = self.latest.as_ref().map(|r| r.rep_id).unwrap_or(0);
        self.buffer.clear();
        self.current_rep = 0;
        self.recent_reps.clear();
        self.summary = None;
        self.pending = Pending::None;
        self.state = LifecycleState::Active;
        info!(offset = self.start_rep_offset, "set started");
        Ok(())
    }

    pub fn stop_set(&mut self) -> Result<(), CommandError> {
        self.require(Command::StopSet, LifecycleState::Active)?;
        self.send(ControlOpcode::StopCapture)?;
        self.state = LifecycleState::Idle;

        match self.config.summary_source {
            SummarySource::Host => {
                self.summary = summarize_set(&self.buffer, self.start_rep_offset);
                match &self.summary {
                    Some(s) => {
                        for rep in &s.reps {
                            self.recent_reps.push_front(rep.clone());
                        }
                        self.recent_reps.truncate(self.config.recent_rep_capacity);
                        info!(
                            reps = s.total_reps,
                            duration_ms = s.set_duration_ms,
                            mean_velocity = s.mean_velocity_mps,
                            "set complete"
                        );
                    }
                    None => info!("set stopped with no readings"),
                }
            }
            SummarySource::Device => {
                self.pending = Pending::Summary;
                debug!("waiting for device set summary");
            }
        }
        self.buffer.clear();
        Ok(())
    }

    pub fn on_reading(&mut self, r: Reading) {
        if let Some(prev) = &self.latest {
            if r.rep_id < prev.rep_id {
                warn!(prev = prev.rep_id, rep_id = r.rep_id, "rep counter went backwards");
            }
            if r.t_ms < prev.t_ms {
                debug!(prev = prev.t_ms, t_ms = r.t_ms, "out-of-order reading");
            }
        }

        match self.state {
            LifecycleState::Calibrating => match r.calibrating {
                Some(true) => {
                    if self.pending == Pending::CalibrationAck {
                        debug!("calibration acknowledged");
                        self.pending = Pending::None;
                    }
                }
                // sent before the device saw the calibrate opcode
                Some(false) if self.pending == Pending::CalibrationAck => {
                    debug!(t_ms = r.t_ms, "stale reading during calibration");
                }
                _ => {
                    self.state = LifecycleState::Idle;
                    self.pending = Pending::None;
                    info!("calibration finished");
                }
            },
            LifecycleState::Active => {
                self.current_rep = r.rep_id.saturating_sub(self.start_rep_offset);
                self.buffer.push(r.clone());
            }
            LifecycleState::Idle => {}
        }
        self.latest = Some(r);
    }

    pub fn on_event(&mut self, event: Event) {
        if self.config.summary_source != SummarySource::Device {
            warn!("ignoring device event; sets are summarised on the host");
            return;
        }
        match event {
            Event::Rep { record, total_reps } => {
                debug!(rep = record.rep_number, total_reps, "rep event");
                if self.state == LifecycleState::Active {
                    self.current_rep = total_reps;
                }
                self.recent_reps.push_front(record);
                self.recent_reps.truncate(self.config.recent_rep_capacity);
            }
            Event::SetSummary(mut summary) => {
                if summary.reps.is_empty() {
                    let reps = self.reps_in_order();
                    if reps.len() == summary.total_reps as usize {
                        summary.reps = reps;
                    } else {
                        warn!(
                            events = reps.len(),
                            total_reps = summary.total_reps,
                            "rep events do not match device summary"
                        );
                    }
                }
                info!(
                    reps = summary.total_reps,
                    duration_ms = summary.set_duration_ms,
                    from = ?self.state,
                    "device set summary"
                );
                self.summary = Some(summary);
                self.state = LifecycleState::Idle;
                self.pending = Pending::None;
                self.buffer.clear();
            }
        }
    }

    // recent reps oldest first, one record per rep number (latest wins)
    fn reps_in_order(&self) -> Vec<RepRecord> {
        let mut reps: Vec<RepRecord> = Vec::with_capacity(self.recent_reps.len());
        for rep in self.recent_reps.iter().rev() {
            match reps.iter_mut().find(|r| r.rep_number == rep.rep_number) {
                Some(slot) => *slot = rep.clone(),
                None => reps.push(rep.clone()),
            }
        }
        reps.sort_by_key(|r| r.rep_number);
        reps
    }

    /// Decodes one payload and applies it. A failure drops only this payload.
    pub fn on_payload(&mut self, payload: &Payload) -> Result<(), DecodeError> {
        let decoded = match payload.channel {
            Channel::Data => self.decoder.decode_reading(&payload.bytes).map(|r| self.on_reading(r)),
            Channel::Metric => self.decoder.decode_event(&payload.bytes).map(|e| self.on_event(e)),
        };
        if let Err(e) = &decoded {
            debug!(channel = ?payload.channel, len = payload.bytes.len(), error = %e, "dropped payload");
        }
        decoded
    }

    pub fn on_command(&mut self, command: Command) -> Result<(), CommandError> {
        match command {
            Command::Calibrate => self.calibrate(),
            Command::StartSet => self.start_set(),
            Command::StopSet => self.stop_set(),
            Command::Disconnect => {
                self.reset();
                info!("device disconnected");
                Ok(())
            }
        }
    }

    pub fn on_inbound(&mut self, item: Inbound) -> Result<(), SessionError> {
        match item {
            Inbound::Payload(p) => self.on_payload(&p).map_err(SessionError::from),
            Inbound::Command(c) => self.on_command(c).map_err(SessionError::from),
        }
    }
}
