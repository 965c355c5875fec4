//! Fixed-width little-endian frames: raw six-axis samples on the data channel
//! and tagged rep / set-summary records on the metric channel.
//!
//! ```text
//! data frame (16 bytes)
//!   0  u32  t_ms
//!   4  i16  ax      6  i16  ay      8  i16  az
//!  10  i16  gx     12  i16  gy     14  i16  gz
//!
//! rep event (tag 0xA1, 16 bytes)
//!   1  u8   rep          2  u8  total_reps
//!   4  u32  duration_ms
//!   8  i16  mean_vel_mmps   10  i16 peak_vel_mmps   12  u16 mean_abs_accel_mg
//!
//! set event (tag 0xA2, 16 bytes)
//!   1  u8   total_reps
//!   4  u32  set_duration_ms
//!   8  i16  mean_of_means_mmps   10  i16 best_peak_mmps   12  u16 avg_rep_dur_ms
//! ```

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};
use std::io::Cursor;
use tracing::debug;
use uuid::Uuid;

use model::{ImuAxes, RepRecord, SetSummary, SummarySource, STANDARD_GRAVITY};
use vbt_ingest_core::{DecodeError, Decoder, Event, Reading};

pub const FRAME_LEN: usize = 16;
pub const TAG_REP: u8 = 0xA1;
pub const TAG_SET: u8 = 0xA2;

#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryDecoder;

impl Decoder for BinaryDecoder {
    fn decode_reading(&self, buf: &[u8]) -> Result<Reading, DecodeError> {
        decode_data_frame(buf)
    }

    fn decode_event(&self, buf: &[u8]) -> Result<Event, DecodeError> {
        decode_metric_frame(buf)
    }
}

fn check_len(buf: &[u8]) -> Result<(), DecodeError> {
    if buf.is_empty() {
        return Err(DecodeError::Empty);
    }
    if buf.len() < FRAME_LEN {
        return Err(DecodeError::TooShort { needed: FRAME_LEN, got: buf.len() });
    }
    Ok(())
}

// length is checked up front, so reads inside the first 16 bytes cannot fail
fn short(buf: &[u8]) -> DecodeError {
    DecodeError::TooShort { needed: FRAME_LEN, got: buf.len() }
}

pub fn decode_data_frame(buf: &[u8]) -> Result<Reading, DecodeError> {
    check_len(buf)?;
    let mut c = Cursor::new(buf);
    let t_ms = c.read_u32::<LittleEndian>().map_err(|_| short(buf))?;
    let mut axis = || c.read_i16::<LittleEndian>().map_err(|_| short(buf));
    let axes = ImuAxes {
        ax: axis()?,
        ay: axis()?,
        az: axis()?,
        gx: axis()?,
        gy: axis()?,
        gz: axis()?,
    };
    Ok(Reading {
        t_ms: t_ms as u64,
        vertical_velocity_mps: 0.0,
        vertical_accel_mps2: None,
        rep_id: 0,
        calibrating: None,
        axes: Some(axes),
    })
}

pub fn decode_metric_frame(buf: &[u8]) -> Result<Event, DecodeError> {
    check_len(buf)?;
    let tag = buf[0];
    match tag {
        TAG_REP => {
            let rep = buf[1] as u32;
            let total_reps = buf[2] as u32;
            let mut c = Cursor::new(&buf[4..]);
            let duration_ms = c.read_u32::<LittleEndian>().map_err(|_| short(buf))?;
            let mean_mmps = c.read_i16::<LittleEndian>().map_err(|_| short(buf))?;
            let peak_mmps = c.read_i16::<LittleEndian>().map_err(|_| short(buf))?;
            let accel_mg = c.read_u16::<LittleEndian>().map_err(|_| short(buf))?;
            Ok(Event::Rep {
                record: RepRecord {
                    rep_number: rep,
                    duration_ms: duration_ms as u64,
                    mean_velocity_mps: mmps_to_mps(mean_mmps),
                    peak_velocity_mps: mmps_to_mps(peak_mmps),
                    mean_abs_accel_mps2: Some(mg_to_mps2(accel_mg)),
                },
                total_reps,
            })
        }
        TAG_SET => {
            let total_reps = buf[1] as u32;
            let mut c = Cursor::new(&buf[4..]);
            let set_duration_ms = c.read_u32::<LittleEndian>().map_err(|_| short(buf))?;
            let mean_mmps = c.read_i16::<LittleEndian>().map_err(|_| short(buf))?;
            let peak_mmps = c.read_i16::<LittleEndian>().map_err(|_| short(buf))?;
            let avg_rep_ms = c.read_u16::<LittleEndian>().map_err(|_| short(buf))?;
            Ok(Event::SetSummary(SetSummary {
                id: Uuid::new_v4(),
                source: SummarySource::Device,
                total_reps,
                set_duration_ms: set_duration_ms as u64,
                mean_velocity_mps: mmps_to_mps(mean_mmps),
                peak_velocity_mps: mmps_to_mps(peak_mmps),
                avg_rep_duration_ms: Some(avg_rep_ms as f64),
                reps: Vec::new(),
            }))
        }
        other => {
            debug!(tag = other, "unknown metric frame tag");
            Err(DecodeError::UnknownTag(other))
        }
    }
}

fn mmps_to_mps(v: i16) -> f64 {
    v as f64 / 1000.0
}

fn mg_to_mps2(v: u16) -> f64 {
    v as f64 / 1000.0 * STANDARD_GRAVITY
}

fn mps_to_mmps(v: f64) -> i16 {
    (v * 1000.0).round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

fn mps2_to_mg(v: f64) -> u16 {
    (v / STANDARD_GRAVITY * 1000.0).round().clamp(0.0, u16::MAX as f64) as u16
}

pub fn encode_data_frame(t_ms: u32, axes: &ImuAxes) -> Bytes {
    let mut b = BytesMut::with_capacity(FRAME_LEN);
    b.put_u32_le(t_ms);
    for v in [axes.ax, axes.ay, axes.az, axes.gx, axes.gy, axes.gz] {
        b.put_i16_le(v);
    }
    b.freeze()
}

pub fn encode_rep_event(record: &RepRecord, total_reps: u32) -> Bytes {
    let mut b = BytesMut::with_capacity(FRAME_LEN);
    b.put_u8(TAG_REP);
    b.put_u8(record.rep_number.min(u8::MAX as u32) as u8);
    b.put_u8(total_reps.min(u8::MAX as u32) as u8);
    b.put_u8(0);
    b.put_u32_le(record.duration_ms.min(u32::MAX as u64) as u32);
    b.put_i16_le(mps_to_mmps(record.mean_velocity_mps));
    b.put_i16_le(mps_to_mmps(record.peak_velocity_mps));
    b.put_u16_le(record.mean_abs_accel_mps2.map(mps2_to_mg).unwrap_or(0));
    b.put_u16_le(0);
    b.freeze()
}

pub fn encode_set_event(summary: &SetSummary) -> Bytes {
    let mut b = BytesMut::with_capacity(FRAME_LEN);
    b.put_u8(TAG_SET);
    b.put_u8(summary.total_reps.min(u8::MAX as u32) as u8);
    b.put_u16_le(0);
    b.put_u32_le(summary.set_duration_ms.min(u32::MAX as u64) as u32);
    b.put_i16_le(mps_to_mmps(summary.mean_velocity_mps));
    b.put_i16_le(mps_to_mmps(summary.peak_velocity_mps));
    let avg = summary.avg_rep_duration_ms.unwrap_or(0.0).round().clamp(0.0, u16::MAX as f64);
    b.put_u16_le(avg as u16);
    b.put_u16_le(0);
    b.freeze()
}
