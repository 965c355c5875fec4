//! Comma-delimited ASCII reading frames.
//!
//! Two row shapes are accepted on the data channel:
//! * velocity frame `t_ms,aZ_filt,vZ,rep_id[,calib_flag]` (flag defaults to 0)
//! * firmware serial-log row `rep_id,t_ms,ax,ay,az,gx,gy,gz,aZ_filt,vZ`
//!
//! Velocity is integrated on the sensor, so `vZ` is taken as-is.

use tracing::trace;

use vbt_ingest_core::{DecodeError, Decoder, Event, Reading};

const VELOCITY_FIELDS_MIN: usize = 4;
const VELOCITY_FIELDS_MAX: usize = 5;
const SERIAL_LOG_FIELDS: usize = 10;

#[derive(Clone, Copy, Debug, Default)]
pub struct TextDecoder;

impl Decoder for TextDecoder {
    fn decode_reading(&self, buf: &[u8]) -> Result<Reading, DecodeError> {
        decode_line(buf)
    }

    fn decode_event(&self, _buf: &[u8]) -> Result<Event, DecodeError> {
        Err(DecodeError::Unsupported("text"))
    }
}

pub fn decode_line(buf: &[u8]) -> Result<Reading, DecodeError> {
    if !buf.is_ascii() {
        return Err(DecodeError::NotText);
    }
    // ASCII was checked, so this cannot fail
    let line = std::str::from_utf8(buf).map_err(|_| DecodeError::NotText)?.trim();
    if line.is_empty() {
        return Err(DecodeError::Empty);
    }

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    match fields.len() {
        VELOCITY_FIELDS_MIN..=VELOCITY_FIELDS_MAX => velocity_frame(&fields),
        SERIAL_LOG_FIELDS => serial_log_row(&fields),
        got => Err(DecodeError::FieldCount { expected: "4, 5 or 10", got }),
    }
}

fn velocity_frame(fields: &[&str]) -> Result<Reading, DecodeError> {
    let t_ms = parse_count(fields, 0)?;
    let accel = parse_real(fields, 1)?;
    let velocity = parse_real(fields, 2)?;
    let rep_id = parse_rep_id(fields, 3)?;
    let calibrating = match fields.get(4) {
        None => false,
        Some(&"0") => false,
        Some(&"1") => true,
        Some(other) => {
            return Err(DecodeError::InvalidField { index: 4, value: other.to_string() })
        }
    };
    trace!(t_ms, rep_id, calibrating, "velocity frame");
    Ok(Reading {
        t_ms,
        vertical_velocity_mps: velocity,
        vertical_accel_mps2: Some(accel),
        rep_id,
        calibrating: Some(calibrating),
        axes: None,
    })
}

fn serial_log_row(fields: &[&str]) -> Result<Reading, DecodeError> {
    let rep_id = parse_rep_id(fields, 0)?;
    let t_ms = parse_count(fields, 1)?;
    // raw axes (m/s^2, rad/s) must still be numeric
    for index in 2..8 {
        parse_real(fields, index)?;
    }
    let accel = parse_real(fields, 8)?;
    let velocity = parse_real(fields, 9)?;
    Ok(Reading {
        t_ms,
        vertical_velocity_mps: velocity,
        vertical_accel_mps2: Some(accel),
        rep_id,
        calibrating: None,
        axes: None,
    })
}

fn invalid(fields: &[&str], index: usize) -> DecodeError {
    DecodeError::InvalidField {
        index,
        value: fields.get(index).map(|s| s.to_string()).unwrap_or_default(),
    }
}

fn parse_real(fields: &[&str], index: usize) -> Result<f64, DecodeError> {
    fields
        .get(index)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(fields, index))
}

// integer counters; a trailing ".0" from float printing is tolerated
fn parse_count(fields: &[&str], index: usize) -> Result<u64, DecodeError> {
    let s = fields.get(index).ok_or_else(|| invalid(fields, index))?;
    if let Ok(v) = s.parse::<u64>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u64::MAX as f64 => {
            Ok(v as u64)
        }
        _ => Err(invalid(fields, index)),
    }
}

fn parse_rep_id(fields: &[&str], index: usize) -> Result<u32, DecodeError> {
    let v = parse_count(fields, index)?;
    u32::try_from(v).map_err(|_| invalid(fields, index))
}

/// Renders a reading as a velocity frame (used when re-emitting recordings).
pub fn encode_velocity_frame(r: &Reading) -> String {
    let mut s = format!(
        "{},{},{},{}",
        r.t_ms,
        r.vertical_accel_mps2.unwrap_or(0.0),
        r.vertical_velocity_mps,
        r.rep_id
    );
    if let Some(flag) = r.calibrating {
        s.push_str(if flag { ",1" } else { ",0" });
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn four_field_frame_defaults_flag_to_zero() {
        let r = TextDecoder.decode_reading(b"1500,0.12,0.45,3").unwrap();
        assert_eq!(r.t_ms, 1500);
        assert_eq!(r.vertical_accel_mps2, Some(0.12));
        assert_eq!(r.vertical_velocity_mps, 0.45);
        assert_eq!(r.rep_id, 3);
        assert_eq!(r.calibrating, Some(false));
    }

    #[test]
    fn five_field_frame_reads_flag() {
        let r = decode_line(b"20,-0.5,-0.01,0,1\r\n").unwrap();
        assert_eq!(r.calibrating, Some(true));
        assert_eq!(r.vertical_velocity_mps, -0.01);
        assert!(r.is_calibrating());
    }

    #[test]
    fn flag_outside_zero_one_fails() {
        assert_eq!(
            decode_line(b"20,0,0,0,2"),
            Err(DecodeError::InvalidField { index: 4, value: "2".into() })
        );
    }

    #[test]
    fn non_numeric_field_fails() {
        assert_eq!(
            decode_line(b"20,abc,0.1,1"),
            Err(DecodeError::InvalidField { index: 1, value: "abc".into() })
        );
        assert!(matches!(decode_line(b"20,NaN,0.1,1"), Err(DecodeError::InvalidField { .. })));
        assert!(matches!(decode_line(b"-5,0,0.1,1"), Err(DecodeError::InvalidField { index: 0, .. })));
    }

    #[test]
    fn too_few_fields_fails() {
        assert_eq!(
            decode_line(b"20,0.1,0.2"),
            Err(DecodeError::FieldCount { expected: "4, 5 or 10", got: 3 })
        );
        assert_eq!(decode_line(b"  \n"), Err(DecodeError::Empty));
    }

    #[test]
    fn non_ascii_fails() {
        assert_eq!(decode_line(&[0x31, 0x2C, 0xFF]), Err(DecodeError::NotText));
    }

    #[test]
    fn serial_log_row_is_accepted() {
        let row = b"2,10450,0.1,0.2,9.9,0.01,0.02,0.03,0.35,0.61";
        let r = decode_line(row).unwrap();
        assert_eq!(r.rep_id, 2);
        assert_eq!(r.t_ms, 10450);
        assert_eq!(r.vertical_accel_mps2, Some(0.35));
        assert_eq!(r.vertical_velocity_mps, 0.61);
        assert_eq!(r.calibrating, None);
    }

    #[test]
    fn serial_log_header_is_rejected() {
        let header = b"rep_id,t_ms,ax_mps2,ay_mps2,az_mps2,gx_rads,gy_rads,gz_rads,aZ_filt,vZ";
        assert!(matches!(decode_line(header), Err(DecodeError::InvalidField { index: 0, .. })));
    }

    #[test]
    fn integral_float_counters_are_tolerated() {
        let r = decode_line(b"100.0,0,0.2,4.0").unwrap();
        assert_eq!((r.t_ms, r.rep_id), (100, 4));
        assert!(decode_line(b"100.5,0,0.2,4").is_err());
    }

    #[test]
    fn text_frames_have_no_events() {
        assert_eq!(TextDecoder.decode_event(b"1,2,3,4"), Err(DecodeError::Unsupported("text")));
    }

    #[test]
    fn encoded_frame_decodes_back() {
        let r = Reading {
            t_ms: 77,
            vertical_velocity_mps: 0.25,
            vertical_accel_mps2: Some(-1.5),
            rep_id: 9,
            calibrating: Some(true),
            axes: None,
        };
        let line = encode_velocity_frame(&r);
        assert_eq!(line, "77,-1.5,0.25,9,1");
        assert_eq!(decode_line(line.as_bytes()).unwrap(), r);
    }

    proptest! {
        #[test]
        fn decoding_is_total(buf in proptest::collection::vec(any::<u8>(), 0..64)) {
            let _ = decode_line(&buf);
        }

        #[test]
        fn decoding_is_total_for_comma_text(s in "[0-9.,\\-a-z ]{0,40}") {
            let _ = decode_line(s.as_bytes());
        }
    }
}
