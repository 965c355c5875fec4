use serde::{Deserialize, Serialize};
use std::str::FromStr;

use vbt_ingest_binary::BinaryDecoder;
use vbt_ingest_core::{DecodeError, Decoder, Event, Reading};
use vbt_ingest_text::TextDecoder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// Pick per payload by looking at its bytes.
    #[default]
    Auto,
    Binary,
    Text,
}

impl FromStr for WireFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "binary" | "bin" => Ok(Self::Binary),
            "text" | "csv" => Ok(Self::Text),
            other => Err(format!("unknown wire format {other:?} (auto, binary, text)")),
        }
    }
}

pub fn decoder_for(format: WireFormat) -> Box<dyn Decoder> {
    match format {
        WireFormat::Auto => Box::new(SniffingDecoder),
        WireFormat::Binary => Box::new(BinaryDecoder),
        WireFormat::Text => Box::new(TextDecoder),
    }
}

/// Text frames are printable ASCII with at least one separator; anything else
/// is treated as a fixed-width binary frame.
pub fn looks_like_text(buf: &[u8]) -> bool {
    buf.contains(&b',') && buf.iter().all(|b| b.is_ascii_graphic() || b.is_ascii_whitespace())
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SniffingDecoder;

impl Decoder for SniffingDecoder {
    fn decode_reading(&self, buf: &[u8]) -> Result<Reading, DecodeError> {
        if looks_like_text(buf) {
            TextDecoder.decode_reading(buf)
        } else {
            BinaryDecoder.decode_reading(buf)
        }
    }

    fn decode_event(&self, buf: &[u8]) -> Result<Event, DecodeError> {
        if looks_like_text(buf) {
            TextDecoder.decode_event(buf)
        } else {
            BinaryDecoder.decode_event(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::ImuAxes;
    use vbt_ingest_binary::encode_data_frame;

    #[test]
    fn sniffs_text_frames() {
        let r = SniffingDecoder.decode_reading(b"120,0.2,0.31,2,0\n").unwrap();
        assert_eq!(r.rep_id, 2);
        assert_eq!(r.calibrating, Some(false));
    }

    #[test]
    fn sniffs_binary_frames() {
        let axes = ImuAxes { ax: 12, ..ImuAxes::default() };
        let r = SniffingDecoder.decode_reading(&encode_data_frame(9, &axes)).unwrap();
        assert_eq!(r.t_ms, 9);
        assert_eq!(r.axes, Some(axes));
    }

    #[test]
    fn short_garbage_is_a_binary_failure() {
        assert_eq!(
            SniffingDecoder.decode_reading(&[0x00, 0x01]),
            Err(DecodeError::TooShort { needed: 16, got: 2 })
        );
    }

    #[test]
    fn fixed_decoders_do_not_sniff() {
        let text = decoder_for(WireFormat::Text);
        assert!(text.decode_reading(&encode_data_frame(1, &ImuAxes::default())).is_err());
        let bin = decoder_for(WireFormat::Binary);
        assert!(bin.decode_reading(b"1,2,3,4").is_err());
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("CSV".parse::<WireFormat>(), Ok(WireFormat::Text));
        assert_eq!("binary".parse::<WireFormat>(), Ok(WireFormat::Binary));
        assert!("morse".parse::<WireFormat>().is_err());
    }
}
