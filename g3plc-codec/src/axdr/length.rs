//! A-XDR length field encoding

use g3plc_core::{G3Error, G3Result};

/// Encode a length field.
///
/// Values below 0x80 use the single-byte short form; larger values use the
/// 0x81/0x82 long form with one or two big-endian payload bytes.
pub fn encode_length(value: u16) -> Vec<u8> {
    if value < 0x80 {
        vec![value as u8]
    } else if value <= 0xFF {
        vec![0x81, value as u8]
    } else {
        vec![0x82, (value >> 8) as u8, (value & 0xFF) as u8]
    }
}

/// Number of bytes [`encode_length`] produces for a value
pub fn encoded_length_size(value: u16) -> usize {
    if value < 0x80 {
        1
    } else if value <= 0xFF {
        2
    } else {
        3
    }
}

/// Decode a length field, returning the value and the bytes consumed.
///
/// Accepts the short form and the 0x81/0x82 long forms only; any other
/// length-of-length prefix is rejected.
pub fn decode_length(bytes: &[u8]) -> G3Result<(u16, usize)> {
    let first = *bytes
        .first()
        .ok_or_else(|| G3Error::Decode("empty length field".to_string()))?;

    if first < 0x80 {
        return Ok((first as u16, 1));
    }

    match first {
        0x81 => {
            let b = *bytes
                .get(1)
                .ok_or_else(|| G3Error::Decode("truncated 0x81 length".to_string()))?;
            Ok((b as u16, 2))
        }
        0x82 => {
            if bytes.len() < 3 {
                return Err(G3Error::Decode("truncated 0x82 length".to_string()));
            }
            Ok((u16::from_be_bytes([bytes[1], bytes[2]]), 3))
        }
        other => Err(G3Error::Decode(format!(
            "unsupported length prefix 0x{:02X}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_short_form() {
        assert_eq!(encode_length(0), vec![0x00]);
        assert_eq!(encode_length(0x7F), vec![0x7F]);
    }

    #[test]
    fn test_encode_long_form_one_byte() {
        assert_eq!(encode_length(200), vec![0x81, 0xC8]);
        assert_eq!(encode_length(0x80), vec![0x81, 0x80]);
        assert_eq!(encode_length(0xFF), vec![0x81, 0xFF]);
    }

    #[test]
    fn test_encode_long_form_two_bytes() {
        assert_eq!(encode_length(0x0100), vec![0x82, 0x01, 0x00]);
        assert_eq!(encode_length(0xFFFF), vec![0x82, 0xFF, 0xFF]);
    }

    #[test]
    fn test_round_trip_all_values() {
        for v in 0..=0xFFFFu16 {
            let encoded = encode_length(v);
            let (decoded, consumed) = decode_length(&encoded).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(consumed, encoded.len());
            assert_eq!(consumed, encoded_length_size(v));
        }
    }

    #[test]
    fn test_decode_rejects_bad_prefix() {
        assert!(decode_length(&[]).is_err());
        assert!(decode_length(&[0x81]).is_err());
        assert!(decode_length(&[0x82, 0x01]).is_err());
        assert!(decode_length(&[0x83, 0x01, 0x00, 0x00]).is_err());
        assert!(decode_length(&[0x80]).is_err());
    }
}
