//! A-XDR decoder

use g3plc_core::data::tag;
use g3plc_core::{DataValue, G3Error, G3Result};

use crate::axdr::length::decode_length;

/// Nesting limit for array/structure decoding
const MAX_DEPTH: usize = 16;

/// Cursor-based A-XDR decoder
pub struct AxdrDecoder<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> AxdrDecoder<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Decode one tagged data value
    pub fn decode_data(&mut self) -> G3Result<DataValue> {
        self.decode_data_nested(0)
    }

    fn decode_data_nested(&mut self, depth: usize) -> G3Result<DataValue> {
        if depth > MAX_DEPTH {
            return Err(G3Error::Decode("data nesting too deep".to_string()));
        }

        let type_tag = self.read_u8()?;
        let value = match type_tag {
            tag::NULL_DATA => DataValue::Null,
            tag::BOOLEAN => DataValue::Boolean(self.read_u8()? != 0),
            tag::DOUBLE_LONG => DataValue::DoubleLong(self.read_u32()? as i32),
            tag::DOUBLE_LONG_UNSIGNED => DataValue::DoubleLongUnsigned(self.read_u32()?),
            tag::OCTET_STRING => {
                let len = self.decode_length()?;
                DataValue::OctetString(self.read_bytes(len)?.to_vec())
            }
            tag::VISIBLE_STRING => {
                let len = self.decode_length()?;
                DataValue::VisibleString(self.read_bytes(len)?.to_vec())
            }
            tag::INTEGER => DataValue::Integer(self.read_u8()? as i8),
            tag::LONG => DataValue::Long(self.read_u16()? as i16),
            tag::UNSIGNED => DataValue::Unsigned(self.read_u8()?),
            tag::LONG_UNSIGNED => DataValue::LongUnsigned(self.read_u16()?),
            tag::LONG_64 => DataValue::Long64(self.read_u64()? as i64),
            tag::LONG_64_UNSIGNED => DataValue::Long64Unsigned(self.read_u64()?),
            tag::ENUM => DataValue::Enum(self.read_u8()?),
            tag::ARRAY => {
                let count = self.decode_length()?;
                let mut items = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    items.push(self.decode_data_nested(depth + 1)?);
                }
                DataValue::Array(items)
            }
            tag::STRUCTURE => {
                let count = self.decode_length()?;
                let mut items = Vec::with_capacity(count.min(64));
                for _ in 0..count {
                    items.push(self.decode_data_nested(depth + 1)?);
                }
                DataValue::Structure(items)
            }
            other => {
                return Err(G3Error::Decode(format!(
                    "unknown data type tag 0x{:02X}",
                    other
                )));
            }
        };
        Ok(value)
    }

    /// Decode a length field and advance past it
    pub fn decode_length(&mut self) -> G3Result<usize> {
        let (value, consumed) = decode_length(&self.buffer[self.position..])?;
        self.position += consumed;
        Ok(value as usize)
    }

    pub fn read_u8(&mut self) -> G3Result<u8> {
        let b = *self
            .buffer
            .get(self.position)
            .ok_or_else(|| G3Error::Decode("unexpected end of data".to_string()))?;
        self.position += 1;
        Ok(b)
    }

    pub fn read_u16(&mut self) -> G3Result<u16> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u32(&mut self) -> G3Result<u32> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> G3Result<u64> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(raw))
    }

    pub fn read_bytes(&mut self, len: usize) -> G3Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(len)
            .filter(|end| *end <= self.buffer.len())
            .ok_or_else(|| G3Error::Decode("unexpected end of data".to_string()))?;
        let slice = &self.buffer[self.position..end];
        self.position = end;
        Ok(slice)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axdr::encoder::encode_value;

    #[test]
    fn test_decode_round_trip() {
        let values = [
            DataValue::Null,
            DataValue::Boolean(false),
            DataValue::DoubleLong(-5),
            DataValue::DoubleLongUnsigned(0xDEADBEEF),
            DataValue::octets(&[1, 2, 3]),
            DataValue::Integer(-1),
            DataValue::Long(-300),
            DataValue::Unsigned(200),
            DataValue::LongUnsigned(0xFFFF),
            DataValue::Long64(-1),
            DataValue::Long64Unsigned(u64::MAX),
            DataValue::Enum(22),
            DataValue::Array(vec![DataValue::Unsigned(1), DataValue::Unsigned(2)]),
            DataValue::Structure(vec![
                DataValue::octets(&[9]),
                DataValue::Long(7),
            ]),
        ];

        for value in values {
            let encoded = encode_value(&value).unwrap();
            let mut decoder = AxdrDecoder::new(&encoded);
            assert_eq!(decoder.decode_data().unwrap(), value);
            assert!(decoder.is_empty());
        }
    }

    #[test]
    fn test_decode_truncated_fails() {
        let encoded = encode_value(&DataValue::DoubleLongUnsigned(1)).unwrap();
        let mut decoder = AxdrDecoder::new(&encoded[..3]);
        assert!(decoder.decode_data().is_err());
    }

    #[test]
    fn test_decode_unknown_tag_fails() {
        let mut decoder = AxdrDecoder::new(&[0x7E]);
        assert!(decoder.decode_data().is_err());
    }
}
