//! A-XDR encoder

use g3plc_core::data::tag;
use g3plc_core::{DataValue, G3Error, G3Result};

use crate::axdr::length::encode_length;

/// A-XDR encoder writing into an owned buffer
pub struct AxdrEncoder {
    buffer: Vec<u8>,
}

impl AxdrEncoder {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a tagged data value
    pub fn encode_data(&mut self, value: &DataValue) -> G3Result<()> {
        self.write_u8(value.tag());
        match value {
            DataValue::Null => {}
            DataValue::Boolean(b) => self.write_u8(if *b { 0xFF } else { 0x00 }),
            DataValue::DoubleLong(v) => self.write_bytes(&v.to_be_bytes()),
            DataValue::DoubleLongUnsigned(v) => self.write_bytes(&v.to_be_bytes()),
            DataValue::OctetString(s) | DataValue::VisibleString(s) => {
                self.encode_length(s.len())?;
                self.write_bytes(s);
            }
            DataValue::Integer(v) => self.write_u8(*v as u8),
            DataValue::Long(v) => self.write_bytes(&v.to_be_bytes()),
            DataValue::Unsigned(v) => self.write_u8(*v),
            DataValue::LongUnsigned(v) => self.write_bytes(&v.to_be_bytes()),
            DataValue::Long64(v) => self.write_bytes(&v.to_be_bytes()),
            DataValue::Long64Unsigned(v) => self.write_bytes(&v.to_be_bytes()),
            DataValue::Enum(v) => self.write_u8(*v),
            DataValue::Array(items) | DataValue::Structure(items) => {
                self.encode_length(items.len())?;
                for item in items {
                    self.encode_data(item)?;
                }
            }
        }
        Ok(())
    }

    /// Encode a length field
    pub fn encode_length(&mut self, len: usize) -> G3Result<()> {
        let len = u16::try_from(len)
            .map_err(|_| G3Error::Encode(format!("length {} exceeds u16", len)))?;
        self.buffer.extend_from_slice(&encode_length(len));
        Ok(())
    }

    /// Encode an octet string body (length + bytes, no type tag)
    pub fn encode_octet_string(&mut self, bytes: &[u8]) -> G3Result<()> {
        self.encode_length(bytes.len())?;
        self.write_bytes(bytes);
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for AxdrEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience wrapper encoding one value to a fresh buffer
pub fn encode_value(value: &DataValue) -> G3Result<Vec<u8>> {
    let mut encoder = AxdrEncoder::new();
    encoder.encode_data(value)?;
    Ok(encoder.into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_null() {
        assert_eq!(encode_value(&DataValue::Null).unwrap(), vec![tag::NULL_DATA]);
    }

    #[test]
    fn test_encode_boolean() {
        assert_eq!(
            encode_value(&DataValue::Boolean(true)).unwrap(),
            vec![tag::BOOLEAN, 0xFF]
        );
    }

    #[test]
    fn test_encode_double_long_unsigned() {
        assert_eq!(
            encode_value(&DataValue::DoubleLongUnsigned(0x12345678)).unwrap(),
            vec![tag::DOUBLE_LONG_UNSIGNED, 0x12, 0x34, 0x56, 0x78]
        );
    }

    #[test]
    fn test_encode_octet_string() {
        assert_eq!(
            encode_value(&DataValue::octets(&[0xAA, 0xBB])).unwrap(),
            vec![tag::OCTET_STRING, 0x02, 0xAA, 0xBB]
        );
    }

    #[test]
    fn test_encode_structure() {
        let value = DataValue::Structure(vec![
            DataValue::Unsigned(7),
            DataValue::LongUnsigned(0x0102),
        ]);
        assert_eq!(
            encode_value(&value).unwrap(),
            vec![
                tag::STRUCTURE,
                0x02,
                tag::UNSIGNED,
                0x07,
                tag::LONG_UNSIGNED,
                0x01,
                0x02
            ]
        );
    }
}
