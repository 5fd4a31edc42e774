//! DLMS data values and their A-XDR type tags
//!
//! Attribute values travel as a one-byte type tag followed by the value
//! content. The tag values are fixed by the DLMS Blue Book; only the types
//! the metering profile actually serves are modelled here.

use serde::{Deserialize, Serialize};

/// A-XDR type tags
pub mod tag {
    pub const NULL_DATA: u8 = 0;
    pub const ARRAY: u8 = 1;
    pub const STRUCTURE: u8 = 2;
    pub const BOOLEAN: u8 = 3;
    pub const BIT_STRING: u8 = 4;
    pub const DOUBLE_LONG: u8 = 5;
    pub const DOUBLE_LONG_UNSIGNED: u8 = 6;
    pub const OCTET_STRING: u8 = 9;
    pub const VISIBLE_STRING: u8 = 10;
    pub const INTEGER: u8 = 15;
    pub const LONG: u8 = 16;
    pub const UNSIGNED: u8 = 17;
    pub const LONG_UNSIGNED: u8 = 18;
    pub const LONG_64: u8 = 20;
    pub const LONG_64_UNSIGNED: u8 = 21;
    pub const ENUM: u8 = 22;
}

/// Fixed content sizes for the scalar date/time renderings
pub const SIZE_DATE_TIME: usize = 12;
pub const SIZE_DATE: usize = 5;
pub const SIZE_TIME: usize = 4;

/// One DLMS data value, tagged per the A-XDR type system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataValue {
    Null,
    Boolean(bool),
    /// int32
    DoubleLong(i32),
    /// uint32
    DoubleLongUnsigned(u32),
    OctetString(#[serde(with = "serde_bytes")] Vec<u8>),
    VisibleString(#[serde(with = "serde_bytes")] Vec<u8>),
    /// int8
    Integer(i8),
    /// int16
    Long(i16),
    /// uint8
    Unsigned(u8),
    /// uint16
    LongUnsigned(u16),
    /// int64
    Long64(i64),
    /// uint64
    Long64Unsigned(u64),
    Enum(u8),
    Array(Vec<DataValue>),
    Structure(Vec<DataValue>),
}

impl DataValue {
    /// The A-XDR type tag this value encodes under
    pub fn tag(&self) -> u8 {
        match self {
            DataValue::Null => tag::NULL_DATA,
            DataValue::Boolean(_) => tag::BOOLEAN,
            DataValue::DoubleLong(_) => tag::DOUBLE_LONG,
            DataValue::DoubleLongUnsigned(_) => tag::DOUBLE_LONG_UNSIGNED,
            DataValue::OctetString(_) => tag::OCTET_STRING,
            DataValue::VisibleString(_) => tag::VISIBLE_STRING,
            DataValue::Integer(_) => tag::INTEGER,
            DataValue::Long(_) => tag::LONG,
            DataValue::Unsigned(_) => tag::UNSIGNED,
            DataValue::LongUnsigned(_) => tag::LONG_UNSIGNED,
            DataValue::Long64(_) => tag::LONG_64,
            DataValue::Long64Unsigned(_) => tag::LONG_64_UNSIGNED,
            DataValue::Enum(_) => tag::ENUM,
            DataValue::Array(_) => tag::ARRAY,
            DataValue::Structure(_) => tag::STRUCTURE,
        }
    }

    /// Convenience constructor for octet-string values
    pub fn octets(bytes: &[u8]) -> Self {
        DataValue::OctetString(bytes.to_vec())
    }
}
