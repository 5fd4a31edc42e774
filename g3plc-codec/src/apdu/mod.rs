//! xDLMS service APDUs (GET/SET)
//!
//! The request/response PDUs are tag-ordered byte layouts: one APDU tag, one
//! CHOICE byte, one invoke-id-and-priority byte, then the choice-specific
//! fields.

pub mod get;
pub mod selector;
pub mod set;

pub use get::{BlockResult, GetDataResult, GetItem, GetRequest, GetResponse};
pub use selector::AccessSelector;
pub use set::{SetRequest, SetResponse};

use g3plc_core::{AttributeDescriptor, G3Result, ObisCode};

use crate::axdr::{AxdrDecoder, AxdrEncoder};

/// APDU tags
pub mod tags {
    pub const CONFIRMED_SERVICE_ERROR: u8 = 0x0E;

    pub const GET_REQUEST: u8 = 0xC0;
    pub const SET_REQUEST: u8 = 0xC1;
    pub const EVENT_NOTIFICATION: u8 = 0xC2;
    pub const ACTION_REQUEST: u8 = 0xC3;

    pub const GET_RESPONSE: u8 = 0xC4;
    pub const SET_RESPONSE: u8 = 0xC5;
    pub const ACTION_RESPONSE: u8 = 0xC7;
}

fn encode_descriptor(encoder: &mut AxdrEncoder, descriptor: &AttributeDescriptor) {
    encoder.write_u16(descriptor.class_id);
    encoder.write_bytes(descriptor.obis.as_bytes());
    encoder.write_u8(descriptor.attribute);
}

fn decode_descriptor(decoder: &mut AxdrDecoder<'_>) -> G3Result<AttributeDescriptor> {
    let class_id = decoder.read_u16()?;
    let obis = ObisCode::from_bytes(decoder.read_bytes(6)?)?;
    let attribute = decoder.read_u8()?;
    Ok(AttributeDescriptor::new(class_id, obis, attribute))
}
