//! Configuration parameter TLVs carried in Accepted bootstrapping data
//!
//! The server hands the joining device its short address and group master
//! keys as a block of id/length/value triples. The device answers with a
//! Parameter-result naming the first parameter it could not apply.

use g3plc_core::{G3Error, ShortAddress};
use thiserror::Error;

/// Configuration parameter attribute ids
pub mod params {
    pub const SHORT_ADDR: u8 = 0x1D;
    pub const GMK: u8 = 0x27;
    pub const GMK_ACTIVATION: u8 = 0x2B;
    pub const GMK_REMOVAL: u8 = 0x2F;
    pub const RESULT: u8 = 0x31;
}

/// Outcome code carried in a Parameter-result TLV
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ParameterResult {
    Success = 0x00,
    MissingParameter = 0x01,
    InvalidValue = 0x02,
    UnknownId = 0x03,
}

impl ParameterResult {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Success),
            0x01 => Some(Self::MissingParameter),
            0x02 => Some(Self::InvalidValue),
            0x03 => Some(Self::UnknownId),
            _ => None,
        }
    }
}

/// A parameter that could not be decoded, with the result code the device
/// reports back against it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("configuration parameter {attribute:#04x} rejected: {code:?}")]
pub struct ParamError {
    pub code: ParameterResult,
    pub attribute: u8,
}

impl From<ParamError> for G3Error {
    fn from(err: ParamError) -> Self {
        G3Error::Decode(err.to_string())
    }
}

/// One decoded configuration parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigParam {
    /// Short address the device shall use once joined
    ShortAddress(ShortAddress),
    /// Group master key to install in the given key slot
    Gmk { key_id: u8, key: [u8; 16] },
    /// Key slot to use for outgoing traffic
    GmkActivation { key_id: u8 },
    /// Key slot to delete
    GmkRemoval { key_id: u8 },
    /// Outcome report; `attribute` names the offending parameter, zero on
    /// success
    Result { code: ParameterResult, attribute: u8 },
}

impl ConfigParam {
    pub fn success() -> Self {
        Self::Result {
            code: ParameterResult::Success,
            attribute: 0,
        }
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        match self {
            Self::ShortAddress(addr) => {
                out.push(params::SHORT_ADDR);
                out.push(2);
                out.extend_from_slice(&addr.value().to_be_bytes());
            }
            Self::Gmk { key_id, key } => {
                out.push(params::GMK);
                out.push(17);
                out.push(*key_id);
                out.extend_from_slice(key);
            }
            Self::GmkActivation { key_id } => {
                out.push(params::GMK_ACTIVATION);
                out.push(1);
                out.push(*key_id);
            }
            Self::GmkRemoval { key_id } => {
                out.push(params::GMK_REMOVAL);
                out.push(1);
                out.push(*key_id);
            }
            Self::Result { code, attribute } => {
                out.push(params::RESULT);
                out.push(2);
                out.push(*code as u8);
                out.push(*attribute);
            }
        }
    }

    fn decode_one(id: u8, value: &[u8]) -> Result<Self, ParamError> {
        let invalid = ParamError {
            code: ParameterResult::InvalidValue,
            attribute: id,
        };
        match id {
            params::SHORT_ADDR => {
                let &[hi, lo] = value else {
                    return Err(invalid);
                };
                Ok(Self::ShortAddress(ShortAddress(u16::from_be_bytes([
                    hi, lo,
                ]))))
            }
            params::GMK => {
                if value.len() != 17 {
                    return Err(invalid);
                }
                let mut key = [0u8; 16];
                key.copy_from_slice(&value[1..]);
                Ok(Self::Gmk {
                    key_id: value[0],
                    key,
                })
            }
            params::GMK_ACTIVATION => {
                let &[key_id] = value else {
                    return Err(invalid);
                };
                Ok(Self::GmkActivation { key_id })
            }
            params::GMK_REMOVAL => {
                let &[key_id] = value else {
                    return Err(invalid);
                };
                Ok(Self::GmkRemoval { key_id })
            }
            params::RESULT => {
                let &[code, attribute] = value else {
                    return Err(invalid);
                };
                let code = ParameterResult::from_u8(code).ok_or(invalid)?;
                Ok(Self::Result { code, attribute })
            }
            _ => Err(ParamError {
                code: ParameterResult::UnknownId,
                attribute: id,
            }),
        }
    }
}

/// Serialize a parameter block as consecutive TLVs
pub fn encode_params(params: &[ConfigParam]) -> Vec<u8> {
    let mut out = Vec::new();
    for param in params {
        param.encode_into(&mut out);
    }
    out
}

/// Walk a configuration TLV block. Stops at the first malformed or unknown
/// parameter, reporting the result code and offending attribute id.
pub fn decode_params(data: &[u8]) -> Result<Vec<ConfigParam>, ParamError> {
    let mut decoded = Vec::new();
    let mut offset = 0usize;
    while offset < data.len() {
        if offset + 2 > data.len() {
            return Err(ParamError {
                code: ParameterResult::InvalidValue,
                attribute: data[offset],
            });
        }
        let id = data[offset];
        let len = data[offset + 1] as usize;
        offset += 2;
        if offset + len > data.len() {
            return Err(ParamError {
                code: ParameterResult::InvalidValue,
                attribute: id,
            });
        }
        decoded.push(ConfigParam::decode_one(id, &data[offset..offset + len])?);
        offset += len;
    }
    Ok(decoded)
}
