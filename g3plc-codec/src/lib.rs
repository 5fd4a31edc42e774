//! Wire codecs for the G3-PLC DLMS stack
//!
//! This crate provides pure encode/decode with no I/O: A-XDR data
//! encoding, DLMS GET/SET APDUs, ISO-ACSE association PDUs, LBP
//! bootstrap frames and the MAC transmit parameter block.
//!
//! Codecs either produce a complete structure or fail; nothing is
//! partially committed to the caller's buffers.

pub mod acse;
pub mod apdu;
pub mod axdr;
pub mod lbp;
pub mod mac;

pub use acse::{
    Aare, AareUserInfo, Aarq, ConfirmedServiceError, InitiateRequest, InitiateResponse, Rlre,
    Rlrq, SourceDiagnostic,
};
pub use apdu::{
    AccessSelector, BlockResult, GetDataResult, GetItem, GetRequest, GetResponse, SetRequest,
    SetResponse,
};
pub use axdr::{AxdrDecoder, AxdrEncoder, decode_length, encode_length};
pub use lbp::{ConfigParam, LbpMessage, LbpMessageType, MediaType, ParameterResult};
