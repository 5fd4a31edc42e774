//! Core types and utilities for the G3-PLC DLMS stack
//!
//! This crate provides fundamental types, error handling, and protocol
//! constants used throughout the stack: addresses, OBIS codes, data values,
//! association configuration and the result enumerations every layer shares.

pub mod address;
pub mod config;
pub mod data;
pub mod error;
pub mod obis;
pub mod result;

pub use address::{
    Eui64, PanId, ShortAddress, link_local_address, short_address_of, unique_local_address,
};
pub use config::{
    AssociationConfig, AuthMechanism, CLIENT_CONFORMANCE, DLMS_VERSION, LLS_PASSWORD_LEN,
    MAX_ASSOCIATIONS, MAX_OBIS_OBJECTS, MAX_OBJECTS_PER_REQUEST, PasswordType, SERVER_CONFORMANCE,
    SERVER_MAX_APDU_SIZE, VAA_NAME, derive_address_password,
};
pub use data::DataValue;
pub use error::{G3Error, G3Result};
pub use obis::{AttributeDescriptor, ObisCode};
pub use result::{
    AssociationResult, ClientResult, DataAccessResult, InitiateError, ReleaseReason,
    ServiceProviderDiagnostic, ServiceUserDiagnostic,
};
