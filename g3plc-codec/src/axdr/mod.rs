//! A-XDR encoding/decoding
//!
//! Length fields use the DLMS long-form convention: values below 0x80 fit in
//! a single byte, larger values carry a 0x81/0x82 prefix followed by one or
//! two big-endian length bytes.

pub mod decoder;
pub mod encoder;
pub mod length;

pub use decoder::AxdrDecoder;
pub use encoder::{encode_value, AxdrEncoder};
pub use length::{decode_length, encode_length, encoded_length_size};
