//! Session layer for the G3-PLC metering stack
//!
//! Two framings sit between the transports and the DLMS layers: the
//! IEC 62056-47 wrapper carried in UDP datagrams, and an HDLC type 3
//! codec for the local serial management port.

pub mod hdlc;
pub mod wrapper;

pub use hdlc::{FcsCalc, FrameType, HdlcAddress, HdlcFrame};
pub use wrapper::{WRAPPER_HEADER_LEN, WRAPPER_VERSION, WrapperHeader, WrapperPdu, WrapperSession};
