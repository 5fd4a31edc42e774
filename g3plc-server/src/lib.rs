//! DLMS server side of the G3-PLC metering stack.
//!
//! [`DlmsServer`] is a plain state machine over APDU bytes: it answers
//! association requests on up to four wrapper-port pairs, dispatches GET and
//! SET onto the OBIS object registry and fragments oversized results into
//! data blocks. The session layer owns the sockets and feeds it one APDU at
//! a time.
//!
//! The [`ic`] module carries the interface classes a meter serves, including
//! the bridges onto the PLC stack's MAC and ADP information bases.

pub mod ic;
pub mod registry;
pub mod server;

pub use registry::{AccessRights, CosemObject, ObjectRegistry, RegisteredObject, attribute_bit};
pub use server::DlmsServer;
