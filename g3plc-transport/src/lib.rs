//! Transport links for the G3-PLC DLMS stack
//!
//! Two link flavours: datagram links keyed by node short address (UDP
//! over the adaptation layer, in-memory for tests) and byte streams for
//! the serial maintenance port.

pub mod datagram;
pub mod memory;
pub mod serial;
pub mod stream;
pub mod udp;

pub use datagram::DatagramLink;
pub use memory::{MemoryHub, MemoryLink};
pub use serial::{SerialLink, SerialSettings};
pub use stream::{ByteStream, StreamTransport};
pub use udp::{DLMS_UDP_PORT, MAX_IPV6_PDU, UdpLink, UdpSettings};
