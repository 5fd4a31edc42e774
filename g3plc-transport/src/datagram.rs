//! Datagram trait for network links keyed by short address

use async_trait::async_trait;
use g3plc_core::{G3Result, ShortAddress};

/// Send and receive whole datagrams to joined nodes.
///
/// Implementations address peers by their 16-bit short address; how that
/// maps onto the underlying medium (derived IPv6 addresses, an in-memory
/// channel) is up to the link.
#[async_trait]
pub trait DatagramLink: Send + Sync {
    /// Send one datagram to a node
    async fn send_to(&mut self, destination: ShortAddress, payload: &[u8]) -> G3Result<()>;

    /// Receive the next datagram, returning the sender's short address
    async fn receive_from(&mut self) -> G3Result<(ShortAddress, Vec<u8>)>;
}
