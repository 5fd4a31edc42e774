//! UDP link over the G3 IPv6 adaptation layer
//!
//! DLMS traffic between coordinator and meters runs over UDP on derived
//! link-local addresses, so a peer is fully identified by its short
//! address once the PAN id is known.

use crate::datagram::DatagramLink;
use async_trait::async_trait;
use g3plc_core::address::{link_local_address, short_address_of};
use g3plc_core::{G3Error, G3Result, PanId, ShortAddress};
use log::trace;
use std::net::{SocketAddr, SocketAddrV6};
use std::time::Duration;
use tokio::net::UdpSocket;

/// UDP port the DLMS application binds on every node
pub const DLMS_UDP_PORT: u16 = 0xF0B1;

/// Largest IPv6 PDU exchanged over the adaptation layer
pub const MAX_IPV6_PDU: usize = 1200;

/// UDP link settings
#[derive(Debug, Clone)]
pub struct UdpSettings {
    pub pan_id: PanId,
    pub port: u16,
    pub timeout: Option<Duration>,
}

impl UdpSettings {
    pub fn new(pan_id: PanId) -> Self {
        Self {
            pan_id,
            port: DLMS_UDP_PORT,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    pub fn with_timeout(pan_id: PanId, timeout: Duration) -> Self {
        Self {
            pan_id,
            port: DLMS_UDP_PORT,
            timeout: Some(timeout),
        }
    }

    /// Socket address of a node, derived from its short address
    pub fn peer_address(&self, peer: ShortAddress) -> SocketAddr {
        SocketAddr::V6(SocketAddrV6::new(
            link_local_address(self.pan_id, peer),
            self.port,
            0,
            0,
        ))
    }
}

/// Datagram link over a bound UDP socket
pub struct UdpLink {
    socket: Option<UdpSocket>,
    settings: UdpSettings,
}

impl UdpLink {
    pub fn new(settings: UdpSettings) -> Self {
        Self {
            socket: None,
            settings,
        }
    }

    /// Bind the local socket on the configured port
    pub async fn open(&mut self) -> G3Result<()> {
        if self.socket.is_some() {
            return Err(G3Error::Link(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "link has already been opened",
            )));
        }
        let socket = UdpSocket::bind(("::", self.settings.port)).await?;
        self.socket = Some(socket);
        Ok(())
    }

    pub fn close(&mut self) {
        self.socket = None;
    }

    pub fn is_closed(&self) -> bool {
        self.socket.is_none()
    }

    fn socket(&self) -> G3Result<&UdpSocket> {
        self.socket.as_ref().ok_or_else(|| {
            G3Error::Link(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "UDP socket not bound",
            ))
        })
    }
}

#[async_trait]
impl DatagramLink for UdpLink {
    async fn send_to(&mut self, destination: ShortAddress, payload: &[u8]) -> G3Result<()> {
        let target = self.settings.peer_address(destination);
        trace!("udp send {} bytes to {}", payload.len(), target);
        self.socket()?.send_to(payload, target).await?;
        Ok(())
    }

    /// Waits for the next datagram from a node of this PAN; frames from
    /// other sources are dropped.
    async fn receive_from(&mut self) -> G3Result<(ShortAddress, Vec<u8>)> {
        let pan_id = self.settings.pan_id;
        let timeout = self.settings.timeout;
        let socket = self.socket()?;
        let mut buf = vec![0u8; MAX_IPV6_PDU];
        loop {
            let (len, source) = match timeout {
                Some(timeout) => tokio::time::timeout(timeout, socket.recv_from(&mut buf))
                    .await
                    .map_err(|_| G3Error::Timeout)??,
                None => socket.recv_from(&mut buf).await?,
            };
            let SocketAddr::V6(source) = source else {
                continue;
            };
            if let Some(peer) = short_address_of(source.ip(), pan_id) {
                trace!("udp received {} bytes from {}", len, peer);
                return Ok((peer, buf[..len].to_vec()));
            }
        }
    }
}
