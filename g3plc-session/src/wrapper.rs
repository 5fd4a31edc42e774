//! IEC 62056-47 wrapper over datagram links

use bytes::{Buf, BufMut, BytesMut};
use g3plc_core::{G3Error, G3Result, ShortAddress};
use g3plc_transport::DatagramLink;
use std::time::Duration;

/// Fixed wrapper header size.
pub const WRAPPER_HEADER_LEN: usize = 8;

/// The only wrapper protocol version this stack speaks.
pub const WRAPPER_VERSION: u16 = 0x0001;

/// Wrapper header fields, all big-endian on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperHeader {
    pub source: u16,
    pub destination: u16,
    pub length: u16,
}

impl WrapperHeader {
    pub fn new(source: u16, destination: u16, length: u16) -> Self {
        Self {
            source,
            destination,
            length,
        }
    }

    pub fn encode(&self) -> [u8; WRAPPER_HEADER_LEN] {
        let mut out = [0u8; WRAPPER_HEADER_LEN];
        out[0..2].copy_from_slice(&WRAPPER_VERSION.to_be_bytes());
        out[2..4].copy_from_slice(&self.source.to_be_bytes());
        out[4..6].copy_from_slice(&self.destination.to_be_bytes());
        out[6..8].copy_from_slice(&self.length.to_be_bytes());
        out
    }

    pub fn decode(mut data: &[u8]) -> G3Result<Self> {
        if data.len() < WRAPPER_HEADER_LEN {
            return Err(G3Error::Decode(format!(
                "wrapper header needs {} bytes, got {}",
                WRAPPER_HEADER_LEN,
                data.len()
            )));
        }
        let version = data.get_u16();
        if version != WRAPPER_VERSION {
            return Err(G3Error::Decode(format!(
                "wrapper version {version:#06x} unsupported"
            )));
        }
        Ok(Self {
            source: data.get_u16(),
            destination: data.get_u16(),
            length: data.get_u16(),
        })
    }
}

/// A wrapper header plus the APDU it frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperPdu {
    header: WrapperHeader,
    apdu: Vec<u8>,
}

impl WrapperPdu {
    /// Frame an APDU between the given wrapper ports.
    pub fn new(source: u16, destination: u16, apdu: Vec<u8>) -> G3Result<Self> {
        let length = u16::try_from(apdu.len())
            .map_err(|_| G3Error::Encode(format!("APDU of {} bytes overflows the wrapper length", apdu.len())))?;
        Ok(Self {
            header: WrapperHeader::new(source, destination, length),
            apdu,
        })
    }

    pub fn header(&self) -> &WrapperHeader {
        &self.header
    }

    pub fn apdu(&self) -> &[u8] {
        &self.apdu
    }

    pub fn into_apdu(self) -> Vec<u8> {
        self.apdu
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = BytesMut::with_capacity(WRAPPER_HEADER_LEN + self.apdu.len());
        out.put_slice(&self.header.encode());
        out.put_slice(&self.apdu);
        out.to_vec()
    }

    /// Parse one whole datagram; the length field must cover it exactly.
    pub fn decode(datagram: &[u8]) -> G3Result<Self> {
        let header = WrapperHeader::decode(datagram)?;
        let apdu = &datagram[WRAPPER_HEADER_LEN..];
        if usize::from(header.length) != apdu.len() {
            return Err(G3Error::Decode(format!(
                "wrapper length {} does not match the {} payload bytes",
                header.length,
                apdu.len()
            )));
        }
        Ok(Self {
            header,
            apdu: apdu.to_vec(),
        })
    }
}

/// Session that frames APDUs with wrapper headers over a datagram link.
///
/// Port pairs are per call rather than per session: the layers above
/// multiplex several associations over a single link.
#[derive(Debug)]
pub struct WrapperSession<L: DatagramLink> {
    link: L,
}

impl<L: DatagramLink> WrapperSession<L> {
    pub fn new(link: L) -> Self {
        Self { link }
    }

    /// Frame and send one APDU to a peer.
    pub async fn send(
        &mut self,
        peer: ShortAddress,
        source: u16,
        destination: u16,
        apdu: &[u8],
    ) -> G3Result<()> {
        let pdu = WrapperPdu::new(source, destination, apdu.to_vec())?;
        self.link.send_to(peer, &pdu.encode()).await
    }

    /// Wait for the next well-formed wrapper PDU.
    pub async fn receive(&mut self) -> G3Result<(ShortAddress, WrapperPdu)> {
        let (peer, datagram) = self.link.receive_from().await?;
        let pdu = WrapperPdu::decode(&datagram)?;
        Ok((peer, pdu))
    }

    /// As [`receive`](Self::receive), bounded by a deadline.
    pub async fn receive_timeout(
        &mut self,
        timeout: Duration,
    ) -> G3Result<(ShortAddress, WrapperPdu)> {
        match tokio::time::timeout(timeout, self.receive()).await {
            Ok(result) => result,
            Err(_) => Err(G3Error::Timeout),
        }
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_inner(self) -> L {
        self.link
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use g3plc_transport::MemoryHub;

    #[test]
    fn test_header_layout_is_big_endian() {
        let header = WrapperHeader::new(0x0001, 0x0002, 0x0203);
        assert_eq!(
            header.encode(),
            [0x00, 0x01, 0x00, 0x01, 0x00, 0x02, 0x02, 0x03]
        );
    }

    #[test]
    fn test_pdu_round_trip() {
        let pdu = WrapperPdu::new(0x0010, 0x0001, vec![0x60, 0x1D, 0xA1]).unwrap();
        let bytes = pdu.encode();
        assert_eq!(bytes.len(), WRAPPER_HEADER_LEN + 3);

        let decoded = WrapperPdu::decode(&bytes).unwrap();
        assert_eq!(decoded, pdu);
        assert_eq!(decoded.header().length, 3);
    }

    #[test]
    fn test_version_and_length_are_enforced() {
        let mut bytes = WrapperPdu::new(1, 1, vec![0xAA]).unwrap().encode();
        bytes[1] = 0x02;
        assert!(WrapperPdu::decode(&bytes).is_err());

        let mut bytes = WrapperPdu::new(1, 1, vec![0xAA]).unwrap().encode();
        bytes.push(0xBB);
        assert!(WrapperPdu::decode(&bytes).is_err());

        assert!(WrapperPdu::decode(&bytes[..5]).is_err());
    }

    #[tokio::test]
    async fn test_session_swaps_ports_across_a_link() {
        let hub = MemoryHub::default();
        let mut client = WrapperSession::new(hub.attach(ShortAddress(1)));
        let mut server = WrapperSession::new(hub.attach(ShortAddress(2)));

        client
            .send(ShortAddress(2), 0x0001, 0x0001, &[0x60, 0x03])
            .await
            .unwrap();

        let (peer, request) = server.receive().await.unwrap();
        assert_eq!(peer, ShortAddress(1));
        assert_eq!(request.apdu(), &[0x60, 0x03]);

        // reply with the ports reversed, as a server does
        let header = *request.header();
        server
            .send(peer, header.destination, header.source, &[0x61, 0x01])
            .await
            .unwrap();

        let (_, reply) = client.receive_timeout(Duration::from_secs(1)).await.unwrap();
        assert_eq!(reply.header().source, 0x0001);
        assert_eq!(reply.apdu(), &[0x61, 0x01]);
    }
}
