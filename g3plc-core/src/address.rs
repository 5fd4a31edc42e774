//! Addressing types for the G3-PLC network layer
//!
//! A node is known by its factory EUI-64 before joining and by the 16-bit
//! short address the coordinator assigns during bootstrap afterwards.

use crate::error::{G3Error, G3Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv6Addr;

/// IEEE EUI-64 extended address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Eui64 {
    bytes: [u8; 8],
}

impl Eui64 {
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self { bytes }
    }

    /// Create an EUI-64 from a byte slice, which must be exactly 8 bytes
    pub fn from_bytes(bytes: &[u8]) -> G3Result<Self> {
        if bytes.len() != 8 {
            return Err(G3Error::Decode(format!(
                "EUI-64 requires 8 bytes, got {}",
                bytes.len()
            )));
        }
        let mut addr = [0u8; 8];
        addr.copy_from_slice(bytes);
        Ok(Self { bytes: addr })
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.bytes
    }

    pub fn to_bytes(&self) -> [u8; 8] {
        self.bytes
    }

    /// Uppercase hex rendering without separators, e.g. "0013A20040B51234"
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02X}", b)).collect()
    }
}

impl fmt::Display for Eui64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.bytes.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{:02X}", b)?;
        }
        Ok(())
    }
}

/// 16-bit network short address assigned at join time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShortAddress(pub u16);

impl ShortAddress {
    /// Sentinel for "no address assigned"
    pub const INVALID: ShortAddress = ShortAddress(0xFFFF);

    /// Address of the PAN coordinator
    pub const COORDINATOR: ShortAddress = ShortAddress(0x0000);

    pub const fn value(&self) -> u16 {
        self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl fmt::Display for ShortAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// PAN identifier of a G3 network instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct PanId(pub u16);

impl PanId {
    pub const fn value(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for PanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

/// Link-local address of a joined node, formed from the PAN id and the
/// assigned short address
pub fn link_local_address(pan: PanId, short: ShortAddress) -> Ipv6Addr {
    Ipv6Addr::new(0xFE80, 0, 0, 0, pan.value(), 0x00FF, 0xFE00, short.value())
}

/// Unique-local address of a node, formed from the PAN id and the
/// factory EUI-64
pub fn unique_local_address(pan: PanId, extended: &Eui64) -> Ipv6Addr {
    let b = extended.as_bytes();
    Ipv6Addr::new(
        0xFD00,
        0x0000,
        0x0002,
        pan.value(),
        u16::from_be_bytes([b[0], b[1]]),
        u16::from_be_bytes([b[2], b[3]]),
        u16::from_be_bytes([b[4], b[5]]),
        u16::from_be_bytes([b[6], b[7]]),
    )
}

/// Recover the short address embedded in a link-local peer address,
/// checking that the PAN id matches
pub fn short_address_of(addr: &Ipv6Addr, pan: PanId) -> Option<ShortAddress> {
    let seg = addr.segments();
    if seg[..4] == [0xFE80, 0, 0, 0]
        && seg[4] == pan.value()
        && seg[5] == 0x00FF
        && seg[6] == 0xFE00
    {
        Some(ShortAddress(seg[7]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eui64_from_bytes() {
        let addr = Eui64::from_bytes(&[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(addr.to_bytes(), [1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(Eui64::from_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_eui64_display() {
        let addr = Eui64::new([0x00, 0x13, 0xA2, 0x00, 0x40, 0xB5, 0x12, 0x34]);
        assert_eq!(format!("{}", addr), "00:13:A2:00:40:B5:12:34");
        assert_eq!(addr.to_hex(), "0013A20040B51234");
    }

    #[test]
    fn test_short_address_validity() {
        assert!(!ShortAddress::INVALID.is_valid());
        assert!(ShortAddress(0x0001).is_valid());
        assert!(ShortAddress::COORDINATOR.is_valid());
    }

    #[test]
    fn test_link_local_derivation() {
        let addr = link_local_address(PanId(0x781D), ShortAddress(0x0001));
        assert_eq!(addr, "fe80::781d:ff:fe00:1".parse::<Ipv6Addr>().unwrap());
        assert_eq!(
            short_address_of(&addr, PanId(0x781D)),
            Some(ShortAddress(0x0001))
        );
        assert_eq!(short_address_of(&addr, PanId(0x1234)), None);
    }

    #[test]
    fn test_unique_local_derivation() {
        let extended = Eui64::new([0x00, 0xAB, 0xCD, 0xFF, 0xFE, 0xEF, 0x00, 0x00]);
        let addr = unique_local_address(PanId(0x781D), &extended);
        assert_eq!(
            addr,
            "fd00:0:2:781d:ab:cdff:feef:0".parse::<Ipv6Addr>().unwrap()
        );
    }
}
