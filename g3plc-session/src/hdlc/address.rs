//! HDLC station addressing

use g3plc_core::{G3Error, G3Result};
use std::fmt;

/// Well-known station addresses.
pub mod reserved {
    pub const NO_STATION: u16 = 0x00;
    pub const MANAGEMENT_LOGICAL_DEVICE: u16 = 0x01;
    pub const PUBLIC_CLIENT: u16 = 0x10;
    pub const CALLING_STATION: u16 = 0x7E;
    pub const ALL_STATION: u16 = 0x7F;
}

const ONE_BYTE_MAX: u16 = 0x7F;
const TWO_BYTE_MAX: u16 = 0x3FFF;

/// Variable-length HDLC address.
///
/// Encodes as 1, 2 or 4 bytes, seven address bits per byte with the LSB
/// reserved as the stop bit on the final byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HdlcAddress {
    byte_length: usize,
    logical: u16,
    physical: u16,
}

impl HdlcAddress {
    /// Single-byte address holding only a logical id.
    pub fn new(logical: u16) -> G3Result<Self> {
        if logical > ONE_BYTE_MAX {
            return Err(G3Error::FrameInvalid(format!(
                "logical address {logical:#x} exceeds one-byte bound {ONE_BYTE_MAX:#x}"
            )));
        }
        Ok(Self {
            byte_length: 1,
            logical,
            physical: 0,
        })
    }

    /// Address carrying both a logical and a physical id.
    pub fn new_with_physical(logical: u16, physical: u16) -> G3Result<Self> {
        let logical_size = Self::half_size(logical)?;
        let physical_size = Self::half_size(physical)?;
        let byte_length = if physical == 0 {
            logical_size
        } else {
            logical_size.max(physical_size) * 2
        };
        Ok(Self {
            byte_length,
            logical,
            physical,
        })
    }

    fn half_size(id: u16) -> G3Result<usize> {
        if id <= ONE_BYTE_MAX {
            Ok(1)
        } else if id <= TWO_BYTE_MAX {
            Ok(2)
        } else {
            Err(G3Error::FrameInvalid(format!(
                "address {id:#x} exceeds two-byte bound {TWO_BYTE_MAX:#x}"
            )))
        }
    }

    pub fn logical(&self) -> u16 {
        self.logical
    }

    pub fn physical(&self) -> u16 {
        self.physical
    }

    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    pub fn is_all_station(&self) -> bool {
        match self.byte_length {
            1 | 2 => self.logical == reserved::ALL_STATION,
            _ => self.logical == TWO_BYTE_MAX,
        }
    }

    /// Wire form, stop bit set on the last byte.
    pub fn encode(&self) -> Vec<u8> {
        let upper = self.byte_length.div_ceil(2);
        let lower = self.byte_length / 2;

        let mut out = vec![0u8; self.byte_length];
        for i in 0..upper {
            let shift = 7 * (upper - i - 1);
            out[i] = (((self.logical >> shift) & 0x7F) << 1) as u8;
        }
        for i in 0..lower {
            let shift = 7 * (lower - i - 1);
            out[upper + i] = (((self.physical >> shift) & 0x7F) << 1) as u8;
        }
        out[self.byte_length - 1] |= 0x01;
        out
    }

    /// Rebuild from the exact bytes consumed off the wire.
    pub fn decode(data: &[u8]) -> G3Result<Self> {
        let (logical, physical) = match *data {
            [a] => (u16::from(a >> 1), 0),
            [a, b] => (u16::from(a >> 1), u16::from(b >> 1)),
            [a, b, c, d] => (
                u16::from(a >> 1) << 7 | u16::from(b >> 1),
                u16::from(c >> 1) << 7 | u16::from(d >> 1),
            ),
            _ => {
                return Err(G3Error::FrameInvalid(format!(
                    "address length {} not one of 1, 2, 4",
                    data.len()
                )));
            }
        };
        let mut address = Self::new_with_physical(logical, physical)?;
        // A short physical id may round-trip through a wider slot.
        address.byte_length = data.len();
        Ok(address)
    }
}

impl fmt::Display for HdlcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}", self.logical)?;
        if self.byte_length > 1 {
            write!(f, "-{:02X}", self.physical)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meter_and_modem_bytes() {
        // The serial management port pins logical 1 and the calling station.
        let meter = HdlcAddress::new(reserved::MANAGEMENT_LOGICAL_DEVICE).unwrap();
        assert_eq!(meter.encode(), vec![0x03]);

        let modem = HdlcAddress::new(reserved::CALLING_STATION).unwrap();
        assert_eq!(modem.encode(), vec![0xFD]);
    }

    #[test]
    fn test_one_byte_round_trip() {
        let addr = HdlcAddress::new(0x10).unwrap();
        let encoded = addr.encode();
        assert_eq!(encoded.len(), 1);
        assert_eq!(HdlcAddress::decode(&encoded).unwrap(), addr);
    }

    #[test]
    fn test_four_byte_round_trip() {
        let addr = HdlcAddress::new_with_physical(0x145, 0x3FFE).unwrap();
        let encoded = addr.encode();
        assert_eq!(encoded.len(), 4);
        let decoded = HdlcAddress::decode(&encoded).unwrap();
        assert_eq!(decoded.logical(), 0x145);
        assert_eq!(decoded.physical(), 0x3FFE);
    }

    #[test]
    fn test_all_station_is_representable() {
        let addr = HdlcAddress::new(reserved::ALL_STATION).unwrap();
        assert!(addr.is_all_station());
        assert_eq!(addr.encode(), vec![0xFF]);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(HdlcAddress::new(0x80).is_err());
        assert!(HdlcAddress::new_with_physical(0x4000, 1).is_err());
        assert!(HdlcAddress::decode(&[0x02, 0x04, 0x07]).is_err());
    }
}
