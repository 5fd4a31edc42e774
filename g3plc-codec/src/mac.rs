//! MAC transmit-request serialization for the modem host interface
//!
//! The modem takes one parameter block per transmission: a fixed-size
//! transmit request, a fixed-size MAC header, then the MSDU. Fields are
//! written out explicitly, little-endian as the MAC layer transmits them.

use g3plc_core::{Eui64, G3Error, G3Result, PanId, ShortAddress};

/// Largest MSDU accepted for a single transmission
pub const MAX_MSDU_LEN: usize = 494;

/// Encoded size of [`TxRequest`]
pub const TX_REQUEST_LEN: usize = 23;

/// Encoded size of [`MacHeader`]
pub const MAC_HEADER_LEN: usize = 34;

/// PHY modulation selected for a transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ModulationType {
    #[default]
    Robust = 0,
    DbpskBpsk = 1,
    DqpskQpsk = 2,
    D8psk8psk = 3,
    Qam16 = 4,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ModulationScheme {
    #[default]
    Differential = 0,
    Coherent = 1,
}

/// MAC-layer address in one of the 802.15.4 addressing modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MacAddress {
    #[default]
    None,
    Short(ShortAddress),
    Extended(Eui64),
}

impl MacAddress {
    /// Addressing-mode code as carried in the frame control field
    pub fn mode(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Short(_) => 2,
            Self::Extended(_) => 3,
        }
    }

    /// Mode byte plus an 8-byte address slot; short addresses occupy the
    /// first two bytes of the slot
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.mode());
        let mut slot = [0u8; 8];
        match self {
            Self::None => {}
            Self::Short(addr) => slot[..2].copy_from_slice(&addr.value().to_le_bytes()),
            Self::Extended(addr) => slot.copy_from_slice(addr.as_bytes()),
        }
        out.extend_from_slice(&slot);
    }
}

/// 802.15.4 frame control field. Addressing modes are filled in from the
/// header addresses at encode time; the frame version is always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameControl {
    pub frame_type: FrameType,
    pub security_enabled: bool,
    pub frame_pending: bool,
    pub ack_request: bool,
    pub pan_id_compression: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum FrameType {
    Beacon = 0,
    #[default]
    Data = 1,
    Ack = 2,
    Command = 3,
}

impl FrameControl {
    fn to_u16(self, dest_mode: u8, src_mode: u8) -> u16 {
        (self.frame_type as u16)
            | (u16::from(self.security_enabled) << 3)
            | (u16::from(self.frame_pending) << 4)
            | (u16::from(self.ack_request) << 5)
            | (u16::from(self.pan_id_compression) << 6)
            | (u16::from(dest_mode) << 10)
            | (u16::from(src_mode) << 14)
    }
}

/// Segmentation control leading every G3 MAC frame, 24 bits on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentControl {
    pub tone_map_response: bool,
    pub contention_control: bool,
    pub channel_access_priority: bool,
    pub last_segment: bool,
    /// Segment index, 6 bits
    pub segment_count: u8,
    /// Segment payload length, 10 bits
    pub segment_length: u16,
}

impl SegmentControl {
    /// Control word for an unsegmented frame of the given length
    pub fn single(segment_length: u16) -> Self {
        Self {
            last_segment: true,
            segment_length,
            ..Default::default()
        }
    }

    pub fn to_bytes(self) -> [u8; 3] {
        let flags = (u8::from(self.tone_map_response) << 4)
            | (u8::from(self.contention_control) << 5)
            | (u8::from(self.channel_access_priority) << 6)
            | (u8::from(self.last_segment) << 7);
        let tail =
            (u16::from(self.segment_count & 0x3F) | ((self.segment_length & 0x03FF) << 6))
                .to_le_bytes();
        [flags, tail[0], tail[1]]
    }

    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        let tail = u16::from_le_bytes([bytes[1], bytes[2]]);
        Self {
            tone_map_response: bytes[0] & 0x10 != 0,
            contention_control: bytes[0] & 0x20 != 0,
            channel_access_priority: bytes[0] & 0x40 != 0,
            last_segment: bytes[0] & 0x80 != 0,
            segment_count: (tail & 0x3F) as u8,
            segment_length: tail >> 6,
        }
    }
}

/// MAC header preceding the MSDU. Address slots are fixed-size so the
/// encoded header length never varies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MacHeader {
    pub segment_control: SegmentControl,
    pub frame_control: FrameControl,
    pub sequence_number: u8,
    pub destination_pan: PanId,
    pub destination: MacAddress,
    pub source_pan: PanId,
    pub source: MacAddress,
    pub security_level: u8,
    pub frame_counter: u32,
    pub key_index: u8,
}

impl MacHeader {
    fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.segment_control.to_bytes());
        let fc = self
            .frame_control
            .to_u16(self.destination.mode(), self.source.mode());
        out.extend_from_slice(&fc.to_le_bytes());
        out.push(self.sequence_number);
        out.extend_from_slice(&self.destination_pan.value().to_le_bytes());
        self.destination.encode_into(out);
        out.extend_from_slice(&self.source_pan.value().to_le_bytes());
        self.source.encode_into(out);
        out.push(self.security_level);
        out.extend_from_slice(&self.frame_counter.to_le_bytes());
        out.push(self.key_index);
    }
}

/// Transmission parameters handed to the modem alongside each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TxRequest {
    pub destination: MacAddress,
    pub tx_gain: u8,
    pub tx_coef: [u8; 6],
    pub tx_res: u8,
    pub modulation_type: ModulationType,
    pub modulation_scheme: ModulationScheme,
    pub tone_map: [u8; 3],
    pub request_ack: bool,
    pub high_priority: bool,
    pub tone_map_request: bool,
    pub force_robust: bool,
}

impl TxRequest {
    fn encode_into(&self, out: &mut Vec<u8>) {
        self.destination.encode_into(out);
        out.push(self.tx_gain);
        out.extend_from_slice(&self.tx_coef);
        out.push(self.tx_res);
        out.push(self.modulation_type as u8);
        out.push(self.modulation_scheme as u8);
        out.extend_from_slice(&self.tone_map);
        out.push(
            u8::from(self.request_ack)
                | (u8::from(self.high_priority) << 1)
                | (u8::from(self.tone_map_request) << 2)
                | (u8::from(self.force_robust) << 3),
        );
    }
}

/// Serialize one transmission as request parameters, MAC header, MSDU
pub fn encode_tx(request: &TxRequest, header: &MacHeader, msdu: &[u8]) -> G3Result<Vec<u8>> {
    if msdu.is_empty() || msdu.len() > MAX_MSDU_LEN {
        return Err(G3Error::Encode(format!(
            "MSDU length {} outside 1..={}",
            msdu.len(),
            MAX_MSDU_LEN
        )));
    }
    let mut out = Vec::with_capacity(TX_REQUEST_LEN + MAC_HEADER_LEN + msdu.len());
    request.encode_into(&mut out);
    header.encode_into(&mut out);
    out.extend_from_slice(msdu);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_header() -> MacHeader {
        MacHeader {
            frame_control: FrameControl {
                frame_type: FrameType::Data,
                ack_request: true,
                ..Default::default()
            },
            sequence_number: 7,
            destination_pan: PanId(0x781D),
            destination: MacAddress::Short(ShortAddress(0x0001)),
            source_pan: PanId(0x781D),
            source: MacAddress::Short(ShortAddress(0x0000)),
            ..Default::default()
        }
    }

    #[test]
    fn test_encode_tx_layout() {
        let request = TxRequest {
            destination: MacAddress::Short(ShortAddress(0x0001)),
            request_ack: true,
            ..Default::default()
        };
        let msdu = [0xDE, 0xAD, 0xBE, 0xEF];
        let bytes = encode_tx(&request, &data_header(), &msdu).unwrap();

        assert_eq!(bytes.len(), TX_REQUEST_LEN + MAC_HEADER_LEN + msdu.len());
        assert_eq!(&bytes[bytes.len() - 4..], &msdu);
        assert_eq!(bytes[0], 2);
        assert_eq!(&bytes[1..3], &[0x01, 0x00]);
    }

    #[test]
    fn test_encode_tx_rejects_bad_msdu_length() {
        let request = TxRequest::default();
        let header = MacHeader::default();
        assert!(encode_tx(&request, &header, &[]).is_err());
        assert!(encode_tx(&request, &header, &[0u8; MAX_MSDU_LEN + 1]).is_err());
        assert!(encode_tx(&request, &header, &[0u8; MAX_MSDU_LEN]).is_ok());
    }

    #[test]
    fn test_frame_control_data_frame_bytes() {
        let header = data_header();
        let mut out = Vec::new();
        header.encode_into(&mut out);
        assert_eq!(out.len(), MAC_HEADER_LEN);
        assert_eq!(&out[3..5], &[0x21, 0x88]);
    }

    #[test]
    fn test_segment_control_round_trip() {
        let control = SegmentControl {
            last_segment: true,
            segment_count: 5,
            segment_length: 0x1F3,
            ..Default::default()
        };
        assert_eq!(SegmentControl::from_bytes(control.to_bytes()), control);
        assert!(SegmentControl::single(100).last_segment);
    }

    #[test]
    fn test_extended_address_slot() {
        let addr = Eui64::new([1, 2, 3, 4, 5, 6, 7, 8]);
        let mut out = Vec::new();
        MacAddress::Extended(addr).encode_into(&mut out);
        assert_eq!(out[0], 3);
        assert_eq!(&out[1..9], addr.as_bytes());
    }
}
