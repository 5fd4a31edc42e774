//! HDLC type 3 frame codec

use crate::hdlc::address::HdlcAddress;
use crate::hdlc::fcs::FcsCalc;
use g3plc_core::{G3Error, G3Result};
use std::fmt;

/// Opening and closing frame delimiter.
pub const FLAG: u8 = 0x7E;

/// LLC bytes ahead of a client APDU.
pub const LLC_COMMAND: [u8; 3] = [0xE6, 0xE6, 0x00];

/// LLC bytes ahead of a server APDU.
pub const LLC_RESPONSE: [u8; 3] = [0xE6, 0xE7, 0x00];

const FORMAT_TYPE: u8 = 0xA0;
const SEGMENTATION_BIT: u8 = 0x08;
const LENGTH_HIGH_MASK: u8 = 0x07;
const POLL_FINAL_BIT: u8 = 0x10;

/// Longest frame body the 11-bit length field can describe.
pub const MAX_FRAME_LENGTH: usize = 0x07FF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Information,
    ReceiveReady,
    ReceiveNotReady,
    SetNormalResponseMode,
    Disconnect,
    UnnumberedAcknowledge,
    DisconnectMode,
    FrameReject,
    UnnumberedInformation,
}

impl FrameType {
    /// Classify a control byte, ignoring the poll/final bit.
    pub fn from_control(control: u8) -> Option<Self> {
        if control & 0x01 == 0 {
            return Some(FrameType::Information);
        }
        match control & 0x0F {
            0x01 => return Some(FrameType::ReceiveReady),
            0x05 => return Some(FrameType::ReceiveNotReady),
            _ => {}
        }
        match control & !POLL_FINAL_BIT {
            0x83 => Some(FrameType::SetNormalResponseMode),
            0x43 => Some(FrameType::Disconnect),
            0x63 => Some(FrameType::UnnumberedAcknowledge),
            0x0F => Some(FrameType::DisconnectMode),
            0x87 => Some(FrameType::FrameReject),
            0x03 => Some(FrameType::UnnumberedInformation),
            _ => None,
        }
    }

    /// Control byte for an unnumbered frame of this type.
    pub fn control(self, poll_final: bool) -> u8 {
        let base = match self {
            FrameType::Information => 0x00,
            FrameType::ReceiveReady => 0x01,
            FrameType::ReceiveNotReady => 0x05,
            FrameType::SetNormalResponseMode => 0x83,
            FrameType::Disconnect => 0x43,
            FrameType::UnnumberedAcknowledge => 0x63,
            FrameType::DisconnectMode => 0x0F,
            FrameType::FrameReject => 0x87,
            FrameType::UnnumberedInformation => 0x03,
        };
        if poll_final { base | POLL_FINAL_BIT } else { base }
    }
}

/// A complete HDLC frame between flags.
///
/// Frames without an information field close with a single check
/// sequence; frames carrying one insert a header check sequence after
/// the control byte and a frame check sequence after the payload. The
/// frame check covers everything between the flags except itself.
#[derive(Debug, Clone, PartialEq)]
pub struct HdlcFrame {
    destination: HdlcAddress,
    source: HdlcAddress,
    control: u8,
    segmented: bool,
    information: Vec<u8>,
}

impl HdlcFrame {
    /// Client-to-server frame wrapping an APDU behind the command LLC.
    pub fn command(destination: HdlcAddress, source: HdlcAddress, apdu: &[u8]) -> Self {
        let mut information = Vec::with_capacity(LLC_COMMAND.len() + apdu.len());
        information.extend_from_slice(&LLC_COMMAND);
        information.extend_from_slice(apdu);
        Self {
            destination,
            source,
            control: FrameType::UnnumberedInformation.control(true),
            segmented: false,
            information,
        }
    }

    /// Server-to-client frame wrapping an APDU behind the response LLC.
    pub fn response(destination: HdlcAddress, source: HdlcAddress, apdu: &[u8]) -> Self {
        let mut information = Vec::with_capacity(LLC_RESPONSE.len() + apdu.len());
        information.extend_from_slice(&LLC_RESPONSE);
        information.extend_from_slice(apdu);
        Self {
            destination,
            source,
            control: FrameType::UnnumberedInformation.control(false),
            segmented: false,
            information,
        }
    }

    /// Supervisory or unnumbered frame without an information field.
    pub fn unnumbered(
        destination: HdlcAddress,
        source: HdlcAddress,
        frame_type: FrameType,
        poll_final: bool,
    ) -> Self {
        Self {
            destination,
            source,
            control: frame_type.control(poll_final),
            segmented: false,
            information: Vec::new(),
        }
    }

    pub fn destination(&self) -> HdlcAddress {
        self.destination
    }

    pub fn source(&self) -> HdlcAddress {
        self.source
    }

    pub fn control(&self) -> u8 {
        self.control
    }

    pub fn frame_type(&self) -> FrameType {
        // Constructors and decode only admit classifiable control bytes.
        FrameType::from_control(self.control).unwrap_or(FrameType::UnnumberedInformation)
    }

    pub fn is_segmented(&self) -> bool {
        self.segmented
    }

    pub fn information(&self) -> &[u8] {
        &self.information
    }

    /// Send sequence number of an information frame.
    pub fn send_sequence(&self) -> Option<u8> {
        match self.frame_type() {
            FrameType::Information => Some((self.control >> 1) & 0x07),
            _ => None,
        }
    }

    /// Receive sequence number of an information or supervisory frame.
    pub fn receive_sequence(&self) -> Option<u8> {
        match self.frame_type() {
            FrameType::Information | FrameType::ReceiveReady | FrameType::ReceiveNotReady => {
                Some((self.control >> 5) & 0x07)
            }
            _ => None,
        }
    }

    /// Payload with the LLC bytes stripped, when either LLC form leads it.
    pub fn apdu(&self) -> Option<&[u8]> {
        let llc = self.information.get(..3)?;
        if llc == LLC_COMMAND || llc == LLC_RESPONSE {
            Some(&self.information[3..])
        } else {
            None
        }
    }

    /// Serialize the frame, flags included.
    pub fn encode(&self) -> G3Result<Vec<u8>> {
        let destination = self.destination.encode();
        let source = self.source.encode();

        let check_len = if self.information.is_empty() { 2 } else { 4 };
        let body_len =
            2 + destination.len() + source.len() + 1 + self.information.len() + check_len;
        if body_len > MAX_FRAME_LENGTH {
            return Err(G3Error::FrameInvalid(format!(
                "frame body of {body_len} bytes exceeds the 11-bit length field"
            )));
        }

        let mut out = Vec::with_capacity(body_len + 2);
        let mut fcs = FcsCalc::new();
        out.push(FLAG);

        let format_high = FORMAT_TYPE
            | if self.segmented { SEGMENTATION_BIT } else { 0 }
            | ((body_len >> 8) as u8 & LENGTH_HIGH_MASK);
        out.push(format_high);
        out.push((body_len & 0xFF) as u8);
        fcs.update(format_high);
        fcs.update((body_len & 0xFF) as u8);

        out.extend_from_slice(&destination);
        fcs.update_slice(&destination);
        out.extend_from_slice(&source);
        fcs.update_slice(&source);

        out.push(self.control);
        fcs.update(self.control);

        if self.information.is_empty() {
            out.extend_from_slice(&fcs.value_bytes());
        } else {
            let hcs = fcs.value_bytes();
            out.extend_from_slice(&hcs);
            fcs.update_slice(&hcs);

            out.extend_from_slice(&self.information);
            fcs.update_slice(&self.information);
            out.extend_from_slice(&fcs.value_bytes());
        }

        out.push(FLAG);
        Ok(out)
    }

    /// Parse a complete frame, flags included.
    pub fn decode(frame: &[u8]) -> G3Result<Self> {
        if frame.len() < 9 {
            return Err(G3Error::FrameInvalid(format!(
                "frame of {} bytes is shorter than the fixed fields",
                frame.len()
            )));
        }
        if frame[0] != FLAG || frame[frame.len() - 1] != FLAG {
            return Err(G3Error::FrameInvalid("missing frame delimiter".into()));
        }

        let body = &frame[1..frame.len() - 1];
        let format_high = body[0];
        if format_high & 0xF0 != FORMAT_TYPE {
            return Err(G3Error::FrameInvalid(format!(
                "frame format {:#04x} is not type 3",
                format_high >> 4
            )));
        }
        let segmented = format_high & SEGMENTATION_BIT != 0;
        let length =
            (usize::from(format_high & LENGTH_HIGH_MASK) << 8) | usize::from(body[1]);
        if length != body.len() {
            return Err(G3Error::FrameInvalid(format!(
                "length field {} does not match {} body bytes",
                length,
                body.len()
            )));
        }

        let mut fcs = FcsCalc::new();
        fcs.update_slice(&body[..2]);
        let mut pos = 2;

        let destination = Self::read_address(body, &mut pos, &mut fcs)?;
        let source = Self::read_address(body, &mut pos, &mut fcs)?;

        let control = *body
            .get(pos)
            .ok_or_else(|| G3Error::FrameInvalid("frame ends before control byte".into()))?;
        if FrameType::from_control(control).is_none() {
            return Err(G3Error::FrameInvalid(format!(
                "control byte {control:#04x} unknown"
            )));
        }
        fcs.update(control);
        pos += 1;

        let remaining = body.len() - pos;
        let information = if remaining == 2 {
            fcs.update_slice(&body[pos..]);
            fcs.validate()?;
            Vec::new()
        } else if remaining >= 5 {
            let mut hcs = fcs;
            hcs.update_slice(&body[pos..pos + 2]);
            hcs.validate()?;
            fcs.update_slice(&body[pos..pos + 2]);
            pos += 2;

            let information = body[pos..body.len() - 2].to_vec();
            fcs.update_slice(&body[pos..]);
            fcs.validate()?;
            information
        } else {
            return Err(G3Error::FrameInvalid(format!(
                "{remaining} bytes after control fit neither frame form"
            )));
        };

        Ok(Self {
            destination,
            source,
            control,
            segmented,
            information,
        })
    }

    fn read_address(body: &[u8], pos: &mut usize, fcs: &mut FcsCalc) -> G3Result<HdlcAddress> {
        let start = *pos;
        loop {
            let byte = *body
                .get(*pos)
                .ok_or_else(|| G3Error::FrameInvalid("frame ends inside an address".into()))?;
            fcs.update(byte);
            *pos += 1;
            if byte & 0x01 != 0 {
                break;
            }
            if *pos - start == 4 {
                return Err(G3Error::FrameInvalid(
                    "address runs past four bytes without a stop bit".into(),
                ));
            }
        }
        HdlcAddress::decode(&body[start..*pos])
    }
}

impl fmt::Display for HdlcFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} -> {} ({} bytes)",
            self.frame_type(),
            self.source,
            self.destination,
            self.information.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hdlc::address::reserved;

    fn meter() -> HdlcAddress {
        HdlcAddress::new(reserved::MANAGEMENT_LOGICAL_DEVICE).unwrap()
    }

    fn modem() -> HdlcAddress {
        HdlcAddress::new(reserved::CALLING_STATION).unwrap()
    }

    #[test]
    fn test_command_frame_layout() {
        let apdu = [0xC0, 0x01, 0x81];
        let frame = HdlcFrame::command(meter(), modem(), &apdu);
        let bytes = frame.encode().unwrap();

        // flag, format, length, addresses, control
        assert_eq!(bytes[0], FLAG);
        assert_eq!(bytes[1], 0xA0);
        assert_eq!(bytes[2], (bytes.len() - 2) as u8);
        assert_eq!(bytes[3], 0x03);
        assert_eq!(bytes[4], 0xFD);
        assert_eq!(bytes[5], 0x13);
        // LLC sits right after the header check
        assert_eq!(&bytes[8..11], &LLC_COMMAND);
        assert_eq!(*bytes.last().unwrap(), FLAG);
        // overhead around the APDU is fixed at 14 bytes
        assert_eq!(bytes.len(), apdu.len() + 14);
    }

    #[test]
    fn test_command_frame_round_trip() {
        let apdu = [0xC0, 0x01, 0x81, 0x00, 0x01, 0x00, 0x00, 0x01, 0x08, 0x00, 0xFF, 0x02];
        let frame = HdlcFrame::command(meter(), modem(), &apdu);
        let decoded = HdlcFrame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(decoded, frame);
        assert_eq!(decoded.frame_type(), FrameType::UnnumberedInformation);
        assert_eq!(decoded.apdu(), Some(&apdu[..]));
    }

    #[test]
    fn test_snrm_has_single_check_sequence() {
        let frame = HdlcFrame::unnumbered(meter(), modem(), FrameType::SetNormalResponseMode, true);
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes.len(), 9);
        assert_eq!(bytes[5], 0x93);

        let decoded = HdlcFrame::decode(&bytes).unwrap();
        assert_eq!(decoded.frame_type(), FrameType::SetNormalResponseMode);
        assert!(decoded.information().is_empty());
    }

    #[test]
    fn test_eleven_bit_length_spans_both_format_bytes() {
        let apdu = vec![0x55; 300];
        let frame = HdlcFrame::response(modem(), meter(), &apdu);
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes[1], 0xA1);
        assert_eq!(bytes[2], 0x38);

        let decoded = HdlcFrame::decode(&bytes).unwrap();
        assert_eq!(decoded.apdu(), Some(&apdu[..]));
    }

    #[test]
    fn test_corrupted_payload_rejected() {
        let frame = HdlcFrame::command(meter(), modem(), &[0xC0, 0x01]);
        let mut bytes = frame.encode().unwrap();
        let mid = bytes.len() - 4;
        bytes[mid] ^= 0x40;
        assert!(HdlcFrame::decode(&bytes).is_err());
    }

    #[test]
    fn test_corrupted_header_rejected_by_header_check() {
        let frame = HdlcFrame::command(meter(), modem(), &[0xC0, 0x01]);
        let mut bytes = frame.encode().unwrap();
        // another valid one-byte address, so only the HCS can catch it
        bytes[3] = 0x07;
        assert!(HdlcFrame::decode(&bytes).is_err());
    }

    #[test]
    fn test_length_field_mismatch_rejected() {
        let frame = HdlcFrame::command(meter(), modem(), &[0xC0]);
        let mut bytes = frame.encode().unwrap();
        bytes[2] = bytes[2].wrapping_add(1);
        assert!(HdlcFrame::decode(&bytes).is_err());
    }

    #[test]
    fn test_information_frame_sequence_numbers() {
        // I-frame control: send 2, receive 5, poll set
        let mut frame = HdlcFrame::command(meter(), modem(), &[0x01]);
        frame.control = (2 << 1) | (5 << 5) | 0x10;
        let decoded = HdlcFrame::decode(&frame.encode().unwrap()).unwrap();
        assert_eq!(decoded.frame_type(), FrameType::Information);
        assert_eq!(decoded.send_sequence(), Some(2));
        assert_eq!(decoded.receive_sequence(), Some(5));
    }
}
