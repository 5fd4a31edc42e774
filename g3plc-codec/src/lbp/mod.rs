//! LBP (LoWPAN Bootstrapping Protocol) frame codec
//!
//! LBP frames carry the join handshake between a bootstrapping device and
//! the bootstrap server. Every frame is a two-byte header, the 8-byte
//! EUI-64 of the bootstrapping device, then opaque bootstrapping data.
//! Messages are built into a fresh buffer, header first.

mod config;

pub use config::{ConfigParam, ParamError, ParameterResult, decode_params, encode_params, params};

use g3plc_core::{Eui64, G3Error, G3Result};

/// Two header bytes plus the EUI-64 of the bootstrapping device
pub const LBP_HEADER_LEN: usize = 2 + 8;

/// Message type, carried in the upper nibble of the first header byte.
///
/// The top bit of the nibble gives the direction: values below 8 originate
/// from the joining device, values 8 and above from the bootstrap server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LbpMessageType {
    /// Device requests to join the network
    Joining = 1,
    /// Device announces that it is leaving the network
    KickFromDevice = 4,
    /// Server accepts the join; bootstrapping data carries the
    /// configuration parameters
    Accepted = 9,
    /// Server challenges the device during authentication
    Challenge = 10,
    /// Server refuses the join
    Decline = 11,
    /// Server expels the device from the network
    KickToDevice = 12,
}

impl LbpMessageType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Joining),
            4 => Some(Self::KickFromDevice),
            9 => Some(Self::Accepted),
            10 => Some(Self::Challenge),
            11 => Some(Self::Decline),
            12 => Some(Self::KickToDevice),
            _ => None,
        }
    }

    /// True for message types sent by the bootstrap server
    pub fn is_from_server(self) -> bool {
        (self as u8) & 0x08 != 0
    }
}

/// Medium the frame was (or should be) exchanged on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum MediaType {
    #[default]
    Plc = 0,
    Rf = 1,
}

/// One LBP frame.
///
/// The second header byte is a reserved transaction id and is always zero
/// on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LbpMessage {
    pub msg_type: LbpMessageType,
    pub media_type: MediaType,
    pub disable_backup: bool,
    /// EUI-64 of the bootstrapping device the frame concerns
    pub address: Eui64,
    /// Opaque bootstrapping data (EAP payload or configuration TLVs)
    pub payload: Vec<u8>,
}

impl LbpMessage {
    /// Join request from a device. The backup medium is always disabled
    /// for the initial exchange.
    pub fn joining(address: Eui64, media_type: MediaType, payload: Vec<u8>) -> Self {
        Self {
            msg_type: LbpMessageType::Joining,
            media_type,
            disable_backup: true,
            address,
            payload,
        }
    }

    /// Authentication challenge from the server
    pub fn challenge(
        address: Eui64,
        media_type: MediaType,
        disable_backup: bool,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            msg_type: LbpMessageType::Challenge,
            media_type,
            disable_backup,
            address,
            payload,
        }
    }

    /// Join acceptance from the server, carrying configuration TLVs
    pub fn accepted(
        address: Eui64,
        media_type: MediaType,
        disable_backup: bool,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            msg_type: LbpMessageType::Accepted,
            media_type,
            disable_backup,
            address,
            payload,
        }
    }

    /// Join refusal from the server
    pub fn decline(address: Eui64, media_type: MediaType, disable_backup: bool) -> Self {
        Self {
            msg_type: LbpMessageType::Decline,
            media_type,
            disable_backup,
            address,
            payload: Vec::new(),
        }
    }

    /// Leave announcement from a device. Kick frames carry no flags and
    /// no bootstrapping data.
    pub fn kick_from_device(address: Eui64) -> Self {
        Self {
            msg_type: LbpMessageType::KickFromDevice,
            media_type: MediaType::Plc,
            disable_backup: false,
            address,
            payload: Vec::new(),
        }
    }

    /// Expulsion order from the server
    pub fn kick_to_device(address: Eui64) -> Self {
        Self {
            msg_type: LbpMessageType::KickToDevice,
            media_type: MediaType::Plc,
            disable_backup: false,
            address,
            payload: Vec::new(),
        }
    }

    /// Serialize header, address and bootstrapping data into a fresh buffer
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(LBP_HEADER_LEN + self.payload.len());
        out.push(
            ((self.msg_type as u8) << 4)
                | ((self.media_type as u8) << 3)
                | (u8::from(self.disable_backup) << 2),
        );
        out.push(0);
        out.extend_from_slice(self.address.as_bytes());
        out.extend_from_slice(&self.payload);
        out
    }

    pub fn decode(bytes: &[u8]) -> G3Result<Self> {
        if bytes.len() < LBP_HEADER_LEN {
            return Err(G3Error::Decode(format!(
                "LBP frame too short: {} bytes",
                bytes.len()
            )));
        }
        let msg_type = LbpMessageType::from_u8(bytes[0] >> 4).ok_or_else(|| {
            G3Error::Decode(format!("unknown LBP message type {}", bytes[0] >> 4))
        })?;
        let media_type = if bytes[0] & 0x08 != 0 {
            MediaType::Rf
        } else {
            MediaType::Plc
        };
        Ok(Self {
            msg_type,
            media_type,
            disable_backup: bytes[0] & 0x04 != 0,
            address: Eui64::from_bytes(&bytes[2..10])?,
            payload: bytes[10..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_addr() -> Eui64 {
        Eui64::new([0x00, 0x13, 0xA2, 0x00, 0x40, 0xB5, 0x12, 0x34])
    }

    #[test]
    fn test_joining_round_trip() {
        let data = vec![0x01, 0x02, 0x03, 0x04];
        let message = LbpMessage::joining(device_addr(), MediaType::Plc, data.clone());
        let bytes = message.encode();

        assert_eq!(bytes[0], 0x14);
        assert_eq!(bytes[1], 0x00);
        assert_eq!(&bytes[2..10], device_addr().as_bytes());
        assert_eq!(&bytes[10..], &data[..]);

        let decoded = LbpMessage::decode(&bytes).unwrap();
        assert_eq!(decoded.msg_type, LbpMessageType::Joining);
        assert_eq!(decoded.address, device_addr());
        assert_eq!(decoded.payload, data);
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_kick_frame_has_no_flags() {
        let bytes = LbpMessage::kick_from_device(device_addr()).encode();
        assert_eq!(bytes.len(), LBP_HEADER_LEN);
        assert_eq!(bytes[0], 0x40);

        let decoded = LbpMessage::decode(&bytes).unwrap();
        assert_eq!(decoded.msg_type, LbpMessageType::KickFromDevice);
        assert!(decoded.payload.is_empty());
    }

    #[test]
    fn test_challenge_flag_bits() {
        let message = LbpMessage::challenge(device_addr(), MediaType::Rf, true, vec![0xAA]);
        let bytes = message.encode();
        assert_eq!(bytes[0], 0xAC);

        let decoded = LbpMessage::decode(&bytes).unwrap();
        assert_eq!(decoded.media_type, MediaType::Rf);
        assert!(decoded.disable_backup);
    }

    #[test]
    fn test_decode_rejects_short_frame() {
        let bytes = LbpMessage::kick_to_device(device_addr()).encode();
        assert!(LbpMessage::decode(&bytes[..9]).is_err());
        assert!(LbpMessage::decode(&[]).is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let mut bytes = LbpMessage::kick_to_device(device_addr()).encode();
        bytes[0] = 0x20;
        assert!(LbpMessage::decode(&bytes).is_err());
    }

    #[test]
    fn test_direction_bit() {
        assert!(!LbpMessageType::Joining.is_from_server());
        assert!(!LbpMessageType::KickFromDevice.is_from_server());
        assert!(LbpMessageType::Accepted.is_from_server());
        assert!(LbpMessageType::Challenge.is_from_server());
        assert!(LbpMessageType::Decline.is_from_server());
        assert!(LbpMessageType::KickToDevice.is_from_server());
    }
}
