//! xDLMS InitiateRequest/InitiateResponse and ConfirmedServiceError
//!
//! These ride inside the user-information field of AARQ/AARE.

use g3plc_core::config::{DLMS_VERSION, VAA_NAME};
use g3plc_core::result::InitiateError;
use g3plc_core::{G3Error, G3Result};

use crate::acse::tags;
use crate::axdr::{AxdrDecoder, AxdrEncoder};

const INITIATE_REQUEST_TAG: u8 = 0x01;
const INITIATE_RESPONSE_TAG: u8 = 0x08;
const CONFIRMED_SERVICE_ERROR_TAG: u8 = 0x0E;

/// ConfirmedServiceError CHOICE: initiateError
const CSE_INITIATE_ERROR: u8 = 1;
/// ServiceError CHOICE: initiate
const SE_INITIATE: u8 = 6;

/// xDLMS InitiateRequest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitiateRequest {
    pub dlms_version: u8,
    pub proposed_conformance: u32,
    pub client_max_pdu_size: u16,
}

impl InitiateRequest {
    pub fn new(proposed_conformance: u32, client_max_pdu_size: u16) -> Self {
        Self {
            dlms_version: DLMS_VERSION,
            proposed_conformance,
            client_max_pdu_size,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = AxdrEncoder::with_capacity(14);
        encoder.write_u8(INITIATE_REQUEST_TAG);
        // dedicated-key absent, response-allowed default, QoS absent
        encoder.write_u8(0x00);
        encoder.write_u8(0x00);
        encoder.write_u8(0x00);
        encoder.write_u8(self.dlms_version);
        encode_conformance(&mut encoder, self.proposed_conformance);
        encoder.write_u16(self.client_max_pdu_size);
        encoder.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> G3Result<Self> {
        let mut decoder = AxdrDecoder::new(bytes);
        let tag = decoder.read_u8()?;
        if tag != INITIATE_REQUEST_TAG {
            return Err(G3Error::Decode(format!(
                "not an InitiateRequest: 0x{:02X}",
                tag
            )));
        }
        for field in ["dedicated-key", "response-allowed", "quality-of-service"] {
            if decoder.read_u8()? != 0x00 {
                return Err(G3Error::Decode(format!("unsupported {} value", field)));
            }
        }
        let dlms_version = decoder.read_u8()?;
        let proposed_conformance = decode_conformance(&mut decoder)?;
        let client_max_pdu_size = decoder.read_u16()?;
        Ok(Self {
            dlms_version,
            proposed_conformance,
            client_max_pdu_size,
        })
    }
}

/// xDLMS InitiateResponse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitiateResponse {
    pub dlms_version: u8,
    pub negotiated_conformance: u32,
    pub server_max_pdu_size: u16,
    pub vaa_name: u16,
}

impl InitiateResponse {
    pub fn new(negotiated_conformance: u32, server_max_pdu_size: u16) -> Self {
        Self {
            dlms_version: DLMS_VERSION,
            negotiated_conformance,
            server_max_pdu_size,
            vaa_name: VAA_NAME,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = AxdrEncoder::with_capacity(14);
        encoder.write_u8(INITIATE_RESPONSE_TAG);
        // negotiated QoS absent
        encoder.write_u8(0x00);
        encoder.write_u8(self.dlms_version);
        encode_conformance(&mut encoder, self.negotiated_conformance);
        encoder.write_u16(self.server_max_pdu_size);
        encoder.write_u16(self.vaa_name);
        encoder.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> G3Result<Self> {
        let mut decoder = AxdrDecoder::new(bytes);
        let tag = decoder.read_u8()?;
        if tag != INITIATE_RESPONSE_TAG {
            return Err(G3Error::Decode(format!(
                "not an InitiateResponse: 0x{:02X}",
                tag
            )));
        }
        if decoder.read_u8()? != 0x00 {
            return Err(G3Error::Decode(
                "negotiated quality-of-service not supported".to_string(),
            ));
        }
        let dlms_version = decoder.read_u8()?;
        let negotiated_conformance = decode_conformance(&mut decoder)?;
        let server_max_pdu_size = decoder.read_u16()?;
        let vaa_name = decoder.read_u16()?;
        Ok(Self {
            dlms_version,
            negotiated_conformance,
            server_max_pdu_size,
            vaa_name,
        })
    }
}

/// ConfirmedServiceError carrying an initiate failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedServiceError {
    pub error: InitiateError,
}

impl ConfirmedServiceError {
    pub fn new(error: InitiateError) -> Self {
        Self { error }
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![
            CONFIRMED_SERVICE_ERROR_TAG,
            CSE_INITIATE_ERROR,
            SE_INITIATE,
            self.error as u8,
        ]
    }

    pub fn decode(bytes: &[u8]) -> G3Result<Self> {
        if bytes.len() < 4 || bytes[0] != CONFIRMED_SERVICE_ERROR_TAG {
            return Err(G3Error::Decode("not a ConfirmedServiceError".to_string()));
        }
        if bytes[1] != CSE_INITIATE_ERROR || bytes[2] != SE_INITIATE {
            return Err(G3Error::Decode(format!(
                "unsupported service error choice {}/{}",
                bytes[1], bytes[2]
            )));
        }
        let error = InitiateError::from_u8(bytes[3])
            .ok_or_else(|| G3Error::Decode(format!("unknown initiate error {}", bytes[3])))?;
        Ok(Self { error })
    }

    /// Whether a user-information payload holds a service error rather than
    /// an InitiateResponse
    pub fn matches(bytes: &[u8]) -> bool {
        bytes.first() == Some(&CONFIRMED_SERVICE_ERROR_TAG)
    }
}

/// Writes the conformance block: tag pair, length, unused-bits byte and
/// three bitmap bytes
fn encode_conformance(encoder: &mut AxdrEncoder, conformance: u32) {
    encoder.write_u8(tags::CONFORMANCE_HI);
    encoder.write_u8(tags::CONFORMANCE_LO);
    encoder.write_u8(0x04);
    encoder.write_u8(0x00);
    let bytes = conformance.to_be_bytes();
    encoder.write_bytes(&bytes[1..]);
}

fn decode_conformance(decoder: &mut AxdrDecoder<'_>) -> G3Result<u32> {
    if decoder.read_u8()? != tags::CONFORMANCE_HI || decoder.read_u8()? != tags::CONFORMANCE_LO {
        return Err(G3Error::Decode("missing conformance tag".to_string()));
    }
    if decoder.read_u8()? != 0x04 {
        return Err(G3Error::Decode("bad conformance length".to_string()));
    }
    // unused-bits byte
    decoder.read_u8()?;
    let bytes = decoder.read_bytes(3)?;
    Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use g3plc_core::config::{CLIENT_CONFORMANCE, SERVER_CONFORMANCE, SERVER_MAX_APDU_SIZE};

    #[test]
    fn test_initiate_request_layout() {
        let request = InitiateRequest::new(CLIENT_CONFORMANCE, 0x0400);
        let bytes = request.encode();
        assert_eq!(
            bytes,
            vec![
                0x01, 0x00, 0x00, 0x00, 0x06, 0x5F, 0x1F, 0x04, 0x00, 0x00, 0x18, 0x1F, 0x04,
                0x00
            ]
        );
        assert_eq!(InitiateRequest::decode(&bytes).unwrap(), request);
    }

    #[test]
    fn test_initiate_response_layout() {
        let response = InitiateResponse::new(SERVER_CONFORMANCE, SERVER_MAX_APDU_SIZE);
        let bytes = response.encode();
        assert_eq!(
            bytes,
            vec![
                0x08, 0x00, 0x06, 0x5F, 0x1F, 0x04, 0x00, 0x00, 0x10, 0x14, 0x00, 0xF7, 0x00,
                0x07
            ]
        );
        assert_eq!(InitiateResponse::decode(&bytes).unwrap(), response);
    }

    #[test]
    fn test_confirmed_service_error() {
        let error = ConfirmedServiceError::new(InitiateError::IncompatibleConformance);
        let bytes = error.encode();
        assert_eq!(bytes, vec![0x0E, 0x01, 0x06, 0x02]);
        assert!(ConfirmedServiceError::matches(&bytes));
        assert_eq!(ConfirmedServiceError::decode(&bytes).unwrap(), error);
    }
}
