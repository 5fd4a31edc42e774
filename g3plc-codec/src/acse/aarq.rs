//! AARQ encoding/decoding

use g3plc_core::{G3Error, G3Result};

use crate::acse::initiate::InitiateRequest;
use crate::acse::{context, mechanism, tags};
use crate::acse::{context_oid, mechanism_oid, parse_oid};
use crate::axdr::{AxdrDecoder, AxdrEncoder};

/// Shortest AARQ the decoder will look at
const MIN_APDU_LEN: usize = 0x0C;

/// Association request APDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aarq {
    pub context_id: u8,
    pub mechanism_id: Option<u8>,
    pub password: Option<Vec<u8>>,
    pub initiate: InitiateRequest,
}

impl Aarq {
    /// Request without authentication; no ACSE requirement, mechanism or
    /// authentication-value field is emitted
    pub fn lowest_level(initiate: InitiateRequest) -> Self {
        Self {
            context_id: context::LOGICAL_NAME,
            mechanism_id: None,
            password: None,
            initiate,
        }
    }

    /// Low-level-security request carrying the password as a graphic string
    pub fn low_level(password: &[u8], initiate: InitiateRequest) -> Self {
        Self {
            context_id: context::LOGICAL_NAME,
            mechanism_id: Some(mechanism::LOW_LEVEL),
            password: Some(password.to_vec()),
            initiate,
        }
    }

    pub fn encode(&self) -> G3Result<Vec<u8>> {
        let mut body = AxdrEncoder::new();

        body.write_u8(tags::AARQ_APP_CONTEXT);
        body.write_u8(0x09);
        body.write_u8(0x06);
        body.write_u8(0x07);
        body.write_bytes(&context_oid(self.context_id));

        if let Some(mechanism_id) = self.mechanism_id {
            body.write_u8(tags::AARQ_ACSE_REQUIREMENTS);
            body.write_u8(0x02);
            body.write_u8(0x07);
            body.write_u8(0x80);

            body.write_u8(tags::AARQ_MECHANISM_NAME);
            body.write_u8(0x07);
            body.write_bytes(&mechanism_oid(mechanism_id));
        }

        if let Some(password) = &self.password {
            let len = u8::try_from(password.len())
                .map_err(|_| G3Error::Encode("password too long".to_string()))?;
            body.write_u8(tags::AARQ_AUTH_VALUE);
            body.write_u8(len + 2);
            body.write_u8(tags::AUTH_VALUE_GRAPHIC_STRING);
            body.write_u8(len);
            body.write_bytes(password);
        }

        let initiate = self.initiate.encode();
        body.write_u8(tags::AARQ_USER_INFO);
        body.write_u8(initiate.len() as u8 + 2);
        body.write_u8(0x04);
        body.write_u8(initiate.len() as u8);
        body.write_bytes(&initiate);

        let mut out = AxdrEncoder::new();
        out.write_u8(tags::AARQ_APDU);
        out.encode_length(body.len())?;
        out.write_bytes(body.as_bytes());
        Ok(out.into_bytes())
    }

    pub fn decode(bytes: &[u8]) -> G3Result<Self> {
        if bytes.len() < MIN_APDU_LEN {
            return Err(G3Error::Decode("AARQ too short".to_string()));
        }
        let mut decoder = AxdrDecoder::new(bytes);
        let tag = decoder.read_u8()?;
        if tag != tags::AARQ_APDU {
            return Err(G3Error::Decode(format!("not an AARQ: 0x{:02X}", tag)));
        }
        let body_len = decoder.decode_length()?;
        if body_len != decoder.remaining() {
            return Err(G3Error::Decode("AARQ length mismatch".to_string()));
        }

        let mut context_id = None;
        let mut mechanism_id = None;
        let mut password = None;
        let mut initiate = None;

        while !decoder.is_empty() {
            let field_tag = decoder.read_u8()?;
            let field_len = decoder.decode_length()?;
            let field = decoder.read_bytes(field_len)?;

            match field_tag {
                tags::AARQ_APP_CONTEXT => {
                    if field.len() != 9 || field[0] != 0x06 || field[1] != 0x07 {
                        return Err(G3Error::Decode("malformed application context".to_string()));
                    }
                    match parse_oid(&field[2..]) {
                        Some((1, id)) => context_id = Some(id),
                        _ => {
                            return Err(G3Error::Decode(
                                "application context OID invalid".to_string(),
                            ));
                        }
                    }
                }
                tags::AARQ_MECHANISM_NAME => match parse_oid(field) {
                    Some((2, id)) => mechanism_id = Some(id),
                    _ => return Err(G3Error::Decode("mechanism OID invalid".to_string())),
                },
                tags::AARQ_AUTH_VALUE => {
                    if field.len() < 2 || field[0] != tags::AUTH_VALUE_GRAPHIC_STRING {
                        return Err(G3Error::Decode(
                            "unsupported authentication value form".to_string(),
                        ));
                    }
                    let pw_len = field[1] as usize;
                    if field.len() != pw_len + 2 {
                        return Err(G3Error::Decode(
                            "authentication value length mismatch".to_string(),
                        ));
                    }
                    password = Some(field[2..].to_vec());
                }
                tags::AARQ_USER_INFO => {
                    if field.len() < 2 || field[0] != 0x04 || field[1] as usize != field.len() - 2 {
                        return Err(G3Error::Decode("malformed user information".to_string()));
                    }
                    initiate = Some(InitiateRequest::decode(&field[2..])?);
                }
                tags::AARQ_PROTOCOL_VERSION
                | tags::AARQ_ACSE_REQUIREMENTS
                | tags::AARQ_IMPLEMENTATION_INFO
                | tags::AARQ_CALLED_AP_TITLE..=tags::AARQ_CALLING_AE_INVOKE_ID => {}
                other => {
                    return Err(G3Error::Decode(format!(
                        "unexpected AARQ field tag 0x{:02X}",
                        other
                    )));
                }
            }
        }

        let context_id = context_id
            .ok_or_else(|| G3Error::Decode("AARQ missing application context".to_string()))?;
        let initiate =
            initiate.ok_or_else(|| G3Error::Decode("AARQ missing user information".to_string()))?;

        Ok(Self {
            context_id,
            mechanism_id,
            password,
            initiate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use g3plc_core::config::CLIENT_CONFORMANCE;

    fn initiate() -> InitiateRequest {
        InitiateRequest::new(CLIENT_CONFORMANCE, 0x0400)
    }

    #[test]
    fn test_lowest_level_has_no_auth_tags() {
        let bytes = Aarq::lowest_level(initiate()).encode().unwrap();
        assert_eq!(bytes[0], 0x60);
        assert!(!bytes.contains(&tags::AARQ_AUTH_VALUE));
        assert!(!bytes.contains(&tags::AARQ_MECHANISM_NAME));

        let decoded = Aarq::decode(&bytes).unwrap();
        assert_eq!(decoded.mechanism_id, None);
        assert_eq!(decoded.password, None);
    }

    #[test]
    fn test_low_level_carries_password() {
        let bytes = Aarq::low_level(b"00000002", initiate()).encode().unwrap();
        let auth_pos = bytes
            .iter()
            .position(|b| *b == tags::AARQ_AUTH_VALUE)
            .unwrap();
        assert_eq!(bytes[auth_pos + 1], 10);
        assert_eq!(bytes[auth_pos + 2], tags::AUTH_VALUE_GRAPHIC_STRING);
        assert_eq!(bytes[auth_pos + 3], 8);
        assert_eq!(&bytes[auth_pos + 4..auth_pos + 12], b"00000002");

        let decoded = Aarq::decode(&bytes).unwrap();
        assert_eq!(decoded.mechanism_id, Some(mechanism::LOW_LEVEL));
        assert_eq!(decoded.password.as_deref(), Some(b"00000002".as_slice()));
        assert_eq!(decoded.initiate, initiate());
    }

    #[test]
    fn test_decode_rejects_short_apdu() {
        assert!(Aarq::decode(&[0x60, 0x03, 0xA1, 0x01, 0x00]).is_err());
    }
}
