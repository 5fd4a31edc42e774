//! AARE encoding/decoding

use g3plc_core::result::{
    AssociationResult, InitiateError, ServiceProviderDiagnostic, ServiceUserDiagnostic,
};
use g3plc_core::{G3Error, G3Result};

use crate::acse::initiate::{ConfirmedServiceError, InitiateResponse};
use crate::acse::{context, context_oid, parse_oid, tags};
use crate::axdr::{AxdrDecoder, AxdrEncoder};

/// Associate-source-diagnostic CHOICE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceDiagnostic {
    User(ServiceUserDiagnostic),
    Provider(ServiceProviderDiagnostic),
}

impl SourceDiagnostic {
    fn choice_tag(&self) -> u8 {
        match self {
            Self::User(_) => tags::DIAGNOSTIC_SERVICE_USER,
            Self::Provider(_) => tags::DIAGNOSTIC_SERVICE_PROVIDER,
        }
    }

    fn code(&self) -> u8 {
        match self {
            Self::User(d) => *d as u8,
            Self::Provider(d) => *d as u8,
        }
    }
}

/// user-information payload of an AARE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AareUserInfo {
    Initiate(InitiateResponse),
    ServiceError(ConfirmedServiceError),
}

/// Association response APDU
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aare {
    pub context_id: u8,
    pub result: AssociationResult,
    pub diagnostic: SourceDiagnostic,
    pub user_info: Option<AareUserInfo>,
}

impl Aare {
    /// Successful association carrying the negotiated InitiateResponse
    pub fn accepted(initiate: InitiateResponse) -> Self {
        Self {
            context_id: context::LOGICAL_NAME,
            result: AssociationResult::Accepted,
            diagnostic: SourceDiagnostic::User(ServiceUserDiagnostic::Null),
            user_info: Some(AareUserInfo::Initiate(initiate)),
        }
    }

    /// Rejection with an ACSE-level diagnostic only
    pub fn rejected(result: AssociationResult, diagnostic: SourceDiagnostic) -> Self {
        Self {
            context_id: context::LOGICAL_NAME,
            result,
            diagnostic,
            user_info: None,
        }
    }

    /// Rejection caused by the xDLMS initiate negotiation
    pub fn initiate_error(result: AssociationResult, error: InitiateError) -> Self {
        Self {
            context_id: context::LOGICAL_NAME,
            result,
            diagnostic: SourceDiagnostic::User(ServiceUserDiagnostic::NoReasonGiven),
            user_info: Some(AareUserInfo::ServiceError(ConfirmedServiceError::new(error))),
        }
    }

    pub fn encode(&self) -> G3Result<Vec<u8>> {
        let mut body = AxdrEncoder::new();

        body.write_u8(tags::AARE_APP_CONTEXT);
        body.write_u8(0x09);
        body.write_u8(0x06);
        body.write_u8(0x07);
        body.write_bytes(&context_oid(self.context_id));

        body.write_u8(tags::AARE_RESULT);
        body.write_u8(0x03);
        body.write_u8(0x02);
        body.write_u8(0x01);
        body.write_u8(self.result as u8);

        body.write_u8(tags::AARE_SOURCE_DIAGNOSTIC);
        body.write_u8(0x05);
        body.write_u8(self.diagnostic.choice_tag());
        body.write_u8(0x03);
        body.write_u8(0x02);
        body.write_u8(0x01);
        body.write_u8(self.diagnostic.code());

        if let Some(user_info) = &self.user_info {
            let payload = match user_info {
                AareUserInfo::Initiate(initiate) => initiate.encode(),
                AareUserInfo::ServiceError(error) => error.encode(),
            };
            body.write_u8(tags::AARE_USER_INFO);
            body.write_u8(payload.len() as u8 + 2);
            body.write_u8(0x04);
            body.write_u8(payload.len() as u8);
            body.write_bytes(&payload);
        }

        let mut out = AxdrEncoder::new();
        out.write_u8(tags::AARE_APDU);
        out.encode_length(body.len())?;
        out.write_bytes(body.as_bytes());
        Ok(out.into_bytes())
    }

    pub fn decode(bytes: &[u8]) -> G3Result<Self> {
        let mut decoder = AxdrDecoder::new(bytes);
        let tag = decoder.read_u8()?;
        if tag != tags::AARE_APDU {
            return Err(G3Error::Decode(format!("not an AARE: 0x{:02X}", tag)));
        }
        let body_len = decoder.decode_length()?;
        if body_len != decoder.remaining() {
            return Err(G3Error::Decode("AARE length mismatch".to_string()));
        }

        let mut context_id = None;
        let mut result = None;
        let mut diagnostic = None;
        let mut user_info = None;

        while !decoder.is_empty() {
            let field_tag = decoder.read_u8()?;
            let field_len = decoder.decode_length()?;
            let field = decoder.read_bytes(field_len)?;

            match field_tag {
                tags::AARE_APP_CONTEXT => {
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
                tags::AARE_RESULT => {
                    if field.len() != 3 || field[0] != 0x02 || field[1] != 0x01 {
                        return Err(G3Error::Decode("malformed association result".to_string()));
                    }
                    result = Some(AssociationResult::from_u8(field[2]).ok_or_else(|| {
                        G3Error::Decode(format!("unknown association result {}", field[2]))
                    })?);
                }
                tags::AARE_SOURCE_DIAGNOSTIC => {
                    if field.len() != 5 || field[1] != 0x03 || field[2] != 0x02 || field[3] != 0x01
                    {
                        return Err(G3Error::Decode("malformed source diagnostic".to_string()));
                    }
                    diagnostic = Some(match field[0] {
                        tags::DIAGNOSTIC_SERVICE_USER => SourceDiagnostic::User(
                            ServiceUserDiagnostic::from_u8(field[4]).ok_or_else(|| {
                                G3Error::Decode(format!("unknown user diagnostic {}", field[4]))
                            })?,
                        ),
                        tags::DIAGNOSTIC_SERVICE_PROVIDER => match field[4] {
                            0 => SourceDiagnostic::Provider(ServiceProviderDiagnostic::Null),
                            1 => {
                                SourceDiagnostic::Provider(ServiceProviderDiagnostic::NoReasonGiven)
                            }
                            2 => SourceDiagnostic::Provider(
                                ServiceProviderDiagnostic::NoCommonAcseVersion,
                            ),
                            other => {
                                return Err(G3Error::Decode(format!(
                                    "unknown provider diagnostic {}",
                                    other
                                )));
                            }
                        },
                        other => {
                            return Err(G3Error::Decode(format!(
                                "unknown diagnostic choice 0x{:02X}",
                                other
                            )));
                        }
                    });
                }
                tags::AARE_USER_INFO => {
                    if field.len() < 2 || field[0] != 0x04 || field[1] as usize != field.len() - 2 {
                        return Err(G3Error::Decode("malformed user information".to_string()));
                    }
                    let payload = &field[2..];
                    user_info = Some(if ConfirmedServiceError::matches(payload) {
                        AareUserInfo::ServiceError(ConfirmedServiceError::decode(payload)?)
                    } else {
                        AareUserInfo::Initiate(InitiateResponse::decode(payload)?)
                    });
                }
                tags::AARE_ACSE_REQUIREMENTS
                | tags::AARE_MECHANISM_NAME
                | tags::AARE_RESPONDING_AUTH_VALUE => {}
                other => {
                    return Err(G3Error::Decode(format!(
                        "unexpected AARE field tag 0x{:02X}",
                        other
                    )));
                }
            }
        }

        let context_id = context_id
            .ok_or_else(|| G3Error::Decode("AARE missing application context".to_string()))?;
        let result =
            result.ok_or_else(|| G3Error::Decode("AARE missing association result".to_string()))?;
        let diagnostic = diagnostic
            .ok_or_else(|| G3Error::Decode("AARE missing source diagnostic".to_string()))?;

        Ok(Self {
            context_id,
            result,
            diagnostic,
            user_info,
        })
    }

    pub fn is_accepted(&self) -> bool {
        self.result == AssociationResult::Accepted
    }
}
