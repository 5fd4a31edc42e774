//! ACSE association PDUs (AARQ/AARE/RLRQ/RLRE)
//!
//! These are encoded with fixed application/context tags walked strictly in
//! order; there is no general ASN.1 schema underneath.

pub mod aare;
pub mod aarq;
pub mod initiate;
pub mod release;

pub use aare::{Aare, AareUserInfo, SourceDiagnostic};
pub use aarq::Aarq;
pub use initiate::{ConfirmedServiceError, InitiateRequest, InitiateResponse};
pub use release::{Rlre, Rlrq};

/// ACSE APDU and field tags
pub mod tags {
    pub const AARQ_APDU: u8 = 0x60;
    pub const AARE_APDU: u8 = 0x61;
    pub const RLRQ_APDU: u8 = 0x62;
    pub const RLRE_APDU: u8 = 0x63;

    pub const AARQ_PROTOCOL_VERSION: u8 = 0x80;
    pub const AARQ_APP_CONTEXT: u8 = 0xA1;
    pub const AARQ_CALLED_AP_TITLE: u8 = 0xA2;
    pub const AARQ_CALLED_AE_QUALIFIER: u8 = 0xA3;
    pub const AARQ_CALLED_AP_INVOKE_ID: u8 = 0xA4;
    pub const AARQ_CALLED_AE_INVOKE_ID: u8 = 0xA5;
    pub const AARQ_CALLING_AP_TITLE: u8 = 0xA6;
    pub const AARQ_CALLING_AE_QUALIFIER: u8 = 0xA7;
    pub const AARQ_CALLING_AP_INVOKE_ID: u8 = 0xA8;
    pub const AARQ_CALLING_AE_INVOKE_ID: u8 = 0xA9;
    pub const AARQ_ACSE_REQUIREMENTS: u8 = 0x8A;
    pub const AARQ_MECHANISM_NAME: u8 = 0x8B;
    pub const AARQ_AUTH_VALUE: u8 = 0xAC;
    pub const AARQ_IMPLEMENTATION_INFO: u8 = 0xBD;
    pub const AARQ_USER_INFO: u8 = 0xBE;

    pub const AARE_APP_CONTEXT: u8 = 0xA1;
    pub const AARE_RESULT: u8 = 0xA2;
    pub const AARE_SOURCE_DIAGNOSTIC: u8 = 0xA3;
    pub const AARE_ACSE_REQUIREMENTS: u8 = 0x88;
    pub const AARE_MECHANISM_NAME: u8 = 0x89;
    pub const AARE_RESPONDING_AUTH_VALUE: u8 = 0xAA;
    pub const AARE_USER_INFO: u8 = 0xBE;

    /// Associate-source-diagnostic CHOICE tags
    pub const DIAGNOSTIC_SERVICE_USER: u8 = 0xA1;
    pub const DIAGNOSTIC_SERVICE_PROVIDER: u8 = 0xA2;

    /// calling-authentication-value CHOICE tags
    pub const AUTH_VALUE_GRAPHIC_STRING: u8 = 0x80;
    pub const AUTH_VALUE_BIT_STRING: u8 = 0x81;

    pub const RELEASE_REASON: u8 = 0x80;

    /// proposed/negotiated-conformance tag pair
    pub const CONFORMANCE_HI: u8 = 0x5F;
    pub const CONFORMANCE_LO: u8 = 0x1F;
}

/// Application context identifiers carried in the context OID's last arc
pub mod context {
    pub const LOGICAL_NAME: u8 = 1;
    pub const SHORT_NAME: u8 = 2;
    pub const LOGICAL_NAME_CIPHERED: u8 = 3;
    pub const SHORT_NAME_CIPHERED: u8 = 4;
}

/// Authentication mechanism identifiers carried in the mechanism OID's last arc
pub mod mechanism {
    pub const LOWEST: u8 = 0;
    pub const LOW_LEVEL: u8 = 1;
    pub const HIGH_LEVEL: u8 = 2;
}

/// joint-iso-ctt country-name prefix shared by the DLMS OIDs
const OID_PREFIX: [u8; 5] = [0x60, 0x85, 0x74, 0x05, 0x08];

const OID_BRANCH_CONTEXT: u8 = 1;
const OID_BRANCH_MECHANISM: u8 = 2;

/// Application-context-name OID body for the given context id
pub fn context_oid(id: u8) -> [u8; 7] {
    let mut oid = [0u8; 7];
    oid[..5].copy_from_slice(&OID_PREFIX);
    oid[5] = OID_BRANCH_CONTEXT;
    oid[6] = id;
    oid
}

/// Mechanism-name OID body for the given mechanism id
pub fn mechanism_oid(id: u8) -> [u8; 7] {
    let mut oid = [0u8; 7];
    oid[..5].copy_from_slice(&OID_PREFIX);
    oid[5] = OID_BRANCH_MECHANISM;
    oid[6] = id;
    oid
}

/// Parses a 7-byte DLMS OID body, returning (branch, id)
pub fn parse_oid(body: &[u8]) -> Option<(u8, u8)> {
    if body.len() == 7 && body[..5] == OID_PREFIX {
        Some((body[5], body[6]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_oid_logical_name() {
        assert_eq!(
            context_oid(context::LOGICAL_NAME),
            [0x60, 0x85, 0x74, 0x05, 0x08, 0x01, 0x01]
        );
    }

    #[test]
    fn test_parse_oid() {
        let oid = mechanism_oid(mechanism::LOW_LEVEL);
        assert_eq!(parse_oid(&oid), Some((2, 1)));
        assert_eq!(parse_oid(&[0x60; 7]), None);
        assert_eq!(parse_oid(&oid[..6]), None);
    }
}
