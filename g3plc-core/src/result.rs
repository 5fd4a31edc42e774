//! Protocol result enumerations
//!
//! These carry the numeric values defined by the DLMS Green Book; the
//! discriminants go straight onto the wire.

use serde::{Deserialize, Serialize};

/// Data-Access-Result returned inside GET/SET responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataAccessResult {
    Success = 0,
    HardwareFault = 1,
    TemporaryFailure = 2,
    ReadWriteDenied = 3,
    ObjectUndefined = 4,
    ObjectClassInconsistent = 9,
    ObjectUnavailable = 11,
    TypeUnmatched = 12,
    ScopeOfAccessViolated = 13,
    DataBlockUnavailable = 14,
    LongGetAborted = 15,
    NoLongGetInProgress = 16,
    LongSetAborted = 17,
    NoLongSetInProgress = 18,
    DataBlockNumberInvalid = 19,
    OtherReason = 250,
}

impl DataAccessResult {
    pub fn from_u8(value: u8) -> Option<Self> {
        let result = match value {
            0 => Self::Success,
            1 => Self::HardwareFault,
            2 => Self::TemporaryFailure,
            3 => Self::ReadWriteDenied,
            4 => Self::ObjectUndefined,
            9 => Self::ObjectClassInconsistent,
            11 => Self::ObjectUnavailable,
            12 => Self::TypeUnmatched,
            13 => Self::ScopeOfAccessViolated,
            14 => Self::DataBlockUnavailable,
            15 => Self::LongGetAborted,
            16 => Self::NoLongGetInProgress,
            17 => Self::LongSetAborted,
            18 => Self::NoLongSetInProgress,
            19 => Self::DataBlockNumberInvalid,
            250 => Self::OtherReason,
            _ => return None,
        };
        Some(result)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Terminal result of one client exchange, delivered through the response
/// callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ClientResult {
    /// Exchange still in flight
    Waiting = 0,
    Success = 1,
    Timeout = 2,
    TxError = 3,
    RxFail = 4,
    Disconnected = 5,
    FormatError = 6,
    Released = 7,
    /// The association index does not exist in the configuration
    AaIdxError = 8,
}

impl ClientResult {
    /// Whether this result ends the exchange (anything but Waiting)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Waiting)
    }
}

/// Association result carried in the AARE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AssociationResult {
    Accepted = 0,
    RejectedPermanent = 1,
    RejectedTransient = 2,
}

impl AssociationResult {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Accepted),
            1 => Some(Self::RejectedPermanent),
            2 => Some(Self::RejectedTransient),
            _ => None,
        }
    }
}

/// acse-service-user diagnostic values in the AARE source-diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ServiceUserDiagnostic {
    Null = 0,
    NoReasonGiven = 1,
    ApplicationContextNameNotSupported = 2,
    AuthenticationMechanismNameNotRecognised = 11,
    AuthenticationMechanismNameRequired = 12,
    AuthenticationFailure = 13,
    AuthenticationRequired = 14,
}

impl ServiceUserDiagnostic {
    pub fn from_u8(value: u8) -> Option<Self> {
        let diag = match value {
            0 => Self::Null,
            1 => Self::NoReasonGiven,
            2 => Self::ApplicationContextNameNotSupported,
            11 => Self::AuthenticationMechanismNameNotRecognised,
            12 => Self::AuthenticationMechanismNameRequired,
            13 => Self::AuthenticationFailure,
            14 => Self::AuthenticationRequired,
            _ => return None,
        };
        Some(diag)
    }
}

/// acse-service-provider diagnostic values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ServiceProviderDiagnostic {
    Null = 0,
    NoReasonGiven = 1,
    NoCommonAcseVersion = 2,
}

/// initiate ServiceError values carried in a ConfirmedServiceError
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum InitiateError {
    Other = 0,
    DlmsVersionTooLow = 1,
    IncompatibleConformance = 2,
    PduSizeTooShort = 3,
    RefusedByVdeHandler = 4,
}

impl InitiateError {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Other),
            1 => Some(Self::DlmsVersionTooLow),
            2 => Some(Self::IncompatibleConformance),
            3 => Some(Self::PduSizeTooShort),
            4 => Some(Self::RefusedByVdeHandler),
            _ => None,
        }
    }
}

/// RLRQ/RLRE release reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ReleaseReason {
    Normal = 0,
    Urgent = 1,
    UserDefined = 30,
}

impl ReleaseReason {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Normal),
            1 => Some(Self::Urgent),
            30 => Some(Self::UserDefined),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_access_result_round_trip() {
        for dar in [
            DataAccessResult::Success,
            DataAccessResult::ScopeOfAccessViolated,
            DataAccessResult::ObjectUndefined,
            DataAccessResult::DataBlockNumberInvalid,
            DataAccessResult::OtherReason,
        ] {
            assert_eq!(DataAccessResult::from_u8(dar as u8), Some(dar));
        }
        assert_eq!(DataAccessResult::from_u8(100), None);
    }

    #[test]
    fn test_client_result_terminal() {
        assert!(!ClientResult::Waiting.is_terminal());
        assert!(ClientResult::Timeout.is_terminal());
        assert!(ClientResult::AaIdxError.is_terminal());
    }

    #[test]
    fn test_diagnostic_values() {
        assert_eq!(ServiceUserDiagnostic::AuthenticationFailure as u8, 13);
        assert_eq!(
            ServiceUserDiagnostic::from_u8(2),
            Some(ServiceUserDiagnostic::ApplicationContextNameNotSupported)
        );
        assert_eq!(ServiceUserDiagnostic::from_u8(9), None);
    }
}
