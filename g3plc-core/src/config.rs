//! Association configuration
//!
//! Each client/server association slot carries a wrapper port pair, an
//! authentication mechanism and a low-level-security password. Servers keep
//! up to [`MAX_ASSOCIATIONS`] slots; the slot index doubles as the
//! association identifier on both sides.

use serde::{Deserialize, Serialize};

use crate::address::Eui64;

/// Maximum number of association slots held by a server
pub const MAX_ASSOCIATIONS: usize = 4;

/// Fixed length of a low-level-security password
pub const LLS_PASSWORD_LEN: usize = 8;

/// Maximum number of objects a server registers in its OBIS table
pub const MAX_OBIS_OBJECTS: usize = 60;

/// Maximum objects a client may queue in a single cycle request list
pub const MAX_OBJECTS_PER_REQUEST: usize = 24;

/// DLMS version carried in the InitiateRequest/Response
pub const DLMS_VERSION: u8 = 6;

/// server-max-receive-pdu-size granted in the InitiateResponse
pub const SERVER_MAX_APDU_SIZE: u16 = 0xF7;

/// VAA name returned for logical-name referencing
pub const VAA_NAME: u16 = 0x0007;

/// Conformance granted by the server: get, selective-access and
/// block-transfer-with-get
pub const SERVER_CONFORMANCE: u32 = 0x00_10_14;

/// Conformance proposed by the client: get, set, action, selective-access,
/// event-notification and both block-transfer directions
pub const CLIENT_CONFORMANCE: u32 = 0x00_18_1F;

/// Authentication mechanism of one association
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum AuthMechanism {
    /// No authentication value exchanged
    Lowest = 0,
    /// Low-level security, password in the AARQ calling-authentication-value
    LowLevel = 1,
}

/// How the LLS password of an association is obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PasswordType {
    /// Password configured verbatim
    Fixed,
    /// Password derived from the peer's extended address
    DerivedFromAddress,
}

/// One association slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationConfig {
    /// Wrapper port of the calling side (client)
    pub source_wport: u16,
    /// Wrapper port of the called side (server)
    pub destination_wport: u16,
    pub password_type: PasswordType,
    pub password: [u8; LLS_PASSWORD_LEN],
    pub mechanism: AuthMechanism,
}

impl AssociationConfig {
    pub fn new(
        source_wport: u16,
        destination_wport: u16,
        password_type: PasswordType,
        password: [u8; LLS_PASSWORD_LEN],
        mechanism: AuthMechanism,
    ) -> Self {
        Self {
            source_wport,
            destination_wport,
            password_type,
            password,
            mechanism,
        }
    }

    /// Slot with low-level security and a fixed password
    pub fn low_level(source_wport: u16, destination_wport: u16, password: &[u8; LLS_PASSWORD_LEN]) -> Self {
        Self::new(
            source_wport,
            destination_wport,
            PasswordType::Fixed,
            *password,
            AuthMechanism::LowLevel,
        )
    }

    /// Slot with no authentication; the stored password is never sent
    pub fn lowest_level(source_wport: u16, destination_wport: u16) -> Self {
        Self::new(
            source_wport,
            destination_wport,
            PasswordType::Fixed,
            *b"--------",
            AuthMechanism::Lowest,
        )
    }

    /// Password to present to the given peer.
    ///
    /// Returns `None` for [`AuthMechanism::Lowest`] since no authentication
    /// value may be sent at all.
    pub fn password_for(&self, peer: &Eui64) -> Option<[u8; LLS_PASSWORD_LEN]> {
        match self.mechanism {
            AuthMechanism::Lowest => None,
            AuthMechanism::LowLevel => match self.password_type {
                PasswordType::Fixed => Some(self.password),
                PasswordType::DerivedFromAddress => Some(derive_address_password(peer)),
            },
        }
    }
}

/// Derives the serial-number password from an extended address.
///
/// The password is the literal prefix `ATM` followed by the last five
/// ASCII-hex digits of address bytes 3 to 5, which is where the meter
/// serial ends up inside the EUI-64.
pub fn derive_address_password(peer: &Eui64) -> [u8; LLS_PASSWORD_LEN] {
    fn hex(nibble: u8) -> u8 {
        if nibble > 9 { nibble + 0x37 } else { nibble + 0x30 }
    }

    let addr = peer.as_bytes();
    [
        b'A',
        b'T',
        b'M',
        hex(addr[3] & 0x0F),
        hex(addr[4] >> 4),
        hex(addr[4] & 0x0F),
        hex(addr[5] >> 4),
        hex(addr[5] & 0x0F),
    ]
}
