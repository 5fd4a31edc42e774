//! PSK challenge-response used during the join handshake
//!
//! The coordinator challenges a joining device with a random nonce; the
//! device answers with a keyed digest over the nonce and its own EUI-64
//! so the coordinator can verify possession of the pre-shared key
//! without it ever crossing the medium.

use g3plc_core::{Eui64, G3Error, G3Result};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Length of the challenge nonce issued by the coordinator
pub const NONCE_LEN: usize = 8;

/// Length of the truncated digest carried back in the Joining payload
pub const AUTH_RESPONSE_LEN: usize = 16;

/// 128-bit pre-shared bootstrap key.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Psk([u8; 16]);

impl Psk {
    pub const fn new(key: [u8; 16]) -> Self {
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl std::fmt::Debug for Psk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Psk(..)")
    }
}

/// Group master key distributed inside an Accepted message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupKey {
    pub key_id: u8,
    pub key: [u8; 16],
}

impl GroupKey {
    pub const fn new(key_id: u8, key: [u8; 16]) -> Self {
        Self { key_id, key }
    }
}

/// Compute the response to a coordinator challenge.
///
/// The digest is HMAC-SHA-256 keyed with the PSK over the nonce
/// followed by the device EUI-64, truncated to 16 bytes.
pub fn challenge_response(
    psk: &Psk,
    nonce: &[u8],
    address: &Eui64,
) -> G3Result<[u8; AUTH_RESPONSE_LEN]> {
    let mut mac = HmacSha256::new_from_slice(psk.as_bytes())
        .map_err(|e| G3Error::Protocol(format!("HMAC key setup failed: {}", e)))?;
    mac.update(nonce);
    mac.update(address.as_bytes());
    let digest = mac.finalize().into_bytes();

    let mut response = [0u8; AUTH_RESPONSE_LEN];
    response.copy_from_slice(&digest[..AUTH_RESPONSE_LEN]);
    Ok(response)
}
