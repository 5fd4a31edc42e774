//! RLRQ/RLRE encoding/decoding

use g3plc_core::result::ReleaseReason;
use g3plc_core::{G3Error, G3Result};

use crate::acse::tags;

/// Release request APDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rlrq {
    pub reason: ReleaseReason,
}

impl Rlrq {
    pub fn new(reason: ReleaseReason) -> Self {
        Self { reason }
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_release(tags::RLRQ_APDU, self.reason)
    }

    pub fn decode(bytes: &[u8]) -> G3Result<Self> {
        let reason = decode_release(tags::RLRQ_APDU, "RLRQ", bytes)?;
        Ok(Self { reason })
    }
}

/// Release response APDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rlre {
    pub reason: ReleaseReason,
}

impl Rlre {
    pub fn new(reason: ReleaseReason) -> Self {
        Self { reason }
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_release(tags::RLRE_APDU, self.reason)
    }

    pub fn decode(bytes: &[u8]) -> G3Result<Self> {
        let reason = decode_release(tags::RLRE_APDU, "RLRE", bytes)?;
        Ok(Self { reason })
    }
}

fn encode_release(apdu_tag: u8, reason: ReleaseReason) -> Vec<u8> {
    vec![apdu_tag, 0x03, tags::RELEASE_REASON, 0x01, reason as u8]
}

/// An empty body is accepted and read as a normal release.
fn decode_release(apdu_tag: u8, name: &str, bytes: &[u8]) -> G3Result<ReleaseReason> {
    if bytes.first() != Some(&apdu_tag) {
        return Err(G3Error::Decode(format!("not a {}", name)));
    }
    let body_len = *bytes
        .get(1)
        .ok_or_else(|| G3Error::Decode(format!("truncated {}", name)))? as usize;
    let body = bytes
        .get(2..2 + body_len)
        .ok_or_else(|| G3Error::Decode(format!("{} length mismatch", name)))?;

    if body.is_empty() {
        return Ok(ReleaseReason::Normal);
    }
    if body.len() < 3 || body[0] != tags::RELEASE_REASON || body[1] != 0x01 {
        return Err(G3Error::Decode(format!("malformed {} reason", name)));
    }
    ReleaseReason::from_u8(body[2])
        .ok_or_else(|| G3Error::Decode(format!("unknown release reason {}", body[2])))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rlrq_layout() {
        let rlrq = Rlrq::new(ReleaseReason::Normal);
        assert_eq!(rlrq.encode(), vec![0x62, 0x03, 0x80, 0x01, 0x00]);
        assert_eq!(Rlrq::decode(&rlrq.encode()).unwrap(), rlrq);
    }

    #[test]
    fn test_rlre_empty_body() {
        assert_eq!(
            Rlre::decode(&[0x63, 0x00]).unwrap().reason,
            ReleaseReason::Normal
        );
    }

    #[test]
    fn test_wrong_tag_rejected() {
        assert!(Rlre::decode(&[0x62, 0x00]).is_err());
    }
}
