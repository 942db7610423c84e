//! Raw public keys and their canonical `npub` display encoding (NIP-19).

use crate::error::{Error, Result};
use bech32::primitives::decode::CheckedHrpstring;
use bech32::{Bech32, Hrp};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

const NPUB_HRP: Hrp = Hrp::parse_unchecked("npub");

pub const PUBLIC_KEY_LEN: usize = 32;

/// Raw x-only public key as carried in relay events and filters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_LEN]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; PUBLIC_KEY_LEN] = bytes.try_into().map_err(|_| {
            Error::MalformedIdentity(format!(
                "expected {} key bytes, got {}",
                PUBLIC_KEY_LEN,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| Error::MalformedIdentity(format!("invalid hex key: {}", e)))?;
        Self::from_slice(&bytes)
    }

    /// Accepts either 64-char hex or an `npub1...` string.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.get(..4).is_some_and(|p| p.eq_ignore_ascii_case("npub")) {
            decode(s)
        } else {
            Self::from_hex(s)
        }
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_npub(&self) -> String {
        encode(self)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Canonical display encoding of a raw key.
pub fn encode(key: &PublicKey) -> String {
    // A 32-byte payload is far below the bech32 length limit.
    bech32::encode::<Bech32>(NPUB_HRP, key.as_bytes()).expect("npub payload fits bech32 limits")
}

/// Inverse of [`encode`].
pub fn decode(display_id: &str) -> Result<PublicKey> {
    let checked = CheckedHrpstring::new::<Bech32>(display_id.trim())
        .map_err(|e| Error::MalformedIdentity(format!("invalid npub: {}", e)))?;
    if checked.hrp() != NPUB_HRP {
        return Err(Error::MalformedIdentity(format!(
            "expected npub prefix, got '{}'",
            checked.hrp()
        )));
    }
    let bytes: Vec<u8> = checked.byte_iter().collect();
    PublicKey::from_slice(&bytes)
}
