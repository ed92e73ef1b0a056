use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hash;
use crate::keys::{PublicKey, SignatureError, KEY_PREFIX};

/// Version bytes of the two legacy wallet address generations, newest
/// first. Together with the compressed/uncompressed axis they give every
/// public key four legacy aliases on top of its modern address.
pub const LEGACY_ADDRESS_VERSIONS: [u8; 2] = [56, 0];

// ── Address ──────────────────────────────────────────────────────────────────

/// A 160-bit wallet address.
///
/// The modern form is RIPEMD-160(SHA-512(compressed key)); legacy forms
/// hash the version byte over SHA-256 of the (compressed or uncompressed)
/// key bytes. Authorities may reference any of the five forms.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address([u8; 20]);

impl Address {
    pub fn from_bytes(raw: [u8; 20]) -> Self {
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The modern address of a public key.
    pub fn from_public_key(key: &PublicKey) -> Self {
        Self(hash::ripemd160(&hash::sha512(key.as_bytes())))
    }

    /// A legacy wallet address for the given encoding and version byte.
    pub fn legacy_from_public_key(key: &PublicKey, compressed: bool, version: u8) -> Self {
        let key_digest = if compressed {
            hash::sha256(key.as_bytes())
        } else {
            hash::sha256(&key.to_uncompressed_bytes())
        };
        let mut versioned = [0u8; 33];
        versioned[0] = version;
        versioned[1..].copy_from_slice(&key_digest);
        Self(hash::ripemd160(&versioned))
    }

    /// All five address forms of a key, modern form first.
    pub fn all_forms(key: &PublicKey) -> [Address; 5] {
        [
            Self::from_public_key(key),
            Self::legacy_from_public_key(key, false, LEGACY_ADDRESS_VERSIONS[0]),
            Self::legacy_from_public_key(key, true, LEGACY_ADDRESS_VERSIONS[0]),
            Self::legacy_from_public_key(key, false, LEGACY_ADDRESS_VERSIONS[1]),
            Self::legacy_from_public_key(key, true, LEGACY_ADDRESS_VERSIONS[1]),
        ]
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut data = [0u8; 24];
        data[..20].copy_from_slice(&self.0);
        let check = hash::ripemd160(&self.0);
        data[20..].copy_from_slice(&check[..4]);
        write!(f, "{}{}", KEY_PREFIX, bs58::encode(&data).into_string())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(KEY_PREFIX)
            .ok_or(SignatureError::InvalidBase58 { kind: "address" })?;
        let bytes = bs58::decode(body)
            .into_vec()
            .map_err(|_| SignatureError::InvalidBase58 { kind: "address" })?;
        if bytes.len() != 24 {
            return Err(SignatureError::InvalidBase58 { kind: "address" });
        }
        let check = hash::ripemd160(&bytes[..20]);
        if check[..4] != bytes[20..] {
            return Err(SignatureError::ChecksumMismatch);
        }
        let mut raw = [0u8; 20];
        raw.copy_from_slice(&bytes[..20]);
        Ok(Self(raw))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
