use std::fmt;
use std::str::FromStr;

use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::hash;

/// Prefix for the human-readable base58 form of keys and addresses.
pub const KEY_PREFIX: &str = "EPX";

/// Length of a compact recoverable signature: 1 header byte + r + s.
pub const COMPACT_SIGNATURE_BYTES: usize = 65;

/// Header byte of a compact signature for recovery id 0 (compressed-key
/// convention: 27 + 4 + recovery_id).
const COMPACT_HEADER_BASE: u8 = 31;

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("invalid public key encoding")]
    InvalidPublicKey,

    #[error("invalid secret key encoding")]
    InvalidSecretKey,

    #[error("invalid compact signature header byte {header}")]
    InvalidRecoveryHeader { header: u8 },

    #[error("malformed compact signature")]
    MalformedSignature,

    #[error("public key recovery failed")]
    RecoveryFailed,

    #[error("invalid base58 encoding for {kind}")]
    InvalidBase58 { kind: &'static str },

    #[error("base58 checksum mismatch")]
    ChecksumMismatch,
}

// ── PublicKey ────────────────────────────────────────────────────────────────

/// A secp256k1 public key in compressed SEC1 form (33 bytes).
///
/// `Ord` is lexicographic on the compressed bytes; this is the canonical
/// key order used by authority containers and the signature minimizer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PublicKey([u8; 33]);

impl PublicKey {
    /// Validate and wrap raw compressed SEC1 bytes.
    pub fn from_bytes(raw: [u8; 33]) -> Result<Self, SignatureError> {
        VerifyingKey::from_sec1_bytes(&raw).map_err(|_| SignatureError::InvalidPublicKey)?;
        Ok(Self(raw))
    }

    pub(crate) fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(true);
        let mut raw = [0u8; 33];
        raw.copy_from_slice(point.as_bytes());
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; 33] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; 33] {
        self.0
    }

    /// Re-encode as the 65-byte uncompressed SEC1 point.
    pub fn to_uncompressed_bytes(&self) -> [u8; 65] {
        let key = VerifyingKey::from_sec1_bytes(&self.0)
            .expect("stored bytes are a validated curve point");
        let point = key.to_encoded_point(false);
        let mut raw = [0u8; 65];
        raw.copy_from_slice(point.as_bytes());
        raw
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut data = [0u8; 37];
        data[..33].copy_from_slice(&self.0);
        let check = hash::ripemd160(&self.0);
        data[33..].copy_from_slice(&check[..4]);
        write!(f, "{}{}", KEY_PREFIX, bs58::encode(&data).into_string())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self)
    }
}

impl FromStr for PublicKey {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix(KEY_PREFIX).ok_or(SignatureError::InvalidBase58 {
            kind: "public key",
        })?;
        let bytes = bs58::decode(body)
            .into_vec()
            .map_err(|_| SignatureError::InvalidBase58 { kind: "public key" })?;
        if bytes.len() != 37 {
            return Err(SignatureError::InvalidBase58 { kind: "public key" });
        }
        let check = hash::ripemd160(&bytes[..33]);
        if check[..4] != bytes[33..] {
            return Err(SignatureError::ChecksumMismatch);
        }
        let mut raw = [0u8; 33];
        raw.copy_from_slice(&bytes[..33]);
        Self::from_bytes(raw)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── CompactSignature ─────────────────────────────────────────────────────────

/// A 65-byte compact recoverable ECDSA signature over secp256k1.
///
/// Layout: `header | r | s` with `header = 31 + recovery_id` and `r`/`s`
/// big-endian. Signatures are produced with RFC 6979 nonces and low-S
/// normalization, so a given (key, digest) pair always yields the same
/// bytes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CompactSignature([u8; 65]);

impl CompactSignature {
    pub fn from_bytes(raw: [u8; 65]) -> Self {
        Self(raw)
    }

    pub(crate) fn from_parts(sig: &EcdsaSignature, recovery_id: RecoveryId) -> Self {
        let mut raw = [0u8; 65];
        raw[0] = COMPACT_HEADER_BASE + recovery_id.to_byte();
        raw[1..].copy_from_slice(&sig.to_bytes());
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// Recover the public key that produced this signature over `digest`.
    pub fn recover(&self, digest: &[u8; 32]) -> Result<PublicKey, SignatureError> {
        let header = self.0[0];
        let recovery_byte = header
            .checked_sub(COMPACT_HEADER_BASE)
            .ok_or(SignatureError::InvalidRecoveryHeader { header })?;
        let recovery_id = RecoveryId::from_byte(recovery_byte)
            .ok_or(SignatureError::InvalidRecoveryHeader { header })?;
        let sig = EcdsaSignature::from_slice(&self.0[1..])
            .map_err(|_| SignatureError::MalformedSignature)?;
        let key = VerifyingKey::recover_from_prehash(digest, &sig, recovery_id)
            .map_err(|_| SignatureError::RecoveryFailed)?;
        Ok(PublicKey::from_verifying_key(&key))
    }
}

impl fmt::Display for CompactSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for CompactSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompactSignature({}…)", &hex::encode(&self.0[..8]))
    }
}

impl FromStr for CompactSignature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| SignatureError::MalformedSignature)?;
        if bytes.len() != COMPACT_SIGNATURE_BYTES {
            return Err(SignatureError::MalformedSignature);
        }
        let mut raw = [0u8; 65];
        raw.copy_from_slice(&bytes);
        Ok(Self(raw))
    }
}

impl Serialize for CompactSignature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CompactSignature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ── PrivateKey ───────────────────────────────────────────────────────────────

/// A secp256k1 secret key. The wrapped `SigningKey` zeroizes its scalar
/// on drop; raw secret bytes only leave through [`PrivateKey::to_bytes`],
/// which hands them back inside a `Zeroizing` buffer.
pub struct PrivateKey {
    secret: SigningKey,
}

impl PrivateKey {
    /// Generate a fresh random key from the OS entropy source.
    pub fn generate() -> Self {
        Self {
            secret: SigningKey::random(&mut OsRng),
        }
    }

    /// Restore a key from raw 32-byte scalar bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignatureError> {
        SigningKey::from_slice(bytes)
            .map(|secret| Self { secret })
            .map_err(|_| SignatureError::InvalidSecretKey)
    }

    /// Derive a key deterministically from an arbitrary seed.
    ///
    /// The seed is hashed with SHA-256 and re-hashed until the digest is a
    /// valid scalar (the first digest virtually always is).
    pub fn from_seed(seed: &[u8]) -> Self {
        let mut digest = hash::sha256(seed);
        loop {
            if let Ok(secret) = SigningKey::from_slice(&digest) {
                return Self { secret };
            }
            digest = hash::sha256(&digest);
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(self.secret.verifying_key())
    }

    /// Raw scalar bytes, wrapped so they are wiped when dropped.
    pub fn to_bytes(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.secret.to_bytes().into())
    }

    /// Produce a compact recoverable signature over a 32-byte digest.
    pub fn sign_compact(&self, digest: &[u8; 32]) -> CompactSignature {
        let (sig, recovery_id) = self
            .secret
            .sign_prehash_recoverable(digest)
            .expect("signing with a valid secret key is infallible");
        CompactSignature::from_parts(&sig, recovery_id)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey {{ public_key: {} }}", self.public_key())
    }
}
