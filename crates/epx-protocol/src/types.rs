use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::TX_ID_BYTES;

/// Seconds since the Unix epoch (UTC). Transaction expirations are
/// 32-bit by consensus.
pub type Timestamp = u32;

// ── AccountId ────────────────────────────────────────────────────────────────

/// On-chain account identifier: the instance number of an account object.
///
/// Ascending numeric order is the canonical container order wherever
/// accounts appear in authority maps.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AccountId(pub u64);

impl AccountId {
    pub fn instance(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "1.2.{}", self.0)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId(1.2.{})", self.0)
    }
}

impl FromStr for AccountId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let instance = s.strip_prefix("1.2.").unwrap_or(s);
        instance.parse().map(Self)
    }
}

// ── ChainId ──────────────────────────────────────────────────────────────────

/// 256-bit network identifier, prefixed to every signing digest so that
/// signatures cannot be replayed across chains.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub [u8; 32]);

impl ChainId {
    pub fn from_bytes(b: [u8; 32]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChainId({}…)", &self.to_hex()[..16])
    }
}

// ── Digest ───────────────────────────────────────────────────────────────────

/// 256-bit consensus digest of a canonical encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// The transaction id is the leading bytes of the digest; the rest is
    /// discarded.
    pub fn truncated(&self) -> TxId {
        let mut id = [0u8; TX_ID_BYTES];
        id.copy_from_slice(&self.0[..TX_ID_BYTES]);
        TxId(id)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({}…)", &self.to_hex()[..16])
    }
}

// ── TxId ─────────────────────────────────────────────────────────────────────

/// 160-bit transaction identifier: the leading bytes of the transaction
/// digest. Displayed as lowercase hex; equality is byte comparison.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(pub [u8; TX_ID_BYTES]);

impl TxId {
    pub fn from_bytes(b: [u8; TX_ID_BYTES]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; TX_ID_BYTES] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(s)?;
        if bytes.len() != TX_ID_BYTES {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; TX_ID_BYTES];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({})", self.to_hex())
    }
}

// ── BlockId ──────────────────────────────────────────────────────────────────

/// 160-bit block identifier. Its first two little-endian 32-bit words
/// feed the reference-block fields of a transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub [u8; 20]);

impl BlockId {
    pub fn from_bytes(b: [u8; 20]) -> Self {
        Self(b)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// The n-th little-endian 32-bit word of the id (n < 5).
    pub fn word(&self, n: usize) -> u32 {
        let mut w = [0u8; 4];
        w.copy_from_slice(&self.0[n * 4..n * 4 + 4]);
        u32::from_le_bytes(w)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", hex::encode(self.0))
    }
}
