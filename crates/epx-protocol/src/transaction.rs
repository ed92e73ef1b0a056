use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ops::{Deref, DerefMut};

use epx_crypto::{sha256, CompactSignature, PrivateKey, PublicKey};

use crate::authority::Authority;
use crate::encode::Encode;
use crate::error::AuthorizationError;
use crate::operation::{Extension, OperationResult, ProtocolOperation};
use crate::types::{AccountId, BlockId, ChainId, Digest, Timestamp, TxId};

// ── Transaction ──────────────────────────────────────────────────────────────

/// An unsigned transaction: an ordered, non-empty batch of operations
/// plus the anti-replay envelope (reference block tag, expiration,
/// extension slot).
///
/// The type is generic over the chain's operation taxonomy; see
/// [`ProtocolOperation`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction<Op> {
    /// Low 16 bits of the reference block number, byte-swapped. The swap
    /// is a consensus quirk; see [`Transaction::set_reference_block`].
    pub ref_block_num: u16,
    /// Second 32-bit word of the reference block id, a compact fork
    /// identifier.
    pub ref_block_prefix: u32,
    /// Absolute deadline (seconds since epoch). Enforcement happens
    /// upstream; the field is part of the signed bytes.
    pub expiration: Timestamp,
    pub operations: Vec<Op>,
    pub extensions: Vec<Extension>,
}

impl<Op> Default for Transaction<Op> {
    fn default() -> Self {
        Self {
            ref_block_num: 0,
            ref_block_prefix: 0,
            expiration: 0,
            operations: Vec::new(),
            extensions: Vec::new(),
        }
    }
}

impl<Op> Transaction<Op> {
    /// Tie this transaction to a reference block: `ref_block_num` becomes
    /// the byte-swapped low 16 bits of word 0 of the block id,
    /// `ref_block_prefix` word 1. The byte swap must be preserved
    /// bit-exactly; peers recompute it when locating the block.
    pub fn set_reference_block(&mut self, block_id: &BlockId) {
        self.ref_block_num = (block_id.word(0) as u16).swap_bytes();
        self.ref_block_prefix = block_id.word(1);
    }
}

impl<Op: Encode> Transaction<Op> {
    /// Digest of the canonical encoding. Two transactions share a digest
    /// iff their canonical encodings are byte-identical.
    pub fn digest(&self) -> Digest {
        Digest(sha256(&self.to_bytes()))
    }

    /// The transaction id: the digest truncated to [`TxId`] size.
    pub fn id(&self) -> TxId {
        self.digest().truncated()
    }

    /// The digest signatures commit to: the chain id precedes the
    /// transaction bytes so a signature is worthless on any other chain.
    pub fn sig_digest(&self, chain_id: &ChainId) -> Digest {
        let mut bytes = Vec::with_capacity(32 + self.packed_size());
        chain_id.encode(&mut bytes);
        self.encode(&mut bytes);
        Digest(sha256(&bytes))
    }
}

impl<Op: ProtocolOperation> Transaction<Op> {
    /// Structural validation: at least one operation, every operation
    /// individually well-formed.
    pub fn validate(&self) -> Result<(), AuthorizationError> {
        if self.operations.is_empty() {
            return Err(AuthorizationError::EmptyTransaction);
        }
        for (index, op) in self.operations.iter().enumerate() {
            op.validate()
                .map_err(|source| AuthorizationError::OperationInvalid { index, source })?;
        }
        Ok(())
    }

    /// Union of the authority demands of every operation.
    /// `required_owner` and `other` accumulate across operations exactly
    /// as the per-operation extractor reports them.
    pub fn get_required_authorities(
        &self,
        required_active: &mut BTreeSet<AccountId>,
        required_owner: &mut BTreeSet<AccountId>,
        other: &mut Vec<Authority>,
        ignore_custom_required_auths: bool,
    ) {
        for op in &self.operations {
            op.get_required_authorities(
                required_active,
                required_owner,
                other,
                ignore_custom_required_auths,
            );
        }
    }
}

impl<Op: Encode> Encode for Transaction<Op> {
    fn encode(&self, out: &mut Vec<u8>) {
        self.ref_block_num.encode(out);
        self.ref_block_prefix.encode(out);
        self.expiration.encode(out);
        self.operations.encode(out);
        self.extensions.encode(out);
    }
}

// ── SignedTransaction ────────────────────────────────────────────────────────

/// A transaction plus the compact recoverable signatures over its
/// signing digest.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignedTransaction<Op> {
    #[serde(flatten)]
    pub transaction: Transaction<Op>,
    pub signatures: Vec<CompactSignature>,
}

impl<Op> SignedTransaction<Op> {
    pub fn new(transaction: Transaction<Op>) -> Self {
        Self {
            transaction,
            signatures: Vec::new(),
        }
    }
}

impl<Op> Deref for SignedTransaction<Op> {
    type Target = Transaction<Op>;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

impl<Op> DerefMut for SignedTransaction<Op> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.transaction
    }
}

impl<Op: Encode> SignedTransaction<Op> {
    /// Sign with `key` for `chain_id` and append the signature.
    pub fn sign(&mut self, key: &PrivateKey, chain_id: &ChainId) -> CompactSignature {
        let sig = self.sign_detached(key, chain_id);
        self.signatures.push(sig);
        sig
    }

    /// Compute the signature `key` would contribute, without appending
    /// it. Dry-run counterpart of [`SignedTransaction::sign`].
    pub fn sign_detached(&self, key: &PrivateKey, chain_id: &ChainId) -> CompactSignature {
        key.sign_compact(self.sig_digest(chain_id).as_bytes())
    }

    /// Recover the public key behind every signature.
    ///
    /// Two signatures recovering to the same key is a fatal protocol
    /// error, not a redundancy to tolerate.
    pub fn get_signature_keys(
        &self,
        chain_id: &ChainId,
    ) -> Result<BTreeSet<PublicKey>, AuthorizationError> {
        let digest = self.sig_digest(chain_id);
        let mut keys = BTreeSet::new();
        for sig in &self.signatures {
            let key = sig.recover(digest.as_bytes())?;
            if !keys.insert(key) {
                return Err(AuthorizationError::DuplicateSignature { key });
            }
        }
        Ok(keys)
    }
}

impl<Op: Encode> Encode for SignedTransaction<Op> {
    fn encode(&self, out: &mut Vec<u8>) {
        self.transaction.encode(out);
        self.signatures.encode(out);
    }
}

// ── ProcessedTransaction ─────────────────────────────────────────────────────

/// A signed transaction that has been included in a block, with the
/// per-operation execution results appended. Execution itself happens in
/// the state layer; the results are opaque here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessedTransaction<Op> {
    #[serde(flatten)]
    pub transaction: SignedTransaction<Op>,
    pub operation_results: Vec<OperationResult>,
}

impl<Op> Deref for ProcessedTransaction<Op> {
    type Target = SignedTransaction<Op>;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

impl<Op: Encode> Encode for ProcessedTransaction<Op> {
    fn encode(&self, out: &mut Vec<u8>) {
        self.transaction.encode(out);
        self.operation_results.encode(out);
    }
}

// ── PrecomputableTransaction ─────────────────────────────────────────────────

/// A signed transaction with one-shot caches for the values hot paths
/// recompute most: transaction id, packed size, recovered signer keys,
/// and the structural-validity verdict.
///
/// Every cache is populated on first access and never invalidated
/// automatically. The signee cache is keyed implicitly on the chain id
/// of the first [`PrecomputableTransaction::get_signature_keys`] call;
/// re-verification under a different chain id is not supported through
/// the cache. Tests can reset a transaction they own exclusively via
/// [`PrecomputableTransaction::invalidate`].
///
/// The `OnceCell` fields make first-access itself race-safe, but the
/// surrounding workflow is single-writer: populate the caches before
/// sharing the value across threads.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrecomputableTransaction<Op> {
    #[serde(flatten)]
    transaction: SignedTransaction<Op>,
    #[serde(skip)]
    tx_id: OnceCell<TxId>,
    #[serde(skip)]
    packed_size: OnceCell<usize>,
    #[serde(skip)]
    signees: OnceCell<BTreeSet<PublicKey>>,
    #[serde(skip)]
    validated: OnceCell<()>,
}

impl<Op> PrecomputableTransaction<Op> {
    pub fn new(transaction: SignedTransaction<Op>) -> Self {
        Self {
            transaction,
            tx_id: OnceCell::new(),
            packed_size: OnceCell::new(),
            signees: OnceCell::new(),
            validated: OnceCell::new(),
        }
    }

    /// Drop every memoized value. Requires exclusive ownership.
    pub fn invalidate(&mut self) {
        self.tx_id = OnceCell::new();
        self.packed_size = OnceCell::new();
        self.signees = OnceCell::new();
        self.validated = OnceCell::new();
    }

    pub fn into_signed(self) -> SignedTransaction<Op> {
        self.transaction
    }
}

impl<Op> Deref for PrecomputableTransaction<Op> {
    type Target = SignedTransaction<Op>;

    fn deref(&self) -> &Self::Target {
        &self.transaction
    }
}

impl<Op: Encode> PrecomputableTransaction<Op> {
    /// The transaction id, computed once.
    pub fn id(&self) -> &TxId {
        self.tx_id.get_or_init(|| self.transaction.id())
    }

    /// Canonical encoded size of the signed transaction, computed once.
    pub fn packed_size(&self) -> usize {
        *self
            .packed_size
            .get_or_init(|| Encode::packed_size(&self.transaction))
    }

    /// Recovered signer keys, computed once for the first `chain_id`
    /// passed here.
    pub fn get_signature_keys(
        &self,
        chain_id: &ChainId,
    ) -> Result<&BTreeSet<PublicKey>, AuthorizationError> {
        self.signees
            .get_or_try_init(|| self.transaction.get_signature_keys(chain_id))
    }
}

impl<Op: ProtocolOperation> PrecomputableTransaction<Op> {
    /// Structural validation, performed once.
    pub fn validate(&self) -> Result<(), AuthorizationError> {
        if self.validated.get().is_some() {
            return Ok(());
        }
        self.transaction.validate()?;
        let _ = self.validated.set(());
        Ok(())
    }
}
