//! ─── EPX Protocol Constants ─────────────────────────────────────────────────
//!
//! Consensus-critical values of the authorization layer. Changing any of
//! these is a hard fork.

use crate::types::AccountId;

// ── Identity ─────────────────────────────────────────────────────────────────

/// Bytes of a transaction id: the digest truncated to 160 bits.
pub const TX_ID_BYTES: usize = 20;

// ── Authority evaluation ─────────────────────────────────────────────────────

/// Default recursion bound when walking `account_auths` chains. Branches
/// deeper than this contribute zero weight; exceeding the bound is never
/// an error.
pub const DEFAULT_MAX_RECURSION_DEPTH: u32 = 2;

// ── Distinguished accounts ───────────────────────────────────────────────────

/// The committee account. Transactions requiring its active authority are
/// rejected unless the caller explicitly opts in.
pub const COMMITTEE_ACCOUNT: AccountId = AccountId(0);

/// The null account. Owns nothing, signs nothing; target of the null
/// authority.
pub const NULL_ACCOUNT: AccountId = AccountId(3);

/// The temp account. A sentinel that every authority evaluation treats as
/// pre-approved.
pub const TEMP_ACCOUNT: AccountId = AccountId(4);

// ── Addresses ────────────────────────────────────────────────────────────────

/// Version bytes of the legacy wallet address generations (re-exported
/// from the crypto layer; the evaluator indexes all forms).
pub use epx_crypto::LEGACY_ADDRESS_VERSIONS;
