use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::authority::Authority;
use crate::encode::Encode;
use crate::error::OperationError;
use crate::types::AccountId;

// ── ProtocolOperation ────────────────────────────────────────────────────────

/// The seam to the operation taxonomy, which lives outside this crate.
///
/// A transaction is generic over its operation type; the chain's
/// taxonomy (a tagged-union enum whose `Encode` impl writes a varint tag
/// followed by the variant body) implements this trait. The
/// authorization layer only needs two things from an operation: a
/// structural validity check and its authority demands.
pub trait ProtocolOperation: Encode {
    /// Stateless structural validation (ranges, non-emptiness, fee sanity).
    fn validate(&self) -> Result<(), OperationError>;

    /// Report which authorities this operation demands.
    ///
    /// Accounts whose active authority is required go into
    /// `required_active`, accounts whose owner authority is required into
    /// `required_owner`, and loose authorities (not attached to an
    /// account) into `other`. When `ignore_custom_required_auths` is set,
    /// operations that relay embedded authority demands must omit them.
    fn get_required_authorities(
        &self,
        required_active: &mut BTreeSet<AccountId>,
        required_owner: &mut BTreeSet<AccountId>,
        other: &mut Vec<Authority>,
        ignore_custom_required_auths: bool,
    );
}

// ── Extensions ───────────────────────────────────────────────────────────────

/// Forward-compatibility slot carried by every transaction. No extension
/// variants exist in the current protocol, so the set always encodes as
/// an empty sequence; the uninhabited enum keeps the wire position
/// reserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Extension {}

impl Encode for Extension {
    fn encode(&self, _out: &mut Vec<u8>) {
        match *self {}
    }
}

// ── OperationResult ──────────────────────────────────────────────────────────

/// Per-operation execution result attached to processed transactions.
/// Execution is out of scope for this layer, so only the void variant
/// exists; the tag keeps the wire format open for richer results.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationResult {
    #[default]
    Void,
}

impl Encode for OperationResult {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            OperationResult::Void => crate::encode::encode_varint(0, out),
        }
    }
}
