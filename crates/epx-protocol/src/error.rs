use thiserror::Error;

use epx_crypto::{PublicKey, SignatureError};

use crate::authority::Authority;
use crate::types::AccountId;
use crate::verify::RejectedCustomAuths;

/// Rejection reason reported by an operation's structural validator.
///
/// The operation taxonomy lives outside this crate; implementors of
/// [`crate::operation::ProtocolOperation`] describe their failures here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct OperationError {
    pub reason: String,
}

impl OperationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Failures surfaced by transaction authorization. All are fatal to the
/// current call; nothing is retried internally.
#[derive(Debug, Error)]
pub enum AuthorizationError {
    #[error("transaction must contain at least one operation")]
    EmptyTransaction,

    #[error("operation {index} is invalid: {source}")]
    OperationInvalid {
        index: usize,
        source: OperationError,
    },

    #[error("duplicate signature: two signatures recover to key {key}")]
    DuplicateSignature { key: PublicKey },

    #[error("missing required active authority for account {account}")]
    MissingActiveAuth {
        account: AccountId,
        /// Custom authorities that were evaluated for the failing
        /// operation set but rejected, for diagnostics.
        rejected_custom_auths: RejectedCustomAuths,
    },

    #[error("missing required owner authority for account {account}")]
    MissingOwnerAuth { account: AccountId },

    #[error("missing required authority (threshold {})", .auth.weight_threshold)]
    MissingOtherAuth { auth: Authority },

    #[error("irrelevant signature(s) for key(s) {unused:?}")]
    IrrelevantSignature { unused: Vec<PublicKey> },

    #[error("committee account {account} may not approve this transaction")]
    InvalidCommitteeApproval { account: AccountId },

    #[error(transparent)]
    Signature(#[from] SignatureError),
}
