//! The EPX protocol layer: canonical transaction identity and the
//! authority-satisfaction engine.
//!
//! Given a candidate transaction this crate answers three questions:
//! what is its canonical identity (digest, id, packed size); which keys
//! produced its signatures; and, against a caller-supplied view of
//! on-chain authority records, is it properly authorized and what is a
//! minimal sufficient signing set. Operation execution, state storage,
//! and networking live elsewhere; the operation taxonomy plugs in via
//! [`operation::ProtocolOperation`].

pub mod authority;
pub mod constants;
pub mod encode;
pub mod error;
pub mod operation;
pub mod sign_state;
pub mod transaction;
pub mod types;
pub mod verify;

pub use authority::{Authority, Weight};
pub use constants::*;
pub use encode::Encode;
pub use error::{AuthorizationError, OperationError};
pub use operation::{Extension, OperationResult, ProtocolOperation};
pub use sign_state::{AuthorityLookup, SignState};
pub use transaction::{
    PrecomputableTransaction, ProcessedTransaction, SignedTransaction, Transaction,
};
pub use types::{AccountId, BlockId, ChainId, Digest, Timestamp, TxId};
pub use verify::{
    no_custom_authorities, verify_authority, CustomAuthorityLookup, RejectedCustomAuths,
};
