//! Authority verification: the orchestrator that turns per-operation
//! authority demands plus a signature set into a pass/fail verdict, and
//! the constructive counterparts that compute and minimize signing sets.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use epx_crypto::PublicKey;

use crate::authority::Authority;
use crate::constants::{COMMITTEE_ACCOUNT, TEMP_ACCOUNT};
use crate::error::AuthorizationError;
use crate::operation::ProtocolOperation;
use crate::sign_state::{AuthorityLookup, SignState};
use crate::transaction::SignedTransaction;
use crate::types::{AccountId, ChainId};

/// Caller-supplied resolver for operation-scoped custom authorities.
///
/// For an (account, operation) pair it returns every custom authority
/// whose predicate accepts the operation, and records the ones it
/// evaluated but rejected into the out-parameter for diagnostics.
/// Predicate evaluation itself is entirely the resolver's concern.
pub type CustomAuthorityLookup<'a, Op> =
    dyn Fn(AccountId, &Op, &mut RejectedCustomAuths) -> Vec<Authority> + 'a;

/// Resolver for chains (or call sites) without custom authorities.
pub fn no_custom_authorities<Op>(
    _account: AccountId,
    _op: &Op,
    _rejected: &mut RejectedCustomAuths,
) -> Vec<Authority> {
    Vec::new()
}

static NO_AVAILABLE_KEYS: BTreeSet<PublicKey> = BTreeSet::new();

// ── RejectedCustomAuths ──────────────────────────────────────────────────────

/// Custom authorities that were evaluated during a verification pass but
/// rejected by their predicates, grouped by account. Reported inside
/// [`AuthorizationError::MissingActiveAuth`] so a caller can see which
/// shortcuts almost applied.
#[derive(Debug, Default, Clone, Serialize)]
pub struct RejectedCustomAuths {
    rejected: BTreeMap<AccountId, Vec<Authority>>,
}

impl RejectedCustomAuths {
    pub fn record(&mut self, account: AccountId, authority: Authority) {
        self.rejected.entry(account).or_default().push(authority);
    }

    pub fn is_empty(&self) -> bool {
        self.rejected.is_empty()
    }

    pub fn for_account(&self, account: &AccountId) -> &[Authority] {
        self.rejected.get(account).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AccountId, &Vec<Authority>)> {
        self.rejected.iter()
    }
}

// ── verify_authority ─────────────────────────────────────────────────────────

/// Check that `sigs` (recovered signer keys) authorize `operations`
/// against the supplied chain-state view.
///
/// The steps, in consensus order: gather each operation's demands (its
/// required-active set is fresh per operation, required-owner and loose
/// authorities accumulate); let satisfied custom authorities strike
/// accounts from the per-operation active set; enforce committee policy;
/// check loose authorities, then owner demands, then active demands
/// (owner always covers active); finally require that every provided
/// signature was consumed.
///
/// `active_approvals` / `owner_approvals` pre-seed the approved set, for
/// callers that have already validated those accounts elsewhere (e.g.
/// proposal execution).
#[allow(clippy::too_many_arguments)]
pub fn verify_authority<'a, Op: ProtocolOperation>(
    operations: &[Op],
    sigs: &BTreeSet<PublicKey>,
    get_active: &'a AuthorityLookup<'a>,
    get_owner: &'a AuthorityLookup<'a>,
    get_custom: &CustomAuthorityLookup<'_, Op>,
    allow_non_immediate_owner: bool,
    ignore_custom_required_auths: bool,
    max_recursion: u32,
    allow_committee: bool,
    active_approvals: &[AccountId],
    owner_approvals: &[AccountId],
) -> Result<(), AuthorizationError> {
    let mut rejected_custom_auths = RejectedCustomAuths::default();
    let mut required_active: BTreeSet<AccountId> = BTreeSet::new();
    let mut required_owner: BTreeSet<AccountId> = BTreeSet::new();
    let mut other: Vec<Authority> = Vec::new();

    let mut state = SignState::new(
        sigs,
        get_active,
        get_owner,
        allow_non_immediate_owner,
        max_recursion,
        &NO_AVAILABLE_KEYS,
    );
    state.approved_by.extend(active_approvals.iter().copied());
    state.approved_by.extend(owner_approvals.iter().copied());
    state.approved_by.insert(TEMP_ACCOUNT);

    for op in operations {
        let mut op_required_active = BTreeSet::new();
        op.get_required_authorities(
            &mut op_required_active,
            &mut required_owner,
            &mut other,
            ignore_custom_required_auths,
        );

        // An operation-scoped custom authority stands in for the
        // account's active authority on this operation only.
        let satisfied_by_custom: Vec<AccountId> = op_required_active
            .iter()
            .copied()
            .filter(|account| {
                get_custom(*account, op, &mut rejected_custom_auths)
                    .iter()
                    .any(|auth| state.check_authority(auth))
            })
            .collect();
        for account in satisfied_by_custom {
            op_required_active.remove(&account);
        }

        required_active.extend(op_required_active);
    }

    if !allow_committee && required_active.contains(&COMMITTEE_ACCOUNT) {
        debug!("committee account appears in required active set");
        return Err(AuthorizationError::InvalidCommitteeApproval {
            account: COMMITTEE_ACCOUNT,
        });
    }

    for auth in &other {
        if !state.check_authority(auth) {
            debug!(threshold = auth.weight_threshold, "loose authority unsatisfied");
            return Err(AuthorizationError::MissingOtherAuth { auth: auth.clone() });
        }
    }

    for &account in &required_owner {
        if owner_approvals.contains(&account) {
            continue;
        }
        if !state.check_authority(get_owner(account)) {
            debug!(%account, "owner authority unsatisfied");
            return Err(AuthorizationError::MissingOwnerAuth { account });
        }
    }

    for &account in &required_active {
        if !state.check_account_authority(account) && !state.check_authority(get_owner(account)) {
            debug!(%account, "active authority unsatisfied");
            return Err(AuthorizationError::MissingActiveAuth {
                account,
                rejected_custom_auths,
            });
        }
    }

    let unused = state.remove_unused_signatures();
    if !unused.is_empty() {
        debug!(count = unused.len(), "provided signatures were never consumed");
        return Err(AuthorizationError::IrrelevantSignature { unused });
    }

    Ok(())
}

// ── Transaction-level entry points ───────────────────────────────────────────

impl<Op: ProtocolOperation> SignedTransaction<Op> {
    /// Structural validation, signature recovery, then
    /// [`verify_authority`] with no prior approvals and the committee
    /// policy enforced.
    #[allow(clippy::too_many_arguments)]
    pub fn verify_authority<'a>(
        &self,
        chain_id: &ChainId,
        get_active: &'a AuthorityLookup<'a>,
        get_owner: &'a AuthorityLookup<'a>,
        get_custom: &CustomAuthorityLookup<'_, Op>,
        allow_non_immediate_owner: bool,
        ignore_custom_required_auths: bool,
        max_recursion: u32,
    ) -> Result<(), AuthorizationError> {
        self.validate()?;
        let sigs = self.get_signature_keys(chain_id)?;
        verify_authority(
            &self.operations,
            &sigs,
            get_active,
            get_owner,
            get_custom,
            allow_non_immediate_owner,
            ignore_custom_required_auths,
            max_recursion,
            false,
            &[],
            &[],
        )
    }

    /// Which of `available_keys` would this transaction need signatures
    /// from, on top of the signatures it already carries?
    ///
    /// Runs the evaluator non-strictly: nothing throws on unsatisfied
    /// demands, the evaluator just consumes the keys it can actually
    /// use. The result is the consumed subset of `available_keys` minus
    /// keys that already signed.
    #[allow(clippy::too_many_arguments)]
    pub fn get_required_signatures<'a>(
        &self,
        chain_id: &ChainId,
        available_keys: &'a BTreeSet<PublicKey>,
        get_active: &'a AuthorityLookup<'a>,
        get_owner: &'a AuthorityLookup<'a>,
        get_custom: &CustomAuthorityLookup<'_, Op>,
        allow_non_immediate_owner: bool,
        ignore_custom_required_auths: bool,
        max_recursion: u32,
    ) -> Result<BTreeSet<PublicKey>, AuthorizationError> {
        let signer_keys = self.get_signature_keys(chain_id)?;
        let mut rejected_custom_auths = RejectedCustomAuths::default();
        let mut required_active: BTreeSet<AccountId> = BTreeSet::new();
        let mut required_owner: BTreeSet<AccountId> = BTreeSet::new();
        let mut other: Vec<Authority> = Vec::new();

        let mut state = SignState::new(
            &signer_keys,
            get_active,
            get_owner,
            allow_non_immediate_owner,
            max_recursion,
            available_keys,
        );
        state.approved_by.insert(TEMP_ACCOUNT);

        for op in self.operations.iter() {
            let mut op_required_active = BTreeSet::new();
            op.get_required_authorities(
                &mut op_required_active,
                &mut required_owner,
                &mut other,
                ignore_custom_required_auths,
            );
            let satisfied_by_custom: Vec<AccountId> = op_required_active
                .iter()
                .copied()
                .filter(|account| {
                    get_custom(*account, op, &mut rejected_custom_auths)
                        .iter()
                        .any(|auth| state.check_authority(auth))
                })
                .collect();
            for account in satisfied_by_custom {
                op_required_active.remove(&account);
            }
            required_active.extend(op_required_active);
        }

        for auth in &other {
            state.check_authority(auth);
        }
        for &account in &required_owner {
            state.check_authority(get_owner(account));
        }
        for &account in &required_active {
            let _ = state.check_account_authority(account) || state.check_authority(get_owner(account));
        }

        state.remove_unused_signatures();

        Ok(state
            .provided_signatures
            .keys()
            .filter(|key| available_keys.contains(*key) && !signer_keys.contains(*key))
            .copied()
            .collect())
    }

    /// Greedy elimination over the required signing set: drop each
    /// candidate in canonical key order and keep the removal whenever
    /// strict verification still passes.
    ///
    /// The three missing-authority errors mean "this key is load-bearing,
    /// keep it"; anything else aborts the minimization. Committee policy
    /// is not enforced here (it is a verification-time concern). The
    /// result is sufficient and locally minimal, not guaranteed globally
    /// minimal.
    #[allow(clippy::too_many_arguments)]
    pub fn minimize_required_signatures<'a>(
        &self,
        chain_id: &ChainId,
        available_keys: &'a BTreeSet<PublicKey>,
        get_active: &'a AuthorityLookup<'a>,
        get_owner: &'a AuthorityLookup<'a>,
        get_custom: &CustomAuthorityLookup<'_, Op>,
        allow_non_immediate_owner: bool,
        ignore_custom_required_auths: bool,
        max_recursion: u32,
    ) -> Result<BTreeSet<PublicKey>, AuthorizationError> {
        let candidates = self.get_required_signatures(
            chain_id,
            available_keys,
            get_active,
            get_owner,
            get_custom,
            allow_non_immediate_owner,
            ignore_custom_required_auths,
            max_recursion,
        )?;

        let mut result = candidates.clone();
        for key in &candidates {
            result.remove(key);
            match verify_authority(
                &self.operations,
                &result,
                get_active,
                get_owner,
                get_custom,
                allow_non_immediate_owner,
                ignore_custom_required_auths,
                max_recursion,
                true,
                &[],
                &[],
            ) {
                Ok(()) => {}
                Err(AuthorizationError::MissingActiveAuth { .. })
                | Err(AuthorizationError::MissingOwnerAuth { .. })
                | Err(AuthorizationError::MissingOtherAuth { .. }) => {
                    result.insert(*key);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(result)
    }
}
