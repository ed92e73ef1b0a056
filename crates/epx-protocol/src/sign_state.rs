use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::trace;

use epx_crypto::{Address, PublicKey};

use crate::authority::Authority;
use crate::types::AccountId;

/// Caller-supplied resolver from an account to one of its authority
/// records. The returned reference borrows from the caller's chain-state
/// snapshot, which must stay consistent for the duration of the
/// evaluation. Behavior for unknown accounts is the caller's problem
/// (resolvers may panic on them).
pub type AuthorityLookup<'a> = dyn Fn(AccountId) -> &'a Authority + 'a;

// ── SignState ────────────────────────────────────────────────────────────────

/// The mutable working set of one authorization evaluation.
///
/// Tracks which provided signatures have been consumed, which accounts
/// are already known satisfied, and (lazily) which wallet addresses
/// resolve to which keys. One instance lives exactly as long as one
/// verification or minimization pass; nothing here suspends or locks.
pub struct SignState<'a> {
    /// Recovered signer keys, each with a consumed flag. A key flips to
    /// consumed the first time the evaluator uses it, even on branches
    /// that ultimately miss their threshold.
    pub(crate) provided_signatures: BTreeMap<PublicKey, bool>,
    /// Keys from which additional signatures could still be produced.
    /// Empty during pure verification; populated when computing required
    /// signing sets.
    available_keys: &'a BTreeSet<PublicKey>,
    /// Accounts already deemed satisfied: caller-seeded approvals plus
    /// every account proven during this pass.
    pub approved_by: BTreeSet<AccountId>,
    provided_address_sigs: Option<HashMap<Address, PublicKey>>,
    available_address_sigs: Option<HashMap<Address, PublicKey>>,
    get_active: &'a AuthorityLookup<'a>,
    get_owner: &'a AuthorityLookup<'a>,
    allow_non_immediate_owner: bool,
    max_recursion: u32,
}

impl<'a> SignState<'a> {
    pub fn new(
        sigs: &BTreeSet<PublicKey>,
        get_active: &'a AuthorityLookup<'a>,
        get_owner: &'a AuthorityLookup<'a>,
        allow_non_immediate_owner: bool,
        max_recursion: u32,
        available_keys: &'a BTreeSet<PublicKey>,
    ) -> Self {
        Self {
            provided_signatures: sigs.iter().map(|k| (*k, false)).collect(),
            available_keys,
            approved_by: BTreeSet::new(),
            provided_address_sigs: None,
            available_address_sigs: None,
            get_active,
            get_owner,
            allow_non_immediate_owner,
            max_recursion,
        }
    }

    /// Consume a signature by key: marks a provided signature used, or
    /// promotes an available key into the provided set (already used).
    pub fn signed_by(&mut self, key: &PublicKey) -> bool {
        if let Some(used) = self.provided_signatures.get_mut(key) {
            *used = true;
            return true;
        }
        if self.available_keys.contains(key) {
            self.provided_signatures.insert(*key, true);
            true
        } else {
            false
        }
    }

    /// Consume a signature by wallet address. The address→key indices
    /// are derived on first call: every key contributes its modern
    /// address plus the four legacy forms.
    pub fn signed_by_address(&mut self, address: &Address) -> bool {
        if self.available_address_sigs.is_none() {
            self.build_address_indices();
        }
        let key = self
            .provided_address_sigs
            .as_ref()
            .and_then(|m| m.get(address))
            .or_else(|| {
                self.available_address_sigs
                    .as_ref()
                    .and_then(|m| m.get(address))
            })
            .copied();
        match key {
            Some(key) => self.signed_by(&key),
            None => false,
        }
    }

    fn build_address_indices(&mut self) {
        let mut available = HashMap::new();
        for key in self.available_keys {
            for form in Address::all_forms(key) {
                available.insert(form, *key);
            }
        }
        let mut provided = HashMap::new();
        for key in self.provided_signatures.keys() {
            for form in Address::all_forms(key) {
                provided.insert(form, *key);
            }
        }
        self.available_address_sigs = Some(available);
        self.provided_address_sigs = Some(provided);
    }

    /// Is `authority` satisfied by the current signature/approval set?
    pub fn check_authority(&mut self, authority: &Authority) -> bool {
        self.check_authority_depth(authority, 0)
    }

    /// Bounded recursive authority evaluation.
    ///
    /// Groups are examined in fixed order (keys, then addresses, then
    /// accounts), each in ascending container order, short-circuiting as
    /// soon as the accumulated weight reaches the threshold. Account
    /// branches deeper than `max_recursion` silently contribute zero;
    /// shallower branches can still reach the threshold on their own.
    pub fn check_authority_depth(&mut self, authority: &Authority, depth: u32) -> bool {
        let threshold = u64::from(authority.weight_threshold);
        let mut total_weight: u64 = 0;

        for (key, weight) in &authority.key_auths {
            if self.signed_by(key) {
                total_weight += u64::from(*weight);
                if total_weight >= threshold {
                    return true;
                }
            }
        }

        for (address, weight) in &authority.address_auths {
            if self.signed_by_address(address) {
                total_weight += u64::from(*weight);
                if total_weight >= threshold {
                    return true;
                }
            }
        }

        for (&account, &weight) in &authority.account_auths {
            if self.approved_by.contains(&account) {
                total_weight += u64::from(weight);
            } else if depth == self.max_recursion {
                trace!(%account, depth, "recursion bound reached, branch contributes zero");
                continue;
            } else {
                let active = (self.get_active)(account);
                let mut satisfied = self.check_authority_depth(active, depth + 1);
                if !satisfied && self.allow_non_immediate_owner {
                    let owner = (self.get_owner)(account);
                    satisfied = self.check_authority_depth(owner, depth + 1);
                }
                if !satisfied {
                    continue;
                }
                self.approved_by.insert(account);
                total_weight += u64::from(weight);
            }
            if total_weight >= threshold {
                return true;
            }
        }

        total_weight >= threshold
    }

    /// Account-level satisfaction: consult `approved_by`, then the
    /// account's active authority, then (when non-immediate owner use is
    /// allowed) its owner authority. Success is memoized.
    pub fn check_account_authority(&mut self, account: AccountId) -> bool {
        if self.approved_by.contains(&account) {
            return true;
        }
        let active = (self.get_active)(account);
        let mut satisfied = self.check_authority(active);
        if !satisfied && self.allow_non_immediate_owner {
            let owner = (self.get_owner)(account);
            satisfied = self.check_authority(owner);
        }
        if satisfied {
            self.approved_by.insert(account);
        }
        satisfied
    }

    /// Drop every provided signature the evaluation never consumed.
    /// Returns the dropped keys; an empty result means the signature set
    /// was tight.
    pub fn remove_unused_signatures(&mut self) -> Vec<PublicKey> {
        let unused: Vec<PublicKey> = self
            .provided_signatures
            .iter()
            .filter(|(_, used)| !**used)
            .map(|(key, _)| *key)
            .collect();
        for key in &unused {
            self.provided_signatures.remove(key);
        }
        unused
    }
}
