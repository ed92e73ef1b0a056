use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use epx_crypto::{Address, PublicKey};

use crate::constants::NULL_ACCOUNT;
use crate::encode::Encode;
use crate::types::AccountId;

/// Weight contributed by a single authority entry.
pub type Weight = u16;

// ── Authority ────────────────────────────────────────────────────────────────

/// A weighted, threshold-based predicate over keys, addresses and
/// sub-accounts.
///
/// The authority is satisfied when the accumulated weight of satisfied
/// entries reaches `weight_threshold`. Account entries recurse into the
/// referenced account's own active (and possibly owner) authority, which
/// is what makes the authority graph multi-level and possibly cyclic;
/// the evaluator bounds that recursion.
///
/// Containers are ordered maps: ascending key order is the canonical
/// evaluation and encoding order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub weight_threshold: u32,
    pub account_auths: BTreeMap<AccountId, Weight>,
    pub key_auths: BTreeMap<PublicKey, Weight>,
    pub address_auths: BTreeMap<Address, Weight>,
}

impl Authority {
    /// Authority satisfied by a single signature from `key`.
    pub fn single_key(key: PublicKey) -> Self {
        Self {
            weight_threshold: 1,
            key_auths: BTreeMap::from([(key, 1)]),
            ..Default::default()
        }
    }

    /// Authority satisfied by the active authority of `account`.
    pub fn single_account(account: AccountId) -> Self {
        Self {
            weight_threshold: 1,
            account_auths: BTreeMap::from([(account, 1)]),
            ..Default::default()
        }
    }

    /// Equal-weight threshold authority over a set of keys.
    pub fn threshold_of_keys(
        weight_threshold: u32,
        keys: impl IntoIterator<Item = (PublicKey, Weight)>,
    ) -> Self {
        Self {
            weight_threshold,
            key_auths: keys.into_iter().collect(),
            ..Default::default()
        }
    }

    /// The unsatisfiable authority assigned to burned accounts: one weight
    /// demanded of the null account, which never signs.
    pub fn null_authority() -> Self {
        Self::single_account(NULL_ACCOUNT)
    }

    pub fn add_key(&mut self, key: PublicKey, weight: Weight) {
        self.key_auths.insert(key, weight);
    }

    pub fn add_account(&mut self, account: AccountId, weight: Weight) {
        self.account_auths.insert(account, weight);
    }

    pub fn add_address(&mut self, address: Address, weight: Weight) {
        self.address_auths.insert(address, weight);
    }

    /// Sum of all entry weights.
    pub fn total_weight(&self) -> u64 {
        self.account_auths
            .values()
            .chain(self.key_auths.values())
            .chain(self.address_auths.values())
            .map(|w| u64::from(*w))
            .sum()
    }

    pub fn num_auths(&self) -> usize {
        self.account_auths.len() + self.key_auths.len() + self.address_auths.len()
    }

    /// True when no combination of entries can reach the threshold.
    pub fn is_impossible(&self) -> bool {
        self.total_weight() < u64::from(self.weight_threshold)
    }

    /// A well-formed authority has a nonzero, reachable threshold and no
    /// zero-weight entries.
    pub fn is_valid(&self) -> bool {
        self.weight_threshold != 0
            && !self.is_impossible()
            && self
                .account_auths
                .values()
                .chain(self.key_auths.values())
                .chain(self.address_auths.values())
                .all(|w| *w != 0)
    }
}

impl Encode for Authority {
    fn encode(&self, out: &mut Vec<u8>) {
        self.weight_threshold.encode(out);
        self.account_auths.encode(out);
        self.key_auths.encode(out);
        self.address_auths.encode(out);
    }
}
