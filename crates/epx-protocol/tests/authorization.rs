//! End-to-end authorization scenarios: sign, recover, verify, minimize.

use std::collections::{BTreeMap, BTreeSet};

use epx_crypto::{PrivateKey, PublicKey};
use epx_protocol::encode::encode_varint;
use epx_protocol::{
    no_custom_authorities, verify_authority, AccountId, Authority, AuthorityLookup,
    AuthorizationError, ChainId, Encode, OperationError, ProtocolOperation, RejectedCustomAuths,
    SignedTransaction, Transaction,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Minimal operation taxonomy for exercising the authorization layer.
#[derive(Clone, Debug)]
enum DemoOp {
    RequireActive(AccountId),
    RequireOwner(AccountId),
}

impl Encode for DemoOp {
    fn encode(&self, out: &mut Vec<u8>) {
        match self {
            DemoOp::RequireActive(id) => {
                encode_varint(0, out);
                id.encode(out);
            }
            DemoOp::RequireOwner(id) => {
                encode_varint(1, out);
                id.encode(out);
            }
        }
    }
}

impl ProtocolOperation for DemoOp {
    fn validate(&self) -> Result<(), OperationError> {
        Ok(())
    }

    fn get_required_authorities(
        &self,
        required_active: &mut BTreeSet<AccountId>,
        required_owner: &mut BTreeSet<AccountId>,
        _other: &mut Vec<Authority>,
        _ignore_custom_required_auths: bool,
    ) {
        match self {
            DemoOp::RequireActive(id) => {
                required_active.insert(*id);
            }
            DemoOp::RequireOwner(id) => {
                required_owner.insert(*id);
            }
        }
    }
}

/// In-memory stand-in for the chain-state authority accessors. Lookups
/// of accounts without records panic, which doubles as an assertion that
/// the engine never consulted them.
#[derive(Default)]
struct TestChain {
    active: BTreeMap<AccountId, Authority>,
    owner: BTreeMap<AccountId, Authority>,
}

impl TestChain {
    fn set_active(&mut self, id: AccountId, auth: Authority) -> &mut Self {
        self.active.insert(id, auth);
        self
    }

    fn set_owner(&mut self, id: AccountId, auth: Authority) -> &mut Self {
        self.owner.insert(id, auth);
        self
    }

    fn get_active(&self) -> Box<AuthorityLookup<'_>> {
        Box::new(move |id| {
            self.active
                .get(&id)
                .unwrap_or_else(|| panic!("no active authority record for {id}"))
        })
    }

    fn get_owner(&self) -> Box<AuthorityLookup<'_>> {
        Box::new(move |id| {
            self.owner
                .get(&id)
                .unwrap_or_else(|| panic!("no owner authority record for {id}"))
        })
    }
}

fn chain_id() -> ChainId {
    ChainId([7u8; 32])
}

fn seed_key(seed: &[u8]) -> PrivateKey {
    PrivateKey::from_seed(seed)
}

fn unsigned_tx(operations: Vec<DemoOp>) -> SignedTransaction<DemoOp> {
    SignedTransaction::new(Transaction {
        expiration: 1_800_000_000,
        operations,
        ..Default::default()
    })
}

fn signed_tx(operations: Vec<DemoOp>, signers: &[&PrivateKey]) -> SignedTransaction<DemoOp> {
    let mut tx = unsigned_tx(operations);
    for key in signers {
        tx.sign(key, &chain_id());
    }
    tx
}

/// Sign `tx` with exactly the secrets whose public keys appear in `keys`.
fn sign_with_subset(
    tx: &SignedTransaction<DemoOp>,
    secrets: &[PrivateKey],
    keys: &BTreeSet<PublicKey>,
) -> SignedTransaction<DemoOp> {
    let mut signed = tx.clone();
    for secret in secrets {
        if keys.contains(&secret.public_key()) {
            signed.sign(secret, &chain_id());
        }
    }
    signed
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[test]
fn single_key_threshold_met() {
    let k1 = seed_key(b"s1-k1");
    let a1 = AccountId(10);
    let mut chain = TestChain::default();
    chain.set_active(a1, Authority::single_key(k1.public_key()));

    let tx = signed_tx(vec![DemoOp::RequireActive(a1)], &[&k1]);
    let get_active = chain.get_active();
    let get_owner = chain.get_owner();
    assert!(tx
        .verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        )
        .is_ok());
}

#[test]
fn unrelated_signature_is_irrelevant() {
    let k1 = seed_key(b"s2-k1");
    let k2 = seed_key(b"s2-k2");
    let a1 = AccountId(10);
    let mut chain = TestChain::default();
    chain.set_active(a1, Authority::single_key(k1.public_key()));

    let tx = signed_tx(vec![DemoOp::RequireActive(a1)], &[&k1, &k2]);
    let get_active = chain.get_active();
    let get_owner = chain.get_owner();
    let err = tx
        .verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        )
        .unwrap_err();
    match err {
        AuthorizationError::IrrelevantSignature { unused } => {
            assert_eq!(unused, vec![k2.public_key()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn two_key_threshold_verifies_and_minimizes() {
    let k1 = seed_key(b"s3-k1");
    let k2 = seed_key(b"s3-k2");
    let a1 = AccountId(10);
    let auth = |threshold| {
        Authority::threshold_of_keys(threshold, [(k1.public_key(), 2), (k2.public_key(), 2)])
    };

    // threshold 3: both signatures verify, and neither is removable.
    let k_owner = seed_key(b"s3-owner");
    let mut chain = TestChain::default();
    chain
        .set_active(a1, auth(3))
        .set_owner(a1, Authority::single_key(k_owner.public_key()));
    let get_active = chain.get_active();
    let get_owner = chain.get_owner();

    let tx = signed_tx(vec![DemoOp::RequireActive(a1)], &[&k1, &k2]);
    assert!(tx
        .verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        )
        .is_ok());

    let available = BTreeSet::from([k1.public_key(), k2.public_key()]);
    let minimized = unsigned_tx(vec![DemoOp::RequireActive(a1)])
        .minimize_required_signatures(
            &chain_id(),
            &available,
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        )
        .unwrap();
    assert_eq!(minimized, available);

    // threshold 2: exactly one key suffices, deterministically.
    let mut chain = TestChain::default();
    chain
        .set_active(a1, auth(2))
        .set_owner(a1, Authority::single_key(k_owner.public_key()));
    let get_active = chain.get_active();
    let get_owner = chain.get_owner();

    let first = unsigned_tx(vec![DemoOp::RequireActive(a1)])
        .minimize_required_signatures(
            &chain_id(),
            &available,
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        )
        .unwrap();
    let second = unsigned_tx(vec![DemoOp::RequireActive(a1)])
        .minimize_required_signatures(
            &chain_id(),
            &available,
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        )
        .unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first, second);
}

#[test]
fn account_auth_recursion_respects_depth_bound() {
    let k1 = seed_key(b"s4-k1");
    let k_owner = seed_key(b"s4-owner");
    let a1 = AccountId(10);
    let a2 = AccountId(11);
    let mut chain = TestChain::default();
    chain
        .set_active(a1, Authority::single_account(a2))
        .set_active(a2, Authority::single_key(k1.public_key()))
        .set_owner(a1, Authority::single_key(k_owner.public_key()));

    let get_active = chain.get_active();
    let get_owner = chain.get_owner();

    let tx = signed_tx(vec![DemoOp::RequireActive(a1)], &[&k1]);
    assert!(tx
        .verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        )
        .is_ok());

    let err = tx
        .verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            0,
        )
        .unwrap_err();
    assert!(matches!(
        err,
        AuthorizationError::MissingActiveAuth { account, .. } if account == a1
    ));
}

#[test]
fn recursion_boundary_is_exact() {
    // The satisfying key sits two account hops deep: reached when
    // max_recursion = 2, out of reach (contributing zero) at 1.
    let k1 = seed_key(b"bound-k1");
    let k_owner = seed_key(b"bound-owner");
    let (a1, a2, a3) = (AccountId(10), AccountId(11), AccountId(12));
    let mut chain = TestChain::default();
    chain
        .set_active(a1, Authority::single_account(a2))
        .set_active(a2, Authority::single_account(a3))
        .set_active(a3, Authority::single_key(k1.public_key()))
        .set_owner(a1, Authority::single_key(k_owner.public_key()));

    let get_active = chain.get_active();
    let get_owner = chain.get_owner();
    let tx = signed_tx(vec![DemoOp::RequireActive(a1)], &[&k1]);

    assert!(tx
        .verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        )
        .is_ok());
    assert!(matches!(
        tx.verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            1,
        ),
        Err(AuthorizationError::MissingActiveAuth { .. })
    ));
}

#[test]
fn owner_satisfies_active() {
    let k1 = seed_key(b"s5-k1");
    let k2 = seed_key(b"s5-k2");
    let a1 = AccountId(10);
    let mut chain = TestChain::default();
    chain
        .set_active(a1, Authority::single_key(k1.public_key()))
        .set_owner(a1, Authority::single_key(k2.public_key()));

    let tx = signed_tx(vec![DemoOp::RequireActive(a1)], &[&k2]);
    assert_eq!(
        tx.get_signature_keys(&chain_id()).unwrap(),
        BTreeSet::from([k2.public_key()])
    );

    let get_active = chain.get_active();
    let get_owner = chain.get_owner();
    assert!(tx
        .verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        )
        .is_ok());
}

#[test]
fn custom_authority_shortcuts_required_active() {
    let k3 = seed_key(b"s6-k3");
    let a1 = AccountId(10);
    // No authority records at all: if the engine ever consulted a1's
    // active or owner authority the lookup would panic.
    let chain = TestChain::default();
    let custom = Authority::single_key(k3.public_key());
    let get_custom = |account: AccountId,
                      _op: &DemoOp,
                      _rejected: &mut RejectedCustomAuths|
     -> Vec<Authority> {
        assert_eq!(account, a1);
        vec![custom.clone()]
    };

    let tx = signed_tx(vec![DemoOp::RequireActive(a1)], &[&k3]);
    let get_active = chain.get_active();
    let get_owner = chain.get_owner();
    assert!(tx
        .verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &get_custom,
            false,
            false,
            2,
        )
        .is_ok());
}

#[test]
fn duplicate_signatures_are_fatal() {
    let k1 = seed_key(b"s7-k1");
    let a1 = AccountId(10);
    let mut tx = signed_tx(vec![DemoOp::RequireActive(a1)], &[&k1]);
    tx.signatures.push(tx.signatures[0]);
    assert!(matches!(
        tx.get_signature_keys(&chain_id()),
        Err(AuthorizationError::DuplicateSignature { .. })
    ));

    let mut chain = TestChain::default();
    chain.set_active(a1, Authority::single_key(k1.public_key()));
    let get_active = chain.get_active();
    let get_owner = chain.get_owner();
    assert!(matches!(
        tx.verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        ),
        Err(AuthorizationError::DuplicateSignature { .. })
    ));
}

// ── Properties ───────────────────────────────────────────────────────────────

#[test]
fn approvals_are_monotonic() {
    // A threshold-1 authority over two accounts: satisfying it via one
    // branch must keep holding when the other account is pre-approved.
    let k1 = seed_key(b"mono-k1");
    let (a1, a2, a3) = (AccountId(10), AccountId(11), AccountId(12));
    let mut chain = TestChain::default();
    let mut root = Authority::single_account(a2);
    root.add_account(a3, 1);
    chain
        .set_active(a1, root)
        .set_active(a2, Authority::single_key(k1.public_key()))
        .set_active(a3, Authority::single_key(seed_key(b"mono-k3").public_key()))
        .set_owner(a3, Authority::single_key(seed_key(b"mono-k3o").public_key()));

    let ops = vec![DemoOp::RequireActive(a1)];
    let sigs = BTreeSet::from([k1.public_key()]);
    let get_active = chain.get_active();
    let get_owner = chain.get_owner();

    assert!(verify_authority(
        &ops,
        &sigs,
        &get_active,
        &get_owner,
        &no_custom_authorities,
        false,
        false,
        2,
        false,
        &[],
        &[],
    )
    .is_ok());

    // Extra approvals never flip a satisfied evaluation to unsatisfied.
    assert!(verify_authority(
        &ops,
        &sigs,
        &get_active,
        &get_owner,
        &no_custom_authorities,
        false,
        false,
        2,
        false,
        &[a3],
        &[],
    )
    .is_ok());
}

#[test]
fn minimized_set_is_sufficient_and_locally_minimal() {
    let secrets = [
        seed_key(b"min-k1"),
        seed_key(b"min-k2"),
        seed_key(b"min-k3"),
    ];
    let a1 = AccountId(10);
    let mut chain = TestChain::default();
    chain
        .set_active(
            a1,
            Authority::threshold_of_keys(3, secrets.iter().map(|k| (k.public_key(), 2))),
        )
        .set_owner(
            a1,
            Authority::single_key(seed_key(b"min-owner").public_key()),
        );
    let get_active = chain.get_active();
    let get_owner = chain.get_owner();

    let available: BTreeSet<PublicKey> = secrets.iter().map(|k| k.public_key()).collect();
    let template = unsigned_tx(vec![DemoOp::RequireActive(a1)]);
    let minimized = template
        .minimize_required_signatures(
            &chain_id(),
            &available,
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        )
        .unwrap();
    assert_eq!(minimized.len(), 2);

    // Sufficient: signing with exactly the minimized set verifies.
    let signed = sign_with_subset(&template, &secrets, &minimized);
    assert!(signed
        .verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        )
        .is_ok());

    // Locally minimal: dropping any single member breaks verification.
    for excluded in &minimized {
        let mut reduced = minimized.clone();
        reduced.remove(excluded);
        let signed = sign_with_subset(&template, &secrets, &reduced);
        assert!(matches!(
            signed.verify_authority(
                &chain_id(),
                &get_active,
                &get_owner,
                &no_custom_authorities,
                false,
                false,
                2,
            ),
            Err(AuthorizationError::MissingActiveAuth { .. })
        ));
    }
}

#[test]
fn get_required_signatures_excludes_existing_signers() {
    let k1 = seed_key(b"req-k1");
    let k2 = seed_key(b"req-k2");
    let a1 = AccountId(10);
    let mut chain = TestChain::default();
    chain.set_active(
        a1,
        Authority::threshold_of_keys(2, [(k1.public_key(), 1), (k2.public_key(), 1)]),
    );
    let get_active = chain.get_active();
    let get_owner = chain.get_owner();

    // k1 already signed; only k2 should be requested from the pool.
    let tx = signed_tx(vec![DemoOp::RequireActive(a1)], &[&k1]);
    let available = BTreeSet::from([k1.public_key(), k2.public_key()]);
    let required = tx
        .get_required_signatures(
            &chain_id(),
            &available,
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        )
        .unwrap();
    assert_eq!(required, BTreeSet::from([k2.public_key()]));
}

#[test]
fn non_immediate_owner_requires_opt_in() {
    // a1's active delegates to a2, whose active is out of reach; a2's
    // owner key signs. Only the opt-in path may walk that owner.
    let k_owner = seed_key(b"nio-owner");
    let (a1, a2) = (AccountId(10), AccountId(11));
    let mut chain = TestChain::default();
    chain
        .set_active(a1, Authority::single_account(a2))
        .set_active(a2, Authority::single_key(seed_key(b"nio-lost").public_key()))
        .set_owner(a1, Authority::single_key(seed_key(b"nio-a1o").public_key()))
        .set_owner(a2, Authority::single_key(k_owner.public_key()));

    let get_active = chain.get_active();
    let get_owner = chain.get_owner();
    let tx = signed_tx(vec![DemoOp::RequireActive(a1)], &[&k_owner]);

    assert!(matches!(
        tx.verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        ),
        Err(AuthorizationError::MissingActiveAuth { .. })
    ));
    assert!(tx
        .verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            true,
            false,
            2,
        )
        .is_ok());
}

#[test]
fn owner_demand_rejects_active_only_signature() {
    let k_active = seed_key(b"own-active");
    let k_owner = seed_key(b"own-owner");
    let a1 = AccountId(10);
    let mut chain = TestChain::default();
    chain
        .set_active(a1, Authority::single_key(k_active.public_key()))
        .set_owner(a1, Authority::single_key(k_owner.public_key()));
    let get_active = chain.get_active();
    let get_owner = chain.get_owner();

    let tx = signed_tx(vec![DemoOp::RequireOwner(a1)], &[&k_active]);
    assert!(matches!(
        tx.verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        ),
        Err(AuthorizationError::MissingOwnerAuth { account }) if account == a1
    ));

    let tx = signed_tx(vec![DemoOp::RequireOwner(a1)], &[&k_owner]);
    assert!(tx
        .verify_authority(
            &chain_id(),
            &get_active,
            &get_owner,
            &no_custom_authorities,
            false,
            false,
            2,
        )
        .is_ok());
}
