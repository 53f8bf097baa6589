use halo2_proofs::dev::MockProver;
use pasta_curves::pallas;
use zkp_group_signal::{
    types::compute_nullifier_hash, types::hash_signal, types::DEFAULT_MAX_SIGNAL_LEN, GroupTree,
    Identity, MembershipCircuit, PublicSignals, CIRCUIT_K,
};

struct Fixture {
    identity: Identity,
    circuit: MembershipCircuit,
    signals: PublicSignals,
}

fn fixture(depth: usize) -> Fixture {
    let identity = Identity::new(Some("alice")).unwrap();
    let other = Identity::new(Some("bob")).unwrap();
    let group =
        GroupTree::with_members(depth, [other.commitment(), identity.commitment()]).unwrap();
    let snapshot = group.snapshot();
    let path = snapshot.membership_path(&identity.commitment()).unwrap();

    let external_nullifier = pallas::Base::from(42);
    let signals = PublicSignals {
        merkle_root: group.root(),
        nullifier_hash: nullifier_of(&identity, external_nullifier),
        signal_hash: hash_signal(b"yes", DEFAULT_MAX_SIGNAL_LEN).unwrap(),
        external_nullifier,
    };

    Fixture {
        circuit: circuit_for(&identity, &path),
        identity,
        signals,
    }
}

fn circuit_for(identity: &Identity, path: &zkp_group_signal::MerklePath) -> MembershipCircuit {
    let secret = zkp_group_signal::field_from_hex(&identity.secret_hex()).unwrap();
    MembershipCircuit::new(secret, path)
}

fn nullifier_of(identity: &Identity, external_nullifier: pallas::Base) -> pallas::Base {
    let secret = zkp_group_signal::field_from_hex(&identity.secret_hex()).unwrap();
    compute_nullifier_hash(secret, external_nullifier)
}

#[test]
fn test_honest_witness_satisfies_circuit() {
    let f = fixture(3);
    let prover = MockProver::run(CIRCUIT_K, &f.circuit, vec![f.signals.to_instance()]).unwrap();
    assert_eq!(prover.verify(), Ok(()));
}

#[test]
fn test_max_depth_fits_circuit_size() {
    let f = fixture(zkp_group_signal::merkle::MAX_DEPTH);
    let prover = MockProver::run(CIRCUIT_K, &f.circuit, vec![f.signals.to_instance()]).unwrap();
    assert_eq!(prover.verify(), Ok(()));
}

#[test]
fn test_wrong_root_is_rejected() {
    let f = fixture(3);
    let mut signals = f.signals;
    signals.merkle_root += pallas::Base::from(1);
    let prover = MockProver::run(CIRCUIT_K, &f.circuit, vec![signals.to_instance()]).unwrap();
    assert!(prover.verify().is_err());
}

#[test]
fn test_wrong_nullifier_is_rejected() {
    let f = fixture(3);
    let mut signals = f.signals;
    signals.nullifier_hash = nullifier_of(&f.identity, pallas::Base::from(43));
    let prover = MockProver::run(CIRCUIT_K, &f.circuit, vec![signals.to_instance()]).unwrap();
    assert!(prover.verify().is_err());
}

#[test]
fn test_non_member_secret_is_rejected() {
    let f = fixture(3);
    let stranger = Identity::new(Some("mallory")).unwrap();
    let group = GroupTree::with_members(3, [stranger.commitment()]).unwrap();
    let path = group.merkle_path(0).unwrap();

    // Stranger's own path, but the public root is alice's group.
    let circuit = circuit_for(&stranger, &path);
    let mut signals = f.signals;
    signals.nullifier_hash = nullifier_of(&stranger, signals.external_nullifier);
    let prover = MockProver::run(CIRCUIT_K, &circuit, vec![signals.to_instance()]).unwrap();
    assert!(prover.verify().is_err());
}
