use once_cell::sync::Lazy;
use pasta_curves::pallas;
use std::sync::Arc;
use zkp_group_signal::{
    CircuitArtifacts, Error, ErrorKind, ExternalNullifier, FullProof, GroupTree, Identity,
    ProofGenerator, ProofVerifier,
};

static ARTIFACTS: Lazy<Arc<CircuitArtifacts>> = Lazy::new(|| Arc::new(CircuitArtifacts::generate()));

fn generator() -> ProofGenerator {
    ProofGenerator::new(ARTIFACTS.clone())
}

fn verifier() -> ProofVerifier {
    ProofVerifier::new(ARTIFACTS.clone())
}

fn prove(identity: &Identity, group: &GroupTree, context: &str, signal: &[u8]) -> FullProof {
    generator()
        .generate_proof(
            identity,
            &group.snapshot(),
            &ExternalNullifier::new(context).unwrap(),
            signal,
        )
        .unwrap()
}

#[test]
fn test_alice_scenario() {
    let alice = Identity::new(Some("alice")).unwrap();
    let group = GroupTree::with_members(1, [alice.commitment()]).unwrap();

    let proof = prove(&alice, &group, "poll-1", b"yes");
    let verifier = verifier();
    assert!(verifier
        .verify_proof(&proof.proof, &proof.public_signals, 1)
        .unwrap());
    assert!(!verifier
        .verify_proof(&proof.proof, &proof.public_signals, 2)
        .unwrap());
}

#[test]
fn test_round_trip_in_larger_group() {
    let members: Vec<Identity> = (0..5)
        .map(|i| Identity::new(Some(&format!("member-{i}"))).unwrap())
        .collect();
    let group = GroupTree::with_members(4, members.iter().map(Identity::commitment)).unwrap();

    let proof = prove(&members[3], &group, "poll-7", b"option b");
    assert_eq!(proof.public_signals.merkle_root, group.root());
    assert!(verifier()
        .verify_proof(&proof.proof, &proof.public_signals, 4)
        .unwrap());
}

#[test]
fn test_tampered_public_signals_are_rejected() {
    let alice = Identity::new(Some("alice")).unwrap();
    let bob = Identity::new(Some("bob")).unwrap();
    let group = GroupTree::with_members(2, [alice.commitment(), bob.commitment()]).unwrap();
    let proof = prove(&bob, &group, "poll-1", b"no");
    let verifier = verifier();
    let one = pallas::Base::from(1);

    let mut signals = proof.public_signals;
    signals.merkle_root += one;
    assert!(!verifier.verify_proof(&proof.proof, &signals, 2).unwrap());

    let mut signals = proof.public_signals;
    signals.nullifier_hash += one;
    assert!(!verifier.verify_proof(&proof.proof, &signals, 2).unwrap());

    let mut signals = proof.public_signals;
    signals.signal_hash += one;
    assert!(!verifier.verify_proof(&proof.proof, &signals, 2).unwrap());

    let mut signals = proof.public_signals;
    signals.external_nullifier += one;
    assert!(!verifier.verify_proof(&proof.proof, &signals, 2).unwrap());
}

#[test]
fn test_corrupted_proof_bytes_are_rejected() {
    let alice = Identity::new(Some("alice")).unwrap();
    let group = GroupTree::with_members(1, [alice.commitment()]).unwrap();
    let proof = prove(&alice, &group, "poll-1", b"yes");

    let mut bytes = proof.proof.clone().into_bytes();
    let mid = bytes.len() / 2;
    bytes[mid] ^= 0xff;
    assert!(!verifier()
        .verify_proof(&bytes.into(), &proof.public_signals, 1)
        .unwrap());
}

#[test]
fn test_nullifier_consistency() {
    let alice = Identity::new(Some("alice")).unwrap();
    let group = GroupTree::with_members(2, [alice.commitment()]).unwrap();

    let first = prove(&alice, &group, "poll-1", b"yes");
    let second = prove(&alice, &group, "poll-1", b"no");
    let other_context = prove(&alice, &group, "poll-2", b"yes");

    assert_eq!(
        first.public_signals.nullifier_hash,
        second.public_signals.nullifier_hash
    );
    assert_ne!(first.public_signals.signal_hash, second.public_signals.signal_hash);
    assert_ne!(
        first.public_signals.nullifier_hash,
        other_context.public_signals.nullifier_hash
    );
}

#[test]
fn test_non_member_is_refused() {
    let alice = Identity::new(Some("alice")).unwrap();
    let bob = Identity::new(Some("bob")).unwrap();
    let group = GroupTree::with_members(1, [alice.commitment()]).unwrap();

    let err = generator()
        .generate_proof(
            &bob,
            &group.snapshot(),
            &ExternalNullifier::new("poll-1").unwrap(),
            b"yes",
        )
        .unwrap_err();
    assert!(matches!(err, Error::NotAMember(_)));
    assert_eq!(err.kind(), ErrorKind::Membership);
}

#[test]
fn test_old_snapshot_still_proves_against_old_root() {
    let alice = Identity::new(Some("alice")).unwrap();
    let bob = Identity::new(Some("bob")).unwrap();
    let mut group = GroupTree::with_members(2, [alice.commitment()]).unwrap();
    let before = group.snapshot();
    group.add_member(bob.commitment()).unwrap();

    let proof = generator()
        .generate_proof(
            &alice,
            &before,
            &ExternalNullifier::new("poll-1").unwrap(),
            b"yes",
        )
        .unwrap();
    let verifier = verifier();
    assert!(verifier
        .verify_with_root(&proof.proof, &proof.public_signals, 2, before.root())
        .unwrap());
    assert!(!verifier
        .verify_with_root(&proof.proof, &proof.public_signals, 2, group.root())
        .unwrap());
}

#[test]
fn test_oversized_signal_is_input_error() {
    let alice = Identity::new(Some("alice")).unwrap();
    let group = GroupTree::with_members(1, [alice.commitment()]).unwrap();
    let signal = vec![0u8; zkp_group_signal::types::DEFAULT_MAX_SIGNAL_LEN + 1];

    let err = generator()
        .generate_proof(
            &alice,
            &group.snapshot(),
            &ExternalNullifier::new("poll-1").unwrap(),
            &signal,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Input);
}
