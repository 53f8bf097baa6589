//! Anonymous group signalling with zero-knowledge membership proofs.
//!
//! A member holds a secret [`Identity`] whose public commitment is a leaf of a
//! [`GroupTree`]. With a halo2 proof the member shows that some leaf of the
//! group is theirs, without revealing which one, and attaches a signal and a
//! nullifier hash that is deterministic per external nullifier. Verifiers can
//! use that nullifier hash to stop the same identity from signalling twice in
//! one context.
//!
//! # Components
//!
//! - [`Identity`]: secret plus Poseidon commitment
//! - [`GroupTree`], [`SharedGroup`], [`GroupSnapshot`]: incremental Merkle group
//! - [`MembershipCircuit`]: the halo2 circuit
//! - [`CircuitArtifacts`]: shared parameters and per-depth keys
//! - [`ProofGenerator`], [`ProofVerifier`]: proving and verifying
//! - [`ProvingService`]: async, deadline-bounded proving
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zkp_group_signal::{
//!     CircuitArtifacts, ExternalNullifier, GroupTree, Identity, ProofGenerator, ProofVerifier,
//! };
//!
//! let alice = Identity::new(Some("alice")).unwrap();
//! let group = GroupTree::with_members(16, [alice.commitment()]).unwrap();
//! let artifacts = Arc::new(CircuitArtifacts::generate());
//!
//! let poll = ExternalNullifier::new("poll-42").unwrap();
//! let proof = ProofGenerator::new(artifacts.clone())
//!     .generate_proof(&alice, &group.snapshot(), &poll, b"yes")
//!     .unwrap();
//! let valid = ProofVerifier::new(artifacts)
//!     .verify_proof(&proof.proof, &proof.public_signals, group.depth())
//!     .unwrap();
//! assert!(valid);
//! ```

pub mod artifacts;
pub mod circuit;
pub mod config;
pub mod error;
pub mod identity;
pub mod members;
pub mod merkle;
pub mod nullifier;
pub mod proof;
pub mod service;
pub mod submission;
pub mod types;
pub mod utils;

#[cfg(test)]
mod merkle_tests;

pub use artifacts::CircuitArtifacts;
pub use circuit::MembershipCircuit;
pub use config::Config;
pub use error::{Error, ErrorKind, Result};
pub use identity::Identity;
pub use merkle::{GroupSnapshot, GroupTree, MerklePath, SharedGroup};
pub use proof::{Cancellation, ProofGenerator, ProofVerifier};
pub use service::{ProofRequest, ProvingService};
pub use submission::{Submission, SubmissionState};
pub use types::{ExternalNullifier, FullProof, Proof, ProofOutput, PublicSignals};
pub use utils::{field_from_hex, field_to_hex, poseidon_hash};

/// Circuit parameter for the halo2 proving system.
///
/// `k=12` gives 2^12 = 4096 rows. Each tree level costs one Poseidon
/// permutation plus a swap row, so every depth up to [`merkle::MAX_DEPTH`]
/// fits in this size.
///
/// Changing `CIRCUIT_K` invalidates every persisted parameter file and every
/// proof made so far; prover and verifier must agree on it.
pub const CIRCUIT_K: u32 = 12;
