//! Proof generation and verification over shared circuit artifacts.

use crate::artifacts::CircuitArtifacts;
use crate::circuit::MembershipCircuit;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::merkle::{validate_depth, GroupSnapshot};
use crate::types::{
    compute_nullifier_hash, hash_signal, ExternalNullifier, FullProof, Proof, PublicSignals,
    DEFAULT_MAX_SIGNAL_LEN,
};
use crate::utils::field_to_hex;
use halo2_proofs::{
    plonk::{create_proof, verify_proof, SingleVerifier},
    transcript::{Blake2bRead, Blake2bWrite, Challenge255},
};
use log::{debug, info};
use pasta_curves::{pallas, vesta};
use rand::rngs::OsRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Shared flag a caller raises to abandon a pending generation.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Generates membership proofs. Stateless apart from the shared artifacts;
/// it does not track nullifier reuse.
pub struct ProofGenerator {
    artifacts: Arc<CircuitArtifacts>,
    max_signal_len: usize,
}

impl ProofGenerator {
    #[must_use]
    pub fn new(artifacts: Arc<CircuitArtifacts>) -> Self {
        Self {
            artifacts,
            max_signal_len: DEFAULT_MAX_SIGNAL_LEN,
        }
    }

    #[must_use]
    pub fn from_config(artifacts: Arc<CircuitArtifacts>, config: &Config) -> Self {
        Self {
            artifacts,
            max_signal_len: config.proof.max_signal_len,
        }
    }

    /// Proves that `identity` belongs to `snapshot` and binds `signal` to
    /// `external_nullifier`.
    ///
    /// Blocks for the whole proving time; call it from a worker thread (see
    /// [`crate::service::ProvingService`]), never from an interactive path.
    ///
    /// # Errors
    /// - [`Error::InvalidInput`] for an oversized signal
    /// - [`Error::NotAMember`] if the commitment is not in the snapshot
    /// - [`Error::CircuitExecution`] if the membership path does not reach the
    ///   snapshot root or the prover fails
    /// - resource errors from key derivation
    pub fn generate_proof(
        &self,
        identity: &Identity,
        snapshot: &GroupSnapshot,
        external_nullifier: &ExternalNullifier,
        signal: &[u8],
    ) -> Result<FullProof> {
        self.generate_proof_cancellable(
            identity,
            snapshot,
            external_nullifier,
            signal,
            &Cancellation::default(),
        )
    }

    /// Like [`ProofGenerator::generate_proof`], abandoning the work with
    /// [`Error::Cancelled`] if `cancellation` is raised before proving starts.
    pub fn generate_proof_cancellable(
        &self,
        identity: &Identity,
        snapshot: &GroupSnapshot,
        external_nullifier: &ExternalNullifier,
        signal: &[u8],
        cancellation: &Cancellation,
    ) -> Result<FullProof> {
        let signal_hash = hash_signal(signal, self.max_signal_len)?;
        let path = snapshot.membership_path(&identity.commitment())?;
        debug!(
            "Membership path found for {} at leaf {}",
            identity.commitment_hex(),
            path.leaf_index
        );

        let public_signals = PublicSignals {
            merkle_root: snapshot.root(),
            nullifier_hash: compute_nullifier_hash(identity.secret(), external_nullifier.value()),
            signal_hash,
            external_nullifier: external_nullifier.value(),
        };

        cancellation.check()?;
        let pk = self.artifacts.proving_key(snapshot.depth())?;

        cancellation.check()?;
        let started = Instant::now();
        let circuit = MembershipCircuit::new(identity.secret(), &path);
        let instance = public_signals.to_instance();
        let instances: &[&[&[pallas::Base]]] = &[&[&instance]];
        let mut transcript = Blake2bWrite::<_, vesta::Affine, Challenge255<_>>::init(vec![]);
        create_proof(
            self.artifacts.params(),
            &*pk,
            &[circuit],
            instances,
            OsRng,
            &mut transcript,
        )
        .map_err(|e| Error::CircuitExecution(format!("proof creation failed: {e:?}")))?;
        let proof = transcript.finalize();

        info!(
            "Generated {}-byte proof at depth {} in {:?} (nullifier hash {})",
            proof.len(),
            snapshot.depth(),
            started.elapsed(),
            field_to_hex(public_signals.nullifier_hash)
        );

        Ok(FullProof {
            proof: Proof::from(proof),
            public_signals,
        })
    }
}

/// Verifies membership proofs. Pure: no state beyond the key cache, safe to
/// share and call concurrently.
pub struct ProofVerifier {
    artifacts: Arc<CircuitArtifacts>,
    max_proof_size: usize,
}

impl ProofVerifier {
    #[must_use]
    pub fn new(artifacts: Arc<CircuitArtifacts>) -> Self {
        Self::from_config(artifacts, &Config::default())
    }

    #[must_use]
    pub fn from_config(artifacts: Arc<CircuitArtifacts>, config: &Config) -> Self {
        Self {
            artifacts,
            max_proof_size: config.proof.max_zk_proof_size,
        }
    }

    /// Checks `proof` against `public_signals` with the verifying key for `depth`.
    ///
    /// Returns `Ok(false)` when the proof does not verify (wrong depth,
    /// tampered signals, corrupted bytes).
    ///
    /// # Errors
    /// [`Error::Verification`] for structurally unusable input: an empty or
    /// oversized proof, or a depth outside the supported range.
    pub fn verify_proof(
        &self,
        proof: &Proof,
        public_signals: &PublicSignals,
        depth: usize,
    ) -> Result<bool> {
        validate_depth(depth).map_err(|e| Error::Verification(e.to_string()))?;
        if proof.is_empty() {
            return Err(Error::Verification("proof is empty".to_string()));
        }
        if proof.len() > self.max_proof_size {
            return Err(Error::Verification(format!(
                "proof is {} bytes, at most {} allowed",
                proof.len(),
                self.max_proof_size
            )));
        }

        let vk = self.artifacts.verifying_key(depth)?;
        let params = self.artifacts.params();
        let instance = public_signals.to_instance();
        let instances: &[&[&[pallas::Base]]] = &[&[&instance]];
        let strategy = SingleVerifier::new(params);
        let mut transcript = Blake2bRead::<_, vesta::Affine, Challenge255<_>>::init(proof.as_bytes());

        match verify_proof(params, &*vk, strategy, instances, &mut transcript) {
            Ok(()) => {
                debug!("Proof verified at depth {depth}");
                Ok(true)
            }
            Err(e) => {
                debug!("Proof rejected at depth {depth}: {e:?}");
                Ok(false)
            }
        }
    }

    /// [`ProofVerifier::verify_proof`] plus a check that the proof was made
    /// against `expected_root`, e.g. the root currently recorded on chain.
    pub fn verify_with_root(
        &self,
        proof: &Proof,
        public_signals: &PublicSignals,
        depth: usize,
        expected_root: pallas::Base,
    ) -> Result<bool> {
        if public_signals.merkle_root != expected_root {
            info!(
                "Proof root {} does not match expected root {}",
                field_to_hex(public_signals.merkle_root),
                field_to_hex(expected_root)
            );
            return Ok(false);
        }
        self.verify_proof(proof, public_signals, depth)
    }
}
