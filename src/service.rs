//! Async front end that keeps proving off the caller's executor.
//!
//! Proof generation is CPU bound and takes seconds, so it always runs on
//! tokio's blocking pool under a deadline. Verification is cheaper but still
//! blocking, and goes through the same pool.

use crate::artifacts::CircuitArtifacts;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::merkle::GroupSnapshot;
use crate::proof::{Cancellation, ProofGenerator, ProofVerifier};
use crate::submission::Submission;
use crate::types::{ExternalNullifier, FullProof};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;

/// Everything needed to prove one signal.
#[derive(Debug, Clone)]
pub struct ProofRequest {
    pub identity: Identity,
    pub snapshot: GroupSnapshot,
    pub external_nullifier: ExternalNullifier,
    pub signal: Vec<u8>,
}

#[derive(Clone)]
pub struct ProvingService {
    generator: Arc<ProofGenerator>,
    verifier: Arc<ProofVerifier>,
    default_deadline: Duration,
}

fn join_error(e: JoinError) -> Error {
    Error::CircuitExecution(format!("proving worker failed: {e}"))
}

impl ProvingService {
    #[must_use]
    pub fn new(artifacts: Arc<CircuitArtifacts>, config: &Config) -> Self {
        Self {
            generator: Arc::new(ProofGenerator::from_config(artifacts.clone(), config)),
            verifier: Arc::new(ProofVerifier::from_config(artifacts, config)),
            default_deadline: Duration::from_secs(config.proof.deadline_secs),
        }
    }

    #[must_use]
    pub fn default_deadline(&self) -> Duration {
        self.default_deadline
    }

    /// Generates a proof on the blocking pool.
    ///
    /// When `deadline` passes first the work is flagged as cancelled and
    /// [`Error::DeadlineExceeded`] is returned; a prover already inside
    /// `create_proof` runs to completion in the background and its result is
    /// dropped.
    pub async fn generate(&self, request: ProofRequest, deadline: Duration) -> Result<FullProof> {
        let generator = self.generator.clone();
        let cancellation = Cancellation::default();
        let worker_cancellation = cancellation.clone();
        let task = tokio::task::spawn_blocking(move || {
            generator.generate_proof_cancellable(
                &request.identity,
                &request.snapshot,
                &request.external_nullifier,
                &request.signal,
                &worker_cancellation,
            )
        });

        match tokio::time::timeout(deadline, task).await {
            Ok(joined) => joined.map_err(join_error)?,
            Err(_) => {
                cancellation.cancel();
                warn!("Proof generation exceeded deadline of {deadline:?}");
                Err(Error::DeadlineExceeded(deadline))
            }
        }
    }

    /// Verifies a proof on the blocking pool.
    pub async fn verify(&self, proof: FullProof, depth: usize) -> Result<bool> {
        let verifier = self.verifier.clone();
        tokio::task::spawn_blocking(move || {
            verifier.verify_proof(&proof.proof, &proof.public_signals, depth)
        })
        .await
        .map_err(join_error)?
    }

    /// Generates then verifies, recording each step in a [`Submission`].
    ///
    /// Failures end up in the returned submission's state rather than as an
    /// `Err`.
    pub async fn submit(&self, request: ProofRequest, deadline: Duration) -> Submission {
        let depth = request.snapshot.depth();
        let mut submission = Submission::new();
        if let Err(e) = self.drive(&mut submission, request, deadline, depth).await {
            warn!("Submission stopped in state {}: {e}", submission.state());
        }
        info!("Submission finished as {}", submission.state());
        submission
    }

    async fn drive(
        &self,
        submission: &mut Submission,
        request: ProofRequest,
        deadline: Duration,
        depth: usize,
    ) -> Result<()> {
        submission.start_generation()?;
        let generated = self.generate(request, deadline).await;
        submission.complete_generation(generated)?;
        let Some(proof) = submission.proof().cloned() else {
            return Ok(());
        };

        submission.start_verification()?;
        let verdict = self.verify(proof, depth).await;
        submission.complete_verification(verdict)
    }
}
