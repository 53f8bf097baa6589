//! Type definitions for proofs, public signals and their wire format.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::merkle::validate_depth;
use crate::utils::{field_to_hex, hash_to_field, poseidon_hash, serde_field};
use log::debug;
use pasta_curves::pallas;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

const EXTERNAL_NULLIFIER_DOMAIN: &[u8] = b"zkp-group-signal/external-nullifier";
const SIGNAL_DOMAIN: &[u8] = b"zkp-group-signal/signal";

/// Default upper bound on signal length in bytes.
pub const DEFAULT_MAX_SIGNAL_LEN: usize = 4096;

/// Context tag (poll id, topic, epoch) that scopes nullifier uniqueness.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalNullifier {
    value: pallas::Base,
}

impl ExternalNullifier {
    /// Derives the external nullifier for a human readable context.
    ///
    /// # Errors
    /// [`Error::InvalidInput`] for a blank context.
    pub fn new(context: &str) -> Result<Self> {
        if context.trim().is_empty() {
            return Err(Error::InvalidInput(
                "external nullifier cannot be empty".to_string(),
            ));
        }
        Ok(Self {
            value: hash_to_field(EXTERNAL_NULLIFIER_DOMAIN, context.as_bytes()),
        })
    }

    #[must_use]
    pub fn from_field(value: pallas::Base) -> Self {
        Self { value }
    }

    #[must_use]
    pub fn value(&self) -> pallas::Base {
        self.value
    }
}

/// Hash of an application signal as committed in a proof.
///
/// # Errors
/// [`Error::InvalidInput`] if the signal is longer than `max_len` bytes.
pub fn hash_signal(signal: &[u8], max_len: usize) -> Result<pallas::Base> {
    if signal.len() > max_len {
        return Err(Error::InvalidInput(format!(
            "signal is {} bytes, at most {} allowed",
            signal.len(),
            max_len
        )));
    }
    Ok(hash_to_field(SIGNAL_DOMAIN, signal))
}

/// Nullifier hash `Poseidon(secret, external_nullifier)`.
///
/// Depends on nothing else, so two proofs by the same identity in the same
/// context always carry the same value.
#[must_use]
#[inline]
pub fn compute_nullifier_hash(
    secret: pallas::Base,
    external_nullifier: pallas::Base,
) -> pallas::Base {
    poseidon_hash(secret, external_nullifier)
}

/// Public inputs of a membership proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicSignals {
    #[serde(with = "serde_field")]
    pub merkle_root: pallas::Base,
    #[serde(with = "serde_field")]
    pub nullifier_hash: pallas::Base,
    #[serde(with = "serde_field")]
    pub signal_hash: pallas::Base,
    #[serde(with = "serde_field")]
    pub external_nullifier: pallas::Base,
}

impl PublicSignals {
    /// Instance column layout shared with the circuit.
    pub const MERKLE_ROOT_ROW: usize = 0;
    pub const NULLIFIER_HASH_ROW: usize = 1;
    pub const SIGNAL_HASH_ROW: usize = 2;
    pub const EXTERNAL_NULLIFIER_ROW: usize = 3;

    #[must_use]
    pub fn to_instance(&self) -> Vec<pallas::Base> {
        vec![
            self.merkle_root,
            self.nullifier_hash,
            self.signal_hash,
            self.external_nullifier,
        ]
    }
}

/// Opaque serialized halo2 proof.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof(Vec<u8>);

impl Proof {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Proof {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Result of proof generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullProof {
    pub proof: Proof,
    pub public_signals: PublicSignals,
}

/// JSON document exchanged between the prover and the verifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofOutput {
    pub public_signals: PublicSignals,
    /// Depth of the group the proof was generated against.
    pub depth: usize,
    /// Raw ZK-SNARK proof bytes, hex encoded
    #[serde(with = "hex::serde")]
    pub proof: Vec<u8>,
    /// Unix timestamp when proof was generated
    pub timestamp: u64,
}

fn unix_now() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| Error::InvalidInput(format!("System clock unavailable: {e}")))
}

impl ProofOutput {
    pub fn new(full_proof: FullProof, depth: usize) -> Result<Self> {
        Ok(Self {
            public_signals: full_proof.public_signals,
            depth,
            proof: full_proof.proof.into_bytes(),
            timestamp: unix_now()?,
        })
    }

    #[must_use]
    pub fn full_proof(&self) -> FullProof {
        FullProof {
            proof: Proof::from(self.proof.clone()),
            public_signals: self.public_signals,
        }
    }

    /// Validates the proof output structure.
    ///
    /// Checks the depth range, that the proof is non-empty and within the
    /// configured size limit, and that the timestamp is neither in the future
    /// (beyond tolerance) nor older than the configured maximum age. Field
    /// encodings are already checked while deserialising.
    ///
    /// # Errors
    /// [`Error::Verification`] describing the first failed check.
    pub fn validate(&self, config: &Config) -> Result<()> {
        debug!("Starting proof output validation");
        debug!("Merkle root: {}", field_to_hex(self.public_signals.merkle_root));
        debug!("ZK proof size: {} bytes", self.proof.len());
        debug!("Depth: {}", self.depth);
        debug!("Timestamp: {}", self.timestamp);

        validate_depth(self.depth).map_err(|e| Error::Verification(e.to_string()))?;

        if self.proof.is_empty() {
            return Err(Error::Verification(
                "ZK proof cannot be empty. The proof data is missing.".to_string(),
            ));
        }
        if self.proof.len() > config.proof.max_zk_proof_size {
            return Err(Error::Verification(format!(
                "ZK proof size exceeds limit: {} bytes (max {} bytes)",
                self.proof.len(),
                config.proof.max_zk_proof_size
            )));
        }

        let now = unix_now()?;
        let security = &config.security;
        if self.timestamp > now + security.timestamp_tolerance_secs {
            return Err(Error::Verification(format!(
                "Timestamp is too far in the future: {} (current: {}, tolerance: {}s). Please check system clock and proof timestamp.",
                self.timestamp, now, security.timestamp_tolerance_secs
            )));
        }
        if now > self.timestamp + security.timestamp_max_age_secs {
            return Err(Error::Verification(format!(
                "Timestamp is too old: {} (current: {}, max age: {}s). This proof may be expired. Please generate a fresh proof.",
                self.timestamp, now, security.timestamp_max_age_secs
            )));
        }

        Ok(())
    }
}
