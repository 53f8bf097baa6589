//! Member identities: a private secret and its public commitment.

use crate::error::{Error, Result};
use crate::utils::{field_from_hex, field_to_hex, hash_to_field, poseidon_hash_one};
use log::debug;
use pasta_curves::group::ff::Field;
use pasta_curves::pallas;
use rand::rngs::OsRng;
use std::fmt;

/// Default upper bound on seed length in bytes.
pub const DEFAULT_MAX_SEED_LEN: usize = 1024;

const SECRET_DOMAIN: &[u8] = b"zkp-group-signal/identity-secret";

/// A group member identity.
///
/// The commitment is `Poseidon(secret)` and is safe to publish. The secret
/// never leaves this struct except through [`Identity::secret_hex`].
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    secret: pallas::Base,
    commitment: pallas::Base,
}

impl Identity {
    /// Creates an identity, deterministically from `seed` when one is given.
    ///
    /// The same seed always yields the same commitment, which is how an
    /// identity is recovered. Without a seed the secret comes from the OS RNG.
    ///
    /// # Errors
    /// [`Error::InvalidSeed`] when the seed is blank, contains control
    /// characters, or is longer than [`DEFAULT_MAX_SEED_LEN`] bytes.
    pub fn new(seed: Option<&str>) -> Result<Self> {
        Self::new_with_limit(seed, DEFAULT_MAX_SEED_LEN)
    }

    /// Like [`Identity::new`] with an explicit seed length limit.
    pub fn new_with_limit(seed: Option<&str>, max_seed_len: usize) -> Result<Self> {
        match seed {
            Some(seed) => {
                validate_seed(seed, max_seed_len)?;
                debug!("Deriving identity from seed ({} bytes)", seed.len());
                Ok(Self::from_secret(hash_to_field(SECRET_DOMAIN, seed.as_bytes())))
            }
            None => {
                debug!("Sampling random identity secret");
                Ok(Self::from_secret(pallas::Base::random(OsRng)))
            }
        }
    }

    /// Builds an identity from an already known secret.
    #[must_use]
    pub fn from_secret(secret: pallas::Base) -> Self {
        Self {
            secret,
            commitment: poseidon_hash_one(secret),
        }
    }

    /// Restores an identity from the hex produced by [`Identity::secret_hex`].
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self> {
        let secret = field_from_hex(secret_hex)
            .map_err(|e| Error::InvalidSeed(format!("invalid exported secret: {e}")))?;
        Ok(Self::from_secret(secret))
    }

    #[must_use]
    pub fn commitment(&self) -> pallas::Base {
        self.commitment
    }

    #[must_use]
    pub fn commitment_hex(&self) -> String {
        field_to_hex(self.commitment)
    }

    /// Exports the secret for backup. Treat the output as a private key.
    #[must_use]
    pub fn secret_hex(&self) -> String {
        field_to_hex(self.secret)
    }

    pub(crate) fn secret(&self) -> pallas::Base {
        self.secret
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("commitment", &self.commitment_hex())
            .finish_non_exhaustive()
    }
}

fn validate_seed(seed: &str, max_seed_len: usize) -> Result<()> {
    if seed.trim().is_empty() {
        return Err(Error::InvalidSeed("seed cannot be empty".to_string()));
    }
    if seed.len() > max_seed_len {
        return Err(Error::InvalidSeed(format!(
            "seed is {} bytes, at most {} allowed",
            seed.len(),
            max_seed_len
        )));
    }
    if seed.chars().any(char::is_control) {
        return Err(Error::InvalidSeed(
            "seed cannot contain control characters".to_string(),
        ));
    }
    Ok(())
}
