//! Circuit artifacts: public parameters and per-depth keys.
//!
//! The IPA parameters for [`CIRCUIT_K`] are loaded (or generated) once per
//! process and shared read-only between every proving and verifying call.
//! Proving and verifying keys are derived from them per tree depth on first
//! use and cached.

use crate::circuit::MembershipCircuit;
use crate::config::KeysConfig;
use crate::error::{Error, Result};
use crate::merkle::validate_depth;
use crate::CIRCUIT_K;
use halo2_proofs::{
    plonk::{keygen_pk, keygen_vk, ProvingKey, VerifyingKey},
    poly::commitment::Params,
};
use log::{debug, info, warn};
use parking_lot::RwLock;
use pasta_curves::vesta;
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Header written in front of serialized parameters.
const PARAMS_MAGIC: &[u8; 8] = b"ZKPGSIG\x01";

pub struct CircuitArtifacts {
    params: Params<vesta::Affine>,
    proving_keys: RwLock<HashMap<usize, Arc<ProvingKey<vesta::Affine>>>>,
    verifying_keys: RwLock<HashMap<usize, Arc<VerifyingKey<vesta::Affine>>>>,
}

fn classify_io(path: &Path, source: io::Error) -> Error {
    match source.kind() {
        io::ErrorKind::NotFound => Error::MissingArtifact(path.to_path_buf()),
        io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData => Error::CorruptArtifact {
            path: path.to_path_buf(),
            reason: source.to_string(),
        },
        _ => Error::ArtifactIo {
            path: path.to_path_buf(),
            source,
        },
    }
}

impl CircuitArtifacts {
    /// Generates fresh parameters in memory.
    #[must_use]
    pub fn generate() -> Self {
        info!("Generating circuit parameters for k={CIRCUIT_K}");
        Self::from_params(Params::<vesta::Affine>::new(CIRCUIT_K))
    }

    #[must_use]
    pub fn from_params(params: Params<vesta::Affine>) -> Self {
        Self {
            params,
            proving_keys: RwLock::new(HashMap::new()),
            verifying_keys: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn params(&self) -> &Params<vesta::Affine> {
        &self.params
    }

    /// Location of the parameter file inside a key directory.
    #[must_use]
    pub fn params_path(cache_dir: &Path) -> PathBuf {
        cache_dir.join(format!("params-k{CIRCUIT_K}.bin"))
    }

    /// Reads parameters from `path` in a single attempt.
    ///
    /// # Errors
    /// - [`Error::MissingArtifact`] if the file does not exist
    /// - [`Error::CorruptArtifact`] on a bad header, wrong `k` or truncated data
    /// - [`Error::ArtifactIo`] on any other I/O failure
    pub fn read_params(path: &Path) -> Result<Params<vesta::Affine>> {
        let file = File::open(path).map_err(|e| classify_io(path, e))?;
        let mut reader = BufReader::new(file);

        let mut magic = [0u8; 8];
        reader
            .read_exact(&mut magic)
            .map_err(|e| classify_io(path, e))?;
        if &magic != PARAMS_MAGIC {
            return Err(Error::CorruptArtifact {
                path: path.to_path_buf(),
                reason: "unrecognised file header".to_string(),
            });
        }

        let mut k_bytes = [0u8; 4];
        reader
            .read_exact(&mut k_bytes)
            .map_err(|e| classify_io(path, e))?;
        let k = u32::from_le_bytes(k_bytes);
        if k != CIRCUIT_K {
            return Err(Error::CorruptArtifact {
                path: path.to_path_buf(),
                reason: format!("parameters are for k={k}, expected k={CIRCUIT_K}"),
            });
        }

        Params::read(&mut reader).map_err(|e| classify_io(path, e))
    }

    /// Writes the parameters to `path` atomically (temp file + rename).
    pub fn write_params(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| classify_io(parent, e))?;
        }
        let tmp = path.with_extension("bin.tmp");
        let write = |writer: &mut BufWriter<File>| -> io::Result<()> {
            writer.write_all(PARAMS_MAGIC)?;
            writer.write_all(&CIRCUIT_K.to_le_bytes())?;
            self.params.write(writer)?;
            writer.flush()
        };
        let file = File::create(&tmp).map_err(|e| classify_io(&tmp, e))?;
        write(&mut BufWriter::new(file)).map_err(|e| classify_io(&tmp, e))?;
        fs::rename(&tmp, path).map_err(|e| classify_io(path, e))?;
        info!("Circuit parameters written to {}", path.display());
        Ok(())
    }

    /// Loads the parameters from `config.cache_dir`.
    ///
    /// Transient I/O failures are retried `load_retries` times with
    /// exponential backoff starting at `retry_backoff_ms`. A missing file is
    /// generated (and persisted when `enable_persistence` is set) if
    /// `generate_if_missing` allows it; every other failure is returned as is.
    pub fn load(config: &KeysConfig) -> Result<Self> {
        let path = Self::params_path(&config.cache_dir);
        let mut attempt: u32 = 0;
        loop {
            match Self::read_params(&path) {
                Ok(params) => {
                    info!("Loaded circuit parameters from {}", path.display());
                    return Ok(Self::from_params(params));
                }
                Err(Error::MissingArtifact(_)) if config.generate_if_missing => {
                    info!("No circuit parameters at {}", path.display());
                    let artifacts = Self::generate();
                    if config.enable_persistence {
                        if let Err(e) = artifacts.write_params(&path) {
                            warn!("Could not persist circuit parameters: {e}");
                        }
                    }
                    return Ok(artifacts);
                }
                Err(e) if e.is_retryable() && attempt < config.load_retries => {
                    let backoff = Duration::from_millis(
                        config
                            .retry_backoff_ms
                            .saturating_mul(2u64.saturating_pow(attempt)),
                    );
                    warn!(
                        "Loading circuit parameters failed (attempt {}): {e}; retrying in {backoff:?}",
                        attempt + 1
                    );
                    std::thread::sleep(backoff);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Proving key for circuits of `depth` levels.
    pub fn proving_key(&self, depth: usize) -> Result<Arc<ProvingKey<vesta::Affine>>> {
        validate_depth(depth)?;
        if let Some(pk) = self.proving_keys.read().get(&depth) {
            return Ok(pk.clone());
        }

        let started = Instant::now();
        let circuit = MembershipCircuit::blank(depth);
        let vk = keygen_vk(&self.params, &circuit).map_err(|e| keygen_error(depth, e))?;
        let pk = keygen_pk(&self.params, vk, &circuit).map_err(|e| keygen_error(depth, e))?;
        debug!("Proving key for depth {depth} generated in {:?}", started.elapsed());

        Ok(self
            .proving_keys
            .write()
            .entry(depth)
            .or_insert_with(|| Arc::new(pk))
            .clone())
    }

    /// Verifying key for circuits of `depth` levels.
    pub fn verifying_key(&self, depth: usize) -> Result<Arc<VerifyingKey<vesta::Affine>>> {
        validate_depth(depth)?;
        if let Some(vk) = self.verifying_keys.read().get(&depth) {
            return Ok(vk.clone());
        }

        let started = Instant::now();
        let vk = keygen_vk(&self.params, &MembershipCircuit::blank(depth))
            .map_err(|e| keygen_error(depth, e))?;
        debug!("Verifying key for depth {depth} generated in {:?}", started.elapsed());

        Ok(self
            .verifying_keys
            .write()
            .entry(depth)
            .or_insert_with(|| Arc::new(vk))
            .clone())
    }
}

fn keygen_error(depth: usize, error: halo2_proofs::plonk::Error) -> Error {
    Error::CorruptArtifact {
        path: PathBuf::from(format!("<keys for depth {depth}>")),
        reason: format!("key generation failed: {error:?}"),
    }
}
