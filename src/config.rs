//! Configuration file support for the group signalling system.
//!
//! Configuration is loaded from TOML, adjusted by a few environment
//! variables, and installed once per process with [`init`]. Nothing secret is
//! kept here; identity secrets are always passed in explicitly.

use crate::identity::DEFAULT_MAX_SEED_LEN;
use crate::types::DEFAULT_MAX_SIGNAL_LEN;
use anyhow::{Context, Result};
use log::{debug, warn};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_DEPTH: usize = 16;
const DEFAULT_MAX_PROOF_FILE_SIZE: u64 = 1024 * 1024;
const DEFAULT_MAX_ZK_PROOF_SIZE: usize = 512 * 1024;
const DEFAULT_DEADLINE_SECS: u64 = 300;
const DEFAULT_LOAD_RETRIES: u32 = 3;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 200;
const DEFAULT_TIMESTAMP_TOLERANCE_SECS: u64 = 300;
const DEFAULT_TIMESTAMP_MAX_AGE_SECS: u64 = 86400;

/// Overrides `proof.max_file_size`.
pub const ENV_MAX_PROOF_FILE_SIZE: &str = "ZKP_MAX_PROOF_FILE_SIZE";
/// Overrides `proof.max_zk_proof_size`.
pub const ENV_MAX_ZK_PROOF_SIZE: &str = "ZKP_MAX_ZK_PROOF_SIZE";
/// Overrides `keys.cache_dir`.
pub const ENV_KEYS_DIR: &str = "ZKP_KEYS_DIR";

static GLOBAL: OnceCell<Config> = OnceCell::new();

/// Configuration for the group signalling system.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub group: GroupConfig,
    #[serde(default)]
    pub proof: ProofConfig,
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_max_seed_len")]
    pub max_seed_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default = "default_depth")]
    pub default_depth: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofConfig {
    #[serde(default = "default_max_proof_file_size")]
    pub max_file_size: u64,
    #[serde(default = "default_max_zk_proof_size")]
    pub max_zk_proof_size: usize,
    #[serde(default = "default_proof_output_file")]
    pub output_file: PathBuf,
    /// Deadline for a single proof generation request.
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_max_signal_len")]
    pub max_signal_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_keys_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_true")]
    pub enable_persistence: bool,
    /// Generate public parameters when none are found in `cache_dir`.
    #[serde(default = "default_true")]
    pub generate_if_missing: bool,
    #[serde(default = "default_load_retries")]
    pub load_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_timestamp_tolerance_secs")]
    pub timestamp_tolerance_secs: u64,
    #[serde(default = "default_timestamp_max_age_secs")]
    pub timestamp_max_age_secs: u64,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            max_seed_len: DEFAULT_MAX_SEED_LEN,
        }
    }
}

impl Default for GroupConfig {
    fn default() -> Self {
        Self {
            default_depth: DEFAULT_DEPTH,
        }
    }
}

impl Default for ProofConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_PROOF_FILE_SIZE,
            max_zk_proof_size: DEFAULT_MAX_ZK_PROOF_SIZE,
            output_file: PathBuf::from("proof.json"),
            deadline_secs: DEFAULT_DEADLINE_SECS,
            max_signal_len: DEFAULT_MAX_SIGNAL_LEN,
        }
    }
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from(".keys"),
            enable_persistence: true,
            generate_if_missing: true,
            load_retries: DEFAULT_LOAD_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            timestamp_tolerance_secs: DEFAULT_TIMESTAMP_TOLERANCE_SECS,
            timestamp_max_age_secs: DEFAULT_TIMESTAMP_MAX_AGE_SECS,
        }
    }
}

fn default_max_seed_len() -> usize {
    DEFAULT_MAX_SEED_LEN
}

fn default_depth() -> usize {
    DEFAULT_DEPTH
}

fn default_max_proof_file_size() -> u64 {
    DEFAULT_MAX_PROOF_FILE_SIZE
}

fn default_max_zk_proof_size() -> usize {
    DEFAULT_MAX_ZK_PROOF_SIZE
}

fn default_proof_output_file() -> PathBuf {
    PathBuf::from("proof.json")
}

fn default_deadline_secs() -> u64 {
    DEFAULT_DEADLINE_SECS
}

fn default_max_signal_len() -> usize {
    DEFAULT_MAX_SIGNAL_LEN
}

fn default_keys_dir() -> PathBuf {
    PathBuf::from(".keys")
}

fn default_true() -> bool {
    true
}

fn default_load_retries() -> u32 {
    DEFAULT_LOAD_RETRIES
}

fn default_retry_backoff_ms() -> u64 {
    DEFAULT_RETRY_BACKOFF_MS
}

fn default_timestamp_tolerance_secs() -> u64 {
    DEFAULT_TIMESTAMP_TOLERANCE_SECS
}

fn default_timestamp_max_age_secs() -> u64 {
    DEFAULT_TIMESTAMP_MAX_AGE_SECS
}

fn env_override<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring unparsable {name}={raw}");
            None
        }
    }
}

impl Config {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Loads `path` when given, otherwise defaults, then applies environment
    /// overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(size) = env_override(ENV_MAX_PROOF_FILE_SIZE) {
            self.proof.max_file_size = size;
        }
        if let Some(size) = env_override(ENV_MAX_ZK_PROOF_SIZE) {
            self.proof.max_zk_proof_size = size;
        }
        if let Some(dir) = env_override::<PathBuf>(ENV_KEYS_DIR) {
            self.keys.cache_dir = dir;
        }
        self
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

/// Installs the process-wide configuration. Only the first call succeeds.
pub fn init(config: Config) -> Result<&'static Config> {
    GLOBAL
        .set(config)
        .map_err(|_| anyhow::anyhow!("Configuration already initialized"))?;
    debug!("Process configuration initialized");
    Ok(global())
}

/// The process-wide configuration, defaults if [`init`] was never called.
pub fn global() -> &'static Config {
    GLOBAL.get_or_init(Config::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.proof.max_file_size, DEFAULT_MAX_PROOF_FILE_SIZE);
        assert_eq!(config.group.default_depth, DEFAULT_DEPTH);
        assert_eq!(config.keys.load_retries, DEFAULT_LOAD_RETRIES);
        assert!(config.keys.generate_if_missing);
        assert_eq!(
            config.security.timestamp_tolerance_secs,
            DEFAULT_TIMESTAMP_TOLERANCE_SECS
        );
    }

    #[test]
    fn test_serialize_deserialize_config() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.proof.output_file, deserialized.proof.output_file);
        assert_eq!(config.keys.cache_dir, deserialized.keys.cache_dir);
    }

    #[test]
    fn test_custom_config() {
        let config_toml = r#"
            [group]
            default_depth = 20

            [proof]
            output_file = "custom_proof.json"
            deadline_secs = 30

            [keys]
            cache_dir = "/var/lib/zkp"
            load_retries = 0

            [security]
            timestamp_tolerance_secs = 600
        "#;

        let config: Config = toml::from_str(config_toml).unwrap();
        assert_eq!(config.group.default_depth, 20);
        assert_eq!(config.proof.output_file, PathBuf::from("custom_proof.json"));
        assert_eq!(config.proof.deadline_secs, 30);
        assert_eq!(config.proof.max_signal_len, DEFAULT_MAX_SIGNAL_LEN);
        assert_eq!(config.keys.cache_dir, PathBuf::from("/var/lib/zkp"));
        assert_eq!(config.keys.load_retries, 0);
        assert_eq!(config.security.timestamp_tolerance_secs, 600);
    }

    #[test]
    fn test_partial_keys_section_keeps_defaults() {
        let config: Config = toml::from_str("[keys]\ncache_dir = \"/tmp/zkp-keys\"\n").unwrap();
        let defaults = KeysConfig::default();

        assert_eq!(config.keys.cache_dir, PathBuf::from("/tmp/zkp-keys"));
        assert!(config.keys.enable_persistence);
        assert!(config.keys.generate_if_missing);
        assert_eq!(config.keys.load_retries, defaults.load_retries);
        assert_eq!(config.keys.retry_backoff_ms, defaults.retry_backoff_ms);
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.proof.deadline_secs = 7;
        config.save_to_file(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.proof.deadline_secs, 7);
        assert!(Config::load_from_file(&dir.path().join("missing.toml")).is_err());
    }
}
