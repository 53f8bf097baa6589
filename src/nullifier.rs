//! Append-only record of spent nullifiers.
//!
//! A nullifier hash is only meaningful within its external nullifier, so the
//! log stores `external_nullifier:nullifier_hash` pairs, one per line.

use crate::types::PublicSignals;
use crate::utils::field_to_hex;
use anyhow::{Context, Result};
use log::{debug, info};
use parking_lot::Mutex;
use std::fs;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// File-backed nullifier registry for a single process.
///
/// The internal mutex makes the read-check-append in [`NullifierLog::record`]
/// atomic across threads sharing one `NullifierLog`. It takes no file lock, so
/// separate processes (or two `NullifierLog`s on one path) must not record to
/// the same file concurrently.
pub struct NullifierLog {
    path: PathBuf,
    lock: Mutex<()>,
}

fn entry(signals: &PublicSignals) -> String {
    format!(
        "{}:{}",
        field_to_hex(signals.external_nullifier),
        field_to_hex(signals.nullifier_hash)
    )
}

impl NullifierLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Log kept next to a proof file, e.g. `proof.json` -> `proof.nullifiers.txt`.
    #[must_use]
    pub fn beside(proof_file: &Path) -> Self {
        let mut path = proof_file.to_path_buf();
        path.set_extension("nullifiers.txt");
        Self::new(path)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records the nullifier of `signals`.
    ///
    /// Returns `false` without writing if the same nullifier hash was already
    /// recorded for the same external nullifier.
    pub fn record(&self, signals: &PublicSignals) -> Result<bool> {
        let entry = entry(signals);
        let _guard = self.lock.lock();

        let mut file = fs::OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open nullifier file: {}", self.path.display()))?;

        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read nullifier file")?;
        if content
            .lines()
            .any(|line| line.trim().eq_ignore_ascii_case(&entry))
        {
            debug!("Nullifier {entry} already recorded");
            return Ok(false);
        }

        let mut writer = BufWriter::new(&file);
        if !content.is_empty() && !content.ends_with('\n') {
            writer.write_all(b"\n").context("Failed to write newline")?;
        }
        writer
            .write_all(entry.as_bytes())
            .context("Failed to write nullifier")?;
        writer.write_all(b"\n").context("Failed to write newline")?;
        writer.flush().context("Failed to flush writer")?;

        info!("Nullifier recorded to {}", self.path.display());
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pasta_curves::pallas;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    fn signals(external: u64, nullifier: u64) -> PublicSignals {
        PublicSignals {
            merkle_root: pallas::Base::from(1),
            nullifier_hash: pallas::Base::from(nullifier),
            signal_hash: pallas::Base::from(3),
            external_nullifier: pallas::Base::from(external),
        }
    }

    #[test]
    fn test_duplicate_is_refused() {
        let dir = TempDir::new().unwrap();
        let log = NullifierLog::new(dir.path().join("nullifiers.txt"));

        assert!(log.record(&signals(1, 10)).unwrap());
        assert!(!log.record(&signals(1, 10)).unwrap());

        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }

    #[test]
    fn test_scoped_by_external_nullifier() {
        let dir = TempDir::new().unwrap();
        let log = NullifierLog::new(dir.path().join("nullifiers.txt"));

        assert!(log.record(&signals(1, 10)).unwrap());
        assert!(log.record(&signals(2, 10)).unwrap());
        assert!(log.record(&signals(1, 11)).unwrap());
    }

    #[test]
    fn test_appends_after_file_without_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nullifiers.txt");
        fs::write(&path, "deadbeef:cafe").unwrap();

        let log = NullifierLog::new(&path);
        assert!(log.record(&signals(1, 10)).unwrap());
        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.ends_with('\n'));
    }

    #[test]
    fn test_beside_proof_file() {
        let log = NullifierLog::beside(Path::new("/tmp/out/proof.json"));
        assert_eq!(log.path(), Path::new("/tmp/out/proof.nullifiers.txt"));
    }

    #[test]
    fn test_concurrent_records_of_one_nullifier_admit_exactly_one() {
        let dir = TempDir::new().unwrap();
        let log = Arc::new(NullifierLog::new(dir.path().join("nullifiers.txt")));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let log = Arc::clone(&log);
                thread::spawn(move || log.record(&signals(1, 10)).unwrap())
            })
            .collect();
        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|&recorded| recorded)
            .count();

        assert_eq!(accepted, 1);
        let content = fs::read_to_string(log.path()).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
