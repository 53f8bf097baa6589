//! Typed failures for identity, group, proving and verification operations.
//!
//! Every failure carries an [`ErrorKind`] so callers can tell "not a member"
//! apart from "proof invalid" and from "system unavailable".

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed seed, signal, external nullifier or other caller input.
    Input,
    /// The identity is not present in the group snapshot.
    Membership,
    /// Tree insertion violation (duplicate member, full group).
    Tree,
    /// Missing, corrupt or unavailable circuit artifacts.
    Resource,
    /// Internal constraint failure while generating a proof.
    Computation,
    /// Structurally invalid proof material.
    Verification,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid submission transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("identity commitment {0} is not a member of the group")]
    NotAMember(String),

    #[error("member {0} is already in the group")]
    DuplicateMember(String),

    #[error("group is full: depth {depth} holds at most {capacity} members")]
    GroupFull { depth: usize, capacity: u64 },

    #[error("missing circuit artifact: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("corrupt circuit artifact {}: {reason}", .path.display())]
    CorruptArtifact { path: PathBuf, reason: String },

    #[error("failed to access circuit artifact {}: {source}", .path.display())]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("proof generation did not finish within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("proof generation was cancelled")]
    Cancelled,

    #[error("circuit execution failed: {0}")]
    CircuitExecution(String),

    #[error("malformed proof: {0}")]
    Verification(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidSeed(_) | Error::InvalidInput(_) | Error::InvalidTransition { .. } => {
                ErrorKind::Input
            }
            Error::NotAMember(_) => ErrorKind::Membership,
            Error::DuplicateMember(_) | Error::GroupFull { .. } => ErrorKind::Tree,
            Error::MissingArtifact(_)
            | Error::CorruptArtifact { .. }
            | Error::ArtifactIo { .. }
            | Error::DeadlineExceeded(_)
            | Error::Cancelled => ErrorKind::Resource,
            Error::CircuitExecution(_) => ErrorKind::Computation,
            Error::Verification(_) => ErrorKind::Verification,
        }
    }

    /// Only transient I/O while loading artifacts may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ArtifactIo { .. })
    }
}
