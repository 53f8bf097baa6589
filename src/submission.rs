//! Lifecycle of a single proof submission.
//!
//! ```text
//! Idle -> Generating -> Generated -> Verifying -> Verified | Rejected
//!              \                          \
//!               +-> Failed(kind)           +-> Failed(kind)
//! ```
//!
//! `Verified`, `Rejected` and `Failed` are terminal.

use crate::error::{Error, ErrorKind, Result};
use crate::types::FullProof;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Generating,
    Generated,
    Verifying,
    Verified,
    Rejected,
    Failed(ErrorKind),
}

impl SubmissionState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SubmissionState::Verified | SubmissionState::Rejected | SubmissionState::Failed(_)
        )
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionState::Idle => write!(f, "idle"),
            SubmissionState::Generating => write!(f, "generating"),
            SubmissionState::Generated => write!(f, "generated"),
            SubmissionState::Verifying => write!(f, "verifying"),
            SubmissionState::Verified => write!(f, "verified"),
            SubmissionState::Rejected => write!(f, "rejected"),
            SubmissionState::Failed(kind) => write!(f, "failed ({kind:?})"),
        }
    }
}

/// Tracks one proof from request to verdict.
#[derive(Debug)]
pub struct Submission {
    state: SubmissionState,
    proof: Option<FullProof>,
    failure: Option<Error>,
}

impl Default for Submission {
    fn default() -> Self {
        Self::new()
    }
}

impl Submission {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: SubmissionState::Idle,
            proof: None,
            failure: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> SubmissionState {
        self.state
    }

    /// The generated proof, once generation has succeeded.
    #[must_use]
    pub fn proof(&self) -> Option<&FullProof> {
        self.proof.as_ref()
    }

    /// The error that moved the submission to `Failed`.
    #[must_use]
    pub fn failure(&self) -> Option<&Error> {
        self.failure.as_ref()
    }

    fn transition(&mut self, expected: SubmissionState, next: SubmissionState) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        Ok(())
    }

    pub fn start_generation(&mut self) -> Result<()> {
        self.transition(SubmissionState::Idle, SubmissionState::Generating)
    }

    /// Records the outcome of generation: `Generated` on success, `Failed`
    /// with the error's kind otherwise.
    pub fn complete_generation(&mut self, outcome: Result<FullProof>) -> Result<()> {
        match outcome {
            Ok(proof) => {
                self.transition(SubmissionState::Generating, SubmissionState::Generated)?;
                self.proof = Some(proof);
            }
            Err(e) => {
                self.transition(SubmissionState::Generating, SubmissionState::Failed(e.kind()))?;
                self.failure = Some(e);
            }
        }
        Ok(())
    }

    pub fn start_verification(&mut self) -> Result<()> {
        self.transition(SubmissionState::Generated, SubmissionState::Verifying)
    }

    /// Records the verifier's verdict. A structural verification error moves
    /// the submission to `Failed`; `Ok(false)` is a rejection.
    pub fn complete_verification(&mut self, outcome: Result<bool>) -> Result<()> {
        match outcome {
            Ok(true) => self.transition(SubmissionState::Verifying, SubmissionState::Verified),
            Ok(false) => self.transition(SubmissionState::Verifying, SubmissionState::Rejected),
            Err(e) => {
                self.transition(SubmissionState::Verifying, SubmissionState::Failed(e.kind()))?;
                self.failure = Some(e);
                Ok(())
            }
        }
    }
}
