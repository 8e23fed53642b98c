//! Per-target result vocabulary
//!
//! Exit codes and byte comparisons are converted into these enums once,
//! at the component that produced them.

use std::fmt;
use std::time::Duration;

/// Result of a read-only verify
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Installed content matches the package
    Match,
    /// Installed content differs from the package
    Mismatch,
}

/// Result of an install attempt that did not hit a device error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    /// New content written and verified
    Updated,
    /// Target already held the package content; nothing written
    SkippedUpToDate,
    /// Content was written but did not verify afterwards
    Failed,
}

/// What an install reports back to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstallReport {
    /// Classified result
    pub outcome: InstallOutcome,
    /// Time the target spent without a self-consistent image, if it entered
    /// that state at all
    pub bricking_window: Option<Duration>,
}

impl From<InstallOutcome> for InstallReport {
    fn from(outcome: InstallOutcome) -> Self {
        Self {
            outcome,
            bricking_window: None,
        }
    }
}

/// Outcome as recorded in the session report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Verify-only: target matches
    VerifiedOk,
    /// Verify-only: target differs
    VerifiedFailed,
    /// Install: new image written and verified
    Updated,
    /// Install: already up to date
    SkippedUpToDate,
    /// Install: image did not take
    Failed,
}

impl Outcome {
    /// True for outcomes that make the overall run fail
    pub fn is_failure(self) -> bool {
        matches!(self, Self::VerifiedFailed | Self::Failed)
    }
}

impl From<VerifyOutcome> for Outcome {
    fn from(v: VerifyOutcome) -> Self {
        match v {
            VerifyOutcome::Match => Self::VerifiedOk,
            VerifyOutcome::Mismatch => Self::VerifiedFailed,
        }
    }
}

impl From<InstallOutcome> for Outcome {
    fn from(i: InstallOutcome) -> Self {
        match i {
            InstallOutcome::Updated => Self::Updated,
            InstallOutcome::SkippedUpToDate => Self::SkippedUpToDate,
            InstallOutcome::Failed => Self::Failed,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::VerifiedOk => write!(f, "verified"),
            Self::VerifiedFailed => write!(f, "verify failed"),
            Self::Updated => write!(f, "updated"),
            Self::SkippedUpToDate => write!(f, "up to date"),
            Self::Failed => write!(f, "failed"),
        }
    }
}
