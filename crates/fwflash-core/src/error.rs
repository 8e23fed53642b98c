//! Error types for fwflash-core
//!
//! Errors are grouped into the four categories an update run can fail
//! with. Per-target verification mismatches are *not* errors: they are
//! recorded as outcomes (see [`crate::outcome`]) and the run continues.
//! Everything that surfaces as an `Err` aborts the whole run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Boxed error from a device backend crate
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Manifest-level failures
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file could not be read
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The manifest is not valid JSON or lacks required top-level fields
    #[error("malformed manifest: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Manifest model does not match the device
    #[error("unsupported model: manifest is for '{manifest}', device is '{requested}'")]
    ModelMismatch { manifest: String, requested: String },

    /// None of the manifest generations match the device
    #[error("unsupported generation '{requested}' (manifest supports: {supported})")]
    GenerationMismatch {
        requested: String,
        supported: String,
    },

    /// Section referenced by the run does not exist
    #[error("section '{0}' not found in manifest")]
    MissingSection(String),

    /// Section exists but its `Name` or `Hash` is absent or null
    #[error("section '{section}' has no {field}")]
    MissingField {
        section: String,
        field: &'static str,
    },

    /// Section is present but not an object with string fields
    #[error("section '{section}' is malformed: {message}")]
    InvalidSection { section: String, message: String },

    /// Declared filename escapes the extraction directory
    #[error("section '{section}' names an unsafe path: {name}")]
    UnsafePath { section: String, name: String },

    /// Declared hash is not a recognised digest
    #[error("section '{section}' has an unrecognised hash '{hash}'")]
    UnknownHash { section: String, hash: String },
}

/// Errors that abort an update or verify run
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid identifying parameters or configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Manifest rejected
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Extracted artifact does not match the manifest hash
    #[error("hash mismatch for section '{section}': expected {expected}, got {actual}")]
    HashMismatch {
        section: String,
        expected: String,
        actual: String,
    },

    /// The physical medium or its tooling cannot be trusted to continue
    #[error("device error on {target}: {source}")]
    Device {
        target: String,
        #[source]
        source: BoxedSource,
    },

    /// Workspace or artifact I/O failure
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// Wrap a backend error as a device error for `target`
    pub fn device<E>(target: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxedSource>,
    {
        Self::Device {
            target: target.into(),
            source: source.into(),
        }
    }

    /// Attach a path to an I/O error
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Taxonomy category of this error
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Config,
            Self::Manifest(_) | Self::HashMismatch { .. } => ErrorCategory::Manifest,
            Self::Device { .. } | Self::Io { .. } => ErrorCategory::Device,
        }
    }
}

/// Error category, each with its own process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// One or more targets failed verification or installation
    Verification,
    /// Invalid or missing identifying parameters
    Config,
    /// Manifest or package rejected before device work
    Manifest,
    /// Hardware or tooling failure
    Device,
}

impl ErrorCategory {
    /// Process exit status for this category
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Verification => 1,
            Self::Config => 2,
            Self::Manifest => 3,
            Self::Device => 4,
        }
    }
}

/// Result type alias using the core Error type
pub type Result<T> = std::result::Result<T, Error>;
