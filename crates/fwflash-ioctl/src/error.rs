//! Error types for the IO controller tool

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// IO controller errors
#[derive(Debug, Error)]
pub enum IoToolError {
    /// Tool could not be started
    #[error("cannot run {program}: {source}")]
    Spawn {
        /// Tool executable
        program: PathBuf,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Tool was terminated by a signal
    #[error("{program} was killed by a signal")]
    Killed {
        /// Tool executable
        program: PathBuf,
    },

    /// Tool reported a device-level fault
    #[error("{action} reported a device fault (exit status {status})")]
    DeviceFault {
        /// Operation that was running
        action: &'static str,
        /// Tool exit status
        status: i32,
    },
}

/// Result type for IO controller operations
pub type Result<T> = std::result::Result<T, IoToolError>;
