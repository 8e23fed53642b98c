//! Error types for boot partition operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Boot partition errors
#[derive(Debug, Error)]
pub enum BootPartError {
    /// Device node does not exist
    #[error("boot partition device not found: {0}")]
    DeviceNotFound(PathBuf),

    /// Partition could not be unmounted from a prior mount
    #[error("cannot unmount {device} from {mount_point}: {source}")]
    Unmount {
        device: PathBuf,
        mount_point: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Partition could not be mounted
    #[error("cannot mount {device} at {mount_point}: {source}")]
    Mount {
        device: PathBuf,
        mount_point: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Filesystem checker could not be run
    #[error("filesystem check of {device} failed to run: {source}")]
    FsckSpawn {
        device: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Filesystem checker found damage it could not repair
    #[error("filesystem on {device} is unrecoverable (fsck status {status})")]
    Unrecoverable { device: PathBuf, status: i32 },

    /// Mount table could not be read
    #[error("cannot read mount table: {0}")]
    MountTable(#[source] io::Error),

    /// File operation on the mounted partition failed
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BootPartError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type for boot partition operations
pub type Result<T> = std::result::Result<T, BootPartError>;
