//! Error types for Linux MTD operations

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Linux MTD-specific errors
#[derive(Debug, Error)]
pub enum LinuxMtdError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Device node does not exist
    #[error("flash device not found: {0}")]
    DeviceNotFound(PathBuf),

    /// Path exists but is not a character or block device
    #[error("{0} is not a character or block special device")]
    NotSpecialDevice(PathBuf),

    /// MTD device type is not NOR flash
    #[error("MTD device type is not 'nor': {0}")]
    NotNorFlash(String),

    /// Failed to read sysfs attribute
    #[error("Failed to read sysfs attribute '{path}': {source}")]
    SysfsRead {
        path: String,
        #[source]
        source: io::Error,
    },

    /// Failed to parse sysfs attribute
    #[error("Failed to parse sysfs attribute '{path}': {value}")]
    SysfsParse { path: String, value: String },

    /// MTD erase size is not a power of 2
    #[error("MTD erase size is not a power of 2: {0}")]
    InvalidEraseSize(u64),

    /// Configured erase block size disagrees with the device
    #[error("configured erase block size {configured} does not match device erase size {device}")]
    GeometryMismatch { configured: u32, device: u64 },

    /// Non-uniform erase regions are not supported
    #[error("MTD device has non-uniform erase regions (count: {0}), which is not supported")]
    NonUniformEraseRegions(u64),

    /// Candidate image is empty or unreadable
    #[error("firmware image {path} is unusable: {reason}")]
    BadImage { path: PathBuf, reason: String },

    /// Raw flash access failed
    #[error(transparent)]
    Flash(#[from] fwflash_core::flash::FlashError),
}

/// Result type for Linux MTD operations
pub type Result<T> = std::result::Result<T, LinuxMtdError>;
