//! Filesystem volume operations used by boot partition targets
//!
//! The trait is the seam between the engine and the host: the Linux
//! implementation lives in `fwflash-bootpart`, tests substitute a fake
//! that maps devices onto plain directories.

use std::io;
use std::path::{Path, PathBuf};

/// How a partition is mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    /// Read-only, for verification
    ReadOnly,
    /// Read-write, for installation
    ReadWrite,
}

/// Classified result of a filesystem check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsckStatus {
    /// No problems found
    Clean,
    /// Problems found and repaired; safe to mount
    Repaired,
    /// Unrecoverable corruption (raw checker exit status attached)
    Unrecoverable(i32),
}

/// Host operations on block devices holding a filesystem
pub trait VolumeOps {
    /// Every place `device` is currently mounted
    fn mounts_of(&self, device: &Path) -> io::Result<Vec<PathBuf>>;

    /// True if something is mounted at `mount_point`
    fn is_mounted_at(&self, mount_point: &Path) -> io::Result<bool>;

    /// Run the filesystem checker with automatic repair
    fn check(&mut self, device: &Path) -> io::Result<FsckStatus>;

    /// Mount `device` at `mount_point`
    fn mount(&mut self, device: &Path, mount_point: &Path, mode: MountMode) -> io::Result<()>;

    /// Unmount whatever is mounted at `mount_point`, flushing pending writes
    ///
    /// With `force` set, a busy filesystem is detached anyway.
    fn unmount(&mut self, mount_point: &Path, force: bool) -> io::Result<()>;
}
