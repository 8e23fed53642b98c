//! fwflash-bootpart - Redundant boot partition targets
//!
//! Each boot partition is a small filesystem holding the boot image and
//! a checksum file. [`BootPartitionTarget`] checks, mounts and replaces
//! that content through [`fwflash_core::volume::VolumeOps`];
//! [`LinuxVolumes`] implements those operations on the host.

#![warn(rust_2018_idioms)]

pub mod checksum;
pub mod error;
pub mod target;
pub mod volumes;

pub use checksum::{ChecksumEntry, ChecksumFile};
pub use error::{BootPartError, Result};
pub use target::BootPartitionTarget;
pub use volumes::{parse_mount_table, FsckCommand, LinuxVolumes, MountEntry};
