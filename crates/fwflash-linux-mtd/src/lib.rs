//! fwflash-linux-mtd - Raw flash targets via the Linux MTD subsystem
//!
//! Bootloader flash on the reference hardware is SPI NOR exposed as
//! `/dev/mtdN`. The kernel handles the flash protocol; this crate reads
//! geometry from sysfs, erases through the `MEMERASE` ioctl and writes
//! through the character device. Block nodes (`/dev/mtdblockN`) are
//! accepted too, in which case the kernel also handles erase.
//!
//! # Device Discovery
//!
//! ```bash
//! cat /proc/mtd
//! cat /sys/class/mtd/mtd0/erasesize
//! cat /sys/class/mtd/mtd0/type  # should be "nor"
//! ```

pub mod device;
pub mod error;
pub mod target;

// Re-exports
pub use device::{classify_node, LinuxMtd, MtdInfo, NodeKind};
pub use error::{LinuxMtdError, Result};
pub use target::MtdTarget;
