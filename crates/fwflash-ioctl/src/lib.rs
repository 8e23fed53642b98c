//! fwflash-ioctl - IO controller targets
//!
//! The IO controller is programmed over a serial line by a vendor tool.
//! This crate runs the tool and translates its exit status into
//! [`fwflash_core`] outcomes.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod error;
pub mod target;
pub mod tool;

pub use error::{IoToolError, Result};
pub use target::IoControllerTarget;
pub use tool::{classify_install, classify_verify, IoSection, IoTool};
