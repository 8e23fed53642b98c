//! fwflash-core - Update/verify engine for multi-target firmware packages
//!
//! A device carries several firmware targets: two redundant boot
//! partitions, two raw flash devices holding bootloaders, and an IO
//! controller with separate boot and main sections. A package is a
//! manifest plus one image per section. This crate checks the manifest,
//! checks every image hash, and drives the targets through the
//! [`target::Target`] trait in a crash-safe order.
//!
//! Device access lives in backend crates:
//!
//! - `fwflash-bootpart` - boot partitions (fsck, mount, replace files)
//! - `fwflash-linux-mtd` - raw flash through Linux MTD
//! - `fwflash-ioctl` - IO controller through its programming tool
//!
//! # Example
//!
//! ```ignore
//! use fwflash_core::{DeviceIdentity, Manifest, Session, TargetId, Workspace};
//!
//! let workspace = Workspace::new(volumes)?;
//! // ... extract the package into workspace.extract_dir()
//! let manifest = Manifest::from_file(&workspace.extract_dir().join("manifest.json"))?;
//! let mut session = Session::new(workspace);
//! session.register(TargetId::Flash1, "flash1", Box::new(flash1));
//!
//! let identity = DeviceIdentity::new(Some("ctrl-a"), Some("3"))?;
//! let report = session.install(&manifest, &identity, &[TargetId::Flash1])?;
//! assert!(report.success());
//! session.finish()?;
//! ```

#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod flash;
pub mod hash;
pub mod manifest;
pub mod outcome;
pub mod report;
pub mod session;
pub mod target;
pub mod volume;
pub mod workspace;

pub use config::Config;
pub use error::{Error, ErrorCategory, ManifestError, Result};
pub use manifest::{Manifest, ResolvedArtifact};
pub use outcome::{InstallOutcome, InstallReport, Outcome, VerifyOutcome};
pub use report::{Buckets, RunMode, SessionReport, TargetRecord};
pub use session::{install_order, DeviceIdentity, Session};
pub use target::{Target, TargetGroup, TargetId};
pub use workspace::Workspace;
