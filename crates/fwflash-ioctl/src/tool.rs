//! External programming tool wrapper
//!
//! The tool is invoked as `<program> <verify|install> <device> <section> <file>`
//! and communicates only through its exit status. Each status is mapped
//! to an outcome exactly once, here.

use crate::error::{IoToolError, Result};
use fwflash_core::{InstallOutcome, VerifyOutcome};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Firmware section of the IO controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoSection {
    /// Boot firmware
    Boot,
    /// Main firmware
    Main,
}

impl IoSection {
    /// Section argument passed to the tool
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::Main => "main",
        }
    }
}

impl fmt::Display for IoSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Map a `verify` exit status
pub fn classify_verify(status: i32) -> Result<VerifyOutcome> {
    match status {
        0 => Ok(VerifyOutcome::Match),
        1 => Ok(VerifyOutcome::Mismatch),
        status => Err(IoToolError::DeviceFault {
            action: "verify",
            status,
        }),
    }
}

/// Map an `install` exit status
pub fn classify_install(status: i32) -> Result<InstallOutcome> {
    match status {
        0 => Ok(InstallOutcome::Updated),
        1 => Ok(InstallOutcome::Failed),
        2 => Ok(InstallOutcome::SkippedUpToDate),
        status => Err(IoToolError::DeviceFault {
            action: "install",
            status,
        }),
    }
}

/// How to run the programming tool
#[derive(Debug, Clone)]
pub struct IoTool {
    program: PathBuf,
    prefix_args: Vec<String>,
}

impl IoTool {
    /// Tool at `program`, resolved through `PATH` if relative
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            prefix_args: Vec::new(),
        }
    }

    /// Arguments inserted before the subcommand
    pub fn with_prefix_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefix_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Run `action` and return its exit status
    fn run(&self, action: &str, device: &Path, section: IoSection, image: &Path) -> Result<i32> {
        log::debug!(
            "Running {} {} {} {} {}",
            self.program.display(),
            action,
            device.display(),
            section,
            image.display()
        );
        let status = Command::new(&self.program)
            .args(&self.prefix_args)
            .arg(action)
            .arg(device)
            .arg(section.as_arg())
            .arg(image)
            .status()
            .map_err(|source| IoToolError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let code = status.code().ok_or_else(|| IoToolError::Killed {
            program: self.program.clone(),
        })?;
        log::debug!("{} {} exited with {}", self.program.display(), action, code);
        Ok(code)
    }

    /// Compare the controller's `section` against `image`
    pub fn verify(&self, device: &Path, section: IoSection, image: &Path) -> Result<VerifyOutcome> {
        classify_verify(self.run("verify", device, section, image)?)
    }

    /// Program `image` into the controller's `section`
    pub fn install(
        &self,
        device: &Path,
        section: IoSection,
        image: &Path,
    ) -> Result<InstallOutcome> {
        classify_install(self.run("install", device, section, image)?)
    }
}
