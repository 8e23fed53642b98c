//! IO controller update targets

use crate::tool::{IoSection, IoTool};
use fwflash_core::{InstallReport, ResolvedArtifact, Target, VerifyOutcome, Workspace};
use std::path::PathBuf;

/// One firmware section of the IO controller
///
/// The tool performs its own compare-before-write, so there is no local
/// state beyond the addressing.
#[derive(Debug, Clone)]
pub struct IoControllerTarget {
    name: String,
    tool: IoTool,
    device: PathBuf,
    section: IoSection,
}

impl IoControllerTarget {
    /// Address `section` of the controller on `device` through `tool`
    pub fn new(
        name: impl Into<String>,
        tool: IoTool,
        device: impl Into<PathBuf>,
        section: IoSection,
    ) -> Self {
        Self {
            name: name.into(),
            tool,
            device: device.into(),
            section,
        }
    }
}

impl Target for IoControllerTarget {
    fn verify(
        &mut self,
        artifact: &ResolvedArtifact,
        _ws: &mut Workspace,
    ) -> fwflash_core::Result<VerifyOutcome> {
        self.tool
            .verify(&self.device, self.section, artifact.path())
            .map_err(|e| fwflash_core::Error::device(&self.name, e))
    }

    fn install(
        &mut self,
        artifact: &ResolvedArtifact,
        _ws: &mut Workspace,
    ) -> fwflash_core::Result<InstallReport> {
        log::info!(
            "{}: programming {} section from {}",
            self.name,
            self.section,
            artifact.file_name()
        );
        self.tool
            .install(&self.device, self.section, artifact.path())
            .map(InstallReport::from)
            .map_err(|e| fwflash_core::Error::device(&self.name, e))
    }
}
