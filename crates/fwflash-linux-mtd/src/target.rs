//! Raw flash update targets
//!
//! Binds a flash device node to the generic header-last update algorithm
//! in [`fwflash_core::flash`].

use crate::device::LinuxMtd;
use crate::error::{LinuxMtdError, Result};
use fwflash_core::flash::{self, FlashGeometry, RawFlash};
use fwflash_core::{InstallReport, ResolvedArtifact, Target, VerifyOutcome, Workspace};
use std::path::{Path, PathBuf};

/// A raw flash device holding a bootloader image
#[derive(Debug, Clone)]
pub struct MtdTarget {
    name: String,
    path: PathBuf,
    geometry: FlashGeometry,
}

impl MtdTarget {
    /// Describe the flash device at `path`
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        geometry: FlashGeometry,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            geometry,
        }
    }

    fn open(&self, writable: bool) -> Result<LinuxMtd> {
        let mtd = LinuxMtd::open(&self.path, writable)?;
        let device = mtd.erase_size();
        if device != 0 && device != self.geometry.erase_block_size as u64 {
            return Err(LinuxMtdError::GeometryMismatch {
                configured: self.geometry.erase_block_size,
                device,
            });
        }
        Ok(mtd)
    }

    fn verify_inner(&self, artifact: &ResolvedArtifact) -> Result<VerifyOutcome> {
        let image = read_image(artifact.path())?;
        let mut mtd = self.open(false)?;
        Ok(flash::verify_image(&mut mtd, &image)?)
    }

    fn install_inner(&self, artifact: &ResolvedArtifact) -> Result<InstallReport> {
        let image = read_image(artifact.path())?;
        let mut mtd = self.open(true)?;
        log::info!(
            "{}: {} bytes from {} to {} ({} byte device)",
            self.name,
            image.len(),
            artifact.file_name(),
            self.path.display(),
            mtd.size()
        );
        Ok(flash::install_image(&mut mtd, &image, &self.geometry)?)
    }
}

/// Read a candidate image, rejecting empty or unreadable files
pub fn read_image(path: &Path) -> Result<Vec<u8>> {
    let image = std::fs::read(path).map_err(|e| LinuxMtdError::BadImage {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if image.is_empty() {
        return Err(LinuxMtdError::BadImage {
            path: path.to_path_buf(),
            reason: "file is empty".to_string(),
        });
    }
    Ok(image)
}

impl Target for MtdTarget {
    fn verify(
        &mut self,
        artifact: &ResolvedArtifact,
        _ws: &mut Workspace,
    ) -> fwflash_core::Result<VerifyOutcome> {
        self.verify_inner(artifact)
            .map_err(|e| fwflash_core::Error::device(&self.name, e))
    }

    fn install(
        &mut self,
        artifact: &ResolvedArtifact,
        _ws: &mut Workspace,
    ) -> fwflash_core::Result<InstallReport> {
        self.install_inner(artifact)
            .map_err(|e| fwflash_core::Error::device(&self.name, e))
    }
}
