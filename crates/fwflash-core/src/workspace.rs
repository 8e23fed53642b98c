//! Session-owned scratch space
//!
//! One temporary directory holds the extracted package and the single
//! mount point shared (serially) by all boot partition operations. It is
//! released exactly once: explicitly through [`Workspace::release`], or on
//! drop if the run aborted early.

use crate::error::{Error, Result};
use crate::volume::VolumeOps;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Extraction directory name inside the workspace
const EXTRACT_DIR: &str = "package";
/// Mount point directory name inside the workspace
const MOUNT_DIR: &str = "mnt";

/// Scratch directories plus the volume operations that use them
pub struct Workspace {
    root: Option<TempDir>,
    extract_dir: PathBuf,
    mount_point: PathBuf,
    volumes: Box<dyn VolumeOps>,
}

impl Workspace {
    /// Create a workspace under the system temporary directory
    pub fn new(volumes: Box<dyn VolumeOps>) -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("fwflash-")
            .tempdir()
            .map_err(|e| Error::io(std::env::temp_dir(), e))?;
        Self::from_tempdir(root, volumes)
    }

    /// Create a workspace under `parent`
    pub fn new_in(parent: &Path, volumes: Box<dyn VolumeOps>) -> Result<Self> {
        let root = tempfile::Builder::new()
            .prefix("fwflash-")
            .tempdir_in(parent)
            .map_err(|e| Error::io(parent, e))?;
        Self::from_tempdir(root, volumes)
    }

    fn from_tempdir(root: TempDir, volumes: Box<dyn VolumeOps>) -> Result<Self> {
        let extract_dir = root.path().join(EXTRACT_DIR);
        let mount_point = root.path().join(MOUNT_DIR);
        for dir in [&extract_dir, &mount_point] {
            fs::create_dir(dir).map_err(|e| Error::io(dir, e))?;
        }
        log::debug!("Workspace created at {}", root.path().display());
        Ok(Self {
            root: Some(root),
            extract_dir,
            mount_point,
            volumes,
        })
    }

    /// Directory the package is extracted into
    pub fn extract_dir(&self) -> &Path {
        &self.extract_dir
    }

    /// The shared mount point
    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    /// Volume operations bound to this workspace
    pub fn volumes(&mut self) -> &mut dyn VolumeOps {
        self.volumes.as_mut()
    }

    /// Unmount anything left on the mount point and remove the workspace
    ///
    /// If the unmount fails the directory tree is left on disk: removing
    /// it would delete the contents of a live filesystem.
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        let Some(root) = self.root.take() else {
            return Ok(());
        };

        let mounted = self
            .volumes
            .is_mounted_at(&self.mount_point)
            .map_err(|e| Error::io(&self.mount_point, e))
            .and_then(|mounted| {
                if mounted {
                    log::info!("Unmounting leftover {}", self.mount_point.display());
                    self.volumes
                        .unmount(&self.mount_point, true)
                        .map_err(|e| Error::io(&self.mount_point, e))?;
                }
                Ok(())
            });

        if let Err(e) = mounted {
            let kept = root.keep();
            log::warn!("Leaving workspace {} in place: {}", kept.display(), e);
            return Err(e);
        }

        let path = root.path().to_path_buf();
        root.close().map_err(|e| Error::io(&path, e))?;
        log::debug!("Workspace {} removed", path.display());
        Ok(())
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            log::warn!("Workspace cleanup failed: {}", e);
        }
    }
}
