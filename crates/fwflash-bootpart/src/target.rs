//! Boot partition update target
//!
//! A boot partition holds one image file plus a checksum file naming it.
//! Every operation starts from an unmounted, checked filesystem and uses
//! the workspace mount point. The partition is never left mounted.

use crate::checksum::ChecksumFile;
use crate::error::{BootPartError, Result};
use fwflash_core::volume::{FsckStatus, MountMode};
use fwflash_core::{
    InstallOutcome, InstallReport, ResolvedArtifact, Target, VerifyOutcome, Workspace,
};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Compare buffer size
const COMPARE_CHUNK_SIZE: usize = 64 * 1024;

/// One redundant boot partition
#[derive(Debug, Clone)]
pub struct BootPartitionTarget {
    name: String,
    device: PathBuf,
    checksum_file: String,
}

/// A mounted partition, unmounted on drop
struct Mounted<'w> {
    ws: &'w mut Workspace,
    device: PathBuf,
    root: PathBuf,
    active: bool,
}

impl Mounted<'_> {
    fn root(&self) -> &Path {
        &self.root
    }

    fn unmount(mut self) -> Result<()> {
        self.active = false;
        let root = self.root.clone();
        self.ws
            .volumes()
            .unmount(&root, false)
            .map_err(|source| BootPartError::Unmount {
                device: self.device.clone(),
                mount_point: root,
                source,
            })
    }
}

impl Drop for Mounted<'_> {
    fn drop(&mut self) {
        if self.active {
            let root = self.root.clone();
            if let Err(e) = self.ws.volumes().unmount(&root, true) {
                log::warn!("Failed to unmount {}: {}", root.display(), e);
            }
        }
    }
}

impl BootPartitionTarget {
    /// Partition on block device `device`, validated by `checksum_file`
    pub fn new(
        name: impl Into<String>,
        device: impl Into<PathBuf>,
        checksum_file: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            device: device.into(),
            checksum_file: checksum_file.into(),
        }
    }

    /// Bring the partition to the unmounted state
    fn release_device(&self, ws: &mut Workspace) -> Result<()> {
        if !self.device.exists() {
            return Err(BootPartError::DeviceNotFound(self.device.clone()));
        }

        let mount_point = ws.mount_point().to_path_buf();
        if ws
            .volumes()
            .is_mounted_at(&mount_point)
            .map_err(BootPartError::MountTable)?
        {
            log::warn!(
                "{}: clearing stale mount at {}",
                self.name,
                mount_point.display()
            );
            self.force_unmount(ws, &mount_point)?;
        }

        let mounts = ws
            .volumes()
            .mounts_of(&self.device)
            .map_err(BootPartError::MountTable)?;
        for mount_point in mounts {
            log::warn!(
                "{}: {} is mounted at {}, unmounting",
                self.name,
                self.device.display(),
                mount_point.display()
            );
            self.force_unmount(ws, &mount_point)?;
        }
        Ok(())
    }

    fn force_unmount(&self, ws: &mut Workspace, mount_point: &Path) -> Result<()> {
        ws.volumes()
            .unmount(mount_point, true)
            .map_err(|source| BootPartError::Unmount {
                device: self.device.clone(),
                mount_point: mount_point.to_path_buf(),
                source,
            })
    }

    fn check(&self, ws: &mut Workspace) -> Result<FsckStatus> {
        let status = ws
            .volumes()
            .check(&self.device)
            .map_err(|source| BootPartError::FsckSpawn {
                device: self.device.clone(),
                source,
            })?;
        match status {
            FsckStatus::Clean => log::debug!("{}: filesystem clean", self.name),
            FsckStatus::Repaired => log::warn!("{}: filesystem errors were repaired", self.name),
            FsckStatus::Unrecoverable(s) => {
                log::error!("{}: filesystem unrecoverable (status {})", self.name, s)
            }
        }
        Ok(status)
    }

    /// Unmounted and checked; unrecoverable damage is fatal
    fn prepare(&self, ws: &mut Workspace) -> Result<()> {
        self.release_device(ws)?;
        match self.check(ws)? {
            FsckStatus::Unrecoverable(status) => Err(BootPartError::Unrecoverable {
                device: self.device.clone(),
                status,
            }),
            FsckStatus::Clean | FsckStatus::Repaired => Ok(()),
        }
    }

    fn mount<'w>(&self, ws: &'w mut Workspace, mode: MountMode) -> Result<Mounted<'w>> {
        let root = ws.mount_point().to_path_buf();
        ws.volumes()
            .mount(&self.device, &root, mode)
            .map_err(|source| BootPartError::Mount {
                device: self.device.clone(),
                mount_point: root.clone(),
                source,
            })?;
        Ok(Mounted {
            ws,
            device: self.device.clone(),
            root,
            active: true,
        })
    }

    /// Image bytes equal the artifact and the checksum file agrees
    fn content_matches(&self, root: &Path, artifact: &ResolvedArtifact) -> Result<bool> {
        let file_name = installed_name(artifact);
        let installed = root.join(file_name);
        if !same_contents(artifact.path(), &installed)? {
            log::debug!("{}: {} differs from package", self.name, file_name);
            return Ok(false);
        }

        let checksum_path = root.join(&self.checksum_file);
        let checksums =
            ChecksumFile::load(&checksum_path).map_err(|e| BootPartError::io(&checksum_path, e))?;
        let Some(checksums) = checksums else {
            log::debug!("{}: {} missing or malformed", self.name, self.checksum_file);
            return Ok(false);
        };
        checksums
            .validates(root, file_name)
            .map_err(|e| BootPartError::io(&installed, e))
    }

    fn verify_inner(
        &self,
        artifact: &ResolvedArtifact,
        ws: &mut Workspace,
    ) -> Result<VerifyOutcome> {
        self.prepare(ws)?;
        let mounted = self.mount(ws, MountMode::ReadOnly)?;
        let matches = self.content_matches(mounted.root(), artifact)?;
        mounted.unmount()?;
        Ok(if matches {
            VerifyOutcome::Match
        } else {
            VerifyOutcome::Mismatch
        })
    }

    fn install_inner(
        &self,
        artifact: &ResolvedArtifact,
        ws: &mut Workspace,
    ) -> Result<InstallReport> {
        if self.verify_inner(artifact, ws)? == VerifyOutcome::Match {
            log::info!("{}: already up to date", self.name);
            return Ok(InstallOutcome::SkippedUpToDate.into());
        }

        let mounted = self.mount(ws, MountMode::ReadWrite)?;
        let root = mounted.root().to_path_buf();
        let started = Instant::now();

        clear_files(&root)?;
        let file_name = installed_name(artifact);
        let image = root.join(file_name);
        fs::copy(artifact.path(), &image).map_err(|e| BootPartError::io(&image, e))?;
        sync_file(&image)?;

        let checksum_path = root.join(&self.checksum_file);
        let checksums = ChecksumFile::single(artifact.hash(), file_name);
        write_synced(&checksum_path, checksums.to_string().as_bytes())?;

        mounted.unmount()?;
        let window = started.elapsed();
        log::info!(
            "{}: wrote {}, bricking window closed after {} ms",
            self.name,
            file_name,
            window.as_millis()
        );

        let outcome = match self.verify_inner(artifact, ws)? {
            VerifyOutcome::Match => InstallOutcome::Updated,
            VerifyOutcome::Mismatch => InstallOutcome::Failed,
        };
        Ok(InstallReport {
            outcome,
            bricking_window: Some(window),
        })
    }

    fn self_test_inner(&self, ws: &mut Workspace) -> Result<bool> {
        self.release_device(ws)?;
        if let FsckStatus::Unrecoverable(_) = self.check(ws)? {
            return Ok(false);
        }

        let mounted = match self.mount(ws, MountMode::ReadOnly) {
            Ok(mounted) => mounted,
            Err(e) => {
                log::warn!("{}: self-test mount failed: {}", self.name, e);
                return Ok(false);
            }
        };

        let checksum_path = mounted.root().join(&self.checksum_file);
        let healthy = match ChecksumFile::load(&checksum_path)
            .and_then(|file| match file {
                Some(file) => file.validates_all(mounted.root()),
                None => Ok(false),
            }) {
            Ok(healthy) => healthy,
            Err(e) => {
                log::warn!("{}: self-test read failed: {}", self.name, e);
                false
            }
        };

        mounted.unmount()?;
        Ok(healthy)
    }
}

/// Name of the image at the partition root
///
/// Packages may keep images in subdirectories; the partition is flat.
fn installed_name(artifact: &ResolvedArtifact) -> &str {
    Path::new(artifact.file_name())
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(artifact.file_name())
}

/// Remove top-level regular files and symlinks, keeping directories
fn clear_files(root: &Path) -> Result<()> {
    let entries = fs::read_dir(root).map_err(|e| BootPartError::io(root, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| BootPartError::io(root, e))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|e| BootPartError::io(&path, e))?;
        if file_type.is_file() || file_type.is_symlink() {
            log::debug!("Removing {}", path.display());
            fs::remove_file(&path).map_err(|e| BootPartError::io(&path, e))?;
        }
    }
    Ok(())
}

fn sync_file(path: &Path) -> Result<()> {
    File::open(path)
        .and_then(|f| f.sync_all())
        .map_err(|e| BootPartError::io(path, e))
}

fn write_synced(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| BootPartError::io(path, e))?;
    file.write_all(data)
        .and_then(|()| file.sync_all())
        .map_err(|e| BootPartError::io(path, e))
}

/// Byte-compare two files; a missing `installed` file compares unequal
fn same_contents(expected: &Path, installed: &Path) -> Result<bool> {
    let mut b = match File::open(installed) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(BootPartError::io(installed, e)),
    };
    let mut a = File::open(expected).map_err(|e| BootPartError::io(expected, e))?;

    let meta_a = a.metadata().map_err(|e| BootPartError::io(expected, e))?;
    let meta_b = b.metadata().map_err(|e| BootPartError::io(installed, e))?;
    if meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut buf_a = vec![0u8; COMPARE_CHUNK_SIZE];
    let mut buf_b = vec![0u8; COMPARE_CHUNK_SIZE];
    loop {
        let n = read_full(&mut a, &mut buf_a).map_err(|e| BootPartError::io(expected, e))?;
        let m = read_full(&mut b, &mut buf_b).map_err(|e| BootPartError::io(installed, e))?;
        if n != m || buf_a[..n] != buf_b[..m] {
            return Ok(false);
        }
        if n == 0 {
            return Ok(true);
        }
    }
}

fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

impl Target for BootPartitionTarget {
    fn verify(
        &mut self,
        artifact: &ResolvedArtifact,
        ws: &mut Workspace,
    ) -> fwflash_core::Result<VerifyOutcome> {
        self.verify_inner(artifact, ws)
            .map_err(|e| fwflash_core::Error::device(&self.name, e))
    }

    fn install(
        &mut self,
        artifact: &ResolvedArtifact,
        ws: &mut Workspace,
    ) -> fwflash_core::Result<InstallReport> {
        self.install_inner(artifact, ws)
            .map_err(|e| fwflash_core::Error::device(&self.name, e))
    }

    fn self_test(&mut self, ws: &mut Workspace) -> fwflash_core::Result<bool> {
        self.self_test_inner(ws)
            .map_err(|e| fwflash_core::Error::device(&self.name, e))
    }
}
