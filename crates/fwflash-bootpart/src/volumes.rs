//! Linux implementation of [`VolumeOps`]
//!
//! Mount state comes from `/proc/self/mounts`; mounting goes through
//! `mount(2)` and `umount2(2)`; the checker is an external program.

use fwflash_core::config::BootConfig;
use fwflash_core::volume::{FsckStatus, MountMode, VolumeOps};
use nix::mount::{mount, umount2, MntFlags, MsFlags};
use std::ffi::OsString;
use std::io;
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Kernel mount table of the current process
const MOUNT_TABLE: &str = "/proc/self/mounts";

/// Filesystem checker invocation
#[derive(Debug, Clone)]
pub struct FsckCommand {
    /// Program to run
    pub program: PathBuf,
    /// Arguments placed before the device path
    pub args: Vec<String>,
    /// Highest exit status that still allows mounting
    pub max_ok_status: i32,
}

impl FsckCommand {
    /// Map a checker exit status onto [`FsckStatus`]
    ///
    /// `None` means the checker was killed by a signal.
    pub fn classify(&self, status: Option<i32>) -> FsckStatus {
        match status {
            Some(0) => FsckStatus::Clean,
            Some(s) if s > 0 && s <= self.max_ok_status => FsckStatus::Repaired,
            Some(s) => FsckStatus::Unrecoverable(s),
            None => FsckStatus::Unrecoverable(-1),
        }
    }
}

/// Host volume operations for one filesystem type
#[derive(Debug, Clone)]
pub struct LinuxVolumes {
    fstype: String,
    mount_data: String,
    fsck: FsckCommand,
}

impl LinuxVolumes {
    /// Volume operations mounting `fstype` with filesystem data `mount_data`
    pub fn new(
        fstype: impl Into<String>,
        mount_data: impl Into<String>,
        fsck: FsckCommand,
    ) -> Self {
        Self {
            fstype: fstype.into(),
            mount_data: mount_data.into(),
            fsck,
        }
    }

    /// Volume operations described by the `[boot]` configuration
    pub fn from_config(config: &BootConfig) -> Self {
        Self::new(
            config.fstype.clone(),
            config.mount_options.clone(),
            FsckCommand {
                program: config.fsck.clone(),
                args: config.fsck_args.clone(),
                max_ok_status: config.fsck_max_ok_status,
            },
        )
    }

    fn table(&self) -> io::Result<Vec<MountEntry>> {
        let text = std::fs::read_to_string(MOUNT_TABLE)?;
        Ok(parse_mount_table(&text))
    }
}

/// One line of the kernel mount table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountEntry {
    /// Mounted device or pseudo-source
    pub source: PathBuf,
    /// Mount point
    pub target: PathBuf,
}

/// Parse `/proc/mounts` format, decoding octal escapes
pub fn parse_mount_table(text: &str) -> Vec<MountEntry> {
    text.lines()
        .filter_map(|line| {
            let mut fields = line.split_ascii_whitespace();
            let source = fields.next()?;
            let target = fields.next()?;
            Some(MountEntry {
                source: unescape(source),
                target: unescape(target),
            })
        })
        .collect()
}

fn unescape(field: &str) -> PathBuf {
    let bytes = field.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 3 < bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let value = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(byte) = u8::try_from(value) {
                    out.push(byte);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    PathBuf::from(OsString::from_vec(out))
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

impl VolumeOps for LinuxVolumes {
    fn mounts_of(&self, device: &Path) -> io::Result<Vec<PathBuf>> {
        let device = canonical(device);
        Ok(self
            .table()?
            .into_iter()
            .filter(|entry| entry.source.is_absolute() && canonical(&entry.source) == device)
            .map(|entry| entry.target)
            .collect())
    }

    fn is_mounted_at(&self, mount_point: &Path) -> io::Result<bool> {
        let mount_point = canonical(mount_point);
        Ok(self
            .table()?
            .iter()
            .any(|entry| entry.target == mount_point))
    }

    fn check(&mut self, device: &Path) -> io::Result<FsckStatus> {
        log::debug!(
            "Running {} {} {}",
            self.fsck.program.display(),
            self.fsck.args.join(" "),
            device.display()
        );
        let status = Command::new(&self.fsck.program)
            .args(&self.fsck.args)
            .arg(device)
            .status()?;
        Ok(self.fsck.classify(status.code()))
    }

    fn mount(&mut self, device: &Path, mount_point: &Path, mode: MountMode) -> io::Result<()> {
        let mut flags = MsFlags::MS_NODEV | MsFlags::MS_NOEXEC | MsFlags::MS_NOSUID;
        if mode == MountMode::ReadOnly {
            flags |= MsFlags::MS_RDONLY;
        }
        let data = (!self.mount_data.is_empty()).then_some(self.mount_data.as_str());
        mount(
            Some(device),
            mount_point,
            Some(self.fstype.as_str()),
            flags,
            data,
        )?;
        log::debug!(
            "Mounted {} at {} ({:?})",
            device.display(),
            mount_point.display(),
            mode
        );
        Ok(())
    }

    fn unmount(&mut self, mount_point: &Path, force: bool) -> io::Result<()> {
        nix::unistd::sync();
        let flags = if force {
            MntFlags::MNT_FORCE
        } else {
            MntFlags::empty()
        };
        umount2(mount_point, flags)?;
        log::debug!("Unmounted {}", mount_point.display());
        Ok(())
    }
}
