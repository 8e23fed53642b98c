//! Linux MTD device implementation

use crate::error::{LinuxMtdError, Result};
use fwflash_core::flash::{FlashError, FlashResult, RawFlash};
use log::{debug, info, warn};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::FileTypeExt;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};

/// Sysfs root for MTD devices
const MTD_SYSFS_ROOT: &str = "/sys/class/mtd";

/// MTD flags from kernel headers
mod mtd_flags {
    /// MTD device is writable
    pub const MTD_WRITEABLE: u64 = 0x400;
    /// MTD device doesn't require erase
    pub const MTD_NO_ERASE: u64 = 0x1000;
}

/// Information about an MTD device read from sysfs
#[derive(Debug, Clone)]
pub struct MtdInfo {
    /// Device name from sysfs
    pub name: String,
    /// Total size in bytes
    pub total_size: u64,
    /// Erase block size in bytes
    pub erase_size: u64,
    /// Number of erase regions (must be 0 for uniform erase)
    pub num_erase_regions: u64,
    /// Whether the device is writable
    pub is_writable: bool,
    /// Whether the device requires erase before write
    pub requires_erase: bool,
}

/// Kind of special file backing a flash target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// `/dev/mtdN` character device: explicit erase via ioctl
    MtdChar,
    /// Block device (e.g. `/dev/mtdblockN`): the kernel handles erase
    Block,
}

/// Check that `path` exists and is a character or block special device
pub fn classify_node(path: &Path) -> Result<NodeKind> {
    let meta = match std::fs::metadata(path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(LinuxMtdError::DeviceNotFound(path.to_path_buf()))
        }
        Err(e) => return Err(e.into()),
    };
    let file_type = meta.file_type();
    if file_type.is_char_device() {
        Ok(NodeKind::MtdChar)
    } else if file_type.is_block_device() {
        Ok(NodeKind::Block)
    } else {
        Err(LinuxMtdError::NotSpecialDevice(path.to_path_buf()))
    }
}

/// Linux MTD device handle
///
/// Wraps a flash device node and implements [`RawFlash`]. For `/dev/mtdN`
/// the geometry comes from sysfs and erase goes through `MEMERASE`; for
/// block nodes the size comes from the node itself and erase is a no-op.
pub struct LinuxMtd {
    /// Device node path
    path: PathBuf,
    /// Device file handle
    file: File,
    /// Device information
    info: MtdInfo,
}

impl LinuxMtd {
    /// Open the flash device at `path`
    ///
    /// # Errors
    /// Returns an error if:
    /// - The node doesn't exist or is not a special device
    /// - An MTD character device is not NOR flash or has
    ///   non-uniform erase regions
    /// - The device cannot be opened
    pub fn open(path: &Path, writable: bool) -> Result<Self> {
        let kind = classify_node(path)?;

        let file = OpenOptions::new().read(true).write(writable).open(path)?;

        let info = match kind {
            NodeKind::MtdChar => {
                let sysfs_path = sysfs_dir(path)?;

                // Check device type (must be "nor")
                let dev_type = read_sysfs_string(&sysfs_path, "type")?;
                if dev_type != "nor" {
                    return Err(LinuxMtdError::NotNorFlash(format!(
                        "{} type is '{}', expected 'nor'",
                        path.display(),
                        dev_type
                    )));
                }

                let info = read_mtd_info(&sysfs_path)?;

                // Validate erase size is a power of 2
                if !info.erase_size.is_power_of_two() {
                    return Err(LinuxMtdError::InvalidEraseSize(info.erase_size));
                }

                // Non-uniform erase regions are not supported
                if info.num_erase_regions != 0 {
                    return Err(LinuxMtdError::NonUniformEraseRegions(info.num_erase_regions));
                }
                info
            }
            NodeKind::Block => block_info(path, &file)?,
        };

        debug!(
            "{}: name='{}', size={}, erase_size={}, writable={}, requires_erase={}",
            path.display(),
            info.name,
            info.total_size,
            info.erase_size,
            info.is_writable,
            info.requires_erase
        );

        info!(
            "Opened {} (name='{}', size={} bytes, erase_size={} bytes)",
            path.display(),
            info.name,
            info.total_size,
            info.erase_size
        );

        Ok(Self {
            path: path.to_path_buf(),
            file,
            info,
        })
    }

    /// Get the erase block size in bytes
    pub fn erase_size(&self) -> u64 {
        self.info.erase_size
    }
}

/// `/dev/mtd3` -> `/sys/class/mtd/mtd3`
fn sysfs_dir(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| n.starts_with("mtd") && n[3..].parse::<u32>().is_ok())
        .ok_or_else(|| {
            LinuxMtdError::NotNorFlash(format!("{} is not an MTD node", path.display()))
        })?;
    let sysfs_path = format!("{}/{}", MTD_SYSFS_ROOT, name);
    if !Path::new(&sysfs_path).exists() {
        return Err(LinuxMtdError::DeviceNotFound(PathBuf::from(sysfs_path)));
    }
    Ok(sysfs_path)
}

fn block_info(path: &Path, file: &File) -> Result<MtdInfo> {
    let mut file = file;
    let total_size = file.seek(SeekFrom::End(0))?;
    file.seek(SeekFrom::Start(0))?;
    Ok(MtdInfo {
        name: path.display().to_string(),
        total_size,
        erase_size: 0,
        num_erase_regions: 0,
        is_writable: true,
        requires_erase: false,
    })
}

/// Read a string from a sysfs file and sanitize it
fn read_sysfs_string(sysfs_path: &str, filename: &str) -> Result<String> {
    let path = format!("{}/{}", sysfs_path, filename);
    let content = std::fs::read_to_string(&path).map_err(|e| LinuxMtdError::SysfsRead {
        path: path.clone(),
        source: e,
    })?;
    Ok(sanitize(&content))
}

/// Keep the printable prefix, drop trailing whitespace
fn sanitize(content: &str) -> String {
    let sanitized: String = content
        .chars()
        .take_while(|c| c.is_ascii_graphic() || *c == ' ')
        .collect();
    sanitized.trim_end().to_string()
}

/// Parse a sysfs integer, hex (`0x...`) or decimal
fn parse_sysfs_int(value: &str) -> Option<u64> {
    let lower = value.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else {
        value.parse::<u64>().ok()
    }
}

/// Read an integer from a sysfs file
fn read_sysfs_int(sysfs_path: &str, filename: &str) -> Result<u64> {
    let value_str = read_sysfs_string(sysfs_path, filename)?;
    parse_sysfs_int(&value_str).ok_or_else(|| LinuxMtdError::SysfsParse {
        path: format!("{}/{}", sysfs_path, filename),
        value: value_str,
    })
}

/// Read MTD device information from sysfs
fn read_mtd_info(sysfs_path: &str) -> Result<MtdInfo> {
    let flags = read_sysfs_int(sysfs_path, "flags")?;
    let is_writable = (flags & mtd_flags::MTD_WRITEABLE) != 0;
    let requires_erase = (flags & mtd_flags::MTD_NO_ERASE) == 0;

    Ok(MtdInfo {
        name: read_sysfs_string(sysfs_path, "name")?,
        total_size: read_sysfs_int(sysfs_path, "size")?,
        erase_size: read_sysfs_int(sysfs_path, "erasesize")?,
        num_erase_regions: read_sysfs_int(sysfs_path, "numeraseregions")?,
        is_writable,
        requires_erase,
    })
}

/// MEMERASE ioctl argument structure
/// Matches struct erase_info_user from mtd/mtd-user.h
#[repr(C)]
struct EraseInfo {
    start: u32,
    length: u32,
}

// MEMERASE = _IOW('M', 2, struct erase_info_user)
nix::ioctl_write_ptr!(memerase, b'M', 2, EraseInfo);

impl RawFlash for LinuxMtd {
    fn size(&self) -> usize {
        self.info.total_size as usize
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> FlashResult<()> {
        let len = buf.len();
        let result = self
            .file
            .seek(SeekFrom::Start(addr as u64))
            .and_then(|_| self.file.read_exact(buf));
        result.map_err(|e| {
            warn!("{}: read at {:#x} failed: {}", self.path.display(), addr, e);
            FlashError::Read { addr, len }
        })
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> FlashResult<()> {
        if !self.info.is_writable {
            return Err(FlashError::WriteProtected);
        }

        let fail = |e: std::io::Error| {
            warn!(
                "{}: write at {:#x} failed: {}",
                self.path.display(),
                addr,
                e
            );
            FlashError::Write {
                addr,
                len: data.len(),
            }
        };

        self.file.seek(SeekFrom::Start(addr as u64)).map_err(fail)?;

        // Write in chunks aligned to erase block size
        let chunksize = std::cmp::max(self.info.erase_size as usize, 4096);
        let mut offset = 0;
        while offset < data.len() {
            let pos = addr as usize + offset;
            let step = std::cmp::min(chunksize - (pos % chunksize), data.len() - offset);
            self.file
                .write_all(&data[offset..offset + step])
                .and_then(|_| self.file.flush())
                .map_err(fail)?;
            offset += step;
        }

        self.file.sync_data().map_err(fail)
    }

    fn erase(&mut self, addr: u32, len: u32) -> FlashResult<()> {
        if !self.info.requires_erase {
            // Block nodes and RAM-backed MTDs erase implicitly
            return Ok(());
        }

        let erase_size = self.info.erase_size as u32;
        if addr % erase_size != 0 || len % erase_size != 0 {
            return Err(FlashError::Erase { addr, len });
        }

        // Erase block by block
        let mut offset = 0u32;
        while offset < len {
            let erase_info = EraseInfo {
                start: addr + offset,
                length: erase_size,
            };

            // SAFETY: We're calling an ioctl with a valid file descriptor and
            // a properly initialized EraseInfo struct
            unsafe {
                memerase(self.file.as_raw_fd(), &erase_info).map_err(|e| {
                    warn!(
                        "{}: MEMERASE at {:#x} failed: {}",
                        self.path.display(),
                        addr + offset,
                        e
                    );
                    FlashError::Erase {
                        addr: addr + offset,
                        len: erase_size,
                    }
                })?;
            }

            offset += erase_size;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("nor\n"), "nor");
        assert_eq!(sanitize("spi0.0  \n\0junk"), "spi0.0");
    }

    #[test]
    fn test_parse_sysfs_int() {
        assert_eq!(parse_sysfs_int("4096"), Some(4096));
        assert_eq!(parse_sysfs_int("0x800"), Some(2048));
        assert_eq!(parse_sysfs_int("0X10"), Some(16));
        assert_eq!(parse_sysfs_int("nope"), None);
    }

    #[test]
    fn test_classify_node_rejects_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("mtd0");
        std::fs::write(&file, [0u8; 16]).unwrap();
        assert!(matches!(
            classify_node(&file),
            Err(LinuxMtdError::NotSpecialDevice(_))
        ));
        assert!(matches!(
            classify_node(&dir.path().join("missing")),
            Err(LinuxMtdError::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_classify_node_accepts_char_device() {
        assert_eq!(
            classify_node(Path::new("/dev/null")).unwrap(),
            NodeKind::MtdChar
        );
    }

    #[test]
    fn test_sysfs_dir_requires_mtd_name() {
        assert!(sysfs_dir(Path::new("/dev/null")).is_err());
        assert!(sysfs_dir(Path::new("/dev/mtdblock0")).is_err());
    }
}
