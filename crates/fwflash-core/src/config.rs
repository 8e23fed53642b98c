//! Device configuration
//!
//! Describes where each target lives and the hardware constants needed to
//! drive it. Loaded from TOML; every field defaults to the reference
//! hardware.
//!
//! ```toml
//! [boot]
//! partitions = ["/dev/mmcblk0p1", "/dev/mmcblk0p2"]
//! section = "boot"
//!
//! [flash]
//! devices = ["/dev/mtd0", "/dev/mtd1"]
//! erase_block_size = 4096
//! header_size = 32
//!
//! [io_controller]
//! device = "/dev/ttymxc2"
//! tool = "/usr/sbin/ioc-flash"
//! ```

use crate::error::{Error, Result};
use crate::flash::FlashGeometry;
use crate::target::TargetId;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Redundant boot partitions
    pub boot: BootConfig,
    /// Raw flash devices
    pub flash: FlashConfig,
    /// Serial-attached IO controller
    pub io_controller: IoControllerConfig,
}

/// Boot partition settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BootConfig {
    /// Block devices for boot partition 1 and 2
    pub partitions: Vec<PathBuf>,
    /// Manifest section installed on both partitions
    pub section: String,
    /// Name of the checksum file kept next to the image
    pub checksum_file: String,
    /// Filesystem type passed to mount
    pub fstype: String,
    /// Filesystem-specific mount data
    pub mount_options: String,
    /// Filesystem checker program
    pub fsck: PathBuf,
    /// Arguments placed before the device path
    pub fsck_args: Vec<String>,
    /// Highest checker exit status that still allows mounting
    pub fsck_max_ok_status: i32,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            partitions: vec![
                PathBuf::from("/dev/mmcblk0p1"),
                PathBuf::from("/dev/mmcblk0p2"),
            ],
            section: "boot".to_string(),
            checksum_file: "checksums".to_string(),
            fstype: "ext4".to_string(),
            mount_options: "data=ordered".to_string(),
            fsck: PathBuf::from("fsck.ext4"),
            fsck_args: vec!["-p".to_string()],
            fsck_max_ok_status: 2,
        }
    }
}

/// Raw flash settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FlashConfig {
    /// Devices for flash 1 and 2
    pub devices: Vec<PathBuf>,
    /// Manifest sections for flash 1 and 2
    pub sections: Vec<String>,
    /// Erase granularity in bytes
    pub erase_block_size: u32,
    /// Image header size written last
    pub header_size: u32,
}

impl Default for FlashConfig {
    fn default() -> Self {
        let geometry = FlashGeometry::default();
        Self {
            devices: vec![PathBuf::from("/dev/mtd0"), PathBuf::from("/dev/mtd1")],
            sections: vec!["flash1".to_string(), "flash2".to_string()],
            erase_block_size: geometry.erase_block_size,
            header_size: geometry.header_size,
        }
    }
}

impl FlashConfig {
    /// Geometry shared by both flash devices
    pub fn geometry(&self) -> FlashGeometry {
        FlashGeometry {
            erase_block_size: self.erase_block_size,
            header_size: self.header_size,
        }
    }
}

/// IO controller settings
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct IoControllerConfig {
    /// Serial device the controller is attached to
    pub device: PathBuf,
    /// Programming tool
    pub tool: PathBuf,
    /// Manifest section for the boot firmware
    pub boot_section: String,
    /// Manifest section for the main firmware
    pub main_section: String,
}

impl Default for IoControllerConfig {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/ttymxc2"),
            tool: PathBuf::from("ioc-flash"),
            boot_section: "io_boot".to_string(),
            main_section: "io_main".to_string(),
        }
    }
}

impl Config {
    /// Parse a TOML string and validate it
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(s).map_err(|e| Error::Config(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let s = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&s)
    }

    /// Reject configurations the engine cannot run safely
    pub fn validate(&self) -> Result<()> {
        if self.boot.partitions.len() != 2 {
            return Err(Error::Config(format!(
                "expected 2 boot partitions, got {}",
                self.boot.partitions.len()
            )));
        }
        if self.flash.devices.len() != 2 || self.flash.sections.len() != 2 {
            return Err(Error::Config("expected 2 flash devices and 2 flash sections".to_string()));
        }
        if self.flash.erase_block_size == 0 {
            return Err(Error::Config("erase_block_size must be non-zero".to_string()));
        }
        if self.flash.header_size > self.flash.erase_block_size {
            return Err(Error::Config(format!(
                "header_size {} exceeds erase_block_size {}",
                self.flash.header_size, self.flash.erase_block_size
            )));
        }
        if self.boot.checksum_file.is_empty() || self.boot.checksum_file.contains('/') {
            return Err(Error::Config(format!(
                "invalid checksum_file '{}'",
                self.boot.checksum_file
            )));
        }
        Ok(())
    }

    /// Manifest section consumed by `target`
    pub fn section_for(&self, target: TargetId) -> &str {
        match target {
            TargetId::Boot1 | TargetId::Boot2 => &self.boot.section,
            TargetId::Flash1 => &self.flash.sections[0],
            TargetId::Flash2 => &self.flash.sections[1],
            TargetId::IoBoot => &self.io_controller.boot_section,
            TargetId::IoMain => &self.io_controller.main_section,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.flash.geometry(), FlashGeometry::default());
        assert_eq!(config.section_for(TargetId::Boot2), "boot");
        assert_eq!(config.section_for(TargetId::Flash2), "flash2");
    }

    #[test]
    fn test_partial_toml() {
        let config = Config::from_toml_str(
            r#"
[flash]
devices = ["/dev/mtd4", "/dev/mtd5"]
erase_block_size = 65536

[io_controller]
tool = "/opt/bin/ioc"
"#,
        )
        .unwrap();
        assert_eq!(config.flash.devices[1], PathBuf::from("/dev/mtd5"));
        assert_eq!(config.flash.erase_block_size, 65536);
        assert_eq!(config.flash.header_size, 32);
        assert_eq!(config.io_controller.tool, PathBuf::from("/opt/bin/ioc"));
        assert_eq!(config.boot, BootConfig::default());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(Config::from_toml_str("[flash]\nerase_block_size = 0\n").is_err());
        assert!(Config::from_toml_str("[flash]\nheader_size = 8192\n").is_err());
        assert!(Config::from_toml_str("[boot]\npartitions = [\"/dev/sda1\"]\n").is_err());
        assert!(Config::from_toml_str("[boot]\nbogus = 1\n").is_err());
    }
}
