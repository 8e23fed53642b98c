//! Boot partition target behavior against directory-backed fake volumes

use fwflash_bootpart::{BootPartitionTarget, ChecksumFile};
use fwflash_core::hash::HashAlgorithm;
use fwflash_core::volume::{FsckStatus, MountMode, VolumeOps};
use fwflash_core::{
    ErrorCategory, InstallOutcome, Manifest, ResolvedArtifact, Target, VerifyOutcome, Workspace,
};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tempfile::TempDir;

#[derive(Default)]
struct State {
    mounts: HashMap<PathBuf, PathBuf>,
    fsck: HashMap<PathBuf, FsckStatus>,
    fail_mount: bool,
    fail_unmount: bool,
    log: Vec<String>,
}

/// Devices are directories; mounting symlinks the device over the mount point
#[derive(Clone, Default)]
struct FakeVolumes(Rc<RefCell<State>>);

impl FakeVolumes {
    fn log(&self) -> Vec<String> {
        self.0.borrow().log.clone()
    }

    fn clear_log(&self) {
        self.0.borrow_mut().log.clear();
    }
}

impl VolumeOps for FakeVolumes {
    fn mounts_of(&self, device: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(self
            .0
            .borrow()
            .mounts
            .iter()
            .filter(|(_, d)| d.as_path() == device)
            .map(|(m, _)| m.clone())
            .collect())
    }

    fn is_mounted_at(&self, mount_point: &Path) -> io::Result<bool> {
        Ok(self.0.borrow().mounts.contains_key(mount_point))
    }

    fn check(&mut self, device: &Path) -> io::Result<FsckStatus> {
        let mut state = self.0.borrow_mut();
        state.log.push(format!("fsck {}", name_of(device)));
        Ok(state.fsck.get(device).copied().unwrap_or(FsckStatus::Clean))
    }

    fn mount(&mut self, device: &Path, mount_point: &Path, mode: MountMode) -> io::Result<()> {
        let mut state = self.0.borrow_mut();
        if state.fail_mount {
            return Err(io::Error::new(io::ErrorKind::Other, "mount refused"));
        }
        let mode = match mode {
            MountMode::ReadOnly => "ro",
            MountMode::ReadWrite => "rw",
        };
        let entry = format!("mount {} {}", mode, name_of(device));
        state.log.push(entry);
        fs::remove_dir(mount_point)?;
        std::os::unix::fs::symlink(device, mount_point)?;
        state
            .mounts
            .insert(mount_point.to_path_buf(), device.to_path_buf());
        Ok(())
    }

    fn unmount(&mut self, mount_point: &Path, force: bool) -> io::Result<()> {
        let mut state = self.0.borrow_mut();
        if state.fail_unmount {
            return Err(io::Error::new(io::ErrorKind::Other, "target is busy"));
        }
        state.log.push(format!(
            "unmount{} {}",
            if force { " force" } else { "" },
            name_of(mount_point)
        ));
        let is_link = fs::symlink_metadata(mount_point)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if is_link {
            fs::remove_file(mount_point)?;
            fs::create_dir(mount_point)?;
        }
        state.mounts.remove(mount_point);
        Ok(())
    }
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

struct Fixture {
    _dir: TempDir,
    device: PathBuf,
    volumes: FakeVolumes,
    workspace: Workspace,
    artifact: ResolvedArtifact,
}

const IMAGE: &[u8] = b"boot image version 2";

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let device = dir.path().join("mmcblk0p1");
    fs::create_dir(&device).unwrap();
    fs::create_dir(device.join("lost+found")).unwrap();
    fs::write(device.join("boot-v1.img"), b"boot image version 1").unwrap();
    fs::write(device.join("checksums"), "stale\n").unwrap();

    let volumes = FakeVolumes::default();
    let workspace = Workspace::new_in(dir.path(), Box::new(volumes.clone())).unwrap();

    fs::write(workspace.extract_dir().join("boot.img"), IMAGE).unwrap();
    let manifest = Manifest::from_json_str(&format!(
        r#"{{"Model": "ctrl-a", "Generation": ["3"], "boot": {{"Name": "boot.img", "Hash": "{}"}}}}"#,
        HashAlgorithm::Md5.digest_bytes(IMAGE)
    ))
    .unwrap();
    let artifact = manifest.resolve("boot", workspace.extract_dir()).unwrap();

    Fixture {
        _dir: dir,
        device,
        volumes,
        workspace,
        artifact,
    }
}

impl Fixture {
    fn target(&self) -> BootPartitionTarget {
        BootPartitionTarget::new("boot1", &self.device, "checksums")
    }

    fn mount_point_is_free(&self) -> bool {
        let mount_point = self.workspace.mount_point();
        !self.volumes.0.borrow().mounts.contains_key(mount_point)
            && fs::symlink_metadata(mount_point).unwrap().is_dir()
    }
}

#[test]
fn test_install_replaces_stale_partition() {
    let mut fx = fixture();
    let mut target = fx.target();

    let report = target.install(&fx.artifact, &mut fx.workspace).unwrap();
    assert_eq!(report.outcome, InstallOutcome::Updated);
    assert!(report.bricking_window.is_some());

    assert_eq!(fs::read(fx.device.join("boot.img")).unwrap(), IMAGE);
    assert!(!fx.device.join("boot-v1.img").exists());
    assert!(fx.device.join("lost+found").is_dir());
    let checksums = fs::read_to_string(fx.device.join("checksums")).unwrap();
    assert_eq!(
        checksums,
        format!("{}  boot.img\n", HashAlgorithm::Md5.digest_bytes(IMAGE))
    );
    assert!(fx.mount_point_is_free());
}

#[test]
fn test_second_install_is_skipped_without_writing() {
    let mut fx = fixture();
    let mut target = fx.target();
    target.install(&fx.artifact, &mut fx.workspace).unwrap();
    fx.volumes.clear_log();

    let report = target.install(&fx.artifact, &mut fx.workspace).unwrap();
    assert_eq!(report.outcome, InstallOutcome::SkippedUpToDate);
    assert_eq!(report.bricking_window, None);
    assert!(!fx.volumes.log().iter().any(|l| l.starts_with("mount rw")));
    assert!(fx.mount_point_is_free());
}

#[test]
fn test_verify_is_read_only() {
    let mut fx = fixture();
    let mut target = fx.target();

    assert_eq!(
        target.verify(&fx.artifact, &mut fx.workspace).unwrap(),
        VerifyOutcome::Mismatch
    );
    assert_eq!(
        fx.volumes.log(),
        vec!["fsck mmcblk0p1", "mount ro mmcblk0p1", "unmount mnt"]
    );
    assert!(fx.device.join("boot-v1.img").exists());
    assert!(fx.mount_point_is_free());
}

#[test]
fn test_tampered_checksum_file_fails_verify() {
    let mut fx = fixture();
    let mut target = fx.target();
    target.install(&fx.artifact, &mut fx.workspace).unwrap();
    assert_eq!(
        target.verify(&fx.artifact, &mut fx.workspace).unwrap(),
        VerifyOutcome::Match
    );

    let bogus = ChecksumFile::single(HashAlgorithm::Md5.digest_bytes(b"other"), "boot.img");
    fs::write(fx.device.join("checksums"), bogus.to_string()).unwrap();
    assert_eq!(
        target.verify(&fx.artifact, &mut fx.workspace).unwrap(),
        VerifyOutcome::Mismatch
    );

    // A tampered partition is rewritten on the next install
    let report = target.install(&fx.artifact, &mut fx.workspace).unwrap();
    assert_eq!(report.outcome, InstallOutcome::Updated);
}

#[test]
fn test_unrecoverable_filesystem_is_fatal() {
    let mut fx = fixture();
    fx.volumes
        .0
        .borrow_mut()
        .fsck
        .insert(fx.device.clone(), FsckStatus::Unrecoverable(8));
    let mut target = fx.target();

    let err = target.verify(&fx.artifact, &mut fx.workspace).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Device);
    let err = target.install(&fx.artifact, &mut fx.workspace).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Device);
    assert!(!fx.volumes.log().iter().any(|l| l.starts_with("mount")));

    // The self-test reports an unhealthy partition instead of failing
    assert!(!target.self_test(&mut fx.workspace).unwrap());
}

#[test]
fn test_prior_mount_is_forced_off() {
    let mut fx = fixture();
    fx.volumes
        .0
        .borrow_mut()
        .mounts
        .insert(PathBuf::from("/boot"), fx.device.clone());
    let mut target = fx.target();

    target.verify(&fx.artifact, &mut fx.workspace).unwrap();
    assert_eq!(fx.volumes.log()[0], "unmount force boot");
    assert!(fx.volumes.0.borrow().mounts.is_empty());
}

#[test]
fn test_unmount_failure_is_fatal() {
    let mut fx = fixture();
    fx.volumes
        .0
        .borrow_mut()
        .mounts
        .insert(PathBuf::from("/boot"), fx.device.clone());
    fx.volumes.0.borrow_mut().fail_unmount = true;
    let mut target = fx.target();

    let err = target.verify(&fx.artifact, &mut fx.workspace).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Device);
    assert!(target.self_test(&mut fx.workspace).is_err());
    fx.volumes.0.borrow_mut().fail_unmount = false;
}

#[test]
fn test_self_test() {
    let mut fx = fixture();
    let mut target = fx.target();

    // Stale checksum file from the fixture
    assert!(!target.self_test(&mut fx.workspace).unwrap());

    target.install(&fx.artifact, &mut fx.workspace).unwrap();
    assert!(target.self_test(&mut fx.workspace).unwrap());

    fs::write(fx.device.join("boot.img"), b"bit rot").unwrap();
    assert!(!target.self_test(&mut fx.workspace).unwrap());

    fx.volumes.0.borrow_mut().fail_mount = true;
    assert!(!target.self_test(&mut fx.workspace).unwrap());
    assert!(fx.mount_point_is_free());
}

#[test]
fn test_missing_device_is_fatal() {
    let mut fx = fixture();
    let mut target = BootPartitionTarget::new("boot2", fx.device.join("absent"), "checksums");
    let err = target.verify(&fx.artifact, &mut fx.workspace).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Device);
}

#[test]
fn test_workspace_release_leaves_device_intact() {
    let mut fx = fixture();
    let mut target = fx.target();
    target.install(&fx.artifact, &mut fx.workspace).unwrap();

    let root = fx.workspace.extract_dir().parent().unwrap().to_path_buf();
    let Fixture {
        _dir,
        device,
        workspace,
        ..
    } = fx;
    workspace.release().unwrap();
    assert!(!root.exists());
    assert_eq!(fs::read(device.join("boot.img")).unwrap(), IMAGE);
}
