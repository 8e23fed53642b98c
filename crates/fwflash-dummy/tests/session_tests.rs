//! Whole-session runs over two emulated flash devices

use fwflash_core::flash::FlashGeometry;
use fwflash_core::hash::HashAlgorithm;
use fwflash_core::volume::{FsckStatus, MountMode, VolumeOps};
use fwflash_core::{
    DeviceIdentity, ErrorCategory, Manifest, Outcome, Result, Session, SessionReport, TargetGroup,
    TargetId, Workspace,
};
use fwflash_dummy::{DummyConfig, DummyFlash, DummyTarget};
use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

struct NoVolumes;

impl VolumeOps for NoVolumes {
    fn mounts_of(&self, _device: &Path) -> io::Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
    fn is_mounted_at(&self, _mount_point: &Path) -> io::Result<bool> {
        Ok(false)
    }
    fn check(&mut self, _device: &Path) -> io::Result<FsckStatus> {
        Ok(FsckStatus::Clean)
    }
    fn mount(&mut self, _device: &Path, _mount_point: &Path, _mode: MountMode) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "no volumes"))
    }
    fn unmount(&mut self, _mount_point: &Path, _force: bool) -> io::Result<()> {
        Ok(())
    }
}

fn image(seed: u8, len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(31) ^ seed)
        .collect()
}

struct Rig {
    _dir: tempfile::TempDir,
    session: Session,
    manifest: Manifest,
    flash1: Rc<RefCell<DummyFlash>>,
    flash2: Rc<RefCell<DummyFlash>>,
}

impl Rig {
    fn install(&mut self) -> Result<SessionReport> {
        self.session
            .install(&self.manifest, &identity(), &FLASH)
            .cloned()
    }

    fn verify(&mut self) -> Result<SessionReport> {
        self.session
            .verify(&self.manifest, &identity(), &FLASH)
            .cloned()
    }
}

fn rig() -> Rig {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new_in(dir.path(), Box::new(NoVolumes)).unwrap();

    let mut sections = Vec::new();
    for (name, seed) in [("flash1", 0x11u8), ("flash2", 0x22u8)] {
        let data = image(seed, 10_000);
        std::fs::write(workspace.extract_dir().join(format!("{}.bin", name)), &data).unwrap();
        sections.push(format!(
            r#""{}": {{"Name": "{}.bin", "Hash": "{}"}}"#,
            name,
            name,
            HashAlgorithm::Md5.digest_bytes(&data)
        ));
    }
    let manifest = Manifest::from_json_str(&format!(
        r#"{{"Model": "ctrl-a", "Generation": ["3"], {}}}"#,
        sections.join(", ")
    ))
    .unwrap();

    let flash1 = Rc::new(RefCell::new(DummyFlash::new(DummyConfig::default())));
    let flash2 = Rc::new(RefCell::new(DummyFlash::new(DummyConfig::default())));
    let geometry = FlashGeometry::default();
    let mut session = Session::new(workspace);
    for (id, flash) in [(TargetId::Flash1, &flash1), (TargetId::Flash2, &flash2)] {
        let target = DummyTarget::new(id.name(), flash.clone(), geometry);
        session.register(id, id.name(), Box::new(target));
    }

    Rig {
        _dir: dir,
        session,
        manifest,
        flash1,
        flash2,
    }
}

fn identity() -> DeviceIdentity {
    DeviceIdentity::new(Some("ctrl-a"), Some("3")).unwrap()
}

const FLASH: [TargetId; 2] = [TargetId::Flash1, TargetId::Flash2];

#[test]
fn test_update_then_skip() {
    let mut rig = rig();

    let report = rig.install().unwrap();
    assert_eq!(report.order(), vec![TargetId::Flash2, TargetId::Flash1]);
    assert_eq!(
        report.summary(TargetGroup::Main).updated,
        vec![TargetId::Flash2, TargetId::Flash1]
    );
    assert!(report.records().iter().all(|r| r.bricking_window.is_some()));

    rig.flash1.borrow_mut().clear_ops();
    let report = rig.install().unwrap();
    assert_eq!(
        report.summary(TargetGroup::Main).skipped,
        vec![TargetId::Flash2, TargetId::Flash1]
    );
    assert!(rig.flash1.borrow().ops().is_empty());

    let report = rig.verify().unwrap();
    assert_eq!(report.summary(TargetGroup::Main).verified.len(), 2);
    assert!(report.success());
}

#[test]
fn test_power_cut_aborts_and_rerun_repairs() {
    let mut rig = rig();
    // Erase and body write go through; the header write is lost
    rig.flash2.borrow_mut().cut_power_after_writes(1);

    let err = rig.install().unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Device);
    // flash2 goes first; flash1 is never touched after the fault
    assert!(rig.session.report().records().is_empty());
    assert!(rig.flash1.borrow().ops().is_empty());

    rig.flash2.borrow_mut().restore_power();
    let report = rig.verify().unwrap();
    assert_eq!(
        report.outcome_of(TargetId::Flash2),
        Some(Outcome::VerifiedFailed)
    );
    assert_eq!(
        report.outcome_of(TargetId::Flash1),
        Some(Outcome::VerifiedFailed)
    );

    let report = rig.install().unwrap();
    assert_eq!(report.outcome_of(TargetId::Flash2), Some(Outcome::Updated));
    assert!(report.success());
}

#[test]
fn test_stuck_cell_is_reported_not_fatal() {
    let mut rig = rig();
    rig.flash2.borrow_mut().add_bad_cell(5000);

    let report = rig.install().unwrap();
    assert_eq!(report.outcome_of(TargetId::Flash2), Some(Outcome::Failed));
    assert_eq!(report.outcome_of(TargetId::Flash1), Some(Outcome::Updated));
    assert!(!report.success());
}

#[test]
fn test_write_protected_flash_aborts_run() {
    let mut rig = rig();
    rig.flash2.borrow_mut().set_write_protected(true);

    let err = rig.install().unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Device);
    assert!(rig.flash1.borrow().ops().is_empty());
}
