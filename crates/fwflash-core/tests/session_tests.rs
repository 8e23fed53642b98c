//! Orchestration tests using scripted targets

use fwflash_core::error::Error;
use fwflash_core::hash::HashAlgorithm;
use fwflash_core::volume::{FsckStatus, MountMode, VolumeOps};
use fwflash_core::{
    DeviceIdentity, InstallOutcome, InstallReport, Manifest, ManifestError, Outcome,
    ResolvedArtifact, Session, Target, TargetGroup, TargetId, VerifyOutcome, Workspace,
};
use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

type CallLog = Rc<RefCell<Vec<String>>>;

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
        Ok(())
    }
    fn unmount(&mut self, _mount_point: &Path, _force: bool) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Script {
    Ok(VerifyOutcome, InstallOutcome),
    DeviceFault,
}

struct ScriptedTarget {
    name: &'static str,
    log: CallLog,
    script: Script,
    healthy: bool,
}

impl ScriptedTarget {
    fn boxed(name: &'static str, log: &CallLog, script: Script) -> Box<dyn Target> {
        Box::new(Self {
            name,
            log: log.clone(),
            script,
            healthy: true,
        })
    }

    fn unhealthy(name: &'static str, log: &CallLog) -> Box<dyn Target> {
        Box::new(Self {
            name,
            log: log.clone(),
            script: Script::Ok(VerifyOutcome::Mismatch, InstallOutcome::Updated),
            healthy: false,
        })
    }
}

impl Target for ScriptedTarget {
    fn verify(
        &mut self,
        _artifact: &ResolvedArtifact,
        _ws: &mut Workspace,
    ) -> fwflash_core::Result<VerifyOutcome> {
        self.log.borrow_mut().push(format!("verify:{}", self.name));
        match self.script {
            Script::Ok(v, _) => Ok(v),
            Script::DeviceFault => Err(Error::device(self.name, "device vanished")),
        }
    }

    fn install(
        &mut self,
        _artifact: &ResolvedArtifact,
        _ws: &mut Workspace,
    ) -> fwflash_core::Result<InstallReport> {
        self.log.borrow_mut().push(format!("install:{}", self.name));
        match self.script {
            Script::Ok(_, i) => Ok(i.into()),
            Script::DeviceFault => Err(Error::device(self.name, "device vanished")),
        }
    }

    fn self_test(&mut self, _ws: &mut Workspace) -> fwflash_core::Result<bool> {
        self.log
            .borrow_mut()
            .push(format!("self_test:{}", self.name));
        Ok(self.healthy)
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    session: Session,
    manifest: Manifest,
    log: CallLog,
}

const SECTIONS: [(&str, &str); 5] = [
    ("boot", "image.ub"),
    ("flash1", "spl1.bin"),
    ("flash2", "spl2.bin"),
    ("io_boot", "ioc-boot.bin"),
    ("io_main", "ioc-main.bin"),
];

fn section_of(id: TargetId) -> &'static str {
    match id {
        TargetId::Boot1 | TargetId::Boot2 => "boot",
        TargetId::Flash1 => "flash1",
        TargetId::Flash2 => "flash2",
        TargetId::IoBoot => "io_boot",
        TargetId::IoMain => "io_main",
    }
}

fn fixture(corrupt: Option<&str>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new_in(dir.path(), Box::new(NoVolumes)).unwrap();

    let mut json = String::from(r#"{"Model": "ctrl-a", "Generation": [3, 4]"#);
    for (section, file) in SECTIONS {
        let content = format!("{} image content", section);
        std::fs::write(workspace.extract_dir().join(file), &content).unwrap();
        let mut hash = HashAlgorithm::Md5.digest_bytes(content.as_bytes());
        if corrupt == Some(section) {
            hash = HashAlgorithm::Md5.digest_bytes(b"something else");
        }
        json.push_str(&format!(
            r#", "{}": {{"Name": "{}", "Hash": "{}"}}"#,
            section, file, hash
        ));
    }
    json.push('}');

    Fixture {
        _dir: dir,
        session: Session::new(workspace),
        manifest: Manifest::from_json_str(&json).unwrap(),
        log: Rc::new(RefCell::new(Vec::new())),
    }
}

fn identity() -> DeviceIdentity {
    DeviceIdentity::new(Some("ctrl-a"), Some("3")).unwrap()
}

fn register_all(f: &mut Fixture, script: Script) {
    let names = ["boot1", "boot2", "flash1", "flash2", "io-boot", "io-main"];
    for (id, name) in TargetId::ALL.into_iter().zip(names) {
        let target = ScriptedTarget::boxed(name, &f.log, script);
        f.session.register(id, section_of(id), target);
    }
}

fn calls(log: &CallLog) -> Vec<String> {
    log.borrow().clone()
}

const ALL_OK: Script = Script::Ok(VerifyOutcome::Match, InstallOutcome::Updated);

#[test]
fn test_healthy_boot1_is_installed_last() {
    let mut f = fixture(None);
    register_all(&mut f, ALL_OK);

    let report = f
        .session
        .install(&f.manifest, &identity(), &TargetId::ALL)
        .unwrap();

    assert_eq!(
        report.order(),
        vec![
            TargetId::Boot2,
            TargetId::Boot1,
            TargetId::Flash2,
            TargetId::Flash1,
            TargetId::IoBoot,
            TargetId::IoMain,
        ]
    );
    assert!(report.success());
    assert_eq!(calls(&f.log)[0], "self_test:boot1");
}

#[test]
fn test_unhealthy_boot1_is_installed_first() {
    let mut f = fixture(None);
    register_all(&mut f, ALL_OK);
    let target = ScriptedTarget::unhealthy("boot1", &f.log);
    f.session.register(TargetId::Boot1, "boot", target);

    let boot = [TargetId::Boot2, TargetId::Boot1];
    let report = f.session.install(&f.manifest, &identity(), &boot).unwrap();

    assert_eq!(report.order(), vec![TargetId::Boot1, TargetId::Boot2]);
    assert_eq!(
        calls(&f.log),
        vec!["self_test:boot1", "install:boot1", "install:boot2"]
    );
}

#[test]
fn test_single_boot_partition_skips_self_test() {
    let mut f = fixture(None);
    register_all(&mut f, ALL_OK);

    f.session
        .install(&f.manifest, &identity(), &[TargetId::Boot1])
        .unwrap();

    assert_eq!(calls(&f.log), vec!["install:boot1"]);
}

#[test]
fn test_device_error_aborts_remaining_targets() {
    let mut f = fixture(None);
    register_all(&mut f, ALL_OK);
    f.session.register(
        TargetId::Flash2,
        "flash2",
        ScriptedTarget::boxed("flash2", &f.log, Script::DeviceFault),
    );

    let err = f
        .session
        .install(&f.manifest, &identity(), &TargetId::ALL)
        .unwrap_err();
    assert!(matches!(err, Error::Device { .. }));

    let log = calls(&f.log);
    assert_eq!(log.last().map(String::as_str), Some("install:flash2"));
    assert!(!log.contains(&"install:flash1".to_string()));
    assert!(!log.iter().any(|c| c.starts_with("install:io")));

    // Work done before the fault stays in the report
    assert_eq!(
        f.session.report().order(),
        vec![TargetId::Boot2, TargetId::Boot1]
    );
}

#[test]
fn test_verify_mismatch_does_not_stop_other_targets() {
    let mut f = fixture(None);
    register_all(&mut f, ALL_OK);
    f.session.register(
        TargetId::Boot2,
        "boot",
        ScriptedTarget::boxed(
            "boot2",
            &f.log,
            Script::Ok(VerifyOutcome::Mismatch, InstallOutcome::Updated),
        ),
    );

    let report = f
        .session
        .verify(&f.manifest, &identity(), &TargetId::ALL)
        .unwrap();

    assert_eq!(report.records().len(), 6);
    assert_eq!(
        report.outcome_of(TargetId::Boot2),
        Some(Outcome::VerifiedFailed)
    );
    assert_eq!(
        report.outcome_of(TargetId::Flash1),
        Some(Outcome::VerifiedOk)
    );
    assert!(!report.success());
    assert_eq!(
        report.summary(TargetGroup::Main).failed,
        vec![TargetId::Boot2]
    );
    assert_eq!(report.summary(TargetGroup::Io).verified.len(), 2);
    // Verification never installs
    assert!(!calls(&f.log).iter().any(|c| c.starts_with("install")));
}

#[test]
fn test_install_outcomes_are_bucketed() {
    let mut f = fixture(None);
    register_all(&mut f, ALL_OK);
    f.session.register(
        TargetId::IoMain,
        "io_main",
        ScriptedTarget::boxed(
            "io-main",
            &f.log,
            Script::Ok(VerifyOutcome::Match, InstallOutcome::SkippedUpToDate),
        ),
    );
    f.session.register(
        TargetId::IoBoot,
        "io_boot",
        ScriptedTarget::boxed(
            "io-boot",
            &f.log,
            Script::Ok(VerifyOutcome::Match, InstallOutcome::Failed),
        ),
    );

    let report = f
        .session
        .install(&f.manifest, &identity(), &TargetId::ALL)
        .unwrap();

    let io = report.summary(TargetGroup::Io);
    assert_eq!(io.skipped, vec![TargetId::IoMain]);
    assert_eq!(io.failed, vec![TargetId::IoBoot]);
    assert_eq!(report.summary(TargetGroup::Main).updated.len(), 4);
    assert!(!report.success());
}

#[test]
fn test_model_mismatch_rejected_before_resolution() {
    let mut f = fixture(None);
    register_all(&mut f, ALL_OK);
    // Every section missing: a resolution attempt would fail differently
    let manifest = Manifest::from_json_str(r#"{"Model": "ctrl-b", "Generation": [3]}"#).unwrap();

    let err = f
        .session
        .install(&manifest, &identity(), &TargetId::ALL)
        .unwrap_err();
    assert!(matches!(err, Error::Manifest(ManifestError::ModelMismatch { .. })));
    assert!(calls(&f.log).is_empty());
}

#[test]
fn test_corrupt_image_stops_before_device_work() {
    let mut f = fixture(Some("io_main"));
    register_all(&mut f, ALL_OK);

    let err = f
        .session
        .install(&f.manifest, &identity(), &TargetId::ALL)
        .unwrap_err();
    assert!(matches!(err, Error::HashMismatch { ref section, .. } if section == "io_main"));
    assert!(calls(&f.log).is_empty());
    assert!(f.session.report().records().is_empty());
}

#[test]
fn test_unconfigured_target_is_config_error() {
    let mut f = fixture(None);
    let err = f
        .session
        .verify(&f.manifest, &identity(), &[TargetId::Flash1])
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_missing_identity_is_config_error() {
    assert!(matches!(DeviceIdentity::new(None, Some("3")), Err(Error::Config(_))));
    assert!(matches!(
        DeviceIdentity::new(Some("ctrl-a"), Some("  ")),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_identity_is_not_trimmed() {
    for (model, generation) in [(" ctrl-a", "3"), ("ctrl-a", "3\n"), ("ctrl-a\t", "3")] {
        let err = DeviceIdentity::new(Some(model), Some(generation)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
    let identity = DeviceIdentity::new(Some("ctrl a"), Some("3")).unwrap();
    assert_eq!(identity.model(), "ctrl a");
}

#[test]
fn test_finish_removes_workspace() {
    let f = fixture(None);
    let extract_dir = f.session.workspace().extract_dir().to_path_buf();
    let root = extract_dir.parent().unwrap();
    assert!(root.exists());
    f.session.finish().unwrap();
    assert!(!root.exists());
}
