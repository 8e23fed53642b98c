//! CLI command implementations
//!
//! `verify` and `update` share the same setup: identity and target list
//! are checked first, then the package is extracted into a fresh
//! workspace and every configured target is registered with a
//! [`Session`]. Only the run itself differs.

pub mod manifest;
mod report;
pub mod update;
pub mod verify;

use crate::cli::RunArgs;
use crate::package;
use crate::signals::SignalGuard;
use fwflash_bootpart::{BootPartitionTarget, LinuxVolumes};
use fwflash_core::{
    Config, DeviceIdentity, Error, Manifest, Result, RunMode, Session, TargetId, Workspace,
};
use fwflash_ioctl::{IoControllerTarget, IoSection, IoTool};
use fwflash_linux_mtd::MtdTarget;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// A session ready to run
struct Prepared {
    session: Session,
    manifest: Manifest,
    identity: DeviceIdentity,
    targets: Vec<TargetId>,
}

/// Check the arguments, extract the package and register all targets
fn prepare(config: &Config, args: &RunArgs) -> Result<Prepared> {
    let identity = DeviceIdentity::new(args.model.as_deref(), args.generation.as_deref())?;
    let targets = TargetId::parse_list(&args.targets).map_err(Error::Config)?;
    if !args.package.is_file() {
        return Err(Error::Config(format!("package not found: {}", args.package.display())));
    }

    let workspace = Workspace::new(Box::new(LinuxVolumes::from_config(&config.boot)))?;
    let manifest = package::open(&args.package, workspace.extract_dir())?;
    log::info!(
        "Package for model '{}', generation(s) {}",
        manifest.model,
        manifest.generations.join(", ")
    );

    Ok(Prepared {
        session: build_session(config, workspace),
        manifest,
        identity,
        targets,
    })
}

/// Register one target per configured device
fn build_session(config: &Config, workspace: Workspace) -> Session {
    let mut session = Session::new(workspace);

    for (id, device) in [TargetId::Boot1, TargetId::Boot2]
        .into_iter()
        .zip(&config.boot.partitions)
    {
        let target = BootPartitionTarget::new(id.name(), device, &config.boot.checksum_file);
        session.register(id, config.section_for(id), Box::new(target));
    }

    let geometry = config.flash.geometry();
    for (id, device) in [TargetId::Flash1, TargetId::Flash2]
        .into_iter()
        .zip(&config.flash.devices)
    {
        let target = MtdTarget::new(id.name(), device, geometry);
        session.register(id, config.section_for(id), Box::new(target));
    }

    let io = &config.io_controller;
    let tool = IoTool::new(&io.tool);
    for (id, section) in [
        (TargetId::IoBoot, IoSection::Boot),
        (TargetId::IoMain, IoSection::Main),
    ] {
        let target = IoControllerTarget::new(id.name(), tool.clone(), &io.device, section);
        session.register(id, config.section_for(id), Box::new(target));
    }

    session
}

fn create_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Run the session, print the report and release the workspace
///
/// Returns whether every target succeeded. A fatal error still prints
/// the partial report and releases the workspace before it is returned.
fn execute(config: &Config, args: &RunArgs, mode: RunMode) -> Result<bool> {
    execute_with(config, args, mode, prepare)
}

/// Termination signals stay blocked from before the workspace is created
/// until after it is released.
fn execute_with<F>(config: &Config, args: &RunArgs, mode: RunMode, prepare: F) -> Result<bool>
where
    F: FnOnce(&Config, &RunArgs) -> Result<Prepared>,
{
    let _signals = SignalGuard::block().map_err(|e| Error::device("session", e))?;
    let Prepared {
        mut session,
        manifest,
        identity,
        targets,
    } = prepare(config, args)?;

    let pb = ProgressBar::new_spinner();
    pb.set_style(create_spinner_style());
    pb.enable_steady_tick(Duration::from_millis(100));
    let verb = match mode {
        RunMode::Verify => "Verifying",
        RunMode::Install => "Updating",
    };
    pb.set_message(format!("{} {} target(s)...", verb, targets.len()));

    let result = match mode {
        RunMode::Verify => session.verify(&manifest, &identity, &targets).map(|_| ()),
        RunMode::Install => session.install(&manifest, &identity, &targets).map(|_| ()),
    };
    pb.finish_and_clear();

    report::print_report(session.report());
    let success = session.report().success();

    match (result, session.finish()) {
        (Err(e), cleanup) => {
            if let Err(cleanup) = cleanup {
                log::warn!("{}", cleanup);
            }
            Err(e)
        }
        (Ok(()), Err(e)) => Err(e),
        (Ok(()), Ok(())) => Ok(success),
    }
}
