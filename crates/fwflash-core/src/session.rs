//! Session orchestrator
//!
//! A session owns the [`Workspace`] and a registry of targets. A run goes
//! through three stages:
//!
//! 1. compatibility check of the manifest against the device identity
//! 2. resolution and hash check of every section the run needs
//! 3. per-target verify or install, in a fixed order
//!
//! Stages 1 and 2 touch no device. Any `Err` aborts the run at once; the
//! report keeps whatever was recorded up to that point.

use crate::error::{Error, Result};
use crate::hash;
use crate::manifest::{Manifest, ResolvedArtifact};
use crate::outcome::Outcome;
use crate::report::{RunMode, SessionReport, TargetRecord};
use crate::target::{Target, TargetId};
use crate::workspace::Workspace;
use std::collections::BTreeMap;

/// Model and generation of the device being updated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    model: String,
    generation: String,
}

impl DeviceIdentity {
    /// Build an identity, rejecting missing or blank values
    ///
    /// Values are matched against the manifest verbatim, so surrounding
    /// whitespace is rejected rather than stripped.
    pub fn new(model: Option<&str>, generation: Option<&str>) -> Result<Self> {
        let model = required("model", model)?;
        let generation = required("generation", generation)?;
        Ok(Self { model, generation })
    }

    /// Hardware model
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Hardware generation
    pub fn generation(&self) -> &str {
        &self.generation
    }
}

fn required(what: &str, value: Option<&str>) -> Result<String> {
    let value = value.unwrap_or_default();
    if value.trim().is_empty() {
        return Err(Error::Config(format!("device {} is required", what)));
    }
    if value.trim() != value {
        return Err(Error::Config(format!(
            "device {} '{}' has leading or trailing whitespace",
            what, value
        )));
    }
    Ok(value.to_string())
}

/// Order in which targets are installed
///
/// The boot partition that is currently good is always replaced last. If
/// boot partition 1 is known bad it is repaired first, while partition 2
/// is still untouched; otherwise partition 2 goes first and partition 1,
/// the good copy, last. Only targets in `requested` are returned.
pub fn install_order(requested: &[TargetId], boot1_healthy: bool) -> Vec<TargetId> {
    let mut order = Vec::with_capacity(TargetId::ALL.len());
    if !boot1_healthy {
        order.push(TargetId::Boot1);
    }
    order.push(TargetId::Boot2);
    if boot1_healthy {
        order.push(TargetId::Boot1);
    }
    order.extend([
        TargetId::Flash2,
        TargetId::Flash1,
        TargetId::IoBoot,
        TargetId::IoMain,
    ]);
    order.retain(|id| requested.contains(id));
    order
}

struct Registered {
    section: String,
    target: Box<dyn Target>,
}

/// One update or verify run over a set of registered targets
pub struct Session {
    workspace: Workspace,
    targets: BTreeMap<TargetId, Registered>,
    report: SessionReport,
}

impl Session {
    /// Create a session owning `workspace`
    pub fn new(workspace: Workspace) -> Self {
        Self {
            workspace,
            targets: BTreeMap::new(),
            report: SessionReport::new(RunMode::Verify),
        }
    }

    /// Register the implementation for `id`, fed from manifest `section`
    pub fn register(&mut self, id: TargetId, section: impl Into<String>, target: Box<dyn Target>) {
        self.targets.insert(
            id,
            Registered {
                section: section.into(),
                target,
            },
        );
    }

    /// The session workspace
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Report of the most recent run, complete or aborted
    pub fn report(&self) -> &SessionReport {
        &self.report
    }

    /// Verify each requested target once
    pub fn verify(
        &mut self,
        manifest: &Manifest,
        identity: &DeviceIdentity,
        requested: &[TargetId],
    ) -> Result<&SessionReport> {
        let requested = normalize(requested);
        self.report = SessionReport::new(RunMode::Verify);
        let artifacts = self.prepare(manifest, identity, &requested)?;

        for id in requested {
            let (target, artifact) = lookup(&mut self.targets, id, &artifacts)?;
            log::info!("Verifying {} against {}", id, artifact.file_name());
            let outcome = target.verify(artifact, &mut self.workspace)?;
            self.report.record(TargetRecord {
                target: id,
                outcome: Outcome::from(outcome),
                bricking_window: None,
            });
        }

        Ok(&self.report)
    }

    /// Install each requested target, boot partitions in safe order
    pub fn install(
        &mut self,
        manifest: &Manifest,
        identity: &DeviceIdentity,
        requested: &[TargetId],
    ) -> Result<&SessionReport> {
        let requested = normalize(requested);
        self.report = SessionReport::new(RunMode::Install);
        let artifacts = self.prepare(manifest, identity, &requested)?;

        let both_boot = [TargetId::Boot1, TargetId::Boot2]
            .iter()
            .all(|id| requested.contains(id));
        let boot1_healthy = if both_boot {
            let (target, _) = lookup(&mut self.targets, TargetId::Boot1, &artifacts)?;
            let healthy = target.self_test(&mut self.workspace)?;
            if healthy {
                log::info!(
                    "{} passed its self-test; it will be updated last",
                    TargetId::Boot1
                );
            } else {
                log::warn!(
                    "{} failed its self-test; repairing it first",
                    TargetId::Boot1
                );
            }
            healthy
        } else {
            true
        };

        for id in install_order(&requested, boot1_healthy) {
            let (target, artifact) = lookup(&mut self.targets, id, &artifacts)?;
            log::info!("Installing {} from {}", id, artifact.file_name());
            let installed = target.install(artifact, &mut self.workspace)?;
            self.report.record(TargetRecord {
                target: id,
                outcome: Outcome::from(installed.outcome),
                bricking_window: installed.bricking_window,
            });
        }

        Ok(&self.report)
    }

    /// Release the workspace, reporting cleanup failures
    pub fn finish(self) -> Result<()> {
        self.workspace.release()
    }

    /// Compatibility check, section resolution and hash check
    fn prepare(
        &self,
        manifest: &Manifest,
        identity: &DeviceIdentity,
        requested: &[TargetId],
    ) -> Result<BTreeMap<TargetId, ResolvedArtifact>> {
        for id in requested {
            if !self.targets.contains_key(id) {
                return Err(Error::Config(format!("target {} is not configured", id)));
            }
        }

        manifest.validate(identity.model(), identity.generation())?;

        let mut by_section: BTreeMap<&str, ResolvedArtifact> = BTreeMap::new();
        let mut artifacts = BTreeMap::new();
        for id in requested {
            let section = self.targets[id].section.as_str();
            let artifact = match by_section.get(section) {
                Some(artifact) => artifact.clone(),
                None => {
                    let artifact = manifest.resolve(section, self.workspace.extract_dir())?;
                    hash::verify(&artifact)?;
                    by_section.insert(section, artifact.clone());
                    artifact
                }
            };
            artifacts.insert(*id, artifact);
        }

        log::info!(
            "Package verified: {} section(s) for {} target(s)",
            by_section.len(),
            artifacts.len()
        );
        Ok(artifacts)
    }
}

fn lookup<'a>(
    targets: &'a mut BTreeMap<TargetId, Registered>,
    id: TargetId,
    artifacts: &'a BTreeMap<TargetId, ResolvedArtifact>,
) -> Result<(&'a mut dyn Target, &'a ResolvedArtifact)> {
    let registered = targets
        .get_mut(&id)
        .ok_or_else(|| Error::Config(format!("target {} is not configured", id)))?;
    let artifact = artifacts
        .get(&id)
        .ok_or_else(|| Error::Config(format!("no artifact resolved for {}", id)))?;
    Ok((registered.target.as_mut(), artifact))
}

fn normalize(requested: &[TargetId]) -> Vec<TargetId> {
    let mut ids = requested.to_vec();
    ids.sort();
    ids.dedup();
    ids
}
