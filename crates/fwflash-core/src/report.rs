//! Per-run result aggregation

use crate::outcome::Outcome;
use crate::target::{TargetGroup, TargetId};
use std::time::Duration;

/// What kind of run produced a report
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Read-only verification
    Verify,
    /// Installation
    Install,
}

/// One recorded target result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetRecord {
    /// Which target
    pub target: TargetId,
    /// What happened
    pub outcome: Outcome,
    /// Time spent without a self-consistent image, for installs that wrote
    pub bricking_window: Option<Duration>,
}

/// Targets of one group sorted by outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buckets {
    /// Verified OK (verify runs)
    pub verified: Vec<TargetId>,
    /// Written and verified (install runs)
    pub updated: Vec<TargetId>,
    /// Already up to date (install runs)
    pub skipped: Vec<TargetId>,
    /// Failed verification or installation
    pub failed: Vec<TargetId>,
}

impl Buckets {
    /// True if nothing was recorded in this group
    pub fn is_empty(&self) -> bool {
        self.verified.is_empty()
            && self.updated.is_empty()
            && self.skipped.is_empty()
            && self.failed.is_empty()
    }
}

/// Ordered, append-only record of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    mode: RunMode,
    records: Vec<TargetRecord>,
}

impl SessionReport {
    /// Empty report for a run of the given kind
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            records: Vec::new(),
        }
    }

    /// Kind of run
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    /// Append a record
    pub(crate) fn record(&mut self, record: TargetRecord) {
        match record.bricking_window {
            Some(window) => log::info!(
                "{}: {} (bricking window {} ms)",
                record.target,
                record.outcome,
                window.as_millis()
            ),
            None => log::info!("{}: {}", record.target, record.outcome),
        }
        self.records.push(record);
    }

    /// Records in the order targets were processed
    pub fn records(&self) -> &[TargetRecord] {
        &self.records
    }

    /// Processing order of targets
    pub fn order(&self) -> Vec<TargetId> {
        self.records.iter().map(|r| r.target).collect()
    }

    /// Outcome recorded for `target`, if it was processed
    pub fn outcome_of(&self, target: TargetId) -> Option<Outcome> {
        self.records
            .iter()
            .find(|r| r.target == target)
            .map(|r| r.outcome)
    }

    /// True iff no recorded target failed
    pub fn success(&self) -> bool {
        !self.records.iter().any(|r| r.outcome.is_failure())
    }

    /// Bucketed outcomes for one group
    pub fn summary(&self, group: TargetGroup) -> Buckets {
        let mut buckets = Buckets::default();
        for record in self.records.iter().filter(|r| r.target.group() == group) {
            let bucket = match record.outcome {
                Outcome::VerifiedOk => &mut buckets.verified,
                Outcome::Updated => &mut buckets.updated,
                Outcome::SkippedUpToDate => &mut buckets.skipped,
                Outcome::VerifiedFailed | Outcome::Failed => &mut buckets.failed,
            };
            bucket.push(record.target);
        }
        buckets
    }
}
