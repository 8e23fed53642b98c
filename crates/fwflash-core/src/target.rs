//! Target capability trait
//!
//! The session only ever talks to targets through [`Target`]. Each device
//! kind (boot partition, raw flash, IO controller section) lives in its own
//! backend crate and implements this trait.

use crate::error::Result;
use crate::manifest::ResolvedArtifact;
use crate::outcome::{InstallReport, VerifyOutcome};
use crate::workspace::Workspace;
use std::fmt;
use std::str::FromStr;

/// A physical update target
///
/// Implementations are stateless descriptors: everything mutable lives on
/// the device or in the shared [`Workspace`]. Any `Err` returned here is
/// treated as fatal for the whole run.
pub trait Target {
    /// Verify the target against `artifact` without modifying it
    fn verify(&mut self, artifact: &ResolvedArtifact, ws: &mut Workspace)
        -> Result<VerifyOutcome>;

    /// Bring the target up to date with `artifact`
    fn install(&mut self, artifact: &ResolvedArtifact, ws: &mut Workspace)
        -> Result<InstallReport>;

    /// Check that the target currently holds a self-consistent image
    ///
    /// This says nothing about whether it matches the package. Used to
    /// decide the order in which redundant copies are replaced.
    fn self_test(&mut self, _ws: &mut Workspace) -> Result<bool> {
        Ok(true)
    }
}

/// Which report bucket a target belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetGroup {
    /// Boot partitions and raw flash
    Main,
    /// IO controller sections
    Io,
}

/// The fixed set of targets on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TargetId {
    /// First boot partition
    Boot1,
    /// Second boot partition
    Boot2,
    /// First raw flash device
    Flash1,
    /// Second raw flash device
    Flash2,
    /// IO controller boot section
    IoBoot,
    /// IO controller main section
    IoMain,
}

impl TargetId {
    /// All targets, in declaration order
    pub const ALL: [TargetId; 6] = [
        Self::Boot1,
        Self::Boot2,
        Self::Flash1,
        Self::Flash2,
        Self::IoBoot,
        Self::IoMain,
    ];

    /// Name used on the command line and in reports
    pub fn name(self) -> &'static str {
        match self {
            Self::Boot1 => "boot1",
            Self::Boot2 => "boot2",
            Self::Flash1 => "flash1",
            Self::Flash2 => "flash2",
            Self::IoBoot => "io-boot",
            Self::IoMain => "io-main",
        }
    }

    /// Report bucket
    pub fn group(self) -> TargetGroup {
        match self {
            Self::IoBoot | Self::IoMain => TargetGroup::Io,
            _ => TargetGroup::Main,
        }
    }

    fn in_group(group: TargetGroup) -> impl Iterator<Item = TargetId> {
        Self::ALL.into_iter().filter(move |t| t.group() == group)
    }

    /// Parse a comma separated selection such as `boot1,flash2` or `main`
    ///
    /// `all`, `main` and `io` expand to their groups. The result is
    /// deduplicated and sorted in declaration order.
    pub fn parse_list(list: &str) -> std::result::Result<Vec<TargetId>, String> {
        let mut ids = Vec::new();
        for item in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match item {
                "all" => ids.extend(Self::ALL),
                "main" => ids.extend(Self::in_group(TargetGroup::Main)),
                "io" => ids.extend(Self::in_group(TargetGroup::Io)),
                other => ids.push(other.parse()?),
            }
        }
        if ids.is_empty() {
            return Err("no targets selected".to_string());
        }
        ids.sort();
        ids.dedup();
        Ok(ids)
    }
}

impl FromStr for TargetId {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| {
                format!(
                    "unknown target '{}' (expected one of: {}, all, main, io)",
                    s,
                    Self::ALL.map(TargetId::name).join(", ")
                )
            })
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        assert_eq!(
            TargetId::parse_list("flash2, boot1").unwrap(),
            vec![TargetId::Boot1, TargetId::Flash2]
        );
        assert_eq!(
            TargetId::parse_list("io").unwrap(),
            vec![TargetId::IoBoot, TargetId::IoMain]
        );
        assert_eq!(TargetId::parse_list("all,boot1").unwrap().len(), 6);
        assert_eq!(TargetId::parse_list("main").unwrap().len(), 4);
        assert!(TargetId::parse_list("flash3").is_err());
        assert!(TargetId::parse_list(" , ").is_err());
    }

    #[test]
    fn test_name_round_trip() {
        for id in TargetId::ALL {
            assert_eq!(id.name().parse::<TargetId>().unwrap(), id);
        }
    }
}
