//! Manifest command implementation

use crate::package;
use fwflash_bootpart::LinuxVolumes;
use fwflash_core::{Config, Result, TargetId, Workspace};
use std::path::Path;

/// Show a package's compatibility and sections
pub fn run_show(config: &Config, package: &Path) -> Result<()> {
    let workspace = Workspace::new(Box::new(LinuxVolumes::from_config(&config.boot)))?;
    let manifest = package::open(package, workspace.extract_dir())?;

    println!("Package:     {}", package.display());
    println!("Model:       {}", manifest.model);
    println!("Generations: {}", manifest.generations.join(", "));
    println!();
    println!("Sections:");
    for name in manifest.section_names() {
        let used_by: Vec<&str> = TargetId::ALL
            .into_iter()
            .filter(|id| config.section_for(*id) == name)
            .map(TargetId::name)
            .collect();
        let used_by = if used_by.is_empty() {
            "unused".to_string()
        } else {
            used_by.join(", ")
        };

        match manifest.resolve(name, workspace.extract_dir()) {
            Ok(artifact) => println!(
                "  {:<12} {:<24} {} [{}]",
                name,
                artifact.file_name(),
                artifact.hash(),
                used_by
            ),
            Err(e) => println!("  {:<12} ({}) [{}]", name, e, used_by),
        }
    }

    workspace.release()
}
