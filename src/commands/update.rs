//! Update command implementation

use crate::cli::RunArgs;
use fwflash_core::{Config, Result, RunMode};

/// Install the package on every requested target
///
/// Targets that already hold the package content are left untouched.
pub fn run_update(config: &Config, args: &RunArgs) -> Result<bool> {
    println!("Updating {} from {}", args.targets, args.package.display());
    let success = super::execute(config, args, RunMode::Install)?;
    if success {
        println!("Update complete!");
    } else {
        println!("Update finished with failures!");
    }
    Ok(success)
}
