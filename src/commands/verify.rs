//! Verify command implementation

use crate::cli::RunArgs;
use fwflash_core::{Config, Result, RunMode};

/// Compare every requested target against the package
pub fn run_verify(config: &Config, args: &RunArgs) -> Result<bool> {
    println!(
        "Verifying {} against {}",
        args.targets,
        args.package.display()
    );
    let success = super::execute(config, args, RunMode::Verify)?;
    if success {
        println!("Verification passed!");
    } else {
        println!("Verification failed!");
    }
    Ok(success)
}
