//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Configuration file read when `--config` is not given
pub const DEFAULT_CONFIG: &str = "/etc/fwflash.toml";

#[derive(Parser)]
#[command(name = "fwflash")]
#[command(author, version, about = "Multi-target firmware updater", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Device configuration file (TOML)
    /// Defaults to /etc/fwflash.toml, or built-in defaults if that is absent
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by verify and update
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Firmware package (.tar, .tar.gz or .tgz)
    #[arg(short, long)]
    pub package: PathBuf,

    /// Hardware model of this device
    #[arg(short, long)]
    pub model: Option<String>,

    /// Hardware generation of this device
    #[arg(short, long)]
    pub generation: Option<String>,

    /// Targets to process (comma-separated: boot1, boot2, flash1, flash2,
    /// io-boot, io-main, or the groups main, io, all)
    #[arg(short, long, default_value = "all")]
    pub targets: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare installed firmware against a package without writing
    Verify(RunArgs),

    /// Install a package, skipping targets that are already up to date
    Update(RunArgs),

    /// Show the sections of a package manifest
    Manifest {
        /// Firmware package (.tar, .tar.gz or .tgz)
        #[arg(short, long)]
        package: PathBuf,
    },
}
