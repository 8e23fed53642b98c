//! fwflash - Multi-target firmware updater
//!
//! Installs or verifies a firmware package on a device with several
//! firmware targets: two redundant boot partitions, two raw flash
//! devices and an IO controller.
//!
//! # Exit status
//!
//! - 0: every requested target verified or installed
//! - 1: at least one target failed verification or installation
//! - 2: configuration error (bad arguments, config file)
//! - 3: manifest error (incompatible package, bad manifest, corrupt image)
//! - 4: device error (run aborted)

mod cli;
mod commands;
mod package;
mod signals;

use clap::Parser;
use cli::{Cli, Commands, DEFAULT_CONFIG};
use fwflash_core::{Config, Result};
use std::path::Path;

fn main() {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    let code = match run(&cli) {
        Ok(true) => 0,
        Ok(false) => 1,
        Err(e) => {
            eprintln!("Error: {}", e);
            let mut source = std::error::Error::source(&e);
            while let Some(cause) = source {
                eprintln!("  caused by: {}", cause);
                source = cause.source();
            }
            e.category().exit_code()
        }
    };
    std::process::exit(code);
}

/// Run the selected command; `Ok(false)` means some target failed
fn run(cli: &Cli) -> Result<bool> {
    match &cli.command {
        Commands::Verify(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::verify::run_verify(&config, args)
        }
        Commands::Update(args) => {
            let config = load_config(cli.config.as_deref())?;
            commands::update::run_update(&config, args)
        }
        Commands::Manifest { package } => {
            let config = load_config(cli.config.as_deref())?;
            commands::manifest::run_show(&config, package)?;
            Ok(true)
        }
    }
}

/// Load the configuration from the given path or the default location
fn load_config(path: Option<&Path>) -> Result<Config> {
    if let Some(path) = path {
        let config = Config::from_toml_file(path)?;
        log::debug!("Loaded configuration from {}", path.display());
        return Ok(config);
    }

    let default = Path::new(DEFAULT_CONFIG);
    if default.is_file() {
        let config = Config::from_toml_file(default)?;
        log::debug!("Loaded configuration from {}", default.display());
        Ok(config)
    } else {
        log::debug!("No {} found, using built-in defaults", DEFAULT_CONFIG);
        Ok(Config::default())
    }
}
