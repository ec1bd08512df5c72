//! logwarden CLI - Back up, rotate, read and follow process log files

use anyhow::Result;
use clap::Parser;
use logwarden_core::{constants, LogFileConfig};
use logwarden_logs::Registry;
use std::path::Path;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod output;

use cli::{Cli, Commands};
use commands::*;

fn main() -> Result<()> {
    // Initialize logging based on verbosity
    let cli = Cli::parse();

    output::set_json_mode(cli.json);

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("logwarden={},logwarden_logs={}", log_level, log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| {
        let registry = Registry::new(config);
        match cli.command {
            Commands::Backup { file, once } => backup::execute(&registry, &file, once),
            Commands::Create { file } => create::execute(&registry, &file),
            Commands::Delete { file } => delete::execute(&registry, &file),
            Commands::Move { source, target } => move_cmd::execute(&registry, &source, &target),
            Commands::Cat(args) => cat::execute(&registry, args),
            Commands::Append { file, lines } => append::execute(&registry, &file, &lines),
            Commands::Watch(args) => watch::execute(&registry, args),
            Commands::Props(args) => props::execute(&registry, args),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Explicit `--config`, else the first config file in the logwarden home
/// directory, else defaults
fn load_config(path: Option<&Path>) -> Result<LogFileConfig> {
    if let Some(path) = path {
        return Ok(LogFileConfig::load(path)?);
    }

    let home = constants::logwarden_home();
    if !constants::CONFIG_FILES
        .iter()
        .any(|name| home.join(name).exists())
    {
        return Ok(LogFileConfig::default());
    }

    let (config, path) = LogFileConfig::find_and_load(&home)?;
    debug!("Loaded config from {}", path.display());
    Ok(config)
}
