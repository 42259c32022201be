//! `text2sql config` - inspect configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use text2sql_core::AppConfig;

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration (file + environment, API key masked)
    Show,
    /// Show config file path
    Path,
}

pub fn run_config(args: ConfigArgs) -> Result<()> {
    match args.command {
        ConfigCommands::Show => {
            let config = AppConfig::load().context("Failed to load configuration")?;
            print!("{}", config.to_redacted_toml());
        }
        ConfigCommands::Path => {
            let path = AppConfig::config_path();
            let note = if path.exists() { "" } else { " (not created)" };
            println!("{}{}", path.display(), note);
        }
    }
    Ok(())
}
