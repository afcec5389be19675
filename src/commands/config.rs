use anyhow::{Context, Result};
use clap::Subcommand;
use std::path::PathBuf;

use crate::commands::utils;
use crate::config::Config;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Write the default configuration file
    Init,
}

pub fn handle_config(
    command: ConfigCommands,
    config: &Config,
    path: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommands::Show => utils::print_json(config),
        ConfigCommands::Init => {
            let path = match path {
                Some(p) => p,
                None => Config::default_path()?,
            };
            Config::default()
                .write_new(&path)
                .context("Failed to initialise config")?;
            println!("Config written to {}", path.display());
            Ok(())
        }
    }
}
