//! Config command - configuration management

use anyhow::{Context, Result, bail};
use std::path::PathBuf;

use crate::args::{ConfigArgs, ConfigCommands};
use crate::config::AppConfig;

pub async fn execute(args: ConfigArgs, config_path: Option<PathBuf>) -> Result<()> {
    match args.command {
        ConfigCommands::Init { path, force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            std::fs::write(&path, AppConfig::example_toml())
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Wrote example configuration to {}", path.display());
            Ok(())
        }
        ConfigCommands::Show => {
            let config = AppConfig::load(config_path.as_deref())?;
            let rendered =
                toml::to_string_pretty(&config).context("Failed to render configuration")?;
            println!("{rendered}");
            Ok(())
        }
    }
}
