use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use querybridge_core::{mask_dsn, QuerybridgeConfig};

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show config file path
    Path,
    /// Print the effective config (credentials masked)
    Show,
    /// Write a config file with default values
    Init(InitArgs),
}

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Force overwrite existing config
    #[arg(long, short)]
    pub force: bool,
}

pub fn run_config(args: ConfigArgs, path: &Path) -> Result<()> {
    match args.command {
        ConfigCommands::Path => {
            println!("{}", path.display());
            Ok(())
        }
        ConfigCommands::Show => run_show(path),
        ConfigCommands::Init(args) => run_init(args, path),
    }
}

fn run_show(path: &Path) -> Result<()> {
    let mut config = QuerybridgeConfig::load_from(path)?;
    config.database.url = mask_dsn(&config.database.url);

    let rendered = config.to_toml().context("Failed to render config")?;
    print!("{rendered}");
    Ok(())
}

fn run_init(args: InitArgs, path: &Path) -> Result<()> {
    // Check if config already exists
    if path.exists() && !args.force {
        return Err(anyhow::anyhow!(
            "Config already exists at {}\n\nUse --force to overwrite",
            path.display()
        ));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = QuerybridgeConfig::default()
        .to_toml()
        .context("Failed to render default config")?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    println!("Created config at: {}", path.display());
    Ok(())
}
