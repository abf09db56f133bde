//! querybridge CLI
//!
//! - `serve`: HTTP API for users, transactions and sessions, plus ad-hoc
//!   queries against a caller-selected database
//! - `import-csv`: convert a CSV file to a JSON array of objects
//! - `config`: inspect or create ~/.querybridge/config.toml

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use querybridge_core::QuerybridgeConfig;

mod commands;
mod config;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "querybridge",
    author,
    version,
    about = "CRUD API over users, transactions and sessions with bring-your-own-database queries"
)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file (default: ~/.querybridge/config.toml)
    #[arg(long, global = true, env = "QUERYBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API server
    Serve(commands::serve::ServeArgs),
    /// Convert CSV (first row is the header) to JSON
    ImportCsv(commands::import_csv::ImportCsvArgs),
    /// Manage querybridge configuration (path, show, init)
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    tracing_setup::init(&tracing_setup::TracingConfig { debug: cli.debug }).ok();

    let config_path = cli.config.unwrap_or_else(QuerybridgeConfig::config_path);

    match cli.command {
        Commands::Serve(args) => {
            let config = QuerybridgeConfig::load_from(&config_path)?;
            commands::run_serve(args, &config).await?
        }
        Commands::ImportCsv(args) => commands::run_import_csv(args)?,
        Commands::Config(args) => config::run_config(args, &config_path)?,
    }
    Ok(())
}
