//! CSV to JSON conversion command

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use querybridge_core::{import_csv, import_csv_json};

/// Arguments for the import-csv command
#[derive(Parser, Debug)]
pub struct ImportCsvArgs {
    /// CSV file with a header row (omit or use `-` for stdin)
    pub input: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pub pretty: bool,
}

/// Convert CSV rows to a JSON array of header-keyed objects on stdout
pub fn run_import_csv(args: ImportCsvArgs) -> Result<()> {
    let reader: Box<dyn Read> = match &args.input {
        Some(path) if path.as_os_str() != "-" => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?,
        )),
        _ => Box::new(io::stdin().lock()),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.pretty {
        let records = import_csv(reader).context("Failed to read CSV")?;
        serde_json::to_writer_pretty(&mut out, &records)?;
    } else {
        let json = import_csv_json(reader).context("Failed to read CSV")?;
        out.write_all(&json)?;
    }
    writeln!(out)?;

    Ok(())
}
