use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::parsers::FileFormat;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Infer table plans from tabular files and import them into relational stores",
    long_about = None
)]
pub struct Cli {
    /// YAML configuration with import defaults and tenant connections
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Detect a file's structure and infer its column plan
    Probe(ProbeArgs),
    /// Match a file's columns against an existing table or a saved plan
    Map(MapArgs),
    /// Import a file into a table, creating it when requested
    Import(ImportArgs),
}

/// How to locate and decode the input file.
#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input file (CSV, Excel, JSON, TXT or TSV)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Force the input format instead of detecting it (csv, excel, json, text)
    #[arg(long, value_parser = parse_format)]
    pub format: Option<FileFormat>,
    /// Mime type reported for the upload, used when the extension is unknown
    #[arg(long)]
    pub mime: Option<String>,
    /// Character encoding of text input (sniffed when omitted)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// Field delimiter for delimited text (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Number of rows to sample when inferring types (0 means full scan)
    #[arg(long)]
    pub sample_rows: Option<usize>,
    /// Reject inputs larger than this many bytes
    #[arg(long = "max-file-bytes")]
    pub max_file_bytes: Option<u64>,
}

#[derive(Debug, Args)]
pub struct ProbeArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Write the inferred plan to this YAML file
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct MapArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Destination table name
    #[arg(long)]
    pub table: String,
    /// Destination schema (defaults to the tenant's schema, then `public`)
    #[arg(long)]
    pub schema: Option<String>,
    /// Tenant whose database holds the destination table
    #[arg(long, conflicts_with = "target")]
    pub tenant: Option<String>,
    /// Saved plan YAML standing in for the destination table
    #[arg(long, required_unless_present = "tenant")]
    pub target: Option<PathBuf>,
    /// Print the mapping report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Destination table name
    #[arg(long)]
    pub table: String,
    /// Destination schema (defaults to the tenant's schema, then `public`)
    #[arg(long)]
    pub schema: Option<String>,
    /// Tenant whose database receives the rows
    #[arg(long, required_unless_present = "dry_run")]
    pub tenant: Option<String>,
    /// Create the table from the inferred plan when it does not exist
    #[arg(long = "create-table")]
    pub create_table: bool,
    /// Empty the table before inserting
    #[arg(long)]
    pub truncate: bool,
    /// Record failing rows and keep going instead of aborting
    #[arg(long = "skip-row-errors")]
    pub skip_row_errors: bool,
    /// Rows per batch (1 to 10000)
    #[arg(long = "batch-size", allow_hyphen_values = true)]
    pub batch_size: Option<i64>,
    /// Match columns to the existing table by name, alias and similarity
    #[arg(long = "map-columns")]
    pub map_columns: bool,
    /// Use a reviewed plan YAML instead of inferring one
    #[arg(long)]
    pub plan: Option<PathBuf>,
    /// Maximum number of row errors included in the result
    #[arg(long = "error-preview-limit")]
    pub error_preview_limit: Option<usize>,
    /// Delete the input file once the import finishes, whatever the outcome
    #[arg(long = "remove-source")]
    pub remove_source: bool,
    /// Run against an in-memory store; the table is always created
    #[arg(long = "dry-run")]
    pub dry_run: bool,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

fn parse_format(value: &str) -> Result<FileFormat, String> {
    value.parse::<FileFormat>().map_err(|err| err.to_string())
}
