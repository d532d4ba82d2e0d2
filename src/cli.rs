use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about = "Validate uploaded report files against a schema catalog", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the selectable report types and their aliases
    Catalog(CatalogArgs),
    /// Ingest a file and show its sniffed properties and content head
    Preview(PreviewArgs),
    /// Run the full validation pipeline for an uploaded file
    Validate(ValidateArgs),
}

#[derive(Debug, Args)]
pub struct CatalogArgs {
    /// Directory tree containing schema definition YAML files
    #[arg(short = 's', long = "schema-dir")]
    pub schema_dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// Uploaded file to preview (.csv or .xlsx)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Number of rows to show from the normalized table
    #[arg(long, default_value_t = 10)]
    pub rows: usize,
}

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// Directory tree containing schema definition YAML files
    #[arg(short = 's', long = "schema-dir")]
    pub schema_dir: PathBuf,
    /// Uploaded file to validate (.csv or .xlsx)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Report type name or alias to validate against
    #[arg(short = 'r', long = "report")]
    pub report: String,
    /// Directory receiving the staged table (enables test orchestration)
    #[arg(long = "staging-dir")]
    pub staging_dir: Option<PathBuf>,
    /// Test engine executable to invoke after staging
    #[arg(long = "engine", default_value = "dbt")]
    pub engine: String,
    /// Test engine project directory (defaults to the current directory)
    #[arg(long = "engine-project")]
    pub engine_project: Option<PathBuf>,
    /// Run-result artifact path, relative to the engine project
    #[arg(long = "results-path")]
    pub results_path: Option<PathBuf>,
    /// Skip staging and test orchestration even when casting succeeds
    #[arg(long = "no-tests")]
    pub no_tests: bool,
}
