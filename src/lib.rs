pub mod cast;
pub mod catalog;
pub mod cli;
pub mod error;
pub mod ingest;
pub mod names;
pub mod orchestrate;
pub mod report;
pub mod schema;
pub mod session;
pub mod validate;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{LevelFilter, info};

use crate::{
    catalog::SchemaCatalog,
    cli::{Cli, Commands},
    ingest::NormalizedTable,
    orchestrate::{CsvStagingStore, TestEngine},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("report_intake", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Catalog(args) => handle_catalog(&args),
        Commands::Preview(args) => handle_preview(&args),
        Commands::Validate(args) => handle_validate(&args),
    }
}

fn load_catalog(dir: &std::path::Path) -> Result<SchemaCatalog> {
    let mut catalog = SchemaCatalog::load(dir)
        .with_context(|| format!("Loading schema catalog from {dir:?}"))?;
    for diagnostic in catalog.diagnostics() {
        eprintln!("{diagnostic}");
    }
    catalog.restrict_from_env();
    Ok(catalog)
}

fn handle_catalog(args: &cli::CatalogArgs) -> Result<()> {
    let catalog = load_catalog(&args.schema_dir)?;
    if catalog.is_empty() {
        bail!(
            "No selectable report types in {:?} (check {} and the catalog files)",
            args.schema_dir,
            catalog::ALLOW_LIST_ENV
        );
    }
    let headers = vec!["Report type".to_string(), "Alias".to_string()];
    let rows: Vec<Vec<String>> = catalog
        .alias_map()
        .iter()
        .map(|(report, alias)| vec![report.to_string(), alias.to_string()])
        .collect();
    report::print_table(&headers, &rows);
    Ok(())
}

fn handle_preview(args: &cli::PreviewArgs) -> Result<()> {
    let session = session::preview_upload("preview", &args.input);
    for err in &session.errors {
        eprintln!("{err}");
    }
    if let Some(properties) = &session.properties {
        println!("Detected properties:");
        report::print_table(
            &["Property".to_string(), "Value".to_string()],
            &report::properties_rows(properties),
        );
        println!();
    }
    if !session.table.is_empty() {
        print_table_head(&session.table, args.rows);
    }
    Ok(())
}

fn handle_validate(args: &cli::ValidateArgs) -> Result<()> {
    let catalog = load_catalog(&args.schema_dir)?;

    let engine_pair = if args.no_tests || args.staging_dir.is_none() {
        None
    } else {
        let staging_dir = args.staging_dir.clone().unwrap_or_default();
        let project_dir = args
            .engine_project
            .clone()
            .unwrap_or_else(|| std::path::PathBuf::from("."));
        let mut engine = TestEngine::new(args.engine.clone(), project_dir);
        if let Some(results_path) = &args.results_path {
            engine.results_path = results_path.clone();
        }
        Some((engine, CsvStagingStore::new(staging_dir)))
    };

    let session = match &engine_pair {
        Some((engine, staging)) => {
            session::validate_upload(&catalog, &args.report, &args.input, Some((engine, staging)))?
        }
        None => session::validate_upload(&catalog, &args.report, &args.input, None)?,
    };

    for err in &session.errors {
        eprintln!("{err}");
    }
    if let Some(check) = &session.column_check
        && check.is_valid()
    {
        println!("Column names match the schema definition.");
    }
    if let Some(cast) = &session.cast {
        println!();
        println!("Cast outcomes:");
        report::print_table(
            &[
                "Column".to_string(),
                "Target type".to_string(),
                "Outcome".to_string(),
            ],
            &report::cast_rows(cast),
        );
    }
    if let Some(tests) = &session.tests {
        println!();
        println!("Test summary:");
        report::print_table(
            &["Status".to_string(), "Count".to_string()],
            &report::test_summary_rows(tests),
        );
        if !tests.passed() {
            println!();
            println!("Failed tests:");
            report::print_table(
                &[
                    "Number of failures".to_string(),
                    "Test name".to_string(),
                    "Compiled code".to_string(),
                    "Message".to_string(),
                ],
                &report::test_failure_rows(tests),
            );
        }
    }

    let tests_ok = session.gates.all_tests_passed || engine_pair.is_none();
    let ready = session.gates.column_is_valid && session.gates.all_column_type_matched && tests_ok;
    if !ready {
        bail!(
            "Validation failed for report '{}' (columns valid: {}, types matched: {}, tests passed: {})",
            session.report_type,
            session.gates.column_is_valid,
            session.gates.all_column_type_matched,
            session.gates.all_tests_passed
        );
    }
    info!("Validation succeeded for report '{}'", session.report_type);
    println!("Validation succeeded for report '{}'.", session.report_type);
    Ok(())
}

fn print_table_head(table: &NormalizedTable, limit: usize) {
    let headers = table.column_names();
    let row_count = table.row_count().min(limit);
    let rows: Vec<Vec<String>> = (0..row_count)
        .map(|row| {
            table
                .columns()
                .iter()
                .map(|column| column.values[row].clone().unwrap_or_default())
                .collect()
        })
        .collect();
    report::print_table(&headers, &rows);
}
