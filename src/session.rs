//! Session state and the pipeline driver.
//!
//! All per-upload state lives in one [`SessionContext`], rebuilt wholesale
//! for each validation attempt with no ambient globals. The driver runs the
//! stages in order and records every failure instead of aborting early:
//! ingestion failure still yields a valid empty table, a column mismatch
//! reports both set differences, and cast diagnostics accumulate across all
//! columns.

use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use log::info;

use crate::{
    cast::{self, CastReport},
    catalog::SchemaCatalog,
    error::IntakeError,
    ingest::{self, FileKind, NormalizedTable, RawTableProperties},
    orchestrate::{StagingStore, TestEngine, TestRunResult},
    validate::{self, ColumnCheck},
};

/// The gate booleans downstream submission logic requires. All three must
/// be true before a record is eligible for final submission.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gates {
    pub column_is_valid: bool,
    pub all_column_type_matched: bool,
    pub all_tests_passed: bool,
}

/// Per-upload session state. Owned exclusively by the active session and
/// overwritten wholesale on re-upload.
#[derive(Debug)]
pub struct SessionContext {
    pub report_type: String,
    pub file: PathBuf,
    pub kind: Option<FileKind>,
    pub properties: Option<RawTableProperties>,
    pub table: NormalizedTable,
    pub column_check: Option<ColumnCheck>,
    pub cast: Option<CastReport>,
    pub tests: Option<TestRunResult>,
    pub errors: Vec<IntakeError>,
    pub gates: Gates,
}

impl SessionContext {
    fn new(report_type: &str, file: &Path) -> Self {
        Self {
            report_type: report_type.to_string(),
            file: file.to_path_buf(),
            kind: None,
            properties: None,
            table: NormalizedTable::empty(),
            column_check: None,
            cast: None,
            tests: None,
            errors: Vec::new(),
            gates: Gates::default(),
        }
    }

    pub fn submission_ready(&self) -> bool {
        self.gates.column_is_valid
            && self.gates.all_column_type_matched
            && self.gates.all_tests_passed
    }
}

/// Ingests a file without validating it, for previewing. Ingestion errors
/// are recorded on the session, never propagated.
pub fn preview_upload(report_type: &str, file: &Path) -> SessionContext {
    let mut session = SessionContext::new(report_type, file);
    ingest_into(&mut session, file);
    session
}

/// Runs the full pipeline for one upload: ingestion, column validation,
/// type casting, then staging plus test orchestration when both prior
/// gates hold and an engine is configured.
///
/// Returns `Err` only when the report type cannot be resolved against the
/// catalog; every downstream failure is recorded on the session instead.
pub fn validate_upload(
    catalog: &SchemaCatalog,
    report_type_or_alias: &str,
    file: &Path,
    engine: Option<(&TestEngine, &dyn StagingStore)>,
) -> Result<SessionContext> {
    let report_type = catalog
        .alias_map()
        .resolve(report_type_or_alias)
        .ok_or_else(|| {
            anyhow!("Report type '{report_type_or_alias}' is not available in the schema catalog")
        })?
        .to_string();
    let expected = catalog
        .expected_columns(&report_type)
        .ok_or_else(|| anyhow!("No column definitions for report '{report_type}'"))?;
    let declared_types = catalog
        .declared_types(&report_type)
        .ok_or_else(|| anyhow!("No type definitions for report '{report_type}'"))?;

    let mut session = SessionContext::new(&report_type, file);
    info!("Validating {file:?} as report type '{report_type}'");

    if !ingest_into(&mut session, file) {
        return Ok(session);
    }

    let check = validate::check_columns(&session.table, expected);
    session.gates.column_is_valid = check.is_valid();
    if !check.is_valid() {
        session
            .errors
            .push(IntakeError::Validation(check.describe()));
        session.column_check = Some(check);
        return Ok(session);
    }
    session.column_check = Some(check);

    validate::rename_to_declared(&mut session.table, expected);
    let report = cast::cast_table(&session.table, declared_types);
    session.gates.all_column_type_matched = report.all_matched;
    for diagnostic in report.diagnostics() {
        session
            .errors
            .push(IntakeError::Coercion(diagnostic.describe()));
    }
    session.cast = Some(report);

    if !session.gates.all_column_type_matched {
        return Ok(session);
    }

    let Some((engine, staging)) = engine else {
        return Ok(session);
    };
    let cast_report = session
        .cast
        .as_ref()
        .ok_or_else(|| anyhow!("Cast report missing after a successful cast"))?;
    let staged = staging
        .replace(&report_type, &cast_report.typed_columns())
        .and_then(|_| engine.run(&report_type));
    match staged {
        Ok(summary) => {
            session.gates.all_tests_passed = summary.passed();
            session.tests = Some(summary);
        }
        Err(err) => {
            session
                .errors
                .push(IntakeError::orchestration(format!("{err:#}")));
        }
    }
    Ok(session)
}

/// Shared ingestion step: on failure the session keeps an empty valid
/// table and records the error, so callers render a clean failure state.
fn ingest_into(session: &mut SessionContext, file: &Path) -> bool {
    let kind = match FileKind::from_path(file) {
        Ok(kind) => kind,
        Err(err) => {
            session.errors.push(IntakeError::ingestion(format!("{err:#}")));
            return false;
        }
    };
    session.kind = Some(kind);
    match ingest::ingest(file, kind) {
        Ok((properties, table)) => {
            session.properties = Some(properties);
            session.table = table;
            true
        }
        Err(err) => {
            session.errors.push(IntakeError::ingestion(format!("{err:#}")));
            false
        }
    }
}
