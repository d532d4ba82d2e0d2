//! Test orchestration: staging the cast table and driving the external
//! declarative test engine.
//!
//! The analytical store and the engine's own rule execution are external
//! collaborators. This module owns the contract around them: replace the
//! staged table for the report, invoke `<engine> test --select
//! source:<namespace>.<report>`, then read the run-result artifact and
//! aggregate it into a pass/fail summary. Invocation failures and a missing
//! artifact are orchestration errors, distinct from failed tests, which are
//! ordinary data in the summary.
//!
//! There is no timeout around the engine invocation; a hung engine blocks
//! the flow. Accepted limitation, inherited from the system this replaces.

use std::{
    fs::{self, File},
    path::PathBuf,
    process::Command,
};

use anyhow::{Context, Result, ensure};
use csv::QuoteStyle;
use log::{info, warn};
use serde::Deserialize;

use crate::cast::TypedColumn;

pub const DEFAULT_SOURCE_NAMESPACE: &str = "uploaded_files";
pub const DEFAULT_RESULTS_PATH: &str = "target/run_results.json";

/// Staging handoff for a fully-cast table. Replaces any prior staged table
/// of the same report name.
pub trait StagingStore {
    fn replace(&self, report_name: &str, columns: &[&TypedColumn]) -> Result<()>;
}

/// File-based staging: one always-quoted CSV per report under the staging
/// root, overwritten on each validation attempt.
#[derive(Debug, Clone)]
pub struct CsvStagingStore {
    root: PathBuf,
}

impl CsvStagingStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn table_path(&self, report_name: &str) -> PathBuf {
        self.root.join(format!("{report_name}.csv"))
    }
}

impl StagingStore for CsvStagingStore {
    fn replace(&self, report_name: &str, columns: &[&TypedColumn]) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("Creating staging directory {:?}", self.root))?;
        let path = self.table_path(report_name);
        let file =
            File::create(&path).with_context(|| format!("Creating staged table {path:?}"))?;
        let mut writer = csv::WriterBuilder::new()
            .quote_style(QuoteStyle::Always)
            .double_quote(true)
            .from_writer(file);

        writer.write_record(columns.iter().map(|column| column.name.as_str()))?;
        let row_count = columns.first().map_or(0, |column| column.values.len());
        for row in 0..row_count {
            let record: Vec<String> = columns
                .iter()
                .map(|column| {
                    column.values[row]
                        .as_ref()
                        .map(|value| value.render())
                        .unwrap_or_default()
                })
                .collect();
            writer.write_record(&record)?;
        }
        writer
            .flush()
            .with_context(|| format!("Flushing staged table {path:?}"))?;
        info!("Staged {row_count} row(s) for report '{report_name}' at {path:?}");
        Ok(())
    }
}

/// External test engine configuration. `results_path` is resolved relative
/// to `project_dir`, where the engine writes its run-result artifact.
#[derive(Debug, Clone)]
pub struct TestEngine {
    pub program: String,
    pub project_dir: PathBuf,
    pub results_path: PathBuf,
    pub source_namespace: String,
}

impl TestEngine {
    pub fn new(program: impl Into<String>, project_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            project_dir: project_dir.into(),
            results_path: PathBuf::from(DEFAULT_RESULTS_PATH),
            source_namespace: DEFAULT_SOURCE_NAMESPACE.to_string(),
        }
    }

    pub fn selector(&self, report_name: &str) -> String {
        format!("source:{}.{report_name}", self.source_namespace)
    }

    /// Runs the tests declared against the staged table and aggregates the
    /// run-result artifact. A non-zero exit with a readable artifact means
    /// some tests failed and is not an invocation error.
    pub fn run(&self, report_name: &str) -> Result<TestRunResult> {
        let selector = self.selector(report_name);
        info!(
            "Invoking test engine '{}' for {selector} (no timeout applies)",
            self.program
        );
        let status = Command::new(&self.program)
            .current_dir(&self.project_dir)
            .args(["test", "--select", &selector])
            .status()
            .with_context(|| format!("Invoking test engine '{}'", self.program))?;
        if !status.success() {
            warn!("Test engine exited with {status}; reading artifact anyway");
        }

        let artifact = self.project_dir.join(&self.results_path);
        ensure!(
            artifact.is_file(),
            "Test engine produced no run-result artifact at {artifact:?}"
        );
        let file = File::open(&artifact)
            .with_context(|| format!("Opening run-result artifact {artifact:?}"))?;
        let raw: RawRunResults = serde_json::from_reader(file)
            .with_context(|| format!("Parsing run-result artifact {artifact:?}"))?;
        Ok(aggregate(raw))
    }
}

#[derive(Debug, Deserialize)]
struct RawRunResults {
    #[serde(default)]
    results: Vec<RawRunResult>,
}

#[derive(Debug, Deserialize)]
struct RawRunResult {
    status: String,
    #[serde(default)]
    unique_id: Option<String>,
    #[serde(default)]
    node: Option<RawNode>,
    #[serde(default)]
    failures: Option<u64>,
    #[serde(default)]
    compiled_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawNode {
    name: String,
}

/// One failed test from the run-result artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
    pub test_id: String,
    pub failures: u64,
    pub compiled_code: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct TestRunResult {
    pub total: usize,
    pub failed: Vec<TestFailure>,
}

impl TestRunResult {
    pub fn passed(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn passed_count(&self) -> usize {
        self.total - self.failed.len()
    }
}

fn aggregate(raw: RawRunResults) -> TestRunResult {
    let total = raw.results.len();
    let failed = raw
        .results
        .into_iter()
        .filter(|result| result.status == "fail")
        .map(|result| {
            let id = result
                .unique_id
                .or_else(|| result.node.map(|node| node.name))
                .unwrap_or_else(|| "<unknown test>".to_string());
            TestFailure {
                test_id: shorten_test_id(&id),
                failures: result.failures.unwrap_or(0),
                compiled_code: result.compiled_code.unwrap_or_default(),
                message: result.message.unwrap_or_default(),
            }
        })
        .collect();
    TestRunResult { total, failed }
}

/// Shortens a dotted unique id to its second-to-last segment, the readable
/// test name in engine artifacts. Undotted ids pass through unchanged.
pub fn shorten_test_id(unique_id: &str) -> String {
    let segments: Vec<&str> = unique_id.split('.').collect();
    if segments.len() >= 2 {
        segments[segments.len() - 2].to_string()
    } else {
        unique_id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shorten_takes_second_to_last_segment() {
        assert_eq!(
            shorten_test_id("test.project.not_null_loans_policy_id.5f2d1a"),
            "not_null_loans_policy_id"
        );
        assert_eq!(shorten_test_id("plain_name"), "plain_name");
    }

    #[test]
    fn aggregate_counts_failures_and_derives_passed() {
        let raw = RawRunResults {
            results: vec![
                RawRunResult {
                    status: "pass".to_string(),
                    unique_id: Some("test.p.ok.1".to_string()),
                    node: None,
                    failures: Some(0),
                    compiled_code: None,
                    message: None,
                },
                RawRunResult {
                    status: "fail".to_string(),
                    unique_id: Some("test.p.bad_premium.2".to_string()),
                    node: None,
                    failures: Some(3),
                    compiled_code: Some("select * from staged".to_string()),
                    message: Some("Got 3 results".to_string()),
                },
            ],
        };
        let summary = aggregate(raw);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed_count(), 1);
        assert!(!summary.passed());
        assert_eq!(summary.failed[0].test_id, "bad_premium");
        assert_eq!(summary.failed[0].failures, 3);
        assert_eq!(summary.failed[0].compiled_code, "select * from staged");
    }

    #[test]
    fn aggregate_falls_back_to_node_name() {
        let raw = RawRunResults {
            results: vec![RawRunResult {
                status: "fail".to_string(),
                unique_id: None,
                node: Some(RawNode {
                    name: "unique_loans_policy_id".to_string(),
                }),
                failures: None,
                compiled_code: None,
                message: None,
            }],
        };
        let summary = aggregate(raw);
        assert_eq!(summary.failed[0].test_id, "unique_loans_policy_id");
    }

    #[test]
    fn all_passing_run_is_passed() {
        let raw = RawRunResults {
            results: (0..3)
                .map(|idx| RawRunResult {
                    status: "pass".to_string(),
                    unique_id: Some(format!("test.p.t{idx}.0")),
                    node: None,
                    failures: Some(0),
                    compiled_code: None,
                    message: None,
                })
                .collect(),
        };
        let summary = aggregate(raw);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.passed_count(), 3);
        assert!(summary.passed());
    }
}
