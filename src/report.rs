//! Plain-text rendering of pipeline diagnostics for the CLI.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::{
    cast::{CastOutcome, CastReport},
    ingest::RawTableProperties,
    orchestrate::TestRunResult,
};

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| h.chars().count()).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(cell.chars().count());
        }
    }
    for width in &mut widths {
        *width = (*width).max(3);
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

pub fn properties_rows(properties: &RawTableProperties) -> Vec<Vec<String>> {
    properties
        .entries()
        .into_iter()
        .map(|(name, value)| vec![name, value])
        .collect()
}

/// Per-column cast status table: name, target type (or `-`), outcome.
pub fn cast_rows(report: &CastReport) -> Vec<Vec<String>> {
    report
        .outcomes
        .iter()
        .map(|outcome| match outcome {
            CastOutcome::Cast(column) => vec![
                column.name.clone(),
                column.datatype.describe(),
                "cast".to_string(),
            ],
            CastOutcome::Passthrough(column) => {
                vec![column.name.clone(), "-".to_string(), "passthrough".to_string()]
            }
            CastOutcome::Failed { original, diagnostic } => vec![
                original.name.clone(),
                diagnostic.target.describe(),
                "failed".to_string(),
            ],
        })
        .collect()
}

pub fn test_summary_rows(summary: &TestRunResult) -> Vec<Vec<String>> {
    vec![
        vec!["Passed".to_string(), summary.passed_count().to_string()],
        vec!["Failed".to_string(), summary.failed.len().to_string()],
    ]
}

pub fn test_failure_rows(summary: &TestRunResult) -> Vec<Vec<String>> {
    summary
        .failed
        .iter()
        .map(|failure| {
            vec![
                failure.failures.to_string(),
                failure.test_id.clone(),
                failure.compiled_code.clone(),
                failure.message.clone(),
            ]
        })
        .collect()
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let mut cell = sanitized.into_owned();
        let padding = widths[idx].saturating_sub(cell.chars().count());
        if padding > 0 {
            cell.push_str(&" ".repeat(padding));
        }
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(
            value
                .chars()
                .map(|ch| match ch {
                    '\n' | '\r' | '\t' => ' ',
                    other => other,
                })
                .collect(),
        )
    } else {
        Cow::Borrowed(value)
    }
}
