//! Column-set validation against a report's expected columns.
//!
//! The check is strict set equality in the sanitized identifier space:
//! columns missing from the file and columns the schema does not expect are
//! both failures. On success the table's columns are renamed in place to the
//! schema's declared names so the caster keys off the typing domain.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;
use log::warn;

use crate::ingest::NormalizedTable;

/// Outcome of the two-way set comparison. Both sets are sorted for stable
/// diagnostics.
#[derive(Debug, Clone, Default)]
pub struct ColumnCheck {
    /// Expected by the schema but absent from the file.
    pub missing: Vec<String>,
    /// Present in the file but not expected by the schema.
    pub extra: Vec<String>,
}

impl ColumnCheck {
    pub fn is_valid(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty()
    }

    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!(
                "missing from file: {{{}}}",
                self.missing.iter().join(", ")
            ));
        }
        if !self.extra.is_empty() {
            parts.push(format!(
                "unexpected in file: {{{}}}",
                self.extra.iter().join(", ")
            ));
        }
        parts.join("; ")
    }
}

/// Compares the table's sanitized column names against the expected
/// matching map (sanitized name -> declared name).
pub fn check_columns(
    table: &NormalizedTable,
    expected: &BTreeMap<String, String>,
) -> ColumnCheck {
    let file_columns: BTreeSet<&str> =
        table.columns().iter().map(|c| c.name.as_str()).collect();
    let expected_columns: BTreeSet<&str> = expected.keys().map(String::as_str).collect();

    let check = ColumnCheck {
        missing: expected_columns
            .difference(&file_columns)
            .map(|name| name.to_string())
            .collect(),
        extra: file_columns
            .difference(&expected_columns)
            .map(|name| name.to_string())
            .collect(),
    };
    if !check.is_valid() {
        warn!("Column validation failed: {}", check.describe());
    }
    check
}

/// Renames the table's sanitized column names to the schema's declared
/// names. Only meaningful after a successful [`check_columns`].
pub fn rename_to_declared(table: &mut NormalizedTable, expected: &BTreeMap<String, String>) {
    table.rename_columns(expected);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::NormalizedTable;

    fn table_with(columns: &[&str]) -> NormalizedTable {
        let headers = columns.iter().map(|name| name.to_string()).collect();
        let (table, _) = NormalizedTable::from_rows(headers, Vec::new());
        table
    }

    fn expected(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(sanitized, declared)| (sanitized.to_string(), declared.to_string()))
            .collect()
    }

    #[test]
    fn matching_sets_pass() {
        let table = table_with(&["id", "amount"]);
        let check = check_columns(&table, &expected(&[("id", "Id"), ("amount", "Amount")]));
        assert!(check.is_valid());
    }

    #[test]
    fn reports_both_missing_and_extra() {
        let table = table_with(&["id", "amt"]);
        let check = check_columns(&table, &expected(&[("id", "Id"), ("amount", "Amount")]));
        assert!(!check.is_valid());
        assert_eq!(check.missing, vec!["amount"]);
        assert_eq!(check.extra, vec!["amt"]);
        assert!(check.describe().contains("missing from file"));
        assert!(check.describe().contains("unexpected in file"));
    }

    #[test]
    fn subset_is_not_tolerated() {
        // A file carrying only a subset of the schema columns fails.
        let table = table_with(&["id"]);
        let check = check_columns(&table, &expected(&[("id", "Id"), ("amount", "Amount")]));
        assert!(!check.is_valid());
        assert_eq!(check.missing, vec!["amount"]);
        assert!(check.extra.is_empty());
    }

    #[test]
    fn rename_maps_sanitized_to_declared() {
        let mut table = table_with(&["policy id", "premium"]);
        let expected = expected(&[("policy id", "Policy Id"), ("premium", "Premium")]);
        rename_to_declared(&mut table, &expected);
        assert_eq!(table.column_names(), vec!["Policy Id", "Premium"]);
    }
}
