//! Type coercion with per-column failure isolation.
//!
//! Every column is cast independently against the report's typing map. A
//! failing column keeps its original raw values and gains a diagnostic with
//! up to five distinct example values; the rest of the table still comes
//! back cast. `all_matched` summarizes whether the whole table coerced,
//! which gates staging and test orchestration downstream.

use std::collections::BTreeMap;

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use log::{debug, info, warn};
use rust_decimal::Decimal;

use crate::{
    ingest::{NormalizedTable, RawColumn},
    schema::{DataType, DecimalSpec},
};

const EXAMPLE_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    String(String),
    Decimal(Decimal),
    Date(NaiveDate),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Bool(bool),
}

impl TypedValue {
    /// Canonical text rendering used when staging a cast table.
    pub fn render(&self) -> String {
        match self {
            TypedValue::String(s) => s.clone(),
            TypedValue::Decimal(d) => d.to_string(),
            TypedValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            TypedValue::Int32(i) => i.to_string(),
            TypedValue::Int64(i) => i.to_string(),
            TypedValue::Float32(f) => f.to_string(),
            TypedValue::Float64(f) => f.to_string(),
            TypedValue::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypedColumn {
    pub name: String,
    pub datatype: DataType,
    pub values: Vec<Option<TypedValue>>,
}

/// Why a column failed to cast, with example raw values for the user.
#[derive(Debug, Clone)]
pub struct CastDiagnostic {
    pub column: String,
    pub target: DataType,
    pub error: String,
    pub examples: Vec<String>,
}

impl CastDiagnostic {
    pub fn describe(&self) -> String {
        format!(
            "Column '{}' could not be cast to {}: {}. Examples: [{}]",
            self.column,
            self.target,
            self.error,
            self.examples.join(", ")
        )
    }
}

#[derive(Debug, Clone)]
pub enum CastOutcome {
    /// Successfully retyped column.
    Cast(TypedColumn),
    /// Column absent from the typing map, passed through unchanged.
    Passthrough(RawColumn),
    /// Cast failed; original raw values retained.
    Failed {
        original: RawColumn,
        diagnostic: CastDiagnostic,
    },
}

impl CastOutcome {
    pub fn name(&self) -> &str {
        match self {
            CastOutcome::Cast(column) => &column.name,
            CastOutcome::Passthrough(column) => &column.name,
            CastOutcome::Failed { original, .. } => &original.name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CastReport {
    pub outcomes: Vec<CastOutcome>,
    pub all_matched: bool,
}

impl CastReport {
    pub fn diagnostics(&self) -> impl Iterator<Item = &CastDiagnostic> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            CastOutcome::Failed { diagnostic, .. } => Some(diagnostic),
            _ => None,
        })
    }

    /// The fully-typed columns, in table order. Covers the whole table
    /// exactly when `all_matched` is true and nothing passed through.
    pub fn typed_columns(&self) -> Vec<&TypedColumn> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match outcome {
                CastOutcome::Cast(column) => Some(column),
                _ => None,
            })
            .collect()
    }
}

/// Casts every column of `table` against `declared_types` (declared column
/// name -> data type). Always returns a complete table; failures are
/// isolated per column.
pub fn cast_table(
    table: &NormalizedTable,
    declared_types: &BTreeMap<String, DataType>,
) -> CastReport {
    let mut outcomes = Vec::with_capacity(table.column_count());
    let mut all_matched = true;

    for column in table.columns() {
        let Some(target) = declared_types.get(&column.name) else {
            outcomes.push(CastOutcome::Passthrough(column.clone()));
            continue;
        };
        match cast_column(column, target) {
            Ok(typed) => {
                debug!("Column '{}' cast to {target}", column.name);
                outcomes.push(CastOutcome::Cast(typed));
            }
            Err(err) => {
                let examples = distinct_examples(column, EXAMPLE_LIMIT)
                    .unwrap_or_else(|inner| vec![format!("example extraction failed: {inner}")]);
                let diagnostic = CastDiagnostic {
                    column: column.name.clone(),
                    target: *target,
                    error: format!("{err:#}"),
                    examples,
                };
                warn!("{}", diagnostic.describe());
                outcomes.push(CastOutcome::Failed {
                    original: column.clone(),
                    diagnostic,
                });
                all_matched = false;
            }
        }
    }

    if all_matched {
        info!("All {} column(s) cast successfully", outcomes.len());
    } else {
        info!("Not all columns could be cast to their declared types");
    }
    CastReport {
        outcomes,
        all_matched,
    }
}

fn cast_column(column: &RawColumn, target: &DataType) -> Result<TypedColumn> {
    // 64-bit integer columns destined for decimal(16,4) narrow to 32 bits
    // first, then widen to the fixed-point type. The direct 64-bit to
    // decimal cast is unsupported in the columnar runtime this handoff
    // feeds, so the staged data must take the same route.
    let values = if is_narrow_widen_case(column, target) {
        cast_integers_via_narrowing(column)?
    } else {
        column
            .values
            .iter()
            .map(|cell| {
                cell.as_deref()
                    .map(|raw| parse_typed(raw, target))
                    .transpose()
            })
            .collect::<Result<Vec<_>>>()?
    };

    Ok(TypedColumn {
        name: column.name.clone(),
        datatype: *target,
        values,
    })
}

fn is_narrow_widen_case(column: &RawColumn, target: &DataType) -> bool {
    let Some(spec) = target.decimal_spec() else {
        return false;
    };
    if (spec.precision, spec.scale) != (16, 4) {
        return false;
    }
    let mut any = false;
    for cell in column.values.iter().flatten() {
        if cell.trim().parse::<i64>().is_err() {
            return false;
        }
        any = true;
    }
    any
}

fn cast_integers_via_narrowing(column: &RawColumn) -> Result<Vec<Option<TypedValue>>> {
    column
        .values
        .iter()
        .map(|cell| {
            cell.as_deref()
                .map(|raw| {
                    let wide: i64 = raw
                        .trim()
                        .parse()
                        .with_context(|| format!("Parsing '{raw}' as int64"))?;
                    let narrow = i32::try_from(wide).map_err(|_| {
                        anyhow!("Value {wide} does not fit a 32-bit integer on the way to decimal(16,4)")
                    })?;
                    let mut decimal = Decimal::from(narrow);
                    decimal.rescale(4);
                    Ok(TypedValue::Decimal(decimal))
                })
                .transpose()
        })
        .collect()
}

fn parse_typed(raw: &str, target: &DataType) -> Result<TypedValue> {
    let trimmed = raw.trim();
    let parsed = match target {
        DataType::String => TypedValue::String(raw.to_string()),
        DataType::Int32 => TypedValue::Int32(
            trimmed
                .parse()
                .with_context(|| format!("Parsing '{trimmed}' as int32"))?,
        ),
        DataType::Int64 => TypedValue::Int64(
            trimmed
                .parse()
                .with_context(|| format!("Parsing '{trimmed}' as int64"))?,
        ),
        DataType::Float32 => TypedValue::Float32(
            trimmed
                .parse()
                .with_context(|| format!("Parsing '{trimmed}' as float32"))?,
        ),
        DataType::Float64 => TypedValue::Float64(
            trimmed
                .parse()
                .with_context(|| format!("Parsing '{trimmed}' as float64"))?,
        ),
        DataType::Bool => {
            let lowered = trimmed.to_ascii_lowercase();
            let value = match lowered.as_str() {
                "true" | "t" | "yes" | "y" | "1" => true,
                "false" | "f" | "no" | "n" | "0" => false,
                _ => bail!("Failed to parse '{trimmed}' as bool"),
            };
            TypedValue::Bool(value)
        }
        DataType::Date => TypedValue::Date(parse_naive_date(trimmed)?),
        DataType::Decimal(spec) => TypedValue::Decimal(parse_decimal(trimmed, spec)?),
    };
    Ok(parsed)
}

pub fn parse_naive_date(value: &str) -> Result<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
    for fmt in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, fmt) {
            return Ok(parsed);
        }
    }
    Err(anyhow!("Failed to parse '{value}' as date"))
}

fn parse_decimal(value: &str, spec: &DecimalSpec) -> Result<Decimal> {
    let mut decimal: Decimal = value
        .parse()
        .with_context(|| format!("Parsing '{value}' as {}", spec.signature()))?;
    let integer_digits = spec.precision - spec.scale;
    let limit = Decimal::from_i128_with_scale(10i128.pow(integer_digits), 0);
    if decimal.abs() >= limit {
        bail!(
            "Value '{value}' exceeds {} ({} integer digit(s) allowed)",
            spec.signature(),
            integer_digits
        );
    }
    decimal.rescale(spec.scale);
    Ok(decimal)
}

/// Samples up to `limit` distinct non-empty raw values, preserving first
/// appearance order. A column with nothing to sample is an error; the
/// caller degrades it to a placeholder diagnostic entry.
fn distinct_examples(column: &RawColumn, limit: usize) -> Result<Vec<String>> {
    let mut examples: Vec<String> = Vec::new();
    for value in column.values.iter().flatten() {
        if !examples.iter().any(|existing| existing == value) {
            examples.push(value.clone());
        }
        if examples.len() == limit {
            break;
        }
    }
    if examples.is_empty() {
        bail!("column '{}' has no non-empty values to sample", column.name);
    }
    Ok(examples)
}
