//! Schema model: report definitions, column specs, and the data-type
//! vocabulary used by catalog files.
//!
//! A [`SchemaDefinition`] describes one report type: its canonical name, a
//! display alias, and an ordered column list. Types are a closed vocabulary
//! (`string | decimal(p,s) | date | int32 | int64 | float32 | float64 |
//! bool`); an unrecognized descriptor in a catalog file is a configuration
//! error, distinct from the per-row coercion failures handled in `cast`.

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow, ensure};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::names;

/// rust_decimal stores 96-bit mantissas, capping usable precision.
const DECIMAL_MAX_PRECISION: u32 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalSpec {
    pub precision: u32,
    pub scale: u32,
}

impl DecimalSpec {
    pub fn new(precision: u32, scale: u32) -> Result<Self> {
        let spec = Self { precision, scale };
        spec.ensure_valid()?;
        Ok(spec)
    }

    pub fn ensure_valid(&self) -> Result<()> {
        ensure!(self.precision > 0, "Decimal precision must be positive");
        ensure!(
            self.precision <= DECIMAL_MAX_PRECISION,
            "Decimal precision must be <= {}",
            DECIMAL_MAX_PRECISION
        );
        ensure!(
            self.scale <= self.precision,
            "Decimal scale ({}) cannot exceed precision ({})",
            self.scale,
            self.precision
        );
        Ok(())
    }

    pub fn signature(&self) -> String {
        format!("decimal({},{})", self.precision, self.scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    String,
    Decimal(DecimalSpec),
    Date,
    Int32,
    Int64,
    Float32,
    Float64,
    Bool,
}

impl DataType {
    pub fn variants() -> &'static [&'static str] {
        &[
            "string",
            "decimal(precision,scale)",
            "date",
            "int32",
            "int64",
            "float32",
            "float64",
            "bool",
        ]
    }

    pub fn describe(&self) -> String {
        match self {
            DataType::Decimal(spec) => spec.signature(),
            DataType::String => "string".to_string(),
            DataType::Date => "date".to_string(),
            DataType::Int32 => "int32".to_string(),
            DataType::Int64 => "int64".to_string(),
            DataType::Float32 => "float32".to_string(),
            DataType::Float64 => "float64".to_string(),
            DataType::Bool => "bool".to_string(),
        }
    }

    pub fn decimal_spec(&self) -> Option<&DecimalSpec> {
        match self {
            DataType::Decimal(spec) => Some(spec),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

impl FromStr for DataType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "string" => Ok(DataType::String),
            "date" => Ok(DataType::Date),
            "int32" => Ok(DataType::Int32),
            "int64" => Ok(DataType::Int64),
            "float32" => Ok(DataType::Float32),
            "float64" => Ok(DataType::Float64),
            "bool" => Ok(DataType::Bool),
            other if other.starts_with("decimal") => parse_decimal_descriptor(value),
            _ => Err(anyhow!(
                "Unsupported data type '{value}'. Supported types: {}",
                DataType::variants().join(", ")
            )),
        }
    }
}

fn parse_decimal_descriptor(value: &str) -> Result<DataType> {
    let trimmed = value.trim();
    let start = trimmed.find('(').ok_or_else(|| {
        anyhow!("Decimal type must specify precision and scale, e.g. decimal(16,4)")
    })?;
    ensure!(
        trimmed.ends_with(')'),
        "Decimal type must close with ')', e.g. decimal(16,4)"
    );
    let inner = &trimmed[start + 1..trimmed.len() - 1];
    let mut parts = inner.split(',').map(str::trim);
    let precision_token = parts
        .next()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| anyhow!("Decimal type requires a precision value, e.g. decimal(16,4)"))?;
    let scale_token = parts
        .next()
        .filter(|token| !token.is_empty())
        .ok_or_else(|| anyhow!("Decimal type requires a scale value, e.g. decimal(16,4)"))?;
    ensure!(
        parts.next().is_none(),
        "Decimal type accepts exactly two arguments, e.g. decimal(16,4)"
    );

    let precision: u32 = precision_token
        .parse()
        .map_err(|_| anyhow!("Decimal precision '{precision_token}' is not an integer"))?;
    let scale: u32 = scale_token
        .parse()
        .map_err(|_| anyhow!("Decimal scale '{scale_token}' is not an integer"))?;

    let spec = DecimalSpec::new(precision, scale)?;
    Ok(DataType::Decimal(spec))
}

impl Serialize for DataType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.describe())
    }
}

impl<'de> Deserialize<'de> for DataType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        DataType::from_str(&token).map_err(de::Error::custom)
    }
}

/// One column of a report schema. `sanitized_name` is derived from
/// `declared_name` and is the key used for file-to-schema matching; the
/// declared name remains the key for typing.
#[derive(Debug, Clone)]
pub struct ColumnSpec {
    pub declared_name: String,
    pub sanitized_name: String,
    pub data_type: DataType,
}

impl ColumnSpec {
    pub fn new(declared_name: impl Into<String>, data_type: DataType) -> Self {
        let declared_name = declared_name.into();
        let sanitized_name = names::sanitize(&declared_name);
        Self {
            declared_name,
            sanitized_name,
            data_type,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchemaDefinition {
    pub report_name: String,
    pub alias: String,
    pub columns: Vec<ColumnSpec>,
}

impl SchemaDefinition {
    pub fn new(
        report_name: impl Into<String>,
        alias: Option<String>,
        columns: Vec<ColumnSpec>,
    ) -> Result<Self> {
        let report_name = report_name.into();
        ensure!(!report_name.is_empty(), "Report name cannot be empty");
        let alias = alias.unwrap_or_else(|| report_name.clone());

        let mut seen = std::collections::BTreeSet::new();
        for column in &columns {
            ensure!(
                seen.insert(column.sanitized_name.clone()),
                "Report '{}' declares columns that collide after sanitization ('{}')",
                report_name,
                column.sanitized_name
            );
        }

        Ok(Self {
            report_name,
            alias,
            columns,
        })
    }
}
