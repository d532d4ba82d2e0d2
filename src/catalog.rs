//! Schema catalog: loads and indexes report definitions from a directory of
//! YAML files.
//!
//! Each catalog file declares dbt-style `sources`; only the first source's
//! first table is read (single-table-per-file convention). A malformed file
//! is skipped with a recorded diagnostic, never failing the whole load.
//!
//! Each report gets two lookup domains: a matching map keyed by sanitized
//! column name and a typing map keyed by the declared name. Report-name and
//! alias resolution uses exact strings.

use std::{
    collections::BTreeMap,
    env,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail, ensure};
use log::{debug, warn};
use serde::Deserialize;

use crate::error::IntakeError;
use crate::schema::{ColumnSpec, DataType, SchemaDefinition};

pub const ALLOW_LIST_ENV: &str = "ALLOWED_REPORT_TYPES";

/// Invariant-checked two-way report-name/alias mapping. Inserting a
/// duplicate on either side is an error, so both directions stay total
/// functions over the valid set.
#[derive(Debug, Clone, Default)]
pub struct AliasMap {
    forward: BTreeMap<String, String>,
    inverse: BTreeMap<String, String>,
}

impl AliasMap {
    pub fn insert(&mut self, report_name: &str, alias: &str) -> Result<()> {
        ensure!(
            !self.forward.contains_key(report_name),
            "Report name '{report_name}' is already registered"
        );
        ensure!(
            !self.inverse.contains_key(alias),
            "Alias '{alias}' is already registered (for report '{}')",
            self.inverse[alias]
        );
        self.forward
            .insert(report_name.to_string(), alias.to_string());
        self.inverse
            .insert(alias.to_string(), report_name.to_string());
        Ok(())
    }

    pub fn alias_of(&self, report_name: &str) -> Option<&str> {
        self.forward.get(report_name).map(String::as_str)
    }

    pub fn report_for(&self, alias: &str) -> Option<&str> {
        self.inverse.get(alias).map(String::as_str)
    }

    /// Resolves either a report name or an alias to the canonical report
    /// name. Exact match only.
    pub fn resolve(&self, name_or_alias: &str) -> Option<&str> {
        if self.forward.contains_key(name_or_alias) {
            return self.forward.get_key_value(name_or_alias).map(|(k, _)| k.as_str());
        }
        self.report_for(name_or_alias)
    }

    pub fn remove(&mut self, report_name: &str) {
        if let Some(alias) = self.forward.remove(report_name) {
            self.inverse.remove(&alias);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward
            .iter()
            .map(|(report, alias)| (report.as_str(), alias.as_str()))
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaCatalog {
    /// report name -> (sanitized column name -> declared column name)
    columns_by_table: BTreeMap<String, BTreeMap<String, String>>,
    /// report name -> (declared column name -> data type)
    types_by_table: BTreeMap<String, BTreeMap<String, DataType>>,
    alias_map: AliasMap,
    /// One configuration error per skipped schema file.
    diagnostics: Vec<IntakeError>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    sources: Vec<SourceDecl>,
}

#[derive(Debug, Deserialize)]
struct SourceDecl {
    #[serde(default)]
    tables: Vec<TableDecl>,
}

#[derive(Debug, Deserialize)]
struct TableDecl {
    name: String,
    #[serde(default)]
    table_alias: Option<String>,
    #[serde(default)]
    columns: Vec<ColumnDecl>,
}

#[derive(Debug, Deserialize)]
struct ColumnDecl {
    name: String,
    data_type: DataType,
}

impl SchemaCatalog {
    /// Scans `dir` recursively for `.yml`/`.yaml` files and loads every
    /// parseable definition. Files that fail to parse, or that collide with
    /// an already-registered report name or alias, are logged and skipped.
    pub fn load(dir: &Path) -> Result<Self> {
        ensure!(
            dir.is_dir(),
            "Schema catalog directory {dir:?} does not exist"
        );
        let mut paths = Vec::new();
        collect_yaml_files(dir, &mut paths)
            .with_context(|| format!("Scanning schema catalog directory {dir:?}"))?;
        paths.sort();

        let mut catalog = SchemaCatalog::default();
        for path in &paths {
            match load_definition(path) {
                Ok(definition) => {
                    if let Err(err) = catalog.register(definition) {
                        catalog.skip(path, format!("{err}"));
                    }
                }
                Err(err) => {
                    catalog.skip(path, format!("{err:#}"));
                }
            }
        }
        debug!(
            "Loaded {} report definition(s) from {dir:?}",
            catalog.alias_map.len()
        );
        Ok(catalog)
    }

    pub fn register(&mut self, definition: SchemaDefinition) -> Result<()> {
        self.alias_map
            .insert(&definition.report_name, &definition.alias)?;

        let mut matching = BTreeMap::new();
        let mut typing = BTreeMap::new();
        for column in &definition.columns {
            matching.insert(column.sanitized_name.clone(), column.declared_name.clone());
            typing.insert(column.declared_name.clone(), column.data_type);
        }
        self.columns_by_table
            .insert(definition.report_name.clone(), matching);
        self.types_by_table
            .insert(definition.report_name, typing);
        Ok(())
    }

    /// Matching map for a report: sanitized name -> declared name.
    pub fn expected_columns(&self, report_name: &str) -> Option<&BTreeMap<String, String>> {
        self.columns_by_table.get(report_name)
    }

    /// Typing map for a report: declared name -> data type.
    pub fn declared_types(&self, report_name: &str) -> Option<&BTreeMap<String, DataType>> {
        self.types_by_table.get(report_name)
    }

    pub fn alias_map(&self) -> &AliasMap {
        &self.alias_map
    }

    /// Configuration errors for schema files skipped during the load.
    pub fn diagnostics(&self) -> &[IntakeError] {
        &self.diagnostics
    }

    fn skip(&mut self, path: &Path, reason: String) {
        let diagnostic = IntakeError::configuration(format!("skipping schema file {path:?}: {reason}"));
        warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    pub fn report_names(&self) -> impl Iterator<Item = &str> {
        self.columns_by_table.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.columns_by_table.is_empty()
    }

    /// Keeps only the report types named in the comma-separated allow-list.
    /// Entries are whitespace-trimmed; matching is exact on the report name.
    pub fn restrict(&mut self, allow_list: &str) {
        let allowed: Vec<&str> = allow_list
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .collect();
        let retained: Vec<String> = self
            .columns_by_table
            .keys()
            .filter(|name| !allowed.contains(&name.as_str()))
            .cloned()
            .collect();
        for name in retained {
            self.columns_by_table.remove(&name);
            self.types_by_table.remove(&name);
            self.alias_map.remove(&name);
        }
    }

    /// Applies the `ALLOWED_REPORT_TYPES` environment allow-list. An unset
    /// variable behaves like an empty one: nothing is selectable.
    pub fn restrict_from_env(&mut self) {
        let allow_list = env::var(ALLOW_LIST_ENV).unwrap_or_default();
        self.restrict(&allow_list);
    }
}

fn collect_yaml_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir).with_context(|| format!("Reading directory {dir:?}"))? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_yaml_files(&path, out)?;
        } else if matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some(ext) if ext.eq_ignore_ascii_case("yml") || ext.eq_ignore_ascii_case("yaml")
        ) {
            out.push(path);
        }
    }
    Ok(())
}

/// Parses one catalog file into a definition. Only the first declared
/// source and its first table are read.
fn load_definition(path: &Path) -> Result<SchemaDefinition> {
    let file = File::open(path).with_context(|| format!("Opening schema file {path:?}"))?;
    let reader = BufReader::new(file);
    let parsed: CatalogFile =
        serde_yaml::from_reader(reader).context("Parsing schema YAML")?;

    let Some(source) = parsed.sources.into_iter().next() else {
        bail!("No sources declared");
    };
    let Some(table) = source.tables.into_iter().next() else {
        bail!("First source declares no tables");
    };

    let columns = table
        .columns
        .into_iter()
        .map(|col| ColumnSpec::new(col.name, col.data_type))
        .collect();
    SchemaDefinition::new(table.name, table.table_alias, columns)
}
