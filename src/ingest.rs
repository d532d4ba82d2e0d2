//! Raw-file ingestion: sniffing, decoding, and normalization.
//!
//! Delimited text and xlsx spreadsheets converge into one
//! [`NormalizedTable`]: fully blank rows are dropped, column names are
//! sanitized right after parse, and cell values stay untyped strings until
//! the caster runs. Sniffed properties ([`RawTableProperties`]) are shown to
//! the user but never drive typing.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow, bail};
use calamine::{Data, Reader, Xlsx, open_workbook};
use encoding_rs::Encoding;
use encoding_rs_io::DecodeReaderBytesBuilder;
use log::{debug, info};

use crate::names;

const SNIFF_SAMPLE_BYTES: usize = 64 * 1024;
const SNIFF_SAMPLE_LINES: usize = 16;
const DELIMITER_CANDIDATES: &[u8] = &[b',', b';', b'\t', b'|'];

/// Upload kind, resolved once from the file extension at upload time and
/// threaded explicitly from there on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Delimited,
    Spreadsheet,
}

impl FileKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(FileKind::Delimited),
            Some(ext) if ext.eq_ignore_ascii_case("xlsx") => Ok(FileKind::Spreadsheet),
            Some(other) => Err(anyhow!(
                "Unsupported file extension '.{other}'. Use '.csv' or '.xlsx'"
            )),
            None => Err(anyhow!(
                "File {path:?} has no extension. Use '.csv' or '.xlsx'"
            )),
        }
    }
}

/// Structural metadata sniffed while reading a raw file. Advisory only.
#[derive(Debug, Clone)]
pub struct RawTableProperties {
    pub delimiter: Option<u8>,
    pub encoding: String,
    pub column_count: usize,
    pub rows_read: usize,
    pub blank_rows_dropped: usize,
}

impl RawTableProperties {
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        if let Some(delimiter) = self.delimiter {
            entries.push(("Delimiter".to_string(), printable_delimiter(delimiter)));
        }
        entries.push(("Encoding".to_string(), self.encoding.clone()));
        entries.push(("Columns".to_string(), self.column_count.to_string()));
        entries.push(("Rows".to_string(), self.rows_read.to_string()));
        entries.push((
            "Blank rows dropped".to_string(),
            self.blank_rows_dropped.to_string(),
        ));
        entries
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}

/// One raw (pre-cast) column. `None` marks an empty cell.
#[derive(Debug, Clone)]
pub struct RawColumn {
    pub name: String,
    pub values: Vec<Option<String>>,
}

/// Ordered columns of raw values. Names are already sanitized by the time a
/// table leaves this module, so downstream comparisons share one identifier
/// space.
#[derive(Debug, Clone, Default)]
pub struct NormalizedTable {
    columns: Vec<RawColumn>,
}

impl NormalizedTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a table from row-major records, dropping rows whose every cell
    /// is empty. Row order is otherwise preserved. Returns the number of
    /// blank rows dropped alongside the table.
    pub fn from_rows(headers: Vec<String>, rows: Vec<Vec<Option<String>>>) -> (Self, usize) {
        let mut columns: Vec<RawColumn> = headers
            .into_iter()
            .map(|name| RawColumn {
                name: names::sanitize(&name),
                values: Vec::new(),
            })
            .collect();

        let mut dropped = 0usize;
        for row in rows {
            if row.iter().all(Option::is_none) {
                dropped += 1;
                continue;
            }
            for (idx, column) in columns.iter_mut().enumerate() {
                column.values.push(row.get(idx).cloned().flatten());
            }
        }
        (Self { columns }, dropped)
    }

    pub fn columns(&self) -> &[RawColumn] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&RawColumn> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Renames columns in place from the current name to the mapped one.
    /// Columns absent from the map keep their name.
    pub fn rename_columns(&mut self, mapping: &BTreeMap<String, String>) {
        for column in &mut self.columns {
            if let Some(declared) = mapping.get(&column.name) {
                column.name = declared.clone();
            }
        }
    }
}

/// Parses an uploaded file into a normalized table plus sniffed structural
/// properties. Errors fail the whole ingestion; the pipeline converts them
/// into an empty-but-valid table with a recorded diagnostic.
pub fn ingest(path: &Path, kind: FileKind) -> Result<(RawTableProperties, NormalizedTable)> {
    info!("Ingesting {path:?} as {kind:?}");
    match kind {
        FileKind::Delimited => ingest_delimited(path),
        FileKind::Spreadsheet => ingest_spreadsheet(path),
    }
}

fn ingest_delimited(path: &Path) -> Result<(RawTableProperties, NormalizedTable)> {
    let (encoding, delimiter) =
        sniff_delimited(path).with_context(|| format!("Sniffing {path:?}"))?;
    debug!(
        "Sniffed delimiter '{}' and encoding {} for {path:?}",
        printable_delimiter(delimiter),
        encoding.map_or("utf-8", |enc| enc.name())
    );

    let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let decoder = DecodeReaderBytesBuilder::new()
        .encoding(encoding)
        .bom_sniffing(true)
        .build(BufReader::new(file));
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(decoder);

    let headers: Vec<String> = reader
        .headers()
        .context("Reading header row")?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.context("Reading data row")?;
        rows.push(record.iter().map(cell_from_str).collect());
    }

    let rows_parsed = rows.len();
    let (table, dropped) = NormalizedTable::from_rows(headers, rows);
    let properties = RawTableProperties {
        delimiter: Some(delimiter),
        encoding: encoding.map_or("utf-8", |enc| enc.name()).to_string(),
        column_count: table.column_count(),
        rows_read: rows_parsed - dropped,
        blank_rows_dropped: dropped,
    };
    Ok((properties, table))
}

fn ingest_spreadsheet(path: &Path) -> Result<(RawTableProperties, NormalizedTable)> {
    let mut workbook: Xlsx<_> =
        open_workbook(path).with_context(|| format!("Opening workbook {path:?}"))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| anyhow!("Workbook {path:?} contains no worksheets"))?
        .with_context(|| format!("Reading first worksheet of {path:?}"))?;

    let mut row_iter = range.rows();
    // First row is always interpreted as headers, matching the forced-header
    // behavior of the delimited path.
    let Some(header_row) = row_iter.next() else {
        bail!("Worksheet in {path:?} is empty");
    };
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(idx, cell)| match render_cell(cell) {
            Some(name) => name,
            None => format!("column {}", idx + 1),
        })
        .collect();

    let width = headers.len();
    let mut rows = Vec::new();
    for row in row_iter {
        let mut cells: Vec<Option<String>> = row.iter().map(render_cell).collect();
        cells.resize(width, None);
        rows.push(cells);
    }

    let rows_parsed = rows.len();
    let (table, dropped) = NormalizedTable::from_rows(headers, rows);
    let properties = RawTableProperties {
        delimiter: None,
        encoding: "utf-8 (xlsx)".to_string(),
        column_count: table.column_count(),
        rows_read: rows_parsed - dropped,
        blank_rows_dropped: dropped,
    };
    Ok((properties, table))
}

fn cell_from_str(value: &str) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Renders a spreadsheet cell to the raw string the caster will see. Whole
/// floats print without a fractional part so integer columns survive the
/// round trip through the spreadsheet engine's numeric cells.
fn render_cell(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => cell_from_str(s),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => {
            if f.fract() == 0.0 {
                Some((*f as i64).to_string())
            } else {
                Some(f.to_string())
            }
        }
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(dt) => Some(dt.as_f64().to_string()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => cell_from_str(s),
        Data::Error(err) => Some(format!("{err:?}")),
    }
}

/// Reads a bounded byte sample and picks the delimiter whose field count is
/// consistent across sampled lines. BOM-declared encodings are honored; the
/// sample is decoded lossily for counting only.
fn sniff_delimited(path: &Path) -> Result<(Option<&'static Encoding>, u8)> {
    let mut file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
    let mut sample = vec![0u8; SNIFF_SAMPLE_BYTES];
    let read = file.read(&mut sample).context("Reading sniff sample")?;
    sample.truncate(read);

    let encoding = Encoding::for_bom(&sample).map(|(enc, _)| enc);
    let decoded = match encoding {
        Some(enc) => enc.decode(&sample).0.into_owned(),
        None => String::from_utf8_lossy(&sample).into_owned(),
    };

    let lines: Vec<&str> = decoded
        .lines()
        .filter(|line| !line.trim().is_empty())
        .take(SNIFF_SAMPLE_LINES)
        .collect();

    let mut best: Option<(u8, usize)> = None;
    for &candidate in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| line.matches(candidate as char).count() + 1)
            .collect();
        let Some(&first) = counts.first() else {
            continue;
        };
        if first < 2 || counts.iter().any(|&count| count != first) {
            continue;
        }
        if best.is_none_or(|(_, fields)| first > fields) {
            best = Some((candidate, first));
        }
    }

    let delimiter = best.map_or(b',', |(candidate, _)| candidate);
    Ok((encoding, delimiter))
}
