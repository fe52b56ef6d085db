//! JSON and CSV export, and the CSV import used for bulk inserts.
//!
//! The CSV dialect is deliberately simple and matches what the dashboard has
//! always produced and accepted:
//!
//! * the header is the key set of the first row;
//! * a value is wrapped in double quotes only when it contains a comma, and
//!   embedded quotes are not escaped;
//! * on import, quotes are not interpreted at all, so a quoted value that
//!   contains a comma is split into two columns.
//!
//! Files exported here therefore do not always round-trip through
//! [`parse_csv`]. JSON always does.

use std::fs::{self, create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::{QuoteStyle, ReaderBuilder, Terminator, Trim, WriterBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AtlasError, Result};
use crate::models::{Industry, NewCompany, OutputFormat, PublishStatus, Region};

/// One imported CSV record: header name to trimmed cell text, in header order
pub type CsvRow = Map<String, Value>;

/// A parsed CSV row and the line of the file it started on
#[derive(Debug, Clone, PartialEq)]
pub struct CsvRecord {
    /// 1-based line number in the source text
    pub line: u64,
    /// Cells keyed by header
    pub cells: CsvRow,
}

impl std::ops::Index<&str> for CsvRecord {
    type Output = Value;

    fn index(&self, column: &str) -> &Value {
        &self.cells[column]
    }
}

/// Pretty-printed JSON array (2-space indentation)
pub fn to_json<T: Serialize>(rows: &[T]) -> Result<String> {
    Ok(serde_json::to_string_pretty(rows)?)
}

/// Read back a JSON export
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    Ok(serde_json::from_str(text)?)
}

fn render_cell(value: &Value) -> String {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => render_cell(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    };

    if text.contains(',') {
        format!("\"{text}\"")
    } else {
        text
    }
}

/// CSV text for `rows`, or `None` when there is nothing to export
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<Option<String>> {
    let objects = rows
        .iter()
        .map(|row| match serde_json::to_value(row)? {
            Value::Object(map) => Ok(map),
            other => Err(AtlasError::Other(format!(
                "CSV export needs object rows, got {other}"
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    let Some(first) = objects.first() else {
        return Ok(None);
    };
    let headers: Vec<String> = first.keys().cloned().collect();

    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Never)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(&headers)?;
    for object in &objects {
        let record: Vec<String> = headers
            .iter()
            .map(|h| object.get(h).map_or_else(String::new, render_cell))
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;

    let bytes = writer
        .into_inner()
        .map_err(|e| AtlasError::Other(format!("Failed to finish CSV buffer: {e}")))?;
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|e| AtlasError::Other(format!("CSV output is not UTF-8: {e}")))
}

/// Split delimited text into header-keyed rows
///
/// Blank lines are skipped and missing trailing cells become empty strings.
/// Text without a header line is rejected.
pub fn parse_csv(text: &str) -> Result<Vec<CsvRecord>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .quoting(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.iter().all(String::is_empty) {
        return Err(AtlasError::Import("missing header line".to_string()));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        let offset = record.position().map_or(0, csv::Position::byte);
        let line = record_line(text, offset);
        let cells: CsvRow = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let cell = record.get(i).unwrap_or_default();
                (header.clone(), Value::String(cell.to_string()))
            })
            .collect();
        rows.push(CsvRecord { line, cells });
    }

    Ok(rows)
}

/// Line a record starts on, given the byte offset the reader reports for it
///
/// The reader's offset sits before any blank lines it skipped on the way.
fn record_line(text: &str, offset: u64) -> u64 {
    let offset = usize::try_from(offset).map_or(text.len(), |o| o.min(text.len()));
    let rest = text.get(offset..).unwrap_or_default();
    let start = offset + (rest.len() - rest.trim_start_matches(['\r', '\n']).len());
    let newlines = text.as_bytes()[..start].iter().filter(|&&b| b == b'\n').count();
    newlines as u64 + 1
}

/// Read and split a CSV file; an unreadable file reports the I/O reason
pub fn parse_csv_file(path: &Path) -> Result<Vec<CsvRecord>> {
    let text = fs::read_to_string(path)?;
    parse_csv(&text)
}

/// Write `rows` under `output_dir` as `<entity>_<timestamp>.<ext>`
///
/// Returns `None` without touching the filesystem when a CSV export would be
/// empty.
pub fn write_export<T: Serialize>(
    rows: &[T],
    format: OutputFormat,
    output_dir: &Path,
    entity: &str,
) -> Result<Option<PathBuf>> {
    let contents = match format {
        OutputFormat::Csv => match to_csv(rows)? {
            Some(csv) => csv,
            None => return Ok(None),
        },
        OutputFormat::Json => to_json(rows)?,
    };

    create_dir_all(output_dir)?;
    let file_name = format!(
        "{entity}_{}.{}",
        Utc::now().format("%Y%m%d_%H%M%S%3f"),
        format.extension()
    );
    let file_path = output_dir.join(file_name);

    let file = File::create(&file_path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(contents.as_bytes())?;
    writer.flush()?;

    Ok(Some(file_path))
}

fn cell<'a>(row: &'a CsvRow, column: &str) -> Option<&'a str> {
    row.get(column)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_cell<T>(row: &CsvRow, column: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    cell(row, column)
        .map(|text| {
            text.parse::<T>().map_err(|e| {
                AtlasError::validation(format!("column {column}: cannot parse {text:?}: {e}"))
            })
        })
        .transpose()
}

impl NewCompany {
    /// Build an insert payload from an imported CSV row
    ///
    /// Empty cells are treated as absent. Columns that are not company
    /// fields (`id`, timestamps, anything unknown) are ignored.
    pub fn from_csv_row(row: &CsvRow) -> Result<Self> {
        let name = cell(row, "name")
            .ok_or_else(|| AtlasError::validation("column name: company name is required"))?;

        Ok(Self {
            name: name.to_string(),
            name_en: cell(row, "name_en").map(str::to_string),
            ticker: cell(row, "ticker").map(str::to_string),
            region: parse_cell::<Region>(row, "region")?,
            industry: parse_cell::<Industry>(row, "industry")?,
            description: cell(row, "description").map(str::to_string),
            website: cell(row, "website").map(str::to_string),
            headquarters: cell(row, "headquarters").map(str::to_string),
            founded_year: parse_cell(row, "founded_year")?,
            employees: parse_cell(row, "employees")?,
            market_cap: parse_cell(row, "market_cap")?,
            revenue: parse_cell(row, "revenue")?,
            status: parse_cell::<PublishStatus>(row, "status")?,
        })
    }
}

/// Convert every parsed row, naming the first bad line
pub fn companies_from_csv(records: &[CsvRecord]) -> Result<Vec<NewCompany>> {
    records
        .iter()
        .map(|record| {
            NewCompany::from_csv_row(&record.cells)
                .map_err(|e| AtlasError::Import(format!("line {}: {e}", record.line)))
        })
        .collect()
}
