//! In-memory tabular data loaded from a CSV file.
//!
//! A [`Dataset`] is read once per ingestion request and never mutated. While
//! reading, every column is classified into one [`ColumnKind`] and its cells
//! are converted into typed [`Value`]s so they can be bound directly as SQL
//! parameters.

use std::{collections::HashSet, fmt, path::Path};

use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use log::debug;

use crate::{
    error::{ChatError, Result},
    io_utils, schema,
};

const BOOLEAN_TOKENS: &[&str] = &["true", "false", "t", "f", "yes", "no", "y", "n"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%d/%m/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Semantic kind the loader reports for a whole column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKind {
    Text,
    Integer,
    Real,
    /// Booleans, dates, timestamps and columns without a single value.
    Unrecognized,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ColumnKind::Text => "text",
            ColumnKind::Integer => "integer",
            ColumnKind::Real => "real",
            ColumnKind::Unrecognized => "unrecognized",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    kind: ColumnKind,
    values: Vec<Value>,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    columns: Vec<Column>,
    row_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub delimiter: Option<u8>,
    pub input_encoding: Option<String>,
    pub normalize_headers: bool,
}

impl Dataset {
    /// Builds a dataset from a header row and string records, classifying
    /// every column. Empty cells become [`Value::Null`].
    pub fn from_records(headers: Vec<String>, rows: Vec<Vec<String>>) -> std::result::Result<Self, String> {
        if headers.is_empty() {
            return Err("CSV file has no header row".to_string());
        }
        let mut seen = HashSet::with_capacity(headers.len());
        for header in &headers {
            if header.trim().is_empty() {
                return Err("Header row contains an empty column name".to_string());
            }
            // SQLite column names are case-insensitive.
            if !seen.insert(header.to_ascii_lowercase()) {
                return Err(format!("Duplicate column name '{header}'"));
            }
        }

        let mut candidates = vec![KindCandidate::new(); headers.len()];
        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() != headers.len() {
                return Err(format!(
                    "Row {} has {} field(s) but the header defines {}",
                    row_idx + 2,
                    row.len(),
                    headers.len()
                ));
            }
            for (candidate, cell) in candidates.iter_mut().zip(row) {
                candidate.observe(cell);
            }
        }

        let row_count = rows.len();
        let columns = headers
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let kind = candidates[idx].decide();
                let values = rows.iter().map(|row| typed_value(&row[idx], kind)).collect();
                Column { name, kind, values }
            })
            .collect();
        Ok(Dataset { columns, row_count })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Values of one row in column order.
    pub fn row(&self, index: usize) -> Vec<&Value> {
        self.columns.iter().map(|column| &column.values[index]).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        (0..self.row_count).map(|idx| self.row(idx))
    }
}

/// Reads a CSV file with a header row into a [`Dataset`].
pub fn load_csv(path: &Path, options: &LoadOptions) -> Result<Dataset> {
    if !path.is_file() {
        return Err(ChatError::load(path, "file does not exist"));
    }
    let (headers, rows) = read_records(path, options).map_err(|err| ChatError::load(path, format!("{err:#}")))?;
    let headers = if options.normalize_headers {
        headers.iter().map(|h| schema::normalize_identifier(h)).collect()
    } else {
        headers
    };
    let dataset = Dataset::from_records(headers, rows).map_err(|reason| ChatError::load(path, reason))?;
    debug!(
        "Loaded {} row(s) across {} column(s) from {path:?}",
        dataset.row_count(),
        dataset.columns().len()
    );
    Ok(dataset)
}

fn read_records(path: &Path, options: &LoadOptions) -> anyhow::Result<(Vec<String>, Vec<Vec<String>>)> {
    let delimiter = io_utils::resolve_input_delimiter(path, options.delimiter);
    let encoding = io_utils::resolve_encoding(options.input_encoding.as_deref())?;
    let mut reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
    let headers = io_utils::reader_headers(&mut reader, encoding)?;
    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
        rows.push(io_utils::decode_record(&record, encoding)?);
    }
    Ok((headers, rows))
}

#[derive(Debug, Clone)]
struct KindCandidate {
    seen_value: bool,
    possible_integer: bool,
    possible_real: bool,
    possible_boolean: bool,
    possible_temporal: bool,
}

impl KindCandidate {
    fn new() -> Self {
        Self {
            seen_value: false,
            possible_integer: true,
            possible_real: true,
            possible_boolean: true,
            possible_temporal: true,
        }
    }

    fn observe(&mut self, raw: &str) {
        let value = raw.trim();
        if value.is_empty() {
            return;
        }
        self.seen_value = true;
        if self.possible_integer && value.parse::<i64>().is_err() {
            self.possible_integer = false;
        }
        if self.possible_real && parse_real(value).is_none() {
            self.possible_real = false;
        }
        if self.possible_boolean && !BOOLEAN_TOKENS.contains(&value.to_ascii_lowercase().as_str()) {
            self.possible_boolean = false;
        }
        if self.possible_temporal && !is_temporal(value) {
            self.possible_temporal = false;
        }
    }

    fn decide(&self) -> ColumnKind {
        if !self.seen_value {
            ColumnKind::Unrecognized
        } else if self.possible_integer {
            ColumnKind::Integer
        } else if self.possible_real {
            ColumnKind::Real
        } else if self.possible_boolean || self.possible_temporal {
            ColumnKind::Unrecognized
        } else {
            ColumnKind::Text
        }
    }
}

fn parse_real(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|parsed| parsed.is_finite())
}

fn is_temporal(value: &str) -> bool {
    DATE_FORMATS
        .iter()
        .any(|fmt| NaiveDate::parse_from_str(value, fmt).is_ok())
        || DATETIME_FORMATS
            .iter()
            .any(|fmt| NaiveDateTime::parse_from_str(value, fmt).is_ok())
}

fn typed_value(raw: &str, kind: ColumnKind) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::Null;
    }
    match kind {
        ColumnKind::Integer => trimmed
            .parse()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(raw.to_string())),
        ColumnKind::Real => parse_real(trimmed)
            .map(Value::Real)
            .unwrap_or_else(|| Value::Text(raw.to_string())),
        ColumnKind::Text | ColumnKind::Unrecognized => Value::Text(raw.to_string()),
    }
}
