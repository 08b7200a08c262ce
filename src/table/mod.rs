// src/table/mod.rs
use anyhow::{anyhow, bail, Context, Result};
use csv::ReaderBuilder;
use std::{collections::HashSet, fmt, io::Read};
use tracing::{debug, warn};

pub mod infer;

use infer::{convert_cell, infer_column_type, is_missing};

/// Column type inferred from the text of a CSV column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Integer,
    Float,
    Boolean,
    Text,
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Text => "text",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

/// A single typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

/// Parsed CSV content: a fixed column list and records holding one cell per column.
#[derive(Debug, Clone, PartialEq)]
pub struct RowSet {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}

/// Make header names usable as column names: blanks become `Unnamed: <idx>`,
/// repeats get `.1`, `.2`, ... appended.
fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    let mut used: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut out = Vec::with_capacity(raw.len());

    for (idx, name) in raw.into_iter().enumerate() {
        let name = if name.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            name
        };
        let mut candidate = name.clone();
        let mut n = 1;
        while used.contains(&candidate) {
            candidate = format!("{}.{}", name, n);
            n += 1;
        }
        if candidate != name {
            debug!(header = %name, renamed = %candidate, "duplicate header renamed");
        }
        used.insert(candidate.clone());
        out.push(candidate);
    }
    out
}

/// Parse CSV text into a [`RowSet`]. The first record names the columns; every
/// later record is a row. Short rows are padded with NULLs, long rows are an error.
pub fn parse_csv<R: Read>(reader: R) -> Result<RowSet> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true) // ragged rows are handled below
        .from_reader(reader);

    let mut records = rdr.records();

    let header = match records.next() {
        Some(rec) => rec.context("CSV parse error in header row")?,
        None => bail!("No columns to parse from file"),
    };
    let raw_headers: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(i, h)| {
            if i == 0 {
                h.trim_start_matches('\u{feff}').to_string()
            } else {
                h.to_string()
            }
        })
        .collect();
    let headers = normalize_headers(raw_headers);
    let width = headers.len();

    let mut cells: Vec<Vec<Option<String>>> = Vec::new();
    for (idx, result) in records.enumerate() {
        let record = result.with_context(|| format!("CSV parse error at record {}", idx + 1))?;
        if record.len() > width {
            let line = record.position().map(|p| p.line()).unwrap_or(idx as u64 + 2);
            return Err(anyhow!(
                "Error tokenizing data. Expected {} fields in line {}, saw {}",
                width,
                line,
                record.len()
            ));
        }
        let mut row: Vec<Option<String>> = record
            .iter()
            .map(|s| (!is_missing(s)).then(|| s.to_string()))
            .collect();
        row.resize(width, None);
        cells.push(row);
    }

    let columns: Vec<Column> = headers
        .into_iter()
        .enumerate()
        .map(|(i, name)| {
            let ty = infer_column_type(cells.iter().map(|r| r[i].as_deref()));
            Column { name, ty }
        })
        .collect();

    let rows: Vec<Vec<Value>> = cells
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(&columns)
                .map(|(cell, col)| convert_cell(cell, col.ty))
                .collect()
        })
        .collect();

    if rows.is_empty() {
        warn!("CSV has a header but no rows");
    }
    debug!(
        rows = rows.len(),
        columns = %columns
            .iter()
            .map(|c| format!("{}:{}", c.name, c.ty))
            .collect::<Vec<_>>()
            .join(", "),
        "parsed csv into row set"
    );

    Ok(RowSet { columns, rows })
}
