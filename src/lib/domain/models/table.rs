use crate::domain::models::column_type::SqlType;
use crate::error::{LoadError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;

/// A single value read from a spreadsheet or csv file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
}

/// Accepts `2024-03-01T12:30:00[.fff]`, `2024-03-01 12:30:00[.fff]` and bare dates.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Largest integer an f64 carries without rounding.
pub const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(i) => Some(*i),
            Cell::Float(f) if f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT_INT => {
                Some(*f as i64)
            }
            Cell::Bool(b) => Some(i64::from(*b)),
            Cell::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Int(i) => Some(*i as f64),
            Cell::Float(f) => Some(*f),
            Cell::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Cell::Text(s) => s.trim().parse().ok().filter(|f: &f64| f.is_finite()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Cell::Bool(b) => Some(*b),
            Cell::Int(0) => Some(false),
            Cell::Int(1) => Some(true),
            Cell::Text(s) => match s.trim().to_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::DateTime(dt) => Some(*dt),
            Cell::Text(s) => parse_datetime(s),
            _ => None,
        }
    }

    /// Types a raw csv field the way a column-typed reader would see it alone.
    pub fn parse_field(raw: &str) -> Self {
        if raw.is_empty() {
            return Cell::Null;
        }
        if let Ok(i) = raw.parse::<i64>() {
            return Cell::Int(i);
        }
        // Non-finite spellings (`NaN`, `inf`) stay text.
        if let Some(f) = raw.parse::<f64>().ok().filter(|f| f.is_finite()) {
            return Cell::Float(f);
        }
        match raw.to_lowercase().as_str() {
            "true" => Cell::Bool(true),
            "false" => Cell::Bool(false),
            _ => Cell::Text(raw.to_string()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Bool(b) => write!(f, "{}", b),
            Cell::Int(i) => write!(f, "{}", i),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// Ordered subset of source columns to load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ColumnSelection {
    /// Every column, in source order.
    #[default]
    All,
    Only(Vec<String>),
}

impl ColumnSelection {
    pub fn only<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ColumnSelection::Only(columns.into_iter().map(Into::into).collect())
    }

    /// Maps the selection onto header positions, in selection order.
    pub fn resolve(&self, header: &[String], file_name: &str) -> Result<Vec<usize>> {
        let requested = match self {
            ColumnSelection::All => return Ok((0..header.len()).collect()),
            ColumnSelection::Only(requested) => requested,
        };
        if requested.is_empty() {
            return Err(LoadError::InvalidArgument(
                "column selection is empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        let mut indices = Vec::with_capacity(requested.len());
        for column in requested {
            if !seen.insert(column.as_str()) {
                return Err(LoadError::InvalidArgument(format!(
                    "column '{}' is selected more than once",
                    column
                )));
            }
            let idx = header
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| LoadError::Column {
                    file: file_name.to_string(),
                    column: column.clone(),
                    available: header.to_vec(),
                })?;
            indices.push(idx);
        }
        Ok(indices)
    }
}

impl<S: Into<String>> FromIterator<S> for ColumnSelection {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        ColumnSelection::only(iter)
    }
}

/// Rows and columns held in memory between reading and writing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Short rows are padded with nulls, long rows truncated to the column count.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, Cell::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = &Cell> {
        self.rows.iter().map(move |row| &row[idx])
    }

    /// New table with columns taken from `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Table {
        let columns = indices.iter().map(|&i| self.columns[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Table { columns, rows }
    }

    pub fn column_types(&self) -> Vec<SqlType> {
        (0..self.columns.len())
            .map(|idx| SqlType::infer(self.column(idx)))
            .collect()
    }

    /// Collapses each csv column to one type: a column that is not wholly
    /// numeric or wholly boolean is kept as its original text.
    pub fn from_text_columns(columns: Vec<String>, raw_rows: Vec<Vec<String>>) -> Self {
        let width = columns.len();
        let mut rows: Vec<Vec<Cell>> = raw_rows
            .iter()
            .map(|raw| {
                (0..width)
                    .map(|i| Cell::parse_field(raw.get(i).map(String::as_str).unwrap_or("")))
                    .collect()
            })
            .collect();
        for idx in 0..width {
            let kind = SqlType::infer(rows.iter().map(|row| &row[idx]));
            for (row, raw) in rows.iter_mut().zip(&raw_rows) {
                let replacement = match (&kind, &row[idx]) {
                    (SqlType::Float, Cell::Int(i)) => Some(Cell::Float(*i as f64)),
                    (SqlType::Text, Cell::Int(_) | Cell::Float(_) | Cell::Bool(_)) => {
                        Some(Cell::Text(raw.get(idx).cloned().unwrap_or_default()))
                    }
                    _ => None,
                };
                if let Some(cell) = replacement {
                    row[idx] = cell;
                }
            }
        }
        Self { columns, rows }
    }

    /// First `n` rows keyed by column name, for previews and logs.
    pub fn preview(&self, n: usize) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .take(n)
            .map(|row| {
                let record: serde_json::Map<String, serde_json::Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(name, cell)| {
                        (
                            name.clone(),
                            serde_json::to_value(cell).unwrap_or(serde_json::Value::Null),
                        )
                    })
                    .collect();
                serde_json::Value::Object(record)
            })
            .collect()
    }
}
