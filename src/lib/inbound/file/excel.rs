use crate::{
    domain::models::{
        Cell, ColumnSelection, Table,
        table::{MAX_EXACT_FLOAT_INT, parse_datetime},
    },
    error::{LoadError, Result},
    inbound::file::Reader,
};
use calamine::{Data, Reader as CalamineReader, open_workbook_auto};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::fmt;
use std::path::Path;
use tracing::debug;

fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    let excel_epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    let days = serial.floor() as i64;
    let seconds_in_day = (serial.fract() * 86400.0).round() as u32;
    let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds_in_day.min(86399), 0)?;
    let date = excel_epoch.checked_add_signed(chrono::Duration::days(days))?;
    Some(NaiveDateTime::new(date, time))
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Null,
        Data::String(s) if s.is_empty() => Cell::Null,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) if f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT_INT => {
            Cell::Int(*f as i64)
        }
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => Cell::Text(dt.to_string()),
        Data::DateTime(dt) => dt
            .as_datetime()
            .or_else(|| excel_serial_to_datetime(dt.as_f64()))
            .map(Cell::DateTime)
            .unwrap_or(Cell::Null),
        Data::DateTimeIso(s) => parse_datetime(s)
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

/// Worksheet to read, by position or by name. A name made only of digits
/// that matches no worksheet is read as a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sheet {
    Index(usize),
    Name(String),
}

impl Sheet {
    fn resolve<'a>(&self, sheet_names: &'a [String]) -> Option<&'a String> {
        match self {
            Sheet::Index(idx) => sheet_names.get(*idx),
            Sheet::Name(name) => sheet_names.iter().find(|s| *s == name).or_else(|| {
                name.trim()
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| sheet_names.get(idx))
            }),
        }
    }
}

impl Default for Sheet {
    fn default() -> Self {
        Sheet::Index(0)
    }
}

impl From<&str> for Sheet {
    fn from(name: &str) -> Self {
        Sheet::Name(name.to_string())
    }
}

impl From<String> for Sheet {
    fn from(name: String) -> Self {
        Sheet::Name(name)
    }
}

impl From<usize> for Sheet {
    fn from(idx: usize) -> Self {
        Sheet::Index(idx)
    }
}

impl fmt::Display for Sheet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sheet::Index(idx) => write!(f, "#{}", idx),
            Sheet::Name(name) => f.write_str(name),
        }
    }
}

pub trait Excel {
    /// Loads the selected columns of one worksheet.
    fn read_excel(path: &Path, sheet: &Sheet, columns: &ColumnSelection) -> Result<Table>;
}

impl Excel for Reader {
    fn read_excel(path: &Path, sheet: &Sheet, columns: &ColumnSelection) -> Result<Table> {
        let file_name = Self::file_name(path);
        Self::ensure_exists(path)?;
        let workbook_error = |source| LoadError::Workbook {
            file: file_name.clone(),
            source,
        };
        let mut workbook = open_workbook_auto(path).map_err(workbook_error)?;
        let sheet_names = workbook.sheet_names().to_owned();
        let sheet_name = sheet
            .resolve(&sheet_names)
            .cloned()
            .ok_or_else(|| LoadError::SheetNotFound {
                file: file_name.clone(),
                sheet: sheet.to_string(),
                available: sheet_names.clone(),
            })?;
        let range = workbook
            .worksheet_range(&sheet_name)
            .map_err(workbook_error)?;
        let mut rows_iter = range.rows();
        let header: Vec<String> = match rows_iter.next() {
            Some(header_row) => header_row.iter().map(|cell| cell.to_string()).collect(),
            None => {
                return Err(LoadError::MissingHeader(format!(
                    "{}:{}",
                    file_name, sheet_name
                )));
            }
        };
        let indices = columns.resolve(&header, &file_name)?;
        let rows: Vec<Vec<Cell>> = rows_iter
            .filter(|row| row.iter().any(|cell| !cell_from_data(cell).is_null()))
            .map(|row| {
                indices
                    .iter()
                    .map(|&i| row.get(i).map(cell_from_data).unwrap_or(Cell::Null))
                    .collect()
            })
            .collect();
        debug!(
            "Read {} rows from worksheet '{}' of excel file '{}'",
            rows.len(),
            sheet_name,
            file_name
        );
        let selected = indices.iter().map(|&i| header[i].clone()).collect();
        Ok(Table::new(selected, rows))
    }
}
