//! T-SQL text and TDS value conversion. Nothing here touches the network.

use crate::domain::loader::writer::ColumnDef;
use crate::domain::models::{Cell, SqlType, TableRef, table_ref::quote_ident};
use crate::error::{LoadError, Result};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::borrow::Cow;
use tiberius::numeric::Numeric;
use tiberius::{ColumnData, ToSql};

/// Maximum string length (in bytes) sent through TDS bulk insert.
pub const BULK_INSERT_STRING_LIMIT: usize = 65535;

/// SQL Server caps one statement at 2100 parameters.
const MAX_PARAMS_PER_STATEMENT: usize = 2000;

pub const DESCRIBE_TABLE_SQL: &str = "SELECT COLUMN_NAME, DATA_TYPE, NUMERIC_PRECISION, NUMERIC_SCALE \
     FROM INFORMATION_SCHEMA.COLUMNS \
     WHERE TABLE_SCHEMA = @P1 AND TABLE_NAME = @P2 \
     ORDER BY ORDINAL_POSITION";

pub fn drop_table_sql(table: &TableRef) -> String {
    format!(
        "IF OBJECT_ID(N'{}', 'U') IS NOT NULL DROP TABLE {}",
        table.quoted().replace('\'', "''"),
        table.quoted()
    )
}

pub fn create_table_sql(table: &TableRef, columns: &[ColumnDef]) -> String {
    let column_defs: Vec<String> = columns
        .iter()
        .map(|c| format!("{} {} NULL", quote_ident(&c.name), c.sql_type.ddl()))
        .collect();
    format!("CREATE TABLE {} ({})", table.quoted(), column_defs.join(", "))
}

pub fn row_has_oversized_strings(row: &[Cell]) -> bool {
    row.iter()
        .any(|cell| matches!(cell, Cell::Text(s) if s.len() > BULK_INSERT_STRING_LIMIT))
}

/// Rows per multi-row `INSERT`, bounded by the parameter limit.
pub fn insert_batch_rows(column_count: usize) -> usize {
    (MAX_PARAMS_PER_STATEMENT / column_count.max(1)).clamp(1, 1000)
}

/// Multi-row parameterized `INSERT` for `row_count` rows; nulls are inlined
/// so only non-null cells consume a parameter slot.
pub fn insert_sql(table: &TableRef, columns: &[ColumnDef], rows: &[Vec<Cell>]) -> String {
    let col_list: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
    let mut param_idx = 1;
    let value_groups: Vec<String> = rows
        .iter()
        .map(|row| {
            let placeholders: Vec<String> = row
                .iter()
                .map(|cell| {
                    if cell.is_null() {
                        "NULL".to_string()
                    } else {
                        let p = format!("@P{}", param_idx);
                        param_idx += 1;
                        p
                    }
                })
                .collect();
            format!("({})", placeholders.join(", "))
        })
        .collect();
    format!(
        "INSERT INTO {} ({}) VALUES {}",
        table.quoted(),
        col_list.join(", "),
        value_groups.join(", ")
    )
}

fn null_column_data(sql_type: &SqlType) -> ColumnData<'static> {
    match sql_type {
        SqlType::BigInt => ColumnData::I64(None),
        SqlType::Int => ColumnData::I32(None),
        SqlType::SmallInt => ColumnData::I16(None),
        SqlType::TinyInt => ColumnData::U8(None),
        SqlType::Float => ColumnData::F64(None),
        SqlType::Real => ColumnData::F32(None),
        SqlType::Bit => ColumnData::Bit(None),
        SqlType::Decimal { .. } => ColumnData::Numeric(None),
        SqlType::DateTime2 => ColumnData::DateTime2(None),
        SqlType::DateTime => ColumnData::DateTime(None),
        SqlType::SmallDateTime => ColumnData::SmallDateTime(None),
        SqlType::Date => ColumnData::Date(None),
        SqlType::Text | SqlType::Other(_) => ColumnData::String(None),
    }
}

fn days_since(date: NaiveDate, epoch: NaiveDate) -> i64 {
    (date - epoch).num_days()
}

fn to_date(date: NaiveDate) -> Option<tiberius::time::Date> {
    let epoch = NaiveDate::from_ymd_opt(1, 1, 1)?;
    let days = u32::try_from(days_since(date, epoch)).ok()?;
    Some(tiberius::time::Date::new(days))
}

fn to_datetime2(dt: &NaiveDateTime) -> Option<tiberius::time::DateTime2> {
    let date = to_date(dt.date())?;
    let time = dt.time();
    let nanos =
        time.num_seconds_from_midnight() as u64 * 1_000_000_000 + time.nanosecond() as u64;
    let increments = nanos / 100;
    Some(tiberius::time::DateTime2::new(
        date,
        tiberius::time::Time::new(increments, 7),
    ))
}

/// Legacy `DATETIME`: days since 1900-01-01 plus 1/300 second ticks.
fn to_legacy_datetime(dt: &NaiveDateTime) -> Option<tiberius::time::DateTime> {
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1)?;
    let days = i32::try_from(days_since(dt.date(), epoch)).ok()?;
    let time = dt.time();
    let millis = time.num_seconds_from_midnight() as u64 * 1000
        + (time.nanosecond() as u64 / 1_000_000).min(999);
    let fragments = u32::try_from(millis * 300 / 1000).ok()?;
    Some(tiberius::time::DateTime::new(days, fragments))
}

/// `SMALLDATETIME`: days since 1900-01-01 plus minutes, rounded to the nearest minute.
fn to_small_datetime(dt: &NaiveDateTime) -> Option<tiberius::time::SmallDateTime> {
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1)?;
    let mut days = days_since(dt.date(), epoch);
    let mut minutes = (dt.time().num_seconds_from_midnight() + 30) / 60;
    if minutes == 24 * 60 {
        days += 1;
        minutes = 0;
    }
    Some(tiberius::time::SmallDateTime::new(
        u16::try_from(days).ok()?,
        u16::try_from(minutes).ok()?,
    ))
}

/// Exact decimal text to a mantissa at `scale`, rounding half away from zero.
fn parse_decimal(text: &str, scale: u8) -> Option<i128> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let scale = usize::from(scale);
    let mut scaled = String::with_capacity(whole.len() + scale);
    scaled.push_str(whole);
    scaled.extend(frac.chars().chain(std::iter::repeat('0')).take(scale));
    let mut mantissa: i128 = if scaled.is_empty() {
        0
    } else {
        scaled.parse().ok()?
    };
    if frac.len() > scale && frac.as_bytes()[scale] >= b'5' {
        mantissa = mantissa.checked_add(1)?;
    }
    Some(if negative { -mantissa } else { mantissa })
}

/// Cell as a `DECIMAL(precision, scale)` value; `None` if it overflows the precision.
fn to_numeric(cell: &Cell, precision: u8, scale: u8) -> Option<Numeric> {
    let factor = 10i128.checked_pow(u32::from(scale))?;
    let mantissa = match cell {
        Cell::Int(i) => i128::from(*i).checked_mul(factor)?,
        Cell::Bool(b) => i128::from(*b) * factor,
        Cell::Float(f) => {
            let scaled = (f * factor as f64).round();
            if !scaled.is_finite() || scaled.abs() >= 1e38 {
                return None;
            }
            scaled as i128
        }
        Cell::Text(s) => parse_decimal(s.trim(), scale)?,
        _ => return None,
    };
    let limit = 10u128.checked_pow(u32::from(precision))?;
    (mantissa.unsigned_abs() < limit).then(|| Numeric::new_with_scale(mantissa, scale))
}

/// Converts a cell into the TDS value for a column of `sql_type`.
/// Returns `None` when the value cannot be represented in that type.
pub fn cell_to_column_data(cell: &Cell, sql_type: &SqlType) -> Option<ColumnData<'static>> {
    if cell.is_null() {
        return Some(null_column_data(sql_type));
    }
    let data = match sql_type {
        SqlType::BigInt => ColumnData::I64(Some(cell.as_i64()?)),
        SqlType::Int => ColumnData::I32(Some(i32::try_from(cell.as_i64()?).ok()?)),
        SqlType::SmallInt => ColumnData::I16(Some(i16::try_from(cell.as_i64()?).ok()?)),
        SqlType::TinyInt => ColumnData::U8(Some(u8::try_from(cell.as_i64()?).ok()?)),
        SqlType::Float => {
            let v = cell.as_f64()?;
            ColumnData::F64(v.is_finite().then_some(v))
        }
        SqlType::Real => {
            let v = cell.as_f64()? as f32;
            ColumnData::F32(v.is_finite().then_some(v))
        }
        SqlType::Bit => ColumnData::Bit(Some(cell.as_bool()?)),
        SqlType::Decimal { precision, scale } => {
            ColumnData::Numeric(Some(to_numeric(cell, *precision, *scale)?))
        }
        SqlType::DateTime2 => ColumnData::DateTime2(Some(to_datetime2(&cell.as_datetime()?)?)),
        SqlType::DateTime => {
            ColumnData::DateTime(Some(to_legacy_datetime(&cell.as_datetime()?)?))
        }
        SqlType::SmallDateTime => {
            ColumnData::SmallDateTime(Some(to_small_datetime(&cell.as_datetime()?)?))
        }
        SqlType::Date => ColumnData::Date(Some(to_date(cell.as_datetime()?.date())?)),
        SqlType::Text | SqlType::Other(_) => {
            ColumnData::String(Some(Cow::Owned(cell.to_string())))
        }
    };
    Some(data)
}

/// Parameter for the `INSERT` fallback; nulls never reach here.
pub fn cell_to_sql_param(cell: &Cell, sql_type: &SqlType) -> Option<Box<dyn ToSql>> {
    let param: Box<dyn ToSql> = match sql_type {
        SqlType::BigInt | SqlType::Int | SqlType::SmallInt | SqlType::TinyInt => {
            Box::new(cell.as_i64()?)
        }
        SqlType::Float | SqlType::Real => Box::new(cell.as_f64()?),
        SqlType::Bit => Box::new(cell.as_bool()?),
        SqlType::Decimal { precision, scale } => Box::new(to_numeric(cell, *precision, *scale)?),
        SqlType::DateTime2 | SqlType::DateTime | SqlType::SmallDateTime | SqlType::Date => {
            Box::new(cell.as_datetime()?)
        }
        SqlType::Text | SqlType::Other(_) => Box::new(cell.to_string()),
    };
    Some(param)
}

pub fn conversion_error(table: &TableRef, column: &ColumnDef, cell: &Cell) -> LoadError {
    LoadError::Conversion {
        table: table.to_string(),
        column: column.name.clone(),
        value: cell.to_string(),
        sql_type: column.sql_type.ddl(),
    }
}

/// Checked form of [`cell_to_column_data`] for one destination column.
pub fn column_data(
    table: &TableRef,
    column: &ColumnDef,
    cell: &Cell,
) -> Result<ColumnData<'static>> {
    cell_to_column_data(cell, &column.sql_type).ok_or_else(|| conversion_error(table, column, cell))
}
