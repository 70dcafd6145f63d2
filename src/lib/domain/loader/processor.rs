use crate::config::Credentials;
use crate::domain::loader::summary::LoadSummary;
use crate::domain::loader::writer::{Destination, write_table};
use crate::domain::models::{ColumnSelection, Table, WriteMode};
use crate::error::Result;
use crate::inbound::file::{Csv, Excel, Reader, Sheet};
use crate::outbound::mssql::MssqlDestination;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

async fn load<D: Destination>(
    dest: &mut D,
    source: &Path,
    table: &Table,
    credentials: &Credentials,
    mode: WriteMode,
    started: Instant,
) -> Result<LoadSummary> {
    let target = credentials.target();
    info!(
        "Writing {} rows from '{}' to {} (mode: {})",
        table.len(),
        Reader::file_name(source),
        target,
        mode
    );
    let report = write_table(dest, table, &target, mode).await?;
    Ok(LoadSummary {
        source: source.display().to_string(),
        target,
        mode,
        rows_read: table.len(),
        rows_written: report.rows_written,
        table_created: report.table_created,
        runtime_secs: started.elapsed().as_secs_f64(),
    })
}

/// Opens a connection, writes, and closes the connection whatever the outcome.
async fn load_into_mssql(
    source: &Path,
    table: &Table,
    credentials: &Credentials,
    mode: WriteMode,
    started: Instant,
) -> Result<LoadSummary> {
    let mut dest = MssqlDestination::connect(credentials).await?;
    let result = load(&mut dest, source, table, credentials, mode, started).await;
    dest.close().await;
    result
}

/// Loads one csv file into the table named by its credentials.
#[derive(Debug, Clone)]
pub struct CsvToMssql {
    csv_path: PathBuf,
    credentials: Credentials,
}

impl CsvToMssql {
    pub fn new(csv_path: impl Into<PathBuf>, credentials: Credentials) -> Self {
        Self {
            csv_path: csv_path.into(),
            credentials,
        }
    }

    pub fn path(&self) -> &Path {
        &self.csv_path
    }

    pub fn read(&self, columns: &ColumnSelection, sep: char, encoding: &str) -> Result<Table> {
        <Reader as Csv>::read_csv(&self.csv_path, columns, sep, encoding)
    }

    /// Reads the file, then connects and writes it. A read failure never opens a connection.
    pub async fn csv_to_mssql(
        &self,
        columns: &ColumnSelection,
        sep: char,
        encoding: &str,
        action: WriteMode,
    ) -> Result<LoadSummary> {
        let started = Instant::now();
        let table = self.read(columns, sep, encoding)?;
        load_into_mssql(&self.csv_path, &table, &self.credentials, action, started).await
    }

    /// Same pipeline against a caller-supplied destination.
    pub async fn csv_to_destination<D: Destination>(
        &self,
        dest: &mut D,
        columns: &ColumnSelection,
        sep: char,
        encoding: &str,
        action: WriteMode,
    ) -> Result<LoadSummary> {
        let started = Instant::now();
        let table = self.read(columns, sep, encoding)?;
        load(dest, &self.csv_path, &table, &self.credentials, action, started).await
    }
}

/// Loads one worksheet into the table named by its credentials.
#[derive(Debug, Clone)]
pub struct ExcelToMssql {
    excel_path: PathBuf,
    credentials: Credentials,
}

impl ExcelToMssql {
    pub fn new(excel_path: impl Into<PathBuf>, credentials: Credentials) -> Self {
        Self {
            excel_path: excel_path.into(),
            credentials,
        }
    }

    pub fn path(&self) -> &Path {
        &self.excel_path
    }

    pub fn read(&self, sheet: &Sheet, columns: &ColumnSelection) -> Result<Table> {
        <Reader as Excel>::read_excel(&self.excel_path, sheet, columns)
    }

    pub async fn excel_to_mssql(
        &self,
        sheet: &Sheet,
        columns: &ColumnSelection,
        action: WriteMode,
    ) -> Result<LoadSummary> {
        let started = Instant::now();
        let table = self.read(sheet, columns)?;
        load_into_mssql(&self.excel_path, &table, &self.credentials, action, started).await
    }

    pub async fn excel_to_destination<D: Destination>(
        &self,
        dest: &mut D,
        sheet: &Sheet,
        columns: &ColumnSelection,
        action: WriteMode,
    ) -> Result<LoadSummary> {
        let started = Instant::now();
        let table = self.read(sheet, columns)?;
        load(dest, &self.excel_path, &table, &self.credentials, action, started).await
    }
}
