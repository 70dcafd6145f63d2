//! In-process `Destination` with transaction snapshots, for exercising the
//! write-mode policy without a server. Cells are converted exactly as the
//! bulk load would convert them, so type errors surface here too.

use crate::domain::loader::writer::{ColumnDef, Destination};
use crate::domain::models::{Cell, TableRef};
use crate::error::{LoadError, Result};
use crate::outbound::mssql::sql;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredTable {
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<Cell>>,
}

#[derive(Debug, Default)]
pub struct MemoryDestination {
    tables: HashMap<TableRef, StoredTable>,
    snapshot: Option<HashMap<TableRef, StoredTable>>,
    /// Every trait call, by name, in call order.
    pub operations: Vec<String>,
    pub fail_inserts: bool,
    pub committed: bool,
    pub rolled_back: bool,
}

impl MemoryDestination {
    pub fn seed(&mut self, table: &TableRef, columns: Vec<ColumnDef>, rows: Vec<Vec<Cell>>) {
        self.tables
            .insert(table.clone(), StoredTable { columns, rows });
    }

    pub fn table(&self, table: &TableRef) -> Option<&StoredTable> {
        self.tables.get(table)
    }

    fn record(&mut self, op: &str) {
        self.operations.push(op.to_string());
    }
}

impl Destination for MemoryDestination {
    async fn describe(&mut self, table: &TableRef) -> Result<Option<Vec<ColumnDef>>> {
        self.record("describe");
        Ok(self.tables.get(table).map(|t| t.columns.clone()))
    }

    async fn begin(&mut self) -> Result<()> {
        self.record("begin");
        self.snapshot = Some(self.tables.clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        self.record("commit");
        self.snapshot = None;
        self.committed = true;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.record("rollback");
        if let Some(snapshot) = self.snapshot.take() {
            self.tables = snapshot;
        }
        self.rolled_back = true;
        Ok(())
    }

    async fn drop_table(&mut self, table: &TableRef) -> Result<()> {
        self.record("drop_table");
        self.tables.remove(table);
        Ok(())
    }

    async fn create_table(&mut self, table: &TableRef, columns: &[ColumnDef]) -> Result<()> {
        self.record("create_table");
        if self.tables.contains_key(table) {
            return Err(LoadError::TableExists(table.to_string()));
        }
        self.seed(table, columns.to_vec(), Vec::new());
        Ok(())
    }

    async fn insert_rows(
        &mut self,
        table: &TableRef,
        columns: &[ColumnDef],
        rows: &[Vec<Cell>],
    ) -> Result<u64> {
        self.record("insert_rows");
        if self.fail_inserts {
            return Err(LoadError::InvalidArgument("insert rejected".to_string()));
        }
        for row in rows {
            for (cell, column) in row.iter().zip(columns) {
                sql::column_data(table, column, cell)?;
            }
        }
        let stored = self
            .tables
            .get_mut(table)
            .ok_or_else(|| LoadError::TableNotFound(table.to_string()))?;
        stored.rows.extend_from_slice(rows);
        Ok(rows.len() as u64)
    }
}
