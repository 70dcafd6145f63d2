//! Write-mode policy: decides what happens to the destination table before
//! rows go in, then runs the whole write inside one transaction.

use crate::domain::models::{Cell, SqlType, Table, TableRef, WriteMode};
use crate::error::{LoadError, Result};
use std::borrow::Cow;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Tables up to this many rows are sent as a single chunk.
const SINGLE_CHUNK_MAX_ROWS: usize = 10_000;
const CHUNKS_FOR_LARGE_TABLES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
        }
    }
}

/// Database operations the write-mode policy needs.
#[allow(async_fn_in_trait)]
pub trait Destination {
    /// Columns of `table` in ordinal order, or `None` if it does not exist.
    async fn describe(&mut self, table: &TableRef) -> Result<Option<Vec<ColumnDef>>>;
    async fn begin(&mut self) -> Result<()>;
    async fn commit(&mut self) -> Result<()>;
    async fn rollback(&mut self) -> Result<()>;
    async fn drop_table(&mut self, table: &TableRef) -> Result<()>;
    async fn create_table(&mut self, table: &TableRef, columns: &[ColumnDef]) -> Result<()>;
    /// Rows are already in `columns` order.
    async fn insert_rows(
        &mut self,
        table: &TableRef,
        columns: &[ColumnDef],
        rows: &[Vec<Cell>],
    ) -> Result<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Preparation {
    Create { drop_existing: bool },
    Keep,
}

#[derive(Debug)]
struct WritePlan {
    preparation: Preparation,
    columns: Vec<ColumnDef>,
    /// Source column index for each destination column.
    order: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReport {
    pub rows_written: u64,
    pub table_created: bool,
}

fn schema_mismatch(target: &TableRef, existing: &[ColumnDef], table: &Table) -> LoadError {
    LoadError::SchemaMismatch {
        table: target.to_string(),
        existing: existing.iter().map(|c| c.name.clone()).collect(),
        incoming: table.columns().to_vec(),
    }
}

fn plan_write(
    table: &Table,
    target: &TableRef,
    mode: WriteMode,
    existing: Option<Vec<ColumnDef>>,
) -> Result<WritePlan> {
    if table.columns().is_empty() {
        return Err(LoadError::InvalidArgument(format!(
            "no columns to write to {}",
            target
        )));
    }
    let mut seen = HashSet::new();
    for name in table.columns() {
        if !seen.insert(name.to_lowercase()) {
            return Err(LoadError::InvalidArgument(format!(
                "column '{}' appears more than once",
                name
            )));
        }
    }
    match (mode, existing) {
        (WriteMode::Fail, Some(_)) => Err(LoadError::TableExists(target.to_string())),
        (WriteMode::Append, None) => Err(LoadError::TableNotFound(target.to_string())),
        (WriteMode::Append, Some(existing)) => {
            if existing.len() != table.columns().len() {
                return Err(schema_mismatch(target, &existing, table));
            }
            let order = existing
                .iter()
                .map(|def| {
                    table
                        .columns()
                        .iter()
                        .position(|c| c.eq_ignore_ascii_case(&def.name))
                })
                .collect::<Option<Vec<usize>>>()
                .ok_or_else(|| schema_mismatch(target, &existing, table))?;
            Ok(WritePlan {
                preparation: Preparation::Keep,
                columns: existing,
                order,
            })
        }
        (WriteMode::Replace | WriteMode::Fail, existing) => {
            let columns = table
                .columns()
                .iter()
                .zip(table.column_types())
                .map(|(name, sql_type)| ColumnDef::new(name.clone(), sql_type))
                .collect();
            Ok(WritePlan {
                preparation: Preparation::Create {
                    drop_existing: existing.is_some(),
                },
                columns,
                order: (0..table.columns().len()).collect(),
            })
        }
    }
}

/// Rows per insert call: the whole table when small, a tenth of it otherwise.
pub fn chunk_size(total_rows: usize) -> usize {
    if total_rows > SINGLE_CHUNK_MAX_ROWS {
        total_rows / CHUNKS_FOR_LARGE_TABLES
    } else {
        total_rows.max(1)
    }
}

pub fn chunker<T>(rows: &[T], size: usize) -> Result<std::slice::Chunks<'_, T>> {
    if size == 0 {
        return Err(LoadError::InvalidArgument(
            "chunk size must be greater than zero".to_string(),
        ));
    }
    Ok(rows.chunks(size))
}

fn log_progress(target: &TableRef, written: u64, total: usize, started: Instant) {
    let pct = if total > 0 {
        (written as f64 / total as f64) * 100.0
    } else {
        100.0
    };
    info!(
        "Progress [{}]: {}/{} rows ({:.1}%) in {:.1}s",
        target,
        written,
        total,
        pct,
        started.elapsed().as_secs_f64()
    );
}

async fn apply<D: Destination>(
    dest: &mut D,
    table: &Table,
    target: &TableRef,
    plan: &WritePlan,
) -> Result<u64> {
    if let Preparation::Create { drop_existing } = plan.preparation {
        if drop_existing {
            dest.drop_table(target).await?;
            debug!("Dropped table {}", target);
        }
        dest.create_table(target, &plan.columns).await?;
        debug!("Created table {} with {} columns", target, plan.columns.len());
    }
    let identity = plan.order.iter().enumerate().all(|(i, &src)| i == src);
    let ordered: Cow<'_, Table> = if identity {
        Cow::Borrowed(table)
    } else {
        Cow::Owned(table.select(&plan.order))
    };
    let started = Instant::now();
    let mut written = 0u64;
    for chunk in chunker(ordered.rows(), chunk_size(ordered.len()))? {
        written += dest.insert_rows(target, &plan.columns, chunk).await?;
        log_progress(target, written, ordered.len(), started);
    }
    Ok(written)
}

/// Applies `mode` to `target` and inserts every row of `table`.
pub async fn write_table<D: Destination>(
    dest: &mut D,
    table: &Table,
    target: &TableRef,
    mode: WriteMode,
) -> Result<WriteReport> {
    let existing = dest.describe(target).await?;
    let plan = plan_write(table, target, mode, existing)?;
    dest.begin().await?;
    match apply(dest, table, target, &plan).await {
        Ok(rows_written) => {
            dest.commit().await?;
            Ok(WriteReport {
                rows_written,
                table_created: matches!(plan.preparation, Preparation::Create { .. }),
            })
        }
        Err(e) => {
            if let Err(rollback_err) = dest.rollback().await {
                warn!("Rollback on {} failed: {}", target, rollback_err);
            }
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outbound::memory::MemoryDestination;

    fn people() -> Table {
        Table::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Cell::Int(1), Cell::Text("Alice".into())],
                vec![Cell::Int(2), Cell::Text("Bob".into())],
            ],
        )
    }

    fn target() -> TableRef {
        TableRef::new("dbo", "people")
    }

    #[tokio::test]
    async fn replace_creates_missing_table() {
        let mut dest = MemoryDestination::default();
        let report = write_table(&mut dest, &people(), &target(), WriteMode::Replace)
            .await
            .unwrap();
        assert_eq!(report.rows_written, 2);
        assert!(report.table_created);
        let stored = dest.table(&target()).unwrap();
        assert_eq!(
            stored.columns,
            vec![
                ColumnDef::new("id", SqlType::BigInt),
                ColumnDef::new("name", SqlType::Text)
            ]
        );
        assert_eq!(stored.rows, people().rows().to_vec());
        assert!(dest.committed);
    }

    #[tokio::test]
    async fn replace_drops_incompatible_table() {
        let mut dest = MemoryDestination::default();
        dest.seed(
            &target(),
            vec![ColumnDef::new("other", SqlType::Bit)],
            vec![vec![Cell::Bool(true)]; 5],
        );
        write_table(&mut dest, &people(), &target(), WriteMode::Replace)
            .await
            .unwrap();
        let stored = dest.table(&target()).unwrap();
        assert_eq!(stored.columns.len(), 2);
        assert_eq!(stored.rows.len(), 2);
    }

    #[tokio::test]
    async fn fail_refuses_existing_table_without_writing() {
        let mut dest = MemoryDestination::default();
        dest.seed(&target(), vec![ColumnDef::new("id", SqlType::BigInt)], vec![]);
        let err = write_table(&mut dest, &people(), &target(), WriteMode::Fail)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::TableExists(ref t) if t == "dbo.people"));
        assert!(dest.operations.iter().all(|op| op == "describe"));
        assert!(dest.table(&target()).unwrap().rows.is_empty());
    }

    #[tokio::test]
    async fn fail_creates_when_absent() {
        let mut dest = MemoryDestination::default();
        let report = write_table(&mut dest, &people(), &target(), WriteMode::Fail)
            .await
            .unwrap();
        assert_eq!(report.rows_written, 2);
        assert!(dest.table(&target()).is_some());
    }

    #[tokio::test]
    async fn append_reorders_to_destination_columns() {
        let mut dest = MemoryDestination::default();
        dest.seed(
            &target(),
            vec![
                ColumnDef::new("NAME", SqlType::Text),
                ColumnDef::new("ID", SqlType::Int),
            ],
            vec![vec![Cell::Text("Zed".into()), Cell::Int(0)]],
        );
        let report = write_table(&mut dest, &people(), &target(), WriteMode::Append)
            .await
            .unwrap();
        assert!(!report.table_created);
        let stored = dest.table(&target()).unwrap();
        assert_eq!(stored.rows.len(), 3);
        assert_eq!(stored.rows[1], vec![Cell::Text("Alice".into()), Cell::Int(1)]);
    }

    #[tokio::test]
    async fn append_with_mismatched_columns_leaves_table_unchanged() {
        let mut dest = MemoryDestination::default();
        let original = vec![vec![Cell::Int(9), Cell::Text("x".into()), Cell::Int(40)]];
        dest.seed(
            &target(),
            vec![
                ColumnDef::new("id", SqlType::BigInt),
                ColumnDef::new("name", SqlType::Text),
                ColumnDef::new("age", SqlType::BigInt),
            ],
            original.clone(),
        );
        let err = write_table(&mut dest, &people(), &target(), WriteMode::Append)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::SchemaMismatch { .. }));
        assert_eq!(dest.table(&target()).unwrap().rows, original);

        dest.seed(
            &target(),
            vec![
                ColumnDef::new("id", SqlType::BigInt),
                ColumnDef::new("email", SqlType::Text),
            ],
            vec![],
        );
        let err = write_table(&mut dest, &people(), &target(), WriteMode::Append)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::SchemaMismatch { .. }));
    }

    #[tokio::test]
    async fn append_value_that_does_not_fit_rolls_back() {
        let mut dest = MemoryDestination::default();
        let original = vec![vec![Cell::Int(1), Cell::Text("Alice".into())]];
        dest.seed(
            &target(),
            vec![
                ColumnDef::new("id", SqlType::BigInt),
                ColumnDef::new("name", SqlType::Text),
            ],
            original.clone(),
        );
        let incoming = Table::new(
            vec!["id".into(), "name".into()],
            vec![
                vec![Cell::Int(2), Cell::Text("Bob".into())],
                vec![Cell::Text("abc".into()), Cell::Text("Carol".into())],
            ],
        );
        let err = write_table(&mut dest, &incoming, &target(), WriteMode::Append)
            .await
            .unwrap_err();
        match err {
            LoadError::Conversion {
                column, value, sql_type, ..
            } => {
                assert_eq!(column, "id");
                assert_eq!(value, "abc");
                assert_eq!(sql_type, "BIGINT");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(dest.rolled_back);
        assert_eq!(dest.table(&target()).unwrap().rows, original);
    }

    #[tokio::test]
    async fn append_converts_into_decimal_columns() {
        let mut dest = MemoryDestination::default();
        dest.seed(
            &target(),
            vec![
                ColumnDef::new("id", SqlType::from_data_type("numeric", Some(10), Some(0))),
                ColumnDef::new("name", SqlType::Other("ntext".into())),
            ],
            vec![],
        );
        let report = write_table(&mut dest, &people(), &target(), WriteMode::Append)
            .await
            .unwrap();
        assert_eq!(report.rows_written, 2);
    }

    #[tokio::test]
    async fn append_to_missing_table_fails() {
        let mut dest = MemoryDestination::default();
        let err = write_table(&mut dest, &people(), &target(), WriteMode::Append)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::TableNotFound(_)));
    }

    #[tokio::test]
    async fn failed_insert_rolls_back_replace() {
        let mut dest = MemoryDestination::default();
        let original = vec![vec![Cell::Int(7)]];
        dest.seed(
            &target(),
            vec![ColumnDef::new("id", SqlType::BigInt)],
            original.clone(),
        );
        dest.fail_inserts = true;
        let err = write_table(&mut dest, &people(), &target(), WriteMode::Replace)
            .await
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidArgument(_)));
        assert!(dest.rolled_back);
        let stored = dest.table(&target()).unwrap();
        assert_eq!(stored.columns, vec![ColumnDef::new("id", SqlType::BigInt)]);
        assert_eq!(stored.rows, original);
    }

    #[tokio::test]
    async fn empty_table_still_creates_destination() {
        let mut dest = MemoryDestination::default();
        let empty = Table::new(vec!["id".into()], vec![]);
        let report = write_table(&mut dest, &empty, &target(), WriteMode::Replace)
            .await
            .unwrap();
        assert_eq!(report.rows_written, 0);
        assert!(dest.table(&target()).is_some());
    }

    #[test]
    fn rejects_duplicate_or_missing_columns() {
        let dup = Table::new(vec!["id".into(), "ID".into()], vec![]);
        assert!(matches!(
            plan_write(&dup, &target(), WriteMode::Replace, None),
            Err(LoadError::InvalidArgument(_))
        ));
        assert!(matches!(
            plan_write(&Table::default(), &target(), WriteMode::Replace, None),
            Err(LoadError::InvalidArgument(_))
        ));
    }

    #[test]
    fn chunks_large_tables_into_tenths() {
        assert_eq!(chunk_size(0), 1);
        assert_eq!(chunk_size(10_000), 10_000);
        assert_eq!(chunk_size(25_000), 2_500);
        let rows = vec![0; 25_000];
        assert_eq!(chunker(&rows, chunk_size(rows.len())).unwrap().count(), 10);
        assert!(chunker(&rows, 0).is_err());
    }
}
