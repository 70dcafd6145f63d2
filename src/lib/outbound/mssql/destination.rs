use crate::config::Credentials;
use crate::domain::loader::writer::{ColumnDef, Destination};
use crate::domain::models::{Cell, SqlType, TableRef};
use crate::error::{LoadError, Result};
use crate::outbound::mssql::{MssqlClient, connect, sql};
use tiberius::{ToSql, TokenRow};
use tracing::{debug, warn};

/// Single SQL Server connection used for one load.
pub struct MssqlDestination {
    client: MssqlClient,
}

fn token_row(table: &TableRef, columns: &[ColumnDef], row: &[Cell]) -> Result<TokenRow<'static>> {
    let mut token_row = TokenRow::new();
    for (cell, column) in row.iter().zip(columns) {
        token_row.push(sql::column_data(table, column, cell)?);
    }
    Ok(token_row)
}

fn insert_params(
    table: &TableRef,
    columns: &[ColumnDef],
    rows: &[Vec<Cell>],
) -> Result<Vec<Box<dyn ToSql>>> {
    let mut params = Vec::new();
    for row in rows {
        for (cell, column) in row.iter().zip(columns) {
            if cell.is_null() {
                continue;
            }
            let param = sql::cell_to_sql_param(cell, &column.sql_type)
                .ok_or_else(|| sql::conversion_error(table, column, cell))?;
            params.push(param);
        }
    }
    Ok(params)
}

impl MssqlDestination {
    pub fn new(client: MssqlClient) -> Self {
        Self { client }
    }

    pub async fn connect(credentials: &Credentials) -> Result<Self> {
        Ok(Self::new(connect(credentials).await?))
    }

    pub async fn close(self) {
        if let Err(e) = self.client.close().await {
            warn!("Failed to close SQL Server connection cleanly: {}", e);
        }
    }

    /// Runs a batch outside `sp_executesql` so transaction state survives it.
    async fn run(&mut self, context: &str, statement: &str) -> Result<()> {
        self.client
            .simple_query(statement)
            .await
            .map_err(|e| LoadError::database(context, e))?
            .into_results()
            .await
            .map_err(|e| LoadError::database(context, e))?;
        Ok(())
    }

    async fn bulk_insert(
        &mut self,
        table: &TableRef,
        columns: &[ColumnDef],
        rows: &[&Vec<Cell>],
    ) -> Result<u64> {
        let db_error = |e| LoadError::database(table.to_string(), e);
        let qualified = table.quoted();
        let mut request = self.client.bulk_insert(&qualified).await.map_err(db_error)?;
        for row in rows {
            request.send(token_row(table, columns, row)?).await.map_err(db_error)?;
        }
        let result = request.finalize().await.map_err(db_error)?;
        Ok(result.total())
    }

    /// Parameterized multi-row `INSERT` for rows the bulk path cannot carry.
    async fn insert_fallback(
        &mut self,
        table: &TableRef,
        columns: &[ColumnDef],
        rows: &[Vec<Cell>],
    ) -> Result<u64> {
        let mut inserted = 0u64;
        for batch in rows.chunks(sql::insert_batch_rows(columns.len())) {
            let statement = sql::insert_sql(table, columns, batch);
            let params = insert_params(table, columns, batch)?;
            let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
            let result = self
                .client
                .execute(statement.as_str(), &param_refs)
                .await
                .map_err(|e| LoadError::database(table.to_string(), e))?;
            inserted += result.total();
        }
        Ok(inserted)
    }
}

impl Destination for MssqlDestination {
    async fn describe(&mut self, table: &TableRef) -> Result<Option<Vec<ColumnDef>>> {
        let db_error = |e| LoadError::database(table.to_string(), e);
        let rows = self
            .client
            .query(sql::DESCRIBE_TABLE_SQL, &[&table.schema, &table.name])
            .await
            .map_err(db_error)?
            .into_first_result()
            .await
            .map_err(db_error)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let name: Option<&str> = row.try_get(0).map_err(db_error)?;
            let data_type: Option<&str> = row.try_get(1).map_err(db_error)?;
            let precision: Option<u8> = row.try_get(2).map_err(db_error)?;
            let scale: Option<i32> = row.try_get(3).map_err(db_error)?;
            columns.push(ColumnDef::new(
                name.unwrap_or_default(),
                SqlType::from_data_type(
                    data_type.unwrap_or_default(),
                    precision,
                    scale.and_then(|s| u8::try_from(s).ok()),
                ),
            ));
        }
        debug!("Table {} has {} columns", table, columns.len());
        Ok(Some(columns))
    }

    async fn begin(&mut self) -> Result<()> {
        self.run("transaction", "BEGIN TRANSACTION").await
    }

    async fn commit(&mut self) -> Result<()> {
        self.run("transaction", "COMMIT TRANSACTION").await
    }

    async fn rollback(&mut self) -> Result<()> {
        self.run("transaction", "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
    }

    async fn drop_table(&mut self, table: &TableRef) -> Result<()> {
        self.run(&table.to_string(), &sql::drop_table_sql(table)).await
    }

    async fn create_table(&mut self, table: &TableRef, columns: &[ColumnDef]) -> Result<()> {
        self.run(&table.to_string(), &sql::create_table_sql(table, columns)).await
    }

    async fn insert_rows(
        &mut self,
        table: &TableRef,
        columns: &[ColumnDef],
        rows: &[Vec<Cell>],
    ) -> Result<u64> {
        if let Some(column) = columns.iter().find(|c| !c.sql_type.bulk_loadable()) {
            debug!(
                "Column {} is {}; inserting {} rows with INSERT",
                column.name,
                column.sql_type.ddl(),
                rows.len()
            );
            return self.insert_fallback(table, columns, rows).await;
        }
        let (oversized, bulk): (Vec<&Vec<Cell>>, Vec<&Vec<Cell>>) = rows
            .iter()
            .partition(|row| sql::row_has_oversized_strings(row));
        let mut inserted = 0;
        if !bulk.is_empty() {
            inserted += self.bulk_insert(table, columns, &bulk).await?;
        }
        if !oversized.is_empty() {
            debug!(
                "Falling back to INSERT for {} rows with oversized strings",
                oversized.len()
            );
            let oversized: Vec<Vec<Cell>> = oversized.into_iter().cloned().collect();
            inserted += self.insert_fallback(table, columns, &oversized).await?;
        }
        Ok(inserted)
    }
}
