use anyhow::Context;
use excel2mssql::{
    config::Config,
    domain::loader::{CsvToMssql, ExcelToMssql, SourceKind, log_summary, setup_logging},
};
use tracing::{error, info};

const PREVIEW_ROWS: usize = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let only_parse = std::env::args().any(|arg| arg == "--only-parse" || arg == "--op");
    let config =
        Config::from_env().context("Failed to load configuration from environment variables")?;

    setup_logging(only_parse, config.log_level)?;
    info!("Configuration loaded successfully");

    let source = &config.source;
    let kind = SourceKind::from_path(&source.path).with_context(|| {
        format!(
            "Unsupported source file type: {}",
            source.path.display()
        )
    })?;

    if only_parse {
        let table = match kind {
            SourceKind::Csv => CsvToMssql::new(&source.path, config.credentials.clone()).read(
                &source.columns,
                source.separator,
                &source.encoding,
            ),
            SourceKind::Excel => ExcelToMssql::new(&source.path, config.credentials.clone())
                .read(&source.sheet, &source.columns),
        }
        .with_context(|| format!("Failed to read {}", source.path.display()))?;
        info!(
            "Parsed {} rows with columns [{}]",
            table.len(),
            table.columns().join(", ")
        );
        for row in table.preview(PREVIEW_ROWS) {
            info!("{}", row);
        }
        return Ok(());
    }

    let result = match kind {
        SourceKind::Csv => {
            CsvToMssql::new(&source.path, config.credentials.clone())
                .csv_to_mssql(
                    &source.columns,
                    source.separator,
                    &source.encoding,
                    source.write_mode,
                )
                .await
        }
        SourceKind::Excel => {
            ExcelToMssql::new(&source.path, config.credentials.clone())
                .excel_to_mssql(&source.sheet, &source.columns, source.write_mode)
                .await
        }
    };

    match result {
        Ok(summary) => {
            log_summary(&summary);
            Ok(())
        }
        Err(e) => {
            error!("Load of {} failed: {}", source.path.display(), e);
            Err(e).context("Load failed")
        }
    }
}
