use anyhow::Context;
use chrono::Utc;
use std::ffi::OsStr;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::info;
use tracing_subscriber::{
    Registry, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

const LOG_DIR: &str = "log";

/// Installs the file and stdout subscribers for the binary.
pub fn setup_logging(only_parse: bool, log_level: tracing::Level) -> anyhow::Result<()> {
    std::fs::create_dir_all(LOG_DIR)
        .with_context(|| format!("Failed to create log directory: {}", LOG_DIR))?;
    let timestamp_str = Utc::now().format("%Y-%m-%d_%H-%M-%S");
    let log_file_path = format!("{}/loader_{}.log", LOG_DIR, timestamp_str);
    let log_file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_file_path)
        .with_context(|| format!("Failed to open log file: {}", log_file_path))?;
    Registry::default()
        .with(LevelFilter::from_level(log_level))
        .with(
            tracing_subscriber::fmt::Layer::default()
                .with_writer(std::sync::Mutex::new(log_file))
                .with_ansi(false),
        )
        .with(tracing_subscriber::fmt::Layer::default().with_writer(std::io::stdout))
        .init();
    info!("Starting excel2mssql loader");
    if only_parse {
        info!("Parse-only mode: will not connect to SQL Server");
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Csv,
    Excel,
}

impl SourceKind {
    /// Picks the reader from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<SourceKind> {
        let ext = path.extension().and_then(OsStr::to_str)?.to_lowercase();
        match ext.as_str() {
            "csv" | "txt" | "tsv" => Some(SourceKind::Csv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(SourceKind::Excel),
            _ => None,
        }
    }
}
