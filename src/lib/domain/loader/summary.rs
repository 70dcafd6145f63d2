use crate::domain::models::{TableRef, WriteMode};
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct LoadSummary {
    pub source: String,
    pub target: TableRef,
    pub mode: WriteMode,
    pub rows_read: usize,
    pub rows_written: u64,
    pub table_created: bool,
    pub runtime_secs: f64,
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    let chars: Vec<char> = s.chars().collect();
    for (i, &ch) in chars.iter().enumerate() {
        if i > 0 && (chars.len() - i).is_multiple_of(3) {
            result.push(',');
        }
        result.push(ch);
    }
    result
}

pub fn log_summary(summary: &LoadSummary) {
    info!("=== Load Summary ===");
    info!("Source: {}", summary.source);
    info!("Target: {} (mode: {})", summary.target, summary.mode);
    info!("Rows read: {}", format_number(summary.rows_read as u64));
    info!("Rows written: {}", format_number(summary.rows_written));
    if summary.table_created {
        info!("Table {} was created", summary.target);
    }
    info!("Total runtime: {:.1}s", summary.runtime_secs);
}
