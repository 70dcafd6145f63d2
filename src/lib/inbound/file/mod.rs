pub mod csv;
pub mod excel;

pub use csv::Csv;
pub use excel::{Excel, Sheet};

use crate::error::{LoadError, Result};
use std::path::Path;

/// Entry point for the file readers; the format traits are implemented on it.
pub struct Reader;

impl Reader {
    pub fn file_name(path: &Path) -> String {
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown file")
            .to_string()
    }

    pub fn ensure_exists(path: &Path) -> Result<()> {
        if !path.is_file() {
            return Err(LoadError::NotFound(path.display().to_string()));
        }
        Ok(())
    }
}
