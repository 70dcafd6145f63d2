use crate::{
    domain::models::{ColumnSelection, Table},
    error::{LoadError, Result},
    inbound::file::Reader,
};
use csv::ReaderBuilder;
use encoding_rs::Encoding;
use std::path::Path;
use tracing::debug;

pub trait Csv {
    /// Loads the selected columns of a delimited text file.
    fn read_csv(
        path: &Path,
        columns: &ColumnSelection,
        sep: char,
        encoding: &str,
    ) -> Result<Table>;
}

fn separator_byte(sep: char) -> Result<u8> {
    if sep.is_ascii() {
        Ok(sep as u8)
    } else {
        Err(LoadError::InvalidArgument(format!(
            "separator '{}' is not a single-byte character",
            sep
        )))
    }
}

fn decode(bytes: &[u8], label: &str, file_name: &str) -> Result<String> {
    let decode_error = || LoadError::Decode {
        file: file_name.to_string(),
        encoding: label.to_string(),
    };
    let encoding = Encoding::for_label(label.trim().as_bytes()).ok_or_else(decode_error)?;
    let body = match Encoding::for_bom(bytes) {
        Some((bom_encoding, bom_len)) if bom_encoding == encoding => &bytes[bom_len..],
        _ => bytes,
    };
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .map(|text| text.into_owned())
        .ok_or_else(decode_error)
}

impl Csv for Reader {
    fn read_csv(
        path: &Path,
        columns: &ColumnSelection,
        sep: char,
        encoding: &str,
    ) -> Result<Table> {
        let file_name = Self::file_name(path);
        Self::ensure_exists(path)?;
        let delimiter = separator_byte(sep)?;
        let bytes = std::fs::read(path)?;
        let text = decode(&bytes, encoding, &file_name)?;
        let csv_error = |source| LoadError::Csv {
            file: file_name.clone(),
            source,
        };
        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());
        let header: Vec<String> = rdr
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(str::to_string)
            .collect();
        if header.is_empty() {
            return Err(LoadError::MissingHeader(file_name.clone()));
        }
        let indices = columns.resolve(&header, &file_name)?;
        let mut raw_rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(csv_error)?;
            raw_rows.push(
                indices
                    .iter()
                    .map(|&i| record.get(i).unwrap_or("").to_string())
                    .collect(),
            );
        }
        debug!(
            "Read {} rows from csv file '{}' ({} columns selected)",
            raw_rows.len(),
            file_name,
            indices.len()
        );
        let selected = indices.iter().map(|&i| header[i].clone()).collect();
        Ok(Table::from_text_columns(selected, raw_rows))
    }
}
