use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use serde_json::Value;

use crate::error::{CarteiraError, Result};
use crate::fmt::iso_date;
use crate::table::{coerce_to_string, resolve_path};

/// Byte-order mark prepended to every written file so spreadsheet tools pick
/// up UTF-8.
pub const BOM: &str = "\u{feff}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvHeader {
    /// Dot path into the serialized row.
    pub key: &'static str,
    pub label: &'static str,
}

impl CsvHeader {
    pub const fn new(key: &'static str, label: &'static str) -> Self {
        Self { key, label }
    }
}

fn field_for(row: &Value, key: &str) -> String {
    resolve_path(row, key)
        .and_then(coerce_to_string)
        .unwrap_or_default()
}

/// Serialize `data` into quoted CSV. Every field is wrapped in double quotes,
/// lines are separated by `\n` and the final line carries no terminator.
/// Empty input yields an empty string, header included.
pub fn convert_to_csv<T: Serialize>(data: &[T], headers: &[CsvHeader]) -> Result<String> {
    if data.is_empty() {
        return Ok(String::new());
    }

    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    wtr.write_record(headers.iter().map(|h| h.label))?;

    for (i, item) in data.iter().enumerate() {
        let row = match serde_json::to_value(item) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("row {i} could not be serialized for export: {e}");
                Value::Null
            }
        };
        wtr.write_record(headers.iter().map(|h| field_for(&row, h.key)))?;
    }

    let bytes = wtr.into_inner().map_err(|e| CarteiraError::Io(e.into_error()))?;
    let mut out = String::from_utf8(bytes).map_err(|e| CarteiraError::Other(e.to_string()))?;
    if out.ends_with('\n') {
        out.pop();
    }
    Ok(out)
}

/// Write `csv` to `dir/filename`, prefixed with the UTF-8 BOM.
pub fn download(csv: &str, dir: &Path, filename: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(filename);
    std::fs::write(&path, format!("{BOM}{csv}"))?;
    log::info!("wrote {} bytes to {}", csv.len() + BOM.len(), path.display());
    Ok(path)
}

/// `clientes` + 2024-06-01 -> `clientes_2024-06-01.csv`
pub fn dated_filename(base_name: &str, date: NaiveDate) -> String {
    format!("{base_name}_{}.csv", iso_date(date))
}

/// Convert and write in one go. Returns `None` without touching the
/// filesystem when there is nothing to export.
pub fn export_to_csv<T: Serialize>(
    data: &[T],
    headers: &[CsvHeader],
    base_name: &str,
    dir: &Path,
) -> Result<Option<PathBuf>> {
    let csv = convert_to_csv(data, headers)?;
    if csv.is_empty() {
        log::debug!("nothing to export for {base_name}");
        return Ok(None);
    }
    let filename = dated_filename(base_name, Local::now().date_naive());
    download(&csv, dir, &filename).map(Some)
}
