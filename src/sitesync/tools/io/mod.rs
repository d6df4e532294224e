//! Table readers and writers. Everything here is file-system glue around
//! the in-memory [`Table`](crate::model::Table).

pub mod csv_read;
pub mod csv_write;
pub mod excel_read;
pub mod excel_write;

use std::path::Path;

use crate::sitesync::tools::error::{Result, ToolError};
use crate::sitesync::tools::model::Table;

/// On-disk table formats the tool understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
}

/// A table that will be materialised as a CSV file or an Excel sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl SheetTable {
    /// Text rendering of a [`Table`] under `sheet_name`.
    pub fn from_table(sheet_name: impl Into<String>, table: &Table) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            columns: table.columns().to_vec(),
            rows: table.text_rows(),
        }
    }
}

/// Infers the table format from the file extension.
pub fn detect_format(path: &Path) -> Option<TableFormat> {
    let extension = path.extension()?.to_ascii_lowercase();
    match extension.to_str()? {
        "csv" | "txt" => Some(TableFormat::Csv),
        "xlsx" | "xlsm" => Some(TableFormat::Xlsx),
        _ => None,
    }
}

/// Reads the first sheet of a workbook, or a whole CSV file.
pub fn read_table(path: &Path) -> Result<Table> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }
    match detect_format(path) {
        Some(TableFormat::Csv) => csv_read::read_csv(path),
        Some(TableFormat::Xlsx) => excel_read::read_first_sheet(path),
        None => Err(ToolError::UnsupportedInput(path.to_path_buf())),
    }
}
