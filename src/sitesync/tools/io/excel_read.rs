use std::path::Path;

use calamine::{DataType, Reader, Xlsx, open_workbook};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::sitesync::tools::error::{Result, ToolError};
use crate::sitesync::tools::model::{CellValue, Table};

/// Reads the first worksheet of an Excel workbook. The first row is the
/// header; fully empty rows are dropped.
pub fn read_first_sheet(path: &Path) -> Result<Table> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("{} has no sheets", path.display())))?;
    let range = read_required_sheet(&mut workbook, &sheet_name)?;
    let table = range_to_table(&range);
    debug!(
        path = %path.display(),
        sheet = %sheet_name,
        rows = table.len(),
        "read worksheet"
    );
    Ok(table)
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<calamine::Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

fn range_to_table(range: &calamine::Range<DataType>) -> Table {
    let mut rows = range.rows();
    let columns: Vec<String> = match rows.next() {
        Some(header) => header
            .iter()
            .enumerate()
            .map(|(col_idx, cell)| match cell_to_value(cell) {
                CellValue::Missing => format!("Unnamed: {col_idx}"),
                other => other.to_string(),
            })
            .collect(),
        None => return Table::default(),
    };

    let mut table = Table::new(columns);
    for row in rows {
        let cells: Vec<CellValue> = row.iter().map(cell_to_value).collect();
        if cells.iter().all(CellValue::is_missing) {
            continue;
        }
        table.push_row(cells);
    }
    table
}

fn cell_to_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::Empty => CellValue::Missing,
        DataType::String(value) if value.is_empty() => CellValue::Missing,
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Int(value) => CellValue::Text(value.to_string()),
        DataType::Float(value) => CellValue::Text(float_to_text(*value)),
        DataType::Bool(true) => CellValue::text("True"),
        DataType::Bool(false) => CellValue::text("False"),
        DataType::DateTime(serial) => match excel_serial_to_datetime(*serial) {
            Some(date_time) => CellValue::DateTime(date_time),
            None => CellValue::Text(serial.to_string()),
        },
        other => CellValue::Text(other.to_string()),
    }
}

/// Integral floats render without a fractional part so numeric ids read
/// the same as they display in Excel.
fn float_to_text(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Converts an Excel serial date (1900 system) to a timestamp.
pub fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    // 2958466 is 9999-12-31, the last date Excel can represent.
    if !serial.is_finite() || !(0.0..2_958_466.0).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}
