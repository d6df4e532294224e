use std::path::Path;

use csv::Writer;

use crate::sitesync::tools::error::Result;
use crate::sitesync::tools::io::SheetTable;

/// Writes `table` as a UTF-8 CSV file with a header row.
pub fn write_csv(path: &Path, table: &SheetTable) -> Result<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}
