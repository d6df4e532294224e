use std::borrow::Cow;
use std::fs;
use std::path::Path;

use csv::ReaderBuilder;
use encoding_rs::WINDOWS_1252;
use tracing::{debug, warn};

use crate::sitesync::tools::error::Result;
use crate::sitesync::tools::model::{CellValue, Table};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Reads a CSV file with a header row.
///
/// Exports arrive either as UTF-8 or as latin-1; the bytes are decoded as
/// UTF-8 when valid and as Windows-1252 otherwise. Records with more fields
/// than the header are skipped; short records are padded.
pub fn read_csv(path: &Path) -> Result<Table> {
    let bytes = fs::read(path)?;
    let text = decode(&bytes);
    let table = parse_csv(&text)?;
    debug!(path = %path.display(), rows = table.len(), "read CSV table");
    Ok(table)
}

/// Parses CSV text into a [`Table`]. Empty fields become
/// [`CellValue::Missing`].
pub fn parse_csv(text: &str) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let width = columns.len();
    let mut table = Table::new(columns);

    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.len() > width {
            warn!(
                line = line + 2,
                fields = record.len(),
                expected = width,
                "skipping malformed CSV record"
            );
            continue;
        }
        let cells = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    CellValue::Missing
                } else {
                    CellValue::text(field)
                }
            })
            .collect();
        table.push_row(cells);
    }

    Ok(table)
}

fn decode(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(bytes).0,
    }
}
