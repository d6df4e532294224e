use std::collections::BTreeMap;

use tracing::{debug, instrument};

use crate::sitesync::tools::error::{Result, ToolError};
use crate::sitesync::tools::model::Table;
use crate::sitesync::tools::normalize::{normalize_value, valid_project_ref};

/// Primary key partition of the source table.
///
/// Duplicates are computed over the valid rows only; an invalid key never
/// takes part in the join, so it is reported once as invalid rather than
/// twice.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyAudit {
    /// Normalized primary key of every source row, by row position.
    pub keys: Vec<String>,
    /// Positions of rows whose key passes [`valid_project_ref`].
    pub valid_rows: Vec<usize>,
    /// Positions of rows whose key does not.
    pub invalid_rows: Vec<usize>,
    /// Keys shared by two or more valid rows, sorted, each listed once.
    pub duplicate_keys: Vec<String>,
    /// Positions of every row belonging to a duplicated key, in input order.
    pub duplicate_rows: Vec<usize>,
}

impl KeyAudit {
    /// Normalized key of the row at `position`.
    pub fn key(&self, position: usize) -> &str {
        self.keys.get(position).map(String::as_str).unwrap_or_default()
    }
}

/// Normalizes `column` on every row, splits rows into valid and invalid
/// keys, and flags every row whose key is shared with another valid row.
#[instrument(level = "debug", skip(table), fields(rows = table.len()))]
pub fn audit_keys(table: &Table, column: &str) -> Result<KeyAudit> {
    if !table.has_column(column) {
        return Err(ToolError::MissingColumn {
            table: "source".to_string(),
            column: column.to_string(),
        });
    }

    let keys: Vec<String> = table
        .rows()
        .map(|row| normalize_value(row.get(column)))
        .collect();

    let (valid_rows, invalid_rows): (Vec<usize>, Vec<usize>) =
        (0..keys.len()).partition(|&position| valid_project_ref(&keys[position]));

    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for &position in &valid_rows {
        let key = keys[position].as_str();
        if key.is_empty() {
            continue;
        }
        groups.entry(key).or_default().push(position);
    }

    let mut duplicate_keys = Vec::new();
    let mut duplicate_rows = Vec::new();
    for (key, positions) in groups {
        if positions.len() > 1 {
            duplicate_keys.push(key.to_string());
            duplicate_rows.extend(positions);
        }
    }
    duplicate_rows.sort_unstable();

    debug!(
        valid = valid_rows.len(),
        invalid = invalid_rows.len(),
        duplicate_keys = duplicate_keys.len(),
        "primary keys audited"
    );

    Ok(KeyAudit {
        keys,
        valid_rows,
        invalid_rows,
        duplicate_keys,
        duplicate_rows,
    })
}
