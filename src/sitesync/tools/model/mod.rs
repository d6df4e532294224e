use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single cell read from a source or downstream table.
///
/// Readers keep native spreadsheet dates as [`CellValue::DateTime`] so the
/// date normalizer can format them without a round trip through text.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// Empty cell, or a cell the reader could not see at all.
    Missing,
    /// Any textual (or text-rendered numeric) value.
    Text(String),
    /// Native date/time value.
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Builds a text cell.
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    /// Returns `true` for [`CellValue::Missing`].
    pub fn is_missing(&self) -> bool {
        matches!(self, CellValue::Missing)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Missing => Ok(()),
            CellValue::Text(value) => f.write_str(value),
            CellValue::DateTime(value) => write!(f, "{}", value.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

/// Column-addressable table with a fixed schema.
///
/// Every row has exactly one cell per column; short rows are padded with
/// [`CellValue::Missing`] and long rows are truncated on insertion. When a
/// header repeats, name lookups resolve to its first occurrence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<CellValue>>,
}

impl Table {
    /// Creates an empty table with the given header.
    pub fn new(columns: Vec<String>) -> Self {
        let index = build_index(&columns);
        Self {
            columns,
            index,
            rows: Vec::new(),
        }
    }

    /// Creates a table from a header and its rows.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row);
        }
        table
    }

    /// Convenience constructor for text-only tables, mostly used by tests.
    pub fn from_text<C, R>(columns: &[C], rows: &[R]) -> Self
    where
        C: AsRef<str>,
        R: AsRef<[&'static str]>,
    {
        let columns = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let rows = rows
            .iter()
            .map(|row| {
                row.as_ref()
                    .iter()
                    .map(|cell| {
                        if cell.is_empty() {
                            CellValue::Missing
                        } else {
                            CellValue::text(*cell)
                        }
                    })
                    .collect()
            })
            .collect();
        Self::from_rows(columns, rows)
    }

    /// Appends a row, padding or truncating it to the schema width.
    pub fn push_row(&mut self, mut cells: Vec<CellValue>) {
        cells.resize(self.columns.len(), CellValue::Missing);
        self.rows.push(cells);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of `column` in the schema, if present.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Typed accessor over the row at `position`.
    pub fn row(&self, position: usize) -> Option<Row<'_>> {
        self.rows.get(position).map(|cells| Row {
            table: self,
            position,
            cells,
        })
    }

    /// Iterates rows in input order.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows
            .iter()
            .enumerate()
            .map(move |(position, cells)| Row {
                table: self,
                position,
                cells,
            })
    }

    /// Returns a copy with every column name passed through `rename`.
    pub fn with_renamed_columns(&self, rename: impl Fn(&str) -> String) -> Table {
        let columns: Vec<String> = self.columns.iter().map(|c| rename(c)).collect();
        Table {
            index: build_index(&columns),
            columns,
            rows: self.rows.clone(),
        }
    }

    /// Rewrites every cell of `column` in place. Returns `false` when the
    /// column is absent.
    pub fn map_column(&mut self, column: &str, mut f: impl FnMut(&CellValue) -> CellValue) -> bool {
        let Some(col_idx) = self.column_index(column) else {
            return false;
        };
        for row in &mut self.rows {
            row[col_idx] = f(&row[col_idx]);
        }
        true
    }

    /// Copies the rows at `positions`, in the given order, into a new table
    /// sharing this schema.
    pub fn select(&self, positions: &[usize]) -> Table {
        let rows = positions
            .iter()
            .filter_map(|&position| self.rows.get(position).cloned())
            .collect();
        Table {
            columns: self.columns.clone(),
            index: self.index.clone(),
            rows,
        }
    }

    /// Renders every cell as text, row by row.
    pub fn text_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| row.iter().map(ToString::to_string).collect())
            .collect()
    }
}

fn build_index(columns: &[String]) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(columns.len());
    for (position, column) in columns.iter().enumerate() {
        index.entry(column.clone()).or_insert(position);
    }
    index
}

/// Borrowed view of one table row.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    position: usize,
    cells: &'a [CellValue],
}

impl<'a> Row<'a> {
    /// Position of this row in its table (input order).
    pub fn position(&self) -> usize {
        self.position
    }

    /// Cell under `column`, or `None` when the schema has no such column.
    pub fn get(&self, column: &str) -> Option<&'a CellValue> {
        let col_idx = self.table.column_index(column)?;
        self.cells.get(col_idx)
    }
}

/// Declared type of a mapped field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Date,
    /// Any other declared type; compared as text.
    Other(String),
}

impl FieldType {
    /// Parses the mapping's `Data Type` cell, case-insensitively.
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        match lowered.as_str() {
            "date" => FieldType::Date,
            "text" | "" => FieldType::Text,
            _ => FieldType::Other(lowered),
        }
    }

    pub fn is_date(&self) -> bool {
        matches!(self, FieldType::Date)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Text => f.write_str("text"),
            FieldType::Date => f.write_str("date"),
            FieldType::Other(name) => f.write_str(name),
        }
    }
}

/// One row of the field mapping for a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    /// Column name in the source spreadsheet.
    pub source_column: String,
    /// Field name in the downstream export.
    pub target_field: String,
    /// API name written to the update file.
    pub api_field: String,
    pub data_type: FieldType,
    pub is_primary_key: bool,
}

/// Primary key column names on both sides of the join.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub source: String,
    pub target: String,
}

/// Field updates for one downstream record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateRecord {
    /// Durable downstream record id.
    pub id: String,
    /// Normalized primary key shared by both sides.
    pub primary_key: String,
    /// `(api_field, new_value)` pairs in mapping order.
    pub fields: Vec<(String, String)>,
}

impl UpdateRecord {
    pub fn new(id: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            primary_key: primary_key.into(),
            fields: Vec::new(),
        }
    }

    /// Value written for `api_field`, if the record carries it.
    pub fn field(&self, api_field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == api_field)
            .map(|(_, value)| value.as_str())
    }

    /// Sets `api_field` to `value`. A field already present keeps its
    /// position and takes the new value.
    pub fn set_field(&mut self, api_field: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| name == api_field) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((api_field.to_string(), value)),
        }
    }
}

/// One differing field between source and downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEntry {
    pub primary_key: String,
    pub id: String,
    pub source_column: String,
    pub target_field: String,
    pub api_field: String,
    pub old_value: String,
    pub new_value: String,
}

/// A date cell that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidDate {
    pub primary_key: String,
    pub column: String,
    pub raw_value: String,
}

impl fmt::Display for InvalidDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {}: {}", self.primary_key, self.column, self.raw_value)
    }
}
