//! Pure value transforms shared by the key validator and the reconciliation
//! engine. None of these functions fail; malformed input degrades to an
//! empty string or a `None` date.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::sitesync::tools::model::{CellValue, Table};

/// Output format for every normalized date.
pub const UK_DATE_FORMAT: &str = "%d/%m/%Y";

static PROJECT_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("static project ref pattern"));

/// Date-only layouts accepted from text cells. Year-first layouts are read
/// as year/month/day; everything else is day-first. `%B` matches full and
/// abbreviated month names.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d/%m/%y",
    "%d-%m-%y",
    "%d.%m.%y",
    "%d %B %Y",
    "%d-%B-%Y",
    "%d %B %y",
    "%d-%B-%y",
];

/// Date-time layouts accepted from text cells (exports often carry a
/// midnight time component).
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Timestamps carrying a numeric UTC offset. The calendar date is taken as
/// written, not shifted to UTC.
const ZONED_DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

/// Strips byte-order marks, non-breaking spaces, and surrounding whitespace
/// from a column name.
pub fn normalize_column_name(name: &str) -> String {
    name.replace(['\u{feff}', '\u{a0}'], "").trim().to_string()
}

/// Returns a copy of `table` with every column name cleaned by
/// [`normalize_column_name`].
pub fn normalize_columns(table: &Table) -> Table {
    table.with_renamed_columns(normalize_column_name)
}

/// Missing cells become the empty string; everything else is rendered and
/// trimmed.
pub fn normalize_value(value: Option<&CellValue>) -> String {
    match value {
        None | Some(CellValue::Missing) => String::new(),
        Some(CellValue::Text(text)) => text.trim().to_string(),
        Some(other) => other.to_string().trim().to_string(),
    }
}

/// Comparison form of a value: en/em dashes become hyphens and whitespace
/// runs collapse to one space. Never used for output.
pub fn comparable_text(value: &str) -> String {
    value
        .replace(['\u{2013}', '\u{2014}'], "-")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Letters, digits, underscore and hyphen only. Callers trim first.
pub fn valid_project_ref(value: &str) -> bool {
    PROJECT_REF.is_match(value)
}

/// Normalizes a date cell to `DD/MM/YYYY`.
///
/// Returns `Some("")` for an empty cell (dates are optional), `Some(date)`
/// for a native date or a strictly parseable day-first string, and `None`
/// when the text is not a date.
pub fn normalize_date_uk(value: Option<&CellValue>) -> Option<String> {
    match value {
        None | Some(CellValue::Missing) => Some(String::new()),
        Some(CellValue::DateTime(date_time)) => Some(date_time.format(UK_DATE_FORMAT).to_string()),
        Some(CellValue::Text(text)) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Some(String::new());
            }
            parse_date(trimmed).map(|date| date.format(UK_DATE_FORMAT).to_string())
        }
    }
}

/// Parses `text` against the accepted layouts. The whole string must match
/// one layout; partial matches are rejected.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let date_only = DATE_FORMATS
        .iter()
        .filter_map(|format| NaiveDate::parse_from_str(text, format).ok());
    let date_time = DATE_TIME_FORMATS.iter().filter_map(|format| {
        NaiveDateTime::parse_from_str(text, format)
            .ok()
            .map(|parsed| parsed.date())
    });
    let zoned = ZONED_DATE_TIME_FORMATS
        .iter()
        .filter_map(|format| DateTime::parse_from_str(text, format).ok())
        .chain(DateTime::parse_from_rfc3339(text).ok())
        .map(|parsed| parsed.date_naive());

    // `%Y` happily reads "24" as the year 24.
    date_only
        .chain(date_time)
        .chain(zoned)
        .find(|date| date.year() >= 1000)
}

/// Trims and title-cases a value: the first letter of every word is upper
/// case, the rest lower case. A word starts after any non-letter.
pub fn normalize_text_case(value: Option<&CellValue>) -> String {
    let trimmed = normalize_value(value);
    let mut titled = String::with_capacity(trimmed.len());
    let mut previous_is_letter = false;
    for ch in trimmed.chars() {
        if ch.is_alphabetic() {
            if previous_is_letter {
                titled.extend(ch.to_lowercase());
            } else {
                titled.extend(ch.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            titled.push(ch);
            previous_is_letter = false;
        }
    }
    titled
}
