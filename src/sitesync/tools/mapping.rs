use std::collections::BTreeSet;

use tracing::{debug, instrument};

use crate::sitesync::tools::error::{Result, ToolError};
use crate::sitesync::tools::model::{FieldType, KeyPair, MappingRule, Row, Table};
use crate::sitesync::tools::normalize::normalize_value;

pub const REPORT_NAME_HEADER: &str = "Report Name";
pub const PRIMARY_KEY_HEADER: &str = "Primary Key?";
pub const SOURCE_COLUMN_HEADER: &str = "Source File Column Name";
pub const TARGET_FIELD_HEADER: &str = "Sitetracker Field Name";
pub const API_NAME_HEADER: &str = "API Name";
pub const DATA_TYPE_HEADER: &str = "Data Type";

/// Headers without which the primary key cannot be located.
const KEY_HEADERS: [&str; 3] = [PRIMARY_KEY_HEADER, SOURCE_COLUMN_HEADER, TARGET_FIELD_HEADER];

/// Headers every field rule reads; an absent one is never defaulted.
const RULE_HEADERS: [&str; 2] = [API_NAME_HEADER, DATA_TYPE_HEADER];

/// The resolved field mapping for one report.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportMapping {
    pub report_name: String,
    pub primary_key: KeyPair,
    /// Rules in mapping-table row order, primary key rule included.
    pub rules: Vec<MappingRule>,
}

impl ReportMapping {
    /// Rules compared field by field: everything except the primary key rule.
    pub fn field_rules(&self) -> impl Iterator<Item = &MappingRule> {
        self.rules.iter().filter(|rule| !rule.is_primary_key)
    }
}

/// Filters the shared mapping table down to `report_name` and extracts the
/// primary key pair plus the ordered field rules.
#[instrument(level = "debug", skip(table), fields(rows = table.len()))]
pub fn resolve_mapping(table: &Table, report_name: &str) -> Result<ReportMapping> {
    if !table.has_column(REPORT_NAME_HEADER) {
        return Err(ToolError::PrimaryKeyUndefined {
            reason: format!("missing '{REPORT_NAME_HEADER}' column"),
        });
    }

    let wanted = report_name.trim();
    let report_rows: Vec<Row<'_>> = table
        .rows()
        .filter(|row| normalize_value(row.get(REPORT_NAME_HEADER)) == wanted)
        .collect();

    if report_rows.is_empty() {
        return Err(ToolError::MappingNotFound {
            report: report_name.to_string(),
        });
    }

    if let Some(missing) = KEY_HEADERS.iter().find(|header| !table.has_column(header)) {
        return Err(ToolError::PrimaryKeyUndefined {
            reason: format!("missing '{missing}' column"),
        });
    }
    if let Some(missing) = RULE_HEADERS.iter().find(|header| !table.has_column(header)) {
        return Err(ToolError::MissingColumn {
            table: "mapping".to_string(),
            column: missing.to_string(),
        });
    }

    let rules: Vec<MappingRule> = report_rows.iter().map(rule_from_row).collect();

    let mut flagged = rules.iter().filter(|rule| rule.is_primary_key);
    let key_rule = flagged.next().ok_or_else(|| ToolError::PrimaryKeyUndefined {
        reason: format!("no row flagged '{PRIMARY_KEY_HEADER}' for report {wanted}"),
    })?;
    let extra = flagged.count();
    if extra > 0 {
        return Err(ToolError::PrimaryKeyAmbiguous {
            report: wanted.to_string(),
            count: extra + 1,
        });
    }

    let primary_key = KeyPair {
        source: key_rule.source_column.clone(),
        target: key_rule.target_field.clone(),
    };
    debug!(
        source_key = %primary_key.source,
        target_key = %primary_key.target,
        rule_count = rules.len(),
        "mapping resolved"
    );

    Ok(ReportMapping {
        report_name: wanted.to_string(),
        primary_key,
        rules,
    })
}

/// Distinct report names present in the mapping table, sorted.
pub fn available_reports(table: &Table) -> Result<Vec<String>> {
    if !table.has_column(REPORT_NAME_HEADER) {
        return Err(ToolError::MissingColumn {
            table: "mapping".to_string(),
            column: REPORT_NAME_HEADER.to_string(),
        });
    }

    let names: BTreeSet<String> = table
        .rows()
        .map(|row| normalize_value(row.get(REPORT_NAME_HEADER)))
        .filter(|name| !name.is_empty())
        .collect();
    Ok(names.into_iter().collect())
}

fn rule_from_row(row: &Row<'_>) -> MappingRule {
    MappingRule {
        source_column: normalize_value(row.get(SOURCE_COLUMN_HEADER)),
        target_field: normalize_value(row.get(TARGET_FIELD_HEADER)),
        api_field: normalize_value(row.get(API_NAME_HEADER)),
        data_type: FieldType::parse(&normalize_value(row.get(DATA_TYPE_HEADER))),
        is_primary_key: normalize_value(row.get(PRIMARY_KEY_HEADER)).eq_ignore_ascii_case("yes"),
    }
}
