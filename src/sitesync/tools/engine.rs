//! Joins source rows to downstream rows by primary key and computes the
//! minimal field-level delta.
//!
//! The engine is pure: it reads two in-memory [`Table`]s and a resolved
//! [`ReportMapping`] and returns a [`Reconciliation`]. Applying the delta is
//! left to whoever consumes the update records.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::sitesync::tools::error::{Result, ToolError};
use crate::sitesync::tools::keys::{KeyAudit, audit_keys};
use crate::sitesync::tools::mapping::ReportMapping;
use crate::sitesync::tools::model::{CellValue, ChangeEntry, InvalidDate, Row, Table, UpdateRecord};
use crate::sitesync::tools::normalize::{comparable_text, normalize_date_uk, normalize_value};

/// Shape of a downstream record id: `a` followed by 17 alphanumerics.
static DURABLE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^a[0-9A-Za-z]{17}$").expect("static durable id pattern"));

/// Everything a reconciliation pass produces.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    /// Downstream column detected as the durable record id.
    pub id_column: String,
    /// Number of source rows with a valid primary key.
    pub valid_records: usize,
    /// Valid source rows with no downstream match.
    pub unmatched_records: usize,
    /// One record per source row with at least one changed field.
    pub updates: Vec<UpdateRecord>,
    /// One entry per changed field.
    pub changes: Vec<ChangeEntry>,
    /// Source date cells that failed to parse; those fields were skipped.
    pub invalid_dates: Vec<InvalidDate>,
    /// Downstream date cells that failed to parse; compared as empty.
    pub downstream_invalid_dates: Vec<InvalidDate>,
    /// Keys shared by two or more valid source rows, sorted.
    pub duplicate_keys: Vec<String>,
    /// Every source row belonging to a duplicated key.
    pub duplicate_rows: Table,
    /// Source rows whose primary key is malformed.
    pub invalid_key_rows: Table,
}

/// Finds the first downstream column holding a value shaped like a durable
/// record id.
pub fn detect_id_column(table: &Table) -> Result<String> {
    table
        .columns()
        .iter()
        .find(|column| {
            table.rows().any(|row| {
                row.get(column)
                    .is_some_and(|cell| DURABLE_ID.is_match(normalize_value(Some(cell)).as_str()))
            })
        })
        .cloned()
        .ok_or_else(|| ToolError::DurableIdNotFound {
            table: "downstream".to_string(),
        })
}

/// Reconciles `source` against `downstream` under `mapping`.
///
/// Both primary key columns are normalized before joining. Source rows with
/// a malformed key are excluded; duplicated keys are reported but still
/// compared. When several downstream rows share a key the first one in
/// input order is used.
#[instrument(
    level = "info",
    skip_all,
    fields(
        report = %mapping.report_name,
        source_rows = source.len(),
        downstream_rows = downstream.len()
    )
)]
pub fn reconcile(
    source: &Table,
    downstream: &Table,
    mapping: &ReportMapping,
) -> Result<Reconciliation> {
    check_columns(source, downstream, mapping)?;

    let id_column = detect_id_column(downstream)?;
    debug!(%id_column, "durable id column detected");

    let key_column = &mapping.primary_key.source;
    let audit = audit_keys(source, key_column)?;
    let index = index_by_key(downstream, &mapping.primary_key.target);

    let mut pass = Pass::default();
    for &position in &audit.valid_rows {
        let Some(src) = source.row(position) else {
            continue;
        };
        let key = audit.key(position);
        let Some(st) = index.get(key).and_then(|&found| downstream.row(found)) else {
            debug!(primary_key = key, "no downstream match");
            pass.unmatched += 1;
            continue;
        };
        pass.compare_row(key, &src, &st, &id_column, mapping);
    }

    info!(
        valid = audit.valid_rows.len(),
        unmatched = pass.unmatched,
        delta_records = pass.updates.len(),
        fields_changed = pass.changes.len(),
        invalid_dates = pass.invalid_dates.len(),
        "reconciliation complete"
    );

    Ok(Reconciliation {
        id_column,
        valid_records: audit.valid_rows.len(),
        unmatched_records: pass.unmatched,
        updates: pass.updates,
        changes: pass.changes,
        invalid_dates: pass.invalid_dates,
        downstream_invalid_dates: pass.downstream_invalid_dates,
        duplicate_keys: audit.duplicate_keys.clone(),
        duplicate_rows: key_rows(source, &audit, &audit.duplicate_rows, key_column),
        invalid_key_rows: key_rows(source, &audit, &audit.invalid_rows, key_column),
    })
}

/// Accumulators for a single pass over the source rows.
#[derive(Default)]
struct Pass {
    updates: Vec<UpdateRecord>,
    changes: Vec<ChangeEntry>,
    invalid_dates: Vec<InvalidDate>,
    downstream_invalid_dates: Vec<InvalidDate>,
    unmatched: usize,
}

impl Pass {
    fn compare_row(
        &mut self,
        key: &str,
        src: &Row<'_>,
        st: &Row<'_>,
        id_column: &str,
        mapping: &ReportMapping,
    ) {
        let id = normalize_value(st.get(id_column));
        let mut update = UpdateRecord::new(id.clone(), key);
        let mut changed = false;

        for rule in mapping.field_rules() {
            let src_cell = src.get(&rule.source_column);
            let st_cell = st.get(&rule.target_field);
            let src_val = normalize_value(src_cell);
            let st_val = normalize_value(st_cell);

            let (src_fmt, st_fmt) = if rule.data_type.is_date() {
                let Some(src_fmt) = normalize_date_uk(src_cell) else {
                    debug!(
                        primary_key = key,
                        column = %rule.source_column,
                        value = %src_val,
                        "invalid source date"
                    );
                    self.invalid_dates.push(InvalidDate {
                        primary_key: key.to_string(),
                        column: rule.source_column.clone(),
                        raw_value: src_val,
                    });
                    continue;
                };
                let st_fmt = normalize_date_uk(st_cell).unwrap_or_else(|| {
                    warn!(
                        primary_key = key,
                        field = %rule.target_field,
                        value = %st_val,
                        "invalid downstream date compared as empty"
                    );
                    self.downstream_invalid_dates.push(InvalidDate {
                        primary_key: key.to_string(),
                        column: rule.target_field.clone(),
                        raw_value: st_val.clone(),
                    });
                    String::new()
                });
                (src_fmt, st_fmt)
            } else {
                (src_val, st_val.clone())
            };

            update.set_field(&rule.api_field, src_fmt.clone());

            if comparable_text(&src_fmt) != comparable_text(&st_fmt) {
                changed = true;
                self.changes.push(ChangeEntry {
                    primary_key: key.to_string(),
                    id: id.clone(),
                    source_column: rule.source_column.clone(),
                    target_field: rule.target_field.clone(),
                    api_field: rule.api_field.clone(),
                    old_value: st_val,
                    new_value: src_fmt,
                });
            }
        }

        if changed {
            self.updates.push(update);
        }
    }
}

/// Mapped columns must exist on their side of the join; a header mismatch
/// is a configuration error, not an empty value.
fn check_columns(source: &Table, downstream: &Table, mapping: &ReportMapping) -> Result<()> {
    for rule in &mapping.rules {
        if !source.has_column(&rule.source_column) {
            return Err(missing_column("source", &rule.source_column));
        }
        if !downstream.has_column(&rule.target_field) {
            return Err(missing_column("downstream", &rule.target_field));
        }
    }
    Ok(())
}

fn missing_column(table: &str, column: &str) -> ToolError {
    ToolError::MissingColumn {
        table: table.to_string(),
        column: column.to_string(),
    }
}

/// Maps each normalized key to its first downstream row.
fn index_by_key(table: &Table, column: &str) -> HashMap<String, usize> {
    let mut index = HashMap::with_capacity(table.len());
    for row in table.rows() {
        index
            .entry(normalize_value(row.get(column)))
            .or_insert(row.position());
    }
    index
}

/// Copies the rows at `positions` with their primary key cell replaced by the
/// normalized key.
fn key_rows(source: &Table, audit: &KeyAudit, positions: &[usize], column: &str) -> Table {
    let mut rows = source.select(positions);
    let normalized: Vec<&str> = positions.iter().map(|&position| audit.key(position)).collect();
    let mut next = normalized.into_iter();
    rows.map_column(column, |_| {
        next.next()
            .map(|key| if key.is_empty() { CellValue::Missing } else { CellValue::text(key) })
            .unwrap_or(CellValue::Missing)
    });
    rows
}
