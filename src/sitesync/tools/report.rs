use std::fmt;

use serde::Serialize;

use crate::sitesync::tools::engine::Reconciliation;
use crate::sitesync::tools::mapping::ReportMapping;
use crate::sitesync::tools::model::{KeyPair, MappingRule};

/// Literal counts for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub valid_records: usize,
    pub delta_records: usize,
    pub fields_changed: usize,
    pub duplicate_keys: usize,
    pub duplicate_records: usize,
    pub invalid_dates: usize,
}

/// Summary of a finished run. Built once from the engine output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub report_name: String,
    /// `YYYY-MM-DD run_HH-MM-SS`.
    pub run_label: String,
    pub counts: RunCounts,
    pub primary_key: KeyPair,
    pub mapping: Vec<MappingRule>,
    pub duplicate_keys: Vec<String>,
    pub invalid_dates: Vec<String>,
    pub downstream_invalid_dates: Vec<String>,
}

impl RunReport {
    pub fn new(
        mapping: &ReportMapping,
        outcome: &Reconciliation,
        run_label: impl Into<String>,
    ) -> Self {
        Self {
            report_name: mapping.report_name.clone(),
            run_label: run_label.into(),
            counts: RunCounts {
                valid_records: outcome.valid_records,
                delta_records: outcome.updates.len(),
                fields_changed: outcome.changes.len(),
                duplicate_keys: outcome.duplicate_keys.len(),
                duplicate_records: outcome.duplicate_rows.len(),
                invalid_dates: outcome.invalid_dates.len(),
            },
            primary_key: mapping.primary_key.clone(),
            mapping: mapping.rules.clone(),
            duplicate_keys: outcome.duplicate_keys.clone(),
            invalid_dates: outcome.invalid_dates.iter().map(ToString::to_string).collect(),
            downstream_invalid_dates: outcome
                .downstream_invalid_dates
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Renders the human-readable summary written next to the run's tables.
impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Report Name: {}", self.report_name)?;
        writeln!(f, "Run time: {}", self.run_label)?;
        writeln!(f)?;

        writeln!(f, "==== COUNTS ====")?;
        writeln!(f, "Valid source records: {}", self.counts.valid_records)?;
        writeln!(f, "Delta Records: {}", self.counts.delta_records)?;
        writeln!(f, "Fields updated: {}", self.counts.fields_changed)?;
        writeln!(f)?;

        writeln!(f, "==== PRIMARY KEY ====")?;
        writeln!(f, "Source: {}", self.primary_key.source)?;
        writeln!(f, "Sitetracker: {}", self.primary_key.target)?;
        writeln!(f)?;

        writeln!(f, "==== FIELD MAPPING USED ====")?;
        for rule in &self.mapping {
            writeln!(
                f,
                "- {} → {} → {} (type={})",
                rule.source_column, rule.target_field, rule.api_field, rule.data_type
            )?;
        }

        writeln!(f)?;
        writeln!(f, "==== DUPLICATE PRIMARY KEYS (SOURCE) ====")?;
        writeln!(f, "Duplicate keys found: {}", self.counts.duplicate_keys)?;
        writeln!(f, "Duplicate records: {}", self.counts.duplicate_records)?;
        for key in &self.duplicate_keys {
            writeln!(f, "- {key}")?;
        }

        if !self.invalid_dates.is_empty() {
            writeln!(f)?;
            writeln!(f, "==== INVALID DATE FIELDS (SOURCE) ====")?;
            writeln!(f, "Total invalid date values: {}", self.counts.invalid_dates)?;
            for line in &self.invalid_dates {
                writeln!(f, "{line}")?;
            }
        }

        if !self.downstream_invalid_dates.is_empty() {
            writeln!(f)?;
            writeln!(f, "==== INVALID DATE FIELDS (SITETRACKER, COMPARED AS EMPTY) ====")?;
            writeln!(
                f,
                "Total invalid date values: {}",
                self.downstream_invalid_dates.len()
            )?;
            for line in &self.downstream_invalid_dates {
                writeln!(f, "{line}")?;
            }
        }

        Ok(())
    }
}
