//! Batch pipeline: locate inputs, reconcile, write the run folder, archive.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use tracing::{debug, info, instrument, warn};

use crate::sitesync::tools::config::{EngineConfig, OutputFormat};
use crate::sitesync::tools::engine::{Reconciliation, reconcile};
use crate::sitesync::tools::error::{Result, ToolError};
use crate::sitesync::tools::io::csv_write::write_csv;
use crate::sitesync::tools::io::excel_write::write_workbook;
use crate::sitesync::tools::io::{SheetTable, read_table};
use crate::sitesync::tools::mapping::{ReportMapping, resolve_mapping};
use crate::sitesync::tools::model::{ChangeEntry, Table, UpdateRecord};
use crate::sitesync::tools::normalize::{normalize_columns, normalize_text_case};
use crate::sitesync::tools::report::RunReport;

pub const INVALID_KEYS_ARTIFACT: &str = "invalid_primary_key";
pub const DUPLICATE_KEYS_ARTIFACT: &str = "duplicate_primary_keys";
pub const UPDATES_ARTIFACT: &str = "final_input_file";
pub const CHANGES_ARTIFACT: &str = "field_level_changes";
pub const SUMMARY_TEXT: &str = "run_summary.txt";
pub const SUMMARY_JSON: &str = "run_summary.json";

const CHANGE_COLUMNS: [&str; 7] = [
    "Project Reference",
    "Id",
    "Source Column",
    "Sitetracker Column",
    "API Field",
    "Old Value",
    "New Value",
];

/// Result of a pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The run reconciled both inputs and wrote its artifacts.
    Completed(CompletedRun),
    /// An input folder was missing or empty; nothing was read or written.
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedRun {
    pub run_dir: PathBuf,
    pub report: RunReport,
    /// Folder the inputs were moved to, when archiving is enabled.
    pub archived_to: Option<PathBuf>,
}

/// Outcome of looking for the single input file in a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLookup {
    Found(PathBuf),
    /// No input available; the reason is suitable for logging.
    Absent(String),
}

/// Finds the only non-hidden file in `folder`.
///
/// A missing or empty folder is not an error; more than one candidate is.
pub fn locate_single_file(folder: &Path, label: &str) -> Result<InputLookup> {
    if !folder.is_dir() {
        return Ok(InputLookup::Absent(format!(
            "{label} folder does not exist: {}",
            folder.display()
        )));
    }

    let mut candidates = Vec::new();
    for entry in fs::read_dir(folder)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        candidates.push(entry.path());
    }

    match candidates.len() {
        0 => Ok(InputLookup::Absent(format!("no files found in {label} folder"))),
        1 => Ok(InputLookup::Found(candidates.remove(0))),
        count => Err(ToolError::AmbiguousInput {
            label: label.to_string(),
            count,
        }),
    }
}

/// Runs one reconciliation for `config`, stamping the run folder with
/// `started_at`.
///
/// Configuration and input errors surface before the run folder is created,
/// so a failed run leaves nothing behind.
#[instrument(level = "info", skip_all, fields(report = %config.report_name))]
pub fn execute(config: &EngineConfig, started_at: NaiveDateTime) -> Result<RunOutcome> {
    let source_file = match locate_single_file(&config.source_dir, "Source")? {
        InputLookup::Found(path) => path,
        InputLookup::Absent(reason) => return Ok(skip(reason)),
    };
    let downstream_file = match locate_single_file(&config.downstream_dir, "Sitetracker")? {
        InputLookup::Found(path) => path,
        InputLookup::Absent(reason) => return Ok(skip(reason)),
    };

    let mapping = load_mapping(&config.mapping_file, &config.report_name)?;
    let source = load_source(&source_file, &config.text_case_columns)?;
    let downstream = load_downstream(&downstream_file)?;

    let outcome = reconcile(&source, &downstream, &mapping)?;

    let day = started_at.format("%Y-%m-%d").to_string();
    let run = started_at.format("run_%H-%M-%S").to_string();
    let run_dir = config.runs_dir.join(&day).join(&run);
    fs::create_dir_all(&run_dir)?;

    let report = RunReport::new(&mapping, &outcome, format!("{day} {run}"));
    write_artifacts(&run_dir, config.output_format, &mapping, &outcome, &report)?;

    let archived_to = if config.archive_after_success {
        let archive = config.archive_dir.join(&day).join(&run);
        archive_inputs(&archive, &[source_file.as_path(), downstream_file.as_path()])?;
        Some(archive)
    } else {
        None
    };

    info!(run_dir = %run_dir.display(), "run complete");
    Ok(RunOutcome::Completed(CompletedRun {
        run_dir,
        report,
        archived_to,
    }))
}

fn skip(reason: String) -> RunOutcome {
    info!(%reason, "skipping run");
    RunOutcome::Skipped { reason }
}

/// Reads the shared mapping table and resolves the rules for `report_name`.
#[instrument(level = "debug", skip(path), fields(path = %path.display()))]
pub fn load_mapping(path: &Path, report_name: &str) -> Result<ReportMapping> {
    let table = normalize_columns(&read_table(path)?);
    resolve_mapping(&table, report_name)
}

/// Reads the source table, cleans its header, and title-cases the
/// configured columns.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn load_source(path: &Path, text_case_columns: &[String]) -> Result<Table> {
    let mut table = normalize_columns(&read_table(path)?);
    for column in text_case_columns {
        let applied = table.map_column(column, |cell| {
            let titled = normalize_text_case(Some(cell));
            if titled.is_empty() {
                cell.clone()
            } else {
                titled.into()
            }
        });
        if !applied {
            debug!(%column, "text case column not present in source");
        }
    }
    info!(rows = table.len(), "loaded source table");
    Ok(table)
}

#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn load_downstream(path: &Path) -> Result<Table> {
    let table = normalize_columns(&read_table(path)?);
    info!(rows = table.len(), "loaded downstream table");
    Ok(table)
}

/// Writes the tabular artifacts plus text and JSON summaries into `run_dir`.
#[instrument(level = "debug", skip_all, fields(run_dir = %run_dir.display(), ?format))]
pub fn write_artifacts(
    run_dir: &Path,
    format: OutputFormat,
    mapping: &ReportMapping,
    outcome: &Reconciliation,
    report: &RunReport,
) -> Result<()> {
    let mut tables = vec![SheetTable::from_table(
        INVALID_KEYS_ARTIFACT,
        &outcome.invalid_key_rows,
    )];
    if !outcome.duplicate_keys.is_empty() {
        tables.push(SheetTable::from_table(
            DUPLICATE_KEYS_ARTIFACT,
            &outcome.duplicate_rows,
        ));
    }
    tables.push(updates_table(&outcome.updates, mapping));
    tables.push(changes_table(&outcome.changes));

    for table in &tables {
        let path = run_dir.join(format!("{}.{}", table.sheet_name, format.extension()));
        match format {
            OutputFormat::Csv => write_csv(&path, table)?,
            OutputFormat::Xlsx => write_workbook(&path, std::slice::from_ref(table))?,
        }
        debug!(path = %path.display(), rows = table.rows.len(), "artifact written");
    }

    fs::write(run_dir.join(SUMMARY_TEXT), report.to_string())?;
    fs::write(
        run_dir.join(SUMMARY_JSON),
        serde_json::to_string_pretty(report)?,
    )?;
    Ok(())
}

/// One row per update record: `Id`, the source primary key column, then
/// every API field written in mapping order.
pub fn updates_table(updates: &[UpdateRecord], mapping: &ReportMapping) -> SheetTable {
    let mut api_fields: Vec<&str> = Vec::new();
    for rule in mapping.field_rules() {
        let api = rule.api_field.as_str();
        if api_fields.contains(&api) {
            continue;
        }
        if updates.iter().any(|update| update.field(api).is_some()) {
            api_fields.push(api);
        }
    }

    let mut columns = vec!["Id".to_string(), mapping.primary_key.source.clone()];
    columns.extend(api_fields.iter().map(|api| api.to_string()));

    let rows = updates
        .iter()
        .map(|update| {
            let mut row = vec![update.id.clone(), update.primary_key.clone()];
            row.extend(
                api_fields
                    .iter()
                    .map(|api| update.field(api).unwrap_or_default().to_string()),
            );
            row
        })
        .collect();

    SheetTable {
        sheet_name: UPDATES_ARTIFACT.to_string(),
        columns,
        rows,
    }
}

/// One row per changed field.
pub fn changes_table(changes: &[ChangeEntry]) -> SheetTable {
    let rows = changes
        .iter()
        .map(|change| {
            vec![
                change.primary_key.clone(),
                change.id.clone(),
                change.source_column.clone(),
                change.target_field.clone(),
                change.api_field.clone(),
                change.old_value.clone(),
                change.new_value.clone(),
            ]
        })
        .collect();

    SheetTable {
        sheet_name: CHANGES_ARTIFACT.to_string(),
        columns: CHANGE_COLUMNS.iter().map(|c| c.to_string()).collect(),
        rows,
    }
}

/// Moves every input file into `archive`.
///
/// Destinations are checked before anything moves, so a name clash leaves
/// every input in place.
#[instrument(level = "debug", skip_all, fields(archive = %archive.display()))]
pub fn archive_inputs(archive: &Path, files: &[&Path]) -> Result<()> {
    let mut moves: Vec<(&Path, PathBuf)> = Vec::with_capacity(files.len());
    for &file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let destination = archive.join(name);
        if destination.exists() || moves.iter().any(|(_, taken)| *taken == destination) {
            return Err(ToolError::ArchiveConflict(destination));
        }
        moves.push((file, destination));
    }

    fs::create_dir_all(archive)?;
    for (done, (file, destination)) in moves.iter().enumerate() {
        if let Err(error) = move_file(file, destination) {
            let left_behind: Vec<String> = moves[done..]
                .iter()
                .map(|(file, _)| file.display().to_string())
                .collect();
            warn!(archived = done, ?left_behind, %error, "archive incomplete");
            return Err(error);
        }
    }
    Ok(())
}

fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_err() {
        // Rename fails across file systems; fall back to copy + delete.
        warn!(from = %from.display(), to = %to.display(), "rename failed, copying");
        fs::copy(from, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}
