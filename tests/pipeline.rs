use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use sitesync_tools::ToolError;
use sitesync_tools::config::{EngineConfig, OutputFormat, ReportConfig, config_file_name};
use sitesync_tools::io::excel_write::write_workbook;
use sitesync_tools::io::{SheetTable, read_table};
use sitesync_tools::run::{
    self, InputLookup, RunOutcome, archive_inputs, load_mapping, locate_single_file,
};
use tempfile::{TempDir, tempdir};

const REPORT: &str = "Site Sync";

const CONFIG_YAML: &str = "\
folders:
  work_dir: Sites
  source_dir: input/source
  sitetracker_dir: input/sitetracker
  runs_dir: runs
  archive_dir: archive
mapping_file: Common/mapping.csv
text_case_columns:
  - Region
";

const MAPPING_CSV: &str = "\
Report Name,Primary Key?,Source File Column Name,Sitetracker Field Name,API Name,Data Type
Site Sync,YES,ProjectRef,Site_Name__c,Site_Name__c,text
Site Sync,NO,Region,Region__c,API_Region,text
Site Sync,NO,GoLiveDate,Go_Live__c,API_GoLive,date
Other,YES,Ref,Ref__c,Ref__c,text
";

const SOURCE_CSV: &str = "\u{feff}ProjectRef,Region,GoLiveDate\n\
PRJ-1 ,north,2024-03-05\n\
PRJ 2,North,\n\
DUP-1,East,not-a-date\n\
DUP-1,East,01/01/2024\n\
PRJ-3,West,\n\
PRJ-4,North - East,\n";

/// Downstream export as latin-1 bytes; `\x96` is an en dash.
fn downstream_bytes() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"Id,Site_Name__c,Region__c,Go_Live__c\n");
    bytes.extend_from_slice(b"a0X000000000001AAA,PRJ-1,North,05/03/2024\n");
    bytes.extend_from_slice(b"a0X000000000002BBB,DUP-1,West,\n");
    bytes.extend_from_slice(b"a0X000000000003CCC,PRJ 2,South,\n");
    bytes.extend_from_slice(b"a0X000000000004DDD,PRJ-4,North \x96 East,\n");
    bytes
}

fn started_at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 10, 18)
        .and_then(|date| date.and_hms_opt(9, 30, 0))
        .expect("valid timestamp")
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let workspace = Self {
            dir: tempdir().expect("temporary directory"),
        };
        let root = workspace.root();
        fs::create_dir_all(root.join("configs")).expect("configs dir");
        fs::create_dir_all(root.join("Common")).expect("common dir");
        fs::create_dir_all(workspace.source_dir()).expect("source dir");
        fs::create_dir_all(workspace.downstream_dir()).expect("downstream dir");
        fs::write(root.join("configs").join(config_file_name(REPORT)), CONFIG_YAML)
            .expect("config written");
        fs::write(root.join("Common/mapping.csv"), MAPPING_CSV).expect("mapping written");
        workspace
    }

    fn with_inputs() -> Self {
        let workspace = Self::new();
        fs::write(workspace.source_dir().join("source.csv"), SOURCE_CSV).expect("source written");
        fs::write(workspace.downstream_dir().join("export.csv"), downstream_bytes())
            .expect("downstream written");
        workspace
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn source_dir(&self) -> PathBuf {
        self.root().join("Sites/input/source")
    }

    fn downstream_dir(&self) -> PathBuf {
        self.root().join("Sites/input/sitetracker")
    }

    fn runs_dir(&self) -> PathBuf {
        self.root().join("Sites/runs")
    }

    fn config(&self) -> EngineConfig {
        ReportConfig::load(&self.root().join("configs"), REPORT)
            .expect("config loaded")
            .resolve(REPORT, self.root())
    }
}

fn completed(outcome: RunOutcome) -> run::CompletedRun {
    match outcome {
        RunOutcome::Completed(completed) => completed,
        RunOutcome::Skipped { reason } => panic!("run skipped: {reason}"),
    }
}

fn text_rows(path: &Path) -> Vec<Vec<String>> {
    read_table(path).expect("artifact read").text_rows()
}

#[test]
fn config_resolves_folders_against_root() {
    assert_eq!(config_file_name("Apollo 10G"), "apollo_10g.yml");

    let workspace = Workspace::new();
    let config = workspace.config();

    assert_eq!(config.report_name, REPORT);
    assert_eq!(config.source_dir, workspace.source_dir());
    assert_eq!(config.downstream_dir, workspace.downstream_dir());
    assert_eq!(config.runs_dir, workspace.runs_dir());
    assert_eq!(config.archive_dir, workspace.root().join("Sites/archive"));
    assert_eq!(config.mapping_file, workspace.root().join("Common/mapping.csv"));
    assert_eq!(config.text_case_columns, ["Region"]);
    assert!(config.archive_after_success);
    assert_eq!(config.output_format, OutputFormat::Csv);
}

#[test]
fn missing_config_is_a_config_error() {
    let workspace = Workspace::new();
    let error = ReportConfig::load(&workspace.root().join("configs"), "Unknown Report")
        .expect_err("no config file");
    assert!(matches!(error, ToolError::Config(_)));
}

#[test]
fn full_run_writes_artifacts_and_archives_inputs() {
    let workspace = Workspace::with_inputs();
    let outcome = run::execute(&workspace.config(), started_at()).expect("run succeeded");
    let completed = completed(outcome);

    let run_dir = workspace.runs_dir().join("2026-10-18/run_09-30-00");
    assert_eq!(completed.run_dir, run_dir);

    let counts = &completed.report.counts;
    assert_eq!(counts.valid_records, 5);
    assert_eq!(counts.delta_records, 2);
    assert_eq!(counts.fields_changed, 3);
    assert_eq!(counts.duplicate_keys, 1);
    assert_eq!(counts.duplicate_records, 2);
    assert_eq!(counts.invalid_dates, 1);

    let updates = read_table(&run_dir.join("final_input_file.csv")).expect("updates read");
    assert_eq!(updates.columns(), ["Id", "ProjectRef", "API_Region", "API_GoLive"]);
    assert_eq!(
        updates.text_rows(),
        [
            ["a0X000000000002BBB", "DUP-1", "East", ""],
            ["a0X000000000002BBB", "DUP-1", "East", "01/01/2024"],
        ]
    );

    let changes = read_table(&run_dir.join("field_level_changes.csv")).expect("changes read");
    assert_eq!(changes.columns()[0], "Project Reference");
    assert_eq!(
        changes.text_rows()[2],
        [
            "DUP-1",
            "a0X000000000002BBB",
            "GoLiveDate",
            "Go_Live__c",
            "API_GoLive",
            "",
            "01/01/2024",
        ]
    );

    let invalid = text_rows(&run_dir.join("invalid_primary_key.csv"));
    assert_eq!(invalid, [["PRJ 2", "North", ""]]);

    let duplicates = text_rows(&run_dir.join("duplicate_primary_keys.csv"));
    assert_eq!(duplicates.len(), 2);

    let summary = fs::read_to_string(run_dir.join("run_summary.txt")).expect("summary read");
    assert!(summary.contains("Report Name: Site Sync"));
    assert!(summary.contains("Run time: 2026-10-18 run_09-30-00"));
    assert!(summary.contains("Valid source records: 5"));
    assert!(summary.contains("Delta Records: 2"));
    assert!(summary.contains("Fields updated: 3"));
    assert!(summary.contains("Source: ProjectRef"));
    assert!(summary.contains("Sitetracker: Site_Name__c"));
    assert!(summary.contains("- GoLiveDate → Go_Live__c → API_GoLive (type=date)"));
    assert!(summary.contains("Duplicate keys found: 1\n"));
    assert!(summary.contains("- DUP-1\n"));
    assert!(summary.contains("DUP-1 | GoLiveDate: not-a-date"));

    let json = fs::read_to_string(run_dir.join("run_summary.json")).expect("json read");
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("json parsed");
    assert_eq!(parsed["counts"]["delta_records"], 2);
    assert_eq!(parsed["primary_key"]["source"], "ProjectRef");

    let archive = workspace.root().join("Sites/archive/2026-10-18/run_09-30-00");
    assert_eq!(completed.archived_to.as_deref(), Some(archive.as_path()));
    assert!(archive.join("source.csv").exists());
    assert!(archive.join("export.csv").exists());
    assert!(!workspace.source_dir().join("source.csv").exists());
    assert!(!workspace.downstream_dir().join("export.csv").exists());
}

#[test]
fn empty_input_folder_skips_without_writing() {
    let workspace = Workspace::new();
    fs::write(workspace.downstream_dir().join("export.csv"), downstream_bytes())
        .expect("downstream written");

    let outcome = run::execute(&workspace.config(), started_at()).expect("skip is not an error");

    assert!(matches!(outcome, RunOutcome::Skipped { .. }));
    assert!(!workspace.runs_dir().exists());
}

#[test]
fn missing_input_folder_is_absent_and_hidden_files_are_ignored() {
    let workspace = Workspace::new();
    let missing = workspace.root().join("nowhere");
    assert!(matches!(
        locate_single_file(&missing, "Source").expect("lookup"),
        InputLookup::Absent(_)
    ));

    fs::write(workspace.source_dir().join(".DS_Store"), b"").expect("hidden file");
    fs::write(workspace.source_dir().join("source.csv"), SOURCE_CSV).expect("source written");
    assert_eq!(
        locate_single_file(&workspace.source_dir(), "Source").expect("lookup"),
        InputLookup::Found(workspace.source_dir().join("source.csv"))
    );
}

#[test]
fn two_candidate_files_are_ambiguous() {
    let workspace = Workspace::with_inputs();
    fs::write(workspace.source_dir().join("second.csv"), SOURCE_CSV).expect("second written");

    let error = run::execute(&workspace.config(), started_at()).expect_err("ambiguous input");

    assert!(matches!(error, ToolError::AmbiguousInput { count: 2, .. }));
    assert!(!workspace.runs_dir().exists());
}

#[test]
fn configuration_errors_leave_no_run_folder() {
    let workspace = Workspace::with_inputs();
    let mut config = workspace.config();
    config.report_name = "Not Mapped".to_string();

    let error = run::execute(&config, started_at()).expect_err("mapping missing");

    assert!(matches!(error, ToolError::MappingNotFound { .. }));
    assert!(!workspace.runs_dir().exists());
    assert!(workspace.source_dir().join("source.csv").exists());
}

#[test]
fn xlsx_output_round_trips_through_the_reader() {
    let workspace = Workspace::with_inputs();
    let mut config = workspace.config();
    config.output_format = OutputFormat::Xlsx;
    config.archive_after_success = false;

    let completed = completed(run::execute(&config, started_at()).expect("run succeeded"));

    let updates = text_rows(&completed.run_dir.join("final_input_file.xlsx"));
    assert_eq!(
        updates,
        [
            ["a0X000000000002BBB", "DUP-1", "East", ""],
            ["a0X000000000002BBB", "DUP-1", "East", "01/01/2024"],
        ]
    );
    assert!(completed.run_dir.join("run_summary.txt").exists());
    assert!(completed.archived_to.is_none());
    assert!(workspace.source_dir().join("source.csv").exists());
}

#[test]
fn mapping_loads_from_an_excel_workbook() {
    let dir = tempdir().expect("temporary directory");
    let path = dir.path().join("Mapping_file.xlsx");
    let sheet = SheetTable {
        sheet_name: "Mapping".to_string(),
        columns: [
            "Report Name ",
            "\u{feff}Primary Key?",
            "Source File Column Name",
            "Sitetracker Field Name",
            "API Name",
            "Data Type",
        ]
        .iter()
        .map(|c| c.to_string())
        .collect(),
        rows: vec![
            ["Site Sync", "Yes", "ProjectRef", "Site_Name__c", "Site_Name__c", "Text"],
            ["Site Sync", "No", "GoLiveDate", "Go_Live__c", "API_GoLive", "Date"],
        ]
        .into_iter()
        .map(|row| row.iter().map(|c| c.to_string()).collect())
        .collect(),
    };
    write_workbook(&path, &[sheet]).expect("workbook written");

    let mapping = load_mapping(&path, REPORT).expect("mapping loaded");

    assert_eq!(mapping.primary_key.source, "ProjectRef");
    assert_eq!(mapping.rules.len(), 2);
    assert!(mapping.rules[1].data_type.is_date());
}

#[test]
fn archive_clash_leaves_every_input_in_place() {
    let dir = tempdir().expect("temporary directory");
    let source = dir.path().join("source.csv");
    let downstream = dir.path().join("export.csv");
    fs::write(&source, "a").expect("source written");
    fs::write(&downstream, "b").expect("downstream written");
    let archive = dir.path().join("archive");
    fs::create_dir_all(&archive).expect("archive dir");
    fs::write(archive.join("export.csv"), "old").expect("earlier archive written");

    let error = archive_inputs(&archive, &[source.as_path(), downstream.as_path()])
        .expect_err("destination taken");

    assert!(matches!(error, ToolError::ArchiveConflict(ref path) if path.ends_with("export.csv")));
    assert!(source.exists());
    assert!(downstream.exists());
    assert!(!archive.join("source.csv").exists());
    assert_eq!(
        fs::read_to_string(archive.join("export.csv")).expect("archive read"),
        "old"
    );
}

#[test]
fn inputs_sharing_a_file_name_are_not_archived() {
    let dir = tempdir().expect("temporary directory");
    let source = dir.path().join("source/data.csv");
    let downstream = dir.path().join("downstream/data.csv");
    for file in [&source, &downstream] {
        fs::create_dir_all(file.parent().expect("parent dir")).expect("input dir");
        fs::write(file, "x").expect("input written");
    }
    let archive = dir.path().join("archive");

    let error = archive_inputs(&archive, &[source.as_path(), downstream.as_path()])
        .expect_err("names clash");

    assert!(matches!(error, ToolError::ArchiveConflict(_)));
    assert!(source.exists());
    assert!(downstream.exists());
}
