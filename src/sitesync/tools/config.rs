//! Per-report configuration.
//!
//! Each report has a YAML file under the config directory naming its work
//! folders. [`ReportConfig::resolve`] turns it into an [`EngineConfig`] with
//! absolute paths so the pipeline never consults the environment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sitesync::tools::error::{Result, ToolError};

/// Mapping workbook location relative to the root when the report config
/// does not name one.
pub const DEFAULT_MAPPING_FILE: &str = "Common/Mapping_file.xlsx";

/// Format of the tabular run artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Xlsx,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Xlsx => "xlsx",
        }
    }
}

/// Contents of `configs/<report>.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportConfig {
    pub folders: FolderConfig,

    /// Optional mapping workbook path, relative to the root.
    #[serde(default)]
    pub mapping_file: Option<PathBuf>,

    /// Source columns title-cased before comparison.
    #[serde(default)]
    pub text_case_columns: Vec<String>,

    #[serde(default)]
    pub behavior: BehaviorConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Folder layout of a report. Every folder but `work_dir` is relative to
/// `work_dir`, which is relative to the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderConfig {
    pub work_dir: PathBuf,
    pub source_dir: PathBuf,
    #[serde(alias = "downstream_dir")]
    pub sitetracker_dir: PathBuf,
    pub runs_dir: PathBuf,
    pub archive_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Move the input files into the archive folder after a successful run.
    pub archive_after_success: bool,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            archive_after_success: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
}

/// File name of the config for `report_name`: lower case, spaces as
/// underscores.
pub fn config_file_name(report_name: &str) -> String {
    format!("{}.yml", report_name.trim().to_lowercase().replace(' ', "_"))
}

impl ReportConfig {
    /// Loads the YAML config for `report_name` from `config_dir`.
    pub fn load(config_dir: &Path, report_name: &str) -> Result<Self> {
        let path = config_dir.join(config_file_name(report_name));
        if !path.exists() {
            return Err(ToolError::Config(format!(
                "YAML config not found: {}",
                path.display()
            )));
        }
        debug!(path = %path.display(), "loading report config");
        let source = fs::read_to_string(&path)?;
        Self::from_yaml(&source).map_err(|error| match error {
            ToolError::Yaml(inner) => ToolError::Config(format!(
                "invalid YAML config for report {report_name}: {inner}"
            )),
            other => other,
        })
    }

    pub fn from_yaml(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Resolves every folder against `root`.
    pub fn resolve(self, report_name: &str, root: &Path) -> EngineConfig {
        let work_dir = root.join(&self.folders.work_dir);
        let mapping_file = root.join(
            self.mapping_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MAPPING_FILE)),
        );
        EngineConfig {
            report_name: report_name.trim().to_string(),
            source_dir: work_dir.join(&self.folders.source_dir),
            downstream_dir: work_dir.join(&self.folders.sitetracker_dir),
            runs_dir: work_dir.join(&self.folders.runs_dir),
            archive_dir: work_dir.join(&self.folders.archive_dir),
            mapping_file,
            text_case_columns: self.text_case_columns,
            archive_after_success: self.behavior.archive_after_success,
            output_format: self.output.format,
        }
    }
}

/// Fully resolved settings for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub report_name: String,
    pub source_dir: PathBuf,
    pub downstream_dir: PathBuf,
    pub runs_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub mapping_file: PathBuf,
    pub text_case_columns: Vec<String>,
    pub archive_after_success: bool,
    pub output_format: OutputFormat,
}
