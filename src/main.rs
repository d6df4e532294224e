use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser, Subcommand};
use sitesync_tools::config::{DEFAULT_MAPPING_FILE, ReportConfig};
use sitesync_tools::io::read_table;
use sitesync_tools::mapping::available_reports;
use sitesync_tools::normalize::normalize_columns;
use sitesync_tools::run::{self, RunOutcome};
use sitesync_tools::{Result, ToolError};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_logging(cli.verbose).and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Run(args) => execute_run(args),
        Command::Reports(args) => list_reports(args),
    }
}

fn execute_run(args: RunArgs) -> Result<()> {
    let config = ReportConfig::load(&args.config_dir(), &args.report)?;
    let mut engine_config = config.resolve(&args.report, &args.root);
    if let Some(mapping) = args.mapping {
        engine_config.mapping_file = mapping;
    }
    if args.no_archive {
        engine_config.archive_after_success = false;
    }

    let started_at = chrono::Local::now().naive_local();
    match run::execute(&engine_config, started_at)? {
        RunOutcome::Completed(completed) => {
            info!(
                delta_records = completed.report.counts.delta_records,
                fields_changed = completed.report.counts.fields_changed,
                "reconciliation finished"
            );
            println!("SUCCESS. Output written to {}", completed.run_dir.display());
        }
        RunOutcome::Skipped { reason } => {
            println!("[SKIP] {reason}");
        }
    }
    Ok(())
}

fn list_reports(args: ReportsArgs) -> Result<()> {
    let path = args
        .mapping
        .unwrap_or_else(|| args.root.join(DEFAULT_MAPPING_FILE));
    let table = normalize_columns(&read_table(&path)?);
    for name in available_reports(&table)? {
        println!("{name}");
    }
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Reconcile a source spreadsheet against a downstream export."
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile the inputs of one report and write a run folder.
    Run(RunArgs),
    /// List the report names defined in the mapping workbook.
    Reports(ReportsArgs),
}

#[derive(clap::Args)]
struct RunArgs {
    /// Report name as it appears in the mapping workbook.
    #[arg(long)]
    report: String,

    /// Root directory holding the report work folders.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Directory holding per-report YAML configs. Defaults to `<root>/configs`.
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Mapping workbook to use instead of the configured one.
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Leave the input files in place after a successful run.
    #[arg(long)]
    no_archive: bool,
}

impl RunArgs {
    fn config_dir(&self) -> PathBuf {
        self.config_dir
            .clone()
            .unwrap_or_else(|| default_config_dir(&self.root))
    }
}

fn default_config_dir(root: &Path) -> PathBuf {
    root.join("configs")
}

#[derive(clap::Args)]
struct ReportsArgs {
    /// Root directory holding `Common/Mapping_file.xlsx`.
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Mapping workbook to read instead of the default location.
    #[arg(long)]
    mapping: Option<PathBuf>,
}
