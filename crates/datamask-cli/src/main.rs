mod registry;
mod snapshot;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use datamask_config::{
    ConfigError, MaskConfig, SourceConfig, ValidationReport, config_json_schema, load_config,
    validate_config, validate_config_json,
};
use datamask_engine::{
    DescriptorRegistry, EngineOptions, EntityFailure, GeneratorRegistry, MetadataProvider,
    Orchestrator, OverrideRegistry, RunOutcome, RunStatus, SourceHandle, StorageError, preflight,
};
use datamask_stats::{HistoryRecord, RunStatistics, StatsError, diff_runs, render_report};
use registry::{
    RegistryError, RunContext, SourceSummary, init_console_logging, init_run_logging, start_run,
    write_outcome,
};
use snapshot::SnapshotSource;

/// Entity name recorded for failures that concern a whole snapshot.
const SNAPSHOT_ENTITY: &str = "snapshot";
const EXIT_PARTIAL: u8 = 1;
const EXIT_PREFLIGHT: u8 = 2;
const EXIT_ERROR: u8 = 3;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("statistics error: {0}")]
    Stats(#[from] StatsError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Parser, Debug)]
#[command(name = "datamask", version, about = "Deterministic data anonymization")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Anonymize every configured source.
    Run(RunArgs),
    /// Check a configuration file without reading any record.
    Validate(ValidateArgs),
    /// Print the JSON Schema of configuration files.
    Schema(SchemaArgs),
    /// Compare the history records of two runs.
    Diff(DiffArgs),
    /// Render run statistics as a markdown report.
    Report(ReportArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Configuration file (.toml or .json).
    #[arg(long, default_value = "datamask.toml")]
    config: PathBuf,
    /// Output directory for runs.
    #[arg(long, default_value = "runs")]
    run_dir: PathBuf,
    /// Compute substitutes and statistics without writing or truncating.
    #[arg(long, default_value_t = false)]
    dry_run: bool,
    /// Override the configured generator seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Override the configured batch size.
    #[arg(long)]
    batch_size: Option<usize>,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Configuration file (.toml or .json).
    #[arg(long, default_value = "datamask.toml")]
    config: PathBuf,
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Write the schema here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Earlier run: a history.json file or its run directory.
    before: PathBuf,
    /// Later run: a history.json file or its run directory.
    after: PathBuf,
}

#[derive(Args, Debug)]
struct ReportArgs {
    /// statistics.json, statistics.csv, or a run directory.
    statistics: PathBuf,
    /// Write the report here instead of stdout.
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(code) => code,
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("error: {err}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn execute(cli: Cli) -> Result<ExitCode, CliError> {
    match cli.command {
        Command::Run(args) => run_command(args).map(exit_code),
        Command::Validate(args) => {
            init_console_logging()?;
            validate_command(args)
        }
        Command::Schema(args) => {
            let schema = serde_json::to_string_pretty(&config_json_schema())?;
            emit(args.out.as_deref(), &schema)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Diff(args) => {
            init_console_logging()?;
            let before = HistoryRecord::load(&run_file(&args.before, "history.json"))?;
            let after = HistoryRecord::load(&run_file(&args.after, "history.json"))?;
            println!("{}", serde_json::to_string_pretty(&diff_runs(&before, &after))?);
            Ok(ExitCode::SUCCESS)
        }
        Command::Report(args) => {
            init_console_logging()?;
            let statistics = load_statistics(&run_file(&args.statistics, "statistics.json"))?;
            emit(args.out.as_deref(), &render_report(&statistics))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(status: RunStatus) -> ExitCode {
    match status {
        RunStatus::Succeeded => ExitCode::SUCCESS,
        RunStatus::PartialFailure => ExitCode::from(EXIT_PARTIAL),
        RunStatus::PreflightFailed => ExitCode::from(EXIT_PREFLIGHT),
    }
}

fn run_command(args: RunArgs) -> Result<RunStatus, CliError> {
    let (config, structural) = load_checked(&args.config)?;
    let Some(mut config) = config else {
        eprintln!("{}", serde_json::to_string_pretty(&structural)?);
        return Ok(RunStatus::PreflightFailed);
    };
    config.dry_run |= args.dry_run;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    let mut report = structural;
    report.merge(validate_config(&config));

    let ctx = RunContext {
        run_id: Uuid::new_v4().to_string(),
        started_at: chrono::Utc::now(),
        run_dir: args.run_dir,
        config_path: args.config.clone(),
        config_version: config.config_version.clone(),
        seed: config.seed,
        batch_size: config.batch_size,
        dry_run: config.dry_run,
        sources: config
            .sources
            .iter()
            .map(|source| SourceSummary {
                id: source.id.clone(),
                location: snapshot_dir(&args.config, source),
            })
            .collect(),
    };
    let paths = start_run(&ctx)?;
    init_run_logging(&paths.logs_path)?;

    info!(
        event = "run_started",
        run_id = %ctx.run_id,
        dry_run = ctx.dry_run,
        seed = ctx.seed,
        sources = ctx.sources.len()
    );

    let registries: Vec<DescriptorRegistry> = config
        .sources
        .iter()
        .map(DescriptorRegistry::from_source)
        .collect();
    let mut stores: Vec<SnapshotSource> = ctx
        .sources
        .iter()
        .map(|source| SnapshotSource::open(&source.location))
        .collect();
    let orchestrator = Orchestrator::new(
        GeneratorRegistry::with_builtins(),
        OverrideRegistry::new(),
        EngineOptions::from_config(&config),
    );

    let mut outcome = {
        let mut handles: Vec<SourceHandle<'_>> = registries
            .iter()
            .zip(stores.iter_mut())
            .map(|(registry, store)| SourceHandle::new(registry.source_id(), registry, store))
            .collect();
        orchestrator.run_checked(&mut handles, report)
    };

    if !ctx.dry_run && outcome.status != RunStatus::PreflightFailed {
        persist_snapshots(&ctx.sources, &stores, &mut outcome);
    }
    write_outcome(&paths, &ctx, &outcome)?;

    let summary = outcome.statistics.summary();
    info!(
        event = "run_finished",
        status = ?outcome.status,
        processed = summary.total_processed,
        updated = summary.total_updated,
        failures = outcome.failures.len(),
        warnings = outcome.warnings.len()
    );
    println!("{}", paths.root.display());
    for failure in &outcome.failures {
        eprintln!("failed: {}@{}: {}", failure.entity, failure.source, failure.cause);
    }
    if outcome.status == RunStatus::PreflightFailed {
        eprintln!("{}", serde_json::to_string_pretty(&outcome.preflight)?);
    }
    Ok(outcome.status)
}

/// Save every modified snapshot table. A source whose tables cannot be
/// written is recorded as a failure and the run becomes partial.
fn persist_snapshots(
    sources: &[SourceSummary],
    stores: &[SnapshotSource],
    outcome: &mut RunOutcome,
) {
    for (source, store) in sources.iter().zip(stores) {
        if let Err(err) = store.persist() {
            error!(
                source = %source.id,
                dir = %store.dir().display(),
                error = %err,
                "snapshot save failed"
            );
            outcome.failures.push(EntityFailure {
                entity: SNAPSHOT_ENTITY.to_string(),
                source: source.id.clone(),
                cause: format!("persist failed: {err}"),
            });
            outcome.status = RunStatus::PartialFailure;
        }
    }
}

fn validate_command(args: ValidateArgs) -> Result<ExitCode, CliError> {
    let (config, mut report) = load_checked(&args.config)?;
    if let Some(config) = config {
        report.merge(validate_config(&config));
        let registries: Vec<DescriptorRegistry> = config
            .sources
            .iter()
            .map(DescriptorRegistry::from_source)
            .collect();
        let metadata: Vec<&dyn MetadataProvider> = registries
            .iter()
            .map(|registry| registry as &dyn MetadataProvider)
            .collect();
        report.merge(preflight(
            &GeneratorRegistry::with_builtins(),
            &OverrideRegistry::new(),
            &EngineOptions::from_config(&config),
            &metadata,
        ));
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_PREFLIGHT)
    })
}

/// Structural check of the raw document, then deserialization when it
/// passes.
fn load_checked(path: &Path) -> Result<(Option<MaskConfig>, ValidationReport), CliError> {
    let contents = fs::read_to_string(path)?;
    let raw: Value = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&contents)?,
        Some("json") => serde_json::from_str(&contents)?,
        other => {
            return Err(CliError::InvalidInput(format!(
                "expected .toml or .json config, got {}",
                other.unwrap_or("no extension")
            )));
        }
    };
    let report = validate_config_json(&raw)?;
    if !report.is_ok() {
        return Ok((None, report));
    }
    Ok((Some(load_config(path)?), report))
}

/// Snapshot directory of a source, relative to the configuration file.
fn snapshot_dir(config_path: &Path, source: &SourceConfig) -> PathBuf {
    let base = config_path.parent().unwrap_or_else(|| Path::new("."));
    match &source.location {
        Some(location) => base.join(location),
        None => base.join("snapshots").join(&source.id),
    }
}

fn run_file(path: &Path, name: &str) -> PathBuf {
    if path.is_dir() {
        path.join(name)
    } else {
        path.to_path_buf()
    }
}

fn load_statistics(path: &Path) -> Result<RunStatistics, CliError> {
    let contents = fs::read_to_string(path)?;
    let statistics = match path.extension().and_then(|ext| ext.to_str()) {
        Some("csv") => RunStatistics::from_csv(&contents)?,
        _ => RunStatistics::from_json(&contents)?,
    };
    Ok(statistics)
}

fn emit(out: Option<&Path>, contents: &str) -> Result<(), CliError> {
    match out {
        Some(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, contents)?;
        }
        None => println!("{contents}"),
    }
    Ok(())
}
