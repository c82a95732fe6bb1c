use std::fs::{self, OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use datamask_config::ValidationReport;
use datamask_engine::{EntityFailure, ResolutionWarning, RunOutcome, RunStatus};
use datamask_stats::{HistoryRecord, render_report};

use super::{RegistryError, RegistryResult};

/// Where a source's records were read from.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub id: String,
    pub location: PathBuf,
}

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub run_dir: PathBuf,
    pub config_path: PathBuf,
    pub config_version: String,
    pub seed: u64,
    pub batch_size: usize,
    pub dry_run: bool,
    pub sources: Vec<SourceSummary>,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
struct RunConfig<'a> {
    run_id: &'a str,
    started_at: String,
    config_path: &'a Path,
    config_version: &'a str,
    seed: u64,
    batch_size: usize,
    dry_run: bool,
    sources: &'a [SourceSummary],
    git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
struct GitInfo {
    commit: Option<String>,
    dirty: Option<bool>,
}

#[derive(Debug, Serialize)]
struct OutcomeFile<'a> {
    run_id: &'a str,
    status: RunStatus,
    preflight: &'a ValidationReport,
    failures: &'a [EntityFailure],
    warnings: &'a [ResolutionWarning],
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub logs_path: PathBuf,
    pub outcome_path: PathBuf,
    pub statistics_json_path: PathBuf,
    pub statistics_csv_path: PathBuf,
    pub history_path: PathBuf,
    pub report_path: PathBuf,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.run_dir.join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let config = RunConfig {
        run_id: &ctx.run_id,
        started_at: ctx.started_at.to_rfc3339(),
        config_path: &ctx.config_path,
        config_version: &ctx.config_version,
        seed: ctx.seed,
        batch_size: ctx.batch_size,
        dry_run: ctx.dry_run,
        sources: &ctx.sources,
        git: collect_git_info(),
    };
    write_json(&root.join("config.json"), &config)?;

    let logs_path = root.join("logs.ndjson");
    OpenOptions::new().create(true).append(true).open(&logs_path)?;

    Ok(RunPaths {
        logs_path,
        outcome_path: root.join("outcome.json"),
        statistics_json_path: root.join("statistics.json"),
        statistics_csv_path: root.join("statistics.csv"),
        history_path: root.join("history.json"),
        report_path: root.join("report.md"),
        root,
    })
}

/// Statistics exports, history record, markdown report and the outcome
/// summary. Pre-flight failures only get the outcome file.
pub fn write_outcome(
    paths: &RunPaths,
    ctx: &RunContext,
    outcome: &RunOutcome,
) -> RegistryResult<()> {
    let summary = OutcomeFile {
        run_id: &ctx.run_id,
        status: outcome.status,
        preflight: &outcome.preflight,
        failures: &outcome.failures,
        warnings: &outcome.warnings,
    };
    write_json(&paths.outcome_path, &summary)?;
    if outcome.status == RunStatus::PreflightFailed {
        return Ok(());
    }

    fs::write(&paths.statistics_json_path, outcome.statistics.to_json()?)?;
    fs::write(&paths.statistics_csv_path, outcome.statistics.to_csv()?)?;
    fs::write(&paths.report_path, render_report(&outcome.statistics))?;
    HistoryRecord::new(ctx.run_id.clone(), ctx.dry_run, outcome.statistics.clone())
        .write(&paths.history_path)?;
    Ok(())
}

fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RegistryError::from)
}
