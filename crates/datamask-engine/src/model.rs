use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use datamask_config::{DEFAULT_BATCH_SIZE, MaskConfig, ValidationReport};
use datamask_stats::RunStatistics;

/// Run-wide engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Seed for the per-record generator RNG.
    pub seed: u64,
    /// Pending record updates buffered before a flush.
    pub batch_size: usize,
    /// Compute everything but suppress writes and truncation.
    pub dry_run: bool,
    /// Options merged over every property using the keyed generator.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub generator_options: BTreeMap<String, Map<String, Value>>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            seed: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
            generator_options: BTreeMap::new(),
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &MaskConfig) -> Self {
        Self {
            seed: config.seed,
            batch_size: config.batch_size,
            dry_run: config.dry_run,
            generator_options: config
                .generator_options
                .iter()
                .map(|(generator, options)| {
                    let options = options
                        .iter()
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect();
                    (generator.clone(), options)
                })
                .collect(),
        }
    }
}

/// Outcome of processing one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub processed: u64,
    pub updated: u64,
    pub property_counts: BTreeMap<String, u64>,
}

/// An entity whose processing was aborted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityFailure {
    pub entity: String,
    pub source: String,
    pub cause: String,
}

/// A property or entity skipped because it could not be resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionWarning {
    pub entity: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Succeeded,
    PartialFailure,
    PreflightFailed,
}

/// Result of a whole run across sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub preflight: ValidationReport,
    pub statistics: RunStatistics,
    pub failures: Vec<EntityFailure>,
    pub warnings: Vec<ResolutionWarning>,
}
