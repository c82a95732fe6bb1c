//! Whole-run orchestration: pre-flight, then each source in turn.

use std::collections::BTreeSet;

use tracing::{error, info, warn};

use datamask_config::ValidationReport;
use datamask_core::EntityDescriptor;
use datamask_stats::{RunStatistics, StatisticsCollector};

use crate::engine::AnonymizationEngine;
use crate::generators::GeneratorRegistry;
use crate::metadata::MetadataProvider;
use crate::model::{EngineOptions, EntityFailure, ResolutionWarning, RunOutcome, RunStatus};
use crate::overrides::OverrideRegistry;
use crate::preflight::preflight;
use crate::source::{RecordSource, TruncatedView};

/// One data source taking part in a run.
pub struct SourceHandle<'a> {
    pub id: String,
    pub metadata: &'a dyn MetadataProvider,
    pub records: &'a mut dyn RecordSource,
}

impl<'a> SourceHandle<'a> {
    pub fn new(
        id: impl Into<String>,
        metadata: &'a dyn MetadataProvider,
        records: &'a mut dyn RecordSource,
    ) -> Self {
        Self {
            id: id.into(),
            metadata,
            records,
        }
    }
}

/// Owns the injected registries and runs sources sequentially.
#[derive(Debug, Default)]
pub struct Orchestrator {
    generators: GeneratorRegistry,
    overrides: OverrideRegistry,
    options: EngineOptions,
}

#[derive(Default)]
struct SourceProgress {
    failures: Vec<EntityFailure>,
    warnings: Vec<ResolutionWarning>,
}

impl Orchestrator {
    pub fn new(
        generators: GeneratorRegistry,
        overrides: OverrideRegistry,
        options: EngineOptions,
    ) -> Self {
        Self {
            generators,
            overrides,
            options,
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn generators(&self) -> &GeneratorRegistry {
        &self.generators
    }

    pub fn overrides(&self) -> &OverrideRegistry {
        &self.overrides
    }

    /// Registry-aware checks over every source's metadata.
    pub fn preflight(&self, sources: &[SourceHandle<'_>]) -> ValidationReport {
        let metadata: Vec<&dyn MetadataProvider> =
            sources.iter().map(|source| source.metadata).collect();
        preflight(&self.generators, &self.overrides, &self.options, &metadata)
    }

    pub fn run(&self, sources: &mut [SourceHandle<'_>]) -> RunOutcome {
        self.run_checked(sources, ValidationReport::default())
    }

    /// Run after merging `report` (typically from configuration validation)
    /// with the engine's own pre-flight. Any error stops the run before a
    /// record is read.
    pub fn run_checked(
        &self,
        sources: &mut [SourceHandle<'_>],
        mut report: ValidationReport,
    ) -> RunOutcome {
        report.merge(self.preflight(sources));
        if !report.is_ok() {
            warn!(errors = report.errors.len(), "pre-flight failed");
            return RunOutcome {
                status: RunStatus::PreflightFailed,
                preflight: report,
                statistics: RunStatistics::default(),
                failures: Vec::new(),
                warnings: Vec::new(),
            };
        }

        let mut collector = StatisticsCollector::new();
        let mut progress = SourceProgress::default();
        collector.start();
        for source in sources.iter_mut() {
            info!(source = %source.id, dry_run = self.options.dry_run, "processing source");
            self.run_source(source, &mut collector, &mut progress);
        }
        collector.stop();

        let status = if progress.failures.is_empty() {
            RunStatus::Succeeded
        } else {
            RunStatus::PartialFailure
        };
        let summary = collector.summary();
        info!(
            status = ?status,
            entities = summary.total_entities,
            processed = summary.total_processed,
            updated = summary.total_updated,
            failures = progress.failures.len(),
            "run finished"
        );
        RunOutcome {
            status,
            preflight: report,
            statistics: collector.into_statistics(),
            failures: progress.failures,
            warnings: progress.warnings,
        }
    }

    fn run_source(
        &self,
        source: &mut SourceHandle<'_>,
        collector: &mut StatisticsCollector,
        progress: &mut SourceProgress,
    ) {
        let engine = AnonymizationEngine::new(&self.generators, &self.overrides, &self.options);
        let entities = source.metadata.list_entities();

        let mut aborted = BTreeSet::new();
        let mut skipped = Vec::new();
        for (target, outcome) in engine.truncate(&source.id, &entities, &mut *source.records) {
            match outcome {
                Ok(()) if self.options.dry_run => skipped.push(target),
                Ok(()) => {}
                Err(err) => {
                    error!(
                        source = %source.id,
                        entity = %target.entity,
                        error = %err,
                        "truncate failed"
                    );
                    progress.failures.push(EntityFailure {
                        entity: target.entity.clone(),
                        source: source.id.clone(),
                        cause: format!("truncate failed: {err}"),
                    });
                    aborted.insert(target.entity);
                }
            }
        }

        for entity in &entities {
            if !entity.anonymizable || aborted.contains(&entity.id) {
                continue;
            }
            if entity.table.trim().is_empty() {
                warn!(source = %source.id, entity = %entity.id, "entity has no backing table");
                progress.warnings.push(ResolutionWarning {
                    entity: entity.id.clone(),
                    source: source.id.clone(),
                    field: None,
                    message: "entity has no backing table; skipped".to_string(),
                });
                continue;
            }

            let entity = self.resolve_entity(source, entity);
            let properties = self.resolve_properties(source, &entity, progress);
            let outcome = if skipped.is_empty() {
                engine.run_entity(&source.id, &entity, &properties, &mut *source.records)
            } else {
                let mut view = TruncatedView::new(&mut *source.records, &skipped);
                engine.run_entity(&source.id, &entity, &properties, &mut view)
            };
            match outcome {
                Ok(result) => collector.record_entity(
                    &entity.id,
                    &source.id,
                    result.processed,
                    result.updated,
                    &result.property_counts,
                ),
                Err(err) => {
                    error!(source = %source.id, entity = %entity.id, error = %err, "entity failed");
                    progress.failures.push(EntityFailure {
                        entity: entity.id.clone(),
                        source: source.id.clone(),
                        cause: err.to_string(),
                    });
                }
            }
        }
    }

    fn resolve_entity(
        &self,
        source: &SourceHandle<'_>,
        entity: &EntityDescriptor,
    ) -> EntityDescriptor {
        let mut entity = entity.clone();
        let identifiers = source.metadata.identifier_columns(&entity.id);
        if !identifiers.is_empty() {
            entity.identifiers = identifiers;
        }
        entity
    }

    fn resolve_properties(
        &self,
        source: &SourceHandle<'_>,
        entity: &EntityDescriptor,
        progress: &mut SourceProgress,
    ) -> Vec<datamask_core::PropertyDescriptor> {
        if entity.override_executor.is_some() {
            return Vec::new();
        }
        let mut resolved = Vec::new();
        for mut property in source.metadata.list_properties(&entity.id) {
            match source.metadata.resolve_column(&entity.id, &property.field) {
                Some(column) => {
                    property.column = column;
                    resolved.push(property);
                }
                None => {
                    warn!(
                        source = %source.id,
                        entity = %entity.id,
                        field = %property.field,
                        "property has no matching column; skipped"
                    );
                    progress.warnings.push(ResolutionWarning {
                        entity: entity.id.clone(),
                        source: source.id.clone(),
                        field: Some(property.field.clone()),
                        message: "property has no matching column; skipped".to_string(),
                    });
                }
            }
        }
        resolved
    }
}
