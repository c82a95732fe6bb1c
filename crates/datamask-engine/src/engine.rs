//! Per-entity execution: match, generate, convert, batch and write.

use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::{Map, Value};
use tracing::{debug, info};

use datamask_core::{
    EntityDescriptor, PatternMatcher, PropertyDescriptor, Record, TruncateTarget, order_properties,
    order_truncates,
};

use crate::convert::convert_value;
use crate::errors::{EngineError, Result, StorageError};
use crate::generators::{GeneratorContext, GeneratorRegistry};
use crate::model::{EngineOptions, ExecutionResult};
use crate::overrides::{OverrideExecutor, OverrideRegistry};
use crate::source::{ColumnValues, RecordSource, RowUpdate};

/// Executes entities against a record source with injected generators and
/// override executors.
#[derive(Debug, Clone, Copy)]
pub struct AnonymizationEngine<'a> {
    generators: &'a GeneratorRegistry,
    overrides: &'a OverrideRegistry,
    options: &'a EngineOptions,
}

struct PreparedProperty<'p> {
    descriptor: &'p PropertyDescriptor,
    matcher: PatternMatcher,
    options: Map<String, Value>,
}

impl<'a> AnonymizationEngine<'a> {
    pub fn new(
        generators: &'a GeneratorRegistry,
        overrides: &'a OverrideRegistry,
        options: &'a EngineOptions,
    ) -> Self {
        Self {
            generators,
            overrides,
            options,
        }
    }

    /// Clear every entity with an enabled truncate directive, in truncate
    /// order. Entities sharing a table through a discriminator only lose
    /// their own rows. In dry-run mode nothing is deleted.
    pub fn truncate(
        &self,
        source_id: &str,
        entities: &[EntityDescriptor],
        records: &mut dyn RecordSource,
    ) -> Vec<(TruncateTarget, std::result::Result<(), StorageError>)> {
        let targets = order_truncates(
            entities
                .iter()
                .filter_map(TruncateTarget::from_entity)
                .collect(),
        );
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let Some(entity) = entities.iter().find(|entity| entity.id == target.entity) else {
                continue;
            };
            let outcome = if self.options.dry_run {
                info!(source = source_id, table = %target.table, "truncate skipped (dry run)");
                Ok(())
            } else {
                info!(
                    source = source_id,
                    entity = %target.entity,
                    table = %target.table,
                    scoped = target.discriminator.is_some(),
                    "truncating"
                );
                records.truncate(entity, target.discriminator.as_ref())
            };
            outcomes.push((target, outcome));
        }
        outcomes
    }

    /// Anonymize every record of one entity.
    ///
    /// Properties are processed in weight order, so a property can derive
    /// from the substitutes of lighter ones. Any generator or storage error
    /// aborts the entity; batches already flushed stay written.
    pub fn run_entity(
        &self,
        source_id: &str,
        entity: &EntityDescriptor,
        properties: &[PropertyDescriptor],
        records: &mut dyn RecordSource,
    ) -> Result<ExecutionResult> {
        let started = Instant::now();
        let entity_matcher = PatternMatcher::compile(&entity.include, &entity.exclude)?;
        let executor = self.override_executor(entity)?;
        let ordered = order_properties(properties.to_vec());
        let prepared = if executor.is_some() {
            Vec::new()
        } else {
            self.prepare(&ordered)?
        };

        let rows = records.fetch_all(entity)?;
        let entity_seed = hash_seed(self.options.seed, &format!("{source_id}/{}", entity.id));
        let batch_size = self.options.batch_size.max(1);
        let mut pending: Vec<RowUpdate> = Vec::new();
        let mut result = ExecutionResult::default();

        for (row_index, record) in rows.iter().enumerate() {
            result.processed += 1;
            if !entity_matcher.matches(record) {
                continue;
            }

            let updates = match executor {
                Some((name, executor)) => {
                    let updates = executor
                        .anonymize(entity, record, self.options.dry_run)
                        .map_err(|source| EngineError::Override {
                            executor: name.to_string(),
                            source,
                        })?;
                    for column in updates.keys() {
                        *result.property_counts.entry(column.clone()).or_insert(0) += 1;
                    }
                    updates
                }
                None => {
                    let mut rng =
                        ChaCha8Rng::seed_from_u64(hash_row_seed(entity_seed, row_index as u64));
                    let context = RowContext {
                        source: source_id,
                        entity: &entity.id,
                        row_index: row_index as u64,
                    };
                    self.apply_properties(&context, &prepared, record, &mut rng, &mut result)?
                }
            };

            if updates.is_empty() {
                continue;
            }
            result.updated += 1;
            if self.options.dry_run {
                continue;
            }
            pending.push(RowUpdate {
                identifiers: identifier_values(entity, record)?,
                columns: updates,
            });
            if pending.len() >= batch_size {
                flush(entity, &mut pending, records)?;
            }
        }
        flush(entity, &mut pending, records)?;

        info!(
            source = source_id,
            entity = %entity.id,
            processed = result.processed,
            updated = result.updated,
            dry_run = self.options.dry_run,
            duration_ms = started.elapsed().as_millis() as u64,
            "entity anonymized"
        );
        Ok(result)
    }

    fn override_executor<'e>(
        &self,
        entity: &'e EntityDescriptor,
    ) -> Result<Option<(&'e str, &'a dyn OverrideExecutor)>> {
        let Some(name) = entity.override_executor.as_deref() else {
            return Ok(None);
        };
        self.overrides
            .get(name)
            .map(|executor| Some((name, executor)))
            .ok_or_else(|| {
                EngineError::Config(format!("override executor '{name}' is not registered"))
            })
    }

    fn prepare<'p>(
        &self,
        properties: &'p [PropertyDescriptor],
    ) -> Result<Vec<PreparedProperty<'p>>> {
        properties
            .iter()
            .map(|descriptor| {
                if !self.generators.contains(&descriptor.generator) {
                    return Err(EngineError::Config(format!(
                        "property '{}' uses unknown generator '{}'",
                        descriptor.field, descriptor.generator
                    )));
                }
                Ok(PreparedProperty {
                    descriptor,
                    matcher: PatternMatcher::compile(&descriptor.include, &descriptor.exclude)?,
                    options: merged_options(descriptor, self.options),
                })
            })
            .collect()
    }

    fn apply_properties(
        &self,
        context: &RowContext<'_>,
        prepared: &[PreparedProperty<'_>],
        record: &Record,
        rng: &mut ChaCha8Rng,
        result: &mut ExecutionResult,
    ) -> Result<ColumnValues> {
        let mut current = record.clone();
        let mut updates = ColumnValues::new();
        for property in prepared {
            let descriptor = property.descriptor;
            let column = descriptor.column.as_str();
            let Some(original) = record.get(column) else {
                continue;
            };
            if !property.matcher.matches(record) {
                continue;
            }

            let ctx = GeneratorContext {
                source: context.source,
                entity: context.entity,
                field: &descriptor.field,
                column,
                original,
                record: &current,
                row_index: context.row_index,
            };
            let generated = self
                .generators
                .generate(&descriptor.generator, &ctx, &property.options, rng)
                .map_err(|source| EngineError::Generation {
                    field: descriptor.field.clone(),
                    source,
                })?;
            let value = convert_value(generated, descriptor.column_type, original);

            current.insert(column, value.clone());
            updates.insert(column.to_string(), value);
            *result
                .property_counts
                .entry(descriptor.field.clone())
                .or_insert(0) += 1;
        }
        Ok(updates)
    }
}

struct RowContext<'r> {
    source: &'r str,
    entity: &'r str,
    row_index: u64,
}

/// Property options with run-wide generator options merged over them.
pub(crate) fn merged_options(
    property: &PropertyDescriptor,
    options: &EngineOptions,
) -> Map<String, Value> {
    let mut merged: Map<String, Value> = property
        .options
        .iter()
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    if let Some(extra) = options.generator_options.get(&property.generator) {
        for (key, value) in extra {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

fn identifier_values(entity: &EntityDescriptor, record: &Record) -> Result<ColumnValues> {
    entity
        .identifiers
        .iter()
        .map(|column| {
            record
                .get(column)
                .map(|value| (column.clone(), value.clone()))
                .ok_or_else(|| EngineError::MissingIdentifier(column.clone()))
        })
        .collect()
}

fn flush(
    entity: &EntityDescriptor,
    pending: &mut Vec<RowUpdate>,
    records: &mut dyn RecordSource,
) -> Result<()> {
    if pending.is_empty() {
        return Ok(());
    }
    debug!(entity = %entity.id, rows = pending.len(), "flushing updates");
    records.update_batch(entity, pending)?;
    pending.clear();
    Ok(())
}

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn hash_row_seed(entity_seed: u64, row_index: u64) -> u64 {
    let hash = entity_seed ^ row_index.wrapping_mul(0x9e3779b97f4a7c15);
    hash.wrapping_mul(0x100000001b3)
}
