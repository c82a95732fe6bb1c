use std::collections::{BTreeMap, HashSet};

use datamask_core::{CONFIG_VERSION, PatternConfig, PatternMatcher};
use jsonschema::JSONSchema;
use serde_json::Value;

use crate::errors::{ConfigError, IssueSeverity, ValidationIssue, ValidationReport};
use crate::model::{EntityConfig, MaskConfig, PropertyConfig, SourceConfig};
use crate::schema::config_json_schema;

/// Validate a registry JSON document against the registry JSON Schema.
pub fn validate_config_json(config_json: &Value) -> Result<ValidationReport, ConfigError> {
    let schema = serde_json::to_value(config_json_schema())?;
    let compiled =
        JSONSchema::compile(&schema).map_err(|err| ConfigError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();

    if let Err(errors) = compiled.validate(config_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Semantic pre-flight validation of a parsed registry.
///
/// Every problem is collected; nothing fails fast.
pub fn validate_config(config: &MaskConfig) -> ValidationReport {
    let mut report = ValidationReport::default();

    if config.config_version != CONFIG_VERSION {
        report.push_warning(
            ValidationIssue::warning(
                "config_version_mismatch",
                "/config_version",
                format!(
                    "config_version '{}' differs from supported '{}'",
                    config.config_version, CONFIG_VERSION
                ),
            )
            .with_hint(format!("set config_version = \"{CONFIG_VERSION}\"")),
        );
    }

    if config.batch_size == 0 {
        report.push_error(
            ValidationIssue::error(
                "batch_size_zero",
                "/batch_size",
                "batch_size must be greater than zero",
            )
            .with_hint("omit batch_size to use the default"),
        );
    }

    if config.sources.is_empty() {
        report.push_error(
            ValidationIssue::error("sources_empty", "/sources", "at least one source is required")
                .with_hint("add a [[sources]] table"),
        );
    }

    let mut source_ids = HashSet::new();
    for (idx, source) in config.sources.iter().enumerate() {
        let path = format!("/sources/{idx}");
        if source.id.trim().is_empty() {
            report.push_error(ValidationIssue::error(
                "empty_source_id",
                format!("{path}/id"),
                "source id must be a non-empty string",
            ));
        } else if !source_ids.insert(source.id.as_str()) {
            report.push_error(ValidationIssue::error(
                "duplicate_source",
                format!("{path}/id"),
                format!("source '{}' is declared more than once", source.id),
            ));
        }
        validate_source(source, &path, &mut report);
    }

    report
}

fn validate_source(source: &SourceConfig, base_path: &str, report: &mut ValidationReport) {
    if source.entities.is_empty() {
        report.push_warning(ValidationIssue::warning(
            "source_without_entities",
            format!("{base_path}/entities"),
            format!("source '{}' declares no entities", source.id),
        ));
    }

    let mut entity_ids = HashSet::new();
    let mut truncating_tables: BTreeMap<&str, Vec<(usize, bool)>> = BTreeMap::new();

    for (idx, entity) in source.entities.iter().enumerate() {
        let path = format!("{base_path}/entities/{idx}");
        if entity.id.trim().is_empty() {
            report.push_error(ValidationIssue::error(
                "empty_entity_id",
                format!("{path}/id"),
                "entity id must be a non-empty string",
            ));
        } else if !entity_ids.insert(entity.id.as_str()) {
            report.push_error(ValidationIssue::error(
                "duplicate_entity",
                format!("{path}/id"),
                format!(
                    "entity '{}' is declared more than once in source '{}'",
                    entity.id, source.id
                ),
            ));
        }

        if entity
            .truncate
            .as_ref()
            .is_some_and(|truncate| truncate.enabled)
        {
            truncating_tables
                .entry(entity.table.as_str())
                .or_default()
                .push((idx, entity.discriminator.is_some()));
        }

        validate_entity(entity, &path, report);
    }

    for (table, entries) in truncating_tables {
        if entries.len() > 1 && entries.iter().any(|(_, scoped)| !scoped) {
            for (idx, scoped) in entries {
                if !scoped {
                    report.push_warning(
                        ValidationIssue::warning(
                            "unscoped_shared_truncate",
                            format!("{base_path}/entities/{idx}/truncate"),
                            format!(
                                "table '{table}' is truncated by several entities \
                                 without a discriminator"
                            ),
                        )
                        .with_hint(
                            "declare a discriminator so only this entity's rows are cleared",
                        ),
                    );
                }
            }
        }
    }
}

fn validate_entity(entity: &EntityConfig, base_path: &str, report: &mut ValidationReport) {
    if entity.table.trim().is_empty() {
        report.push_error(ValidationIssue::error(
            "empty_table",
            format!("{base_path}/table"),
            format!("entity '{}' has no backing table", entity.id),
        ));
    }

    let processes_records =
        entity.anonymize && (!entity.properties.is_empty() || entity.override_executor.is_some());

    if processes_records && entity.identifiers.is_empty() {
        report.push_error(
            ValidationIssue::error(
                "identifiers_empty",
                format!("{base_path}/identifiers"),
                format!("entity '{}' needs at least one identifier column", entity.id),
            )
            .with_hint("updates are keyed by identifier columns"),
        );
    }
    for (idx, identifier) in entity.identifiers.iter().enumerate() {
        if identifier.trim().is_empty() {
            report.push_error(ValidationIssue::error(
                "empty_identifier",
                format!("{base_path}/identifiers/{idx}"),
                "identifier column must be a non-empty string",
            ));
        }
    }

    if let Some(discriminator) = &entity.discriminator
        && discriminator.column.trim().is_empty()
    {
        report.push_error(ValidationIssue::error(
            "empty_discriminator_column",
            format!("{base_path}/discriminator/column"),
            "discriminator column must be a non-empty string",
        ));
    }

    match entity.override_executor.as_deref() {
        Some(executor) if executor.trim().is_empty() => {
            report.push_error(ValidationIssue::error(
                "empty_override_executor",
                format!("{base_path}/override_executor"),
                "override_executor is declared but empty",
            ));
        }
        Some(_) if !entity.properties.is_empty() => {
            report.push_warning(ValidationIssue::warning(
                "override_shadows_properties",
                format!("{base_path}/properties"),
                format!(
                    "entity '{}' uses an override executor; its properties are ignored",
                    entity.id
                ),
            ));
        }
        _ => {}
    }

    if entity.anonymize
        && entity.properties.is_empty()
        && entity.override_executor.is_none()
        && entity.truncate.is_none()
    {
        report.push_warning(ValidationIssue::warning(
            "entity_without_work",
            base_path.to_string(),
            format!(
                "entity '{}' declares no properties, override executor, or truncate",
                entity.id
            ),
        ));
    }

    validate_patterns(&entity.include, &format!("{base_path}/include"), report);
    validate_patterns(&entity.exclude, &format!("{base_path}/exclude"), report);

    let mut fields = HashSet::new();
    let mut columns = HashSet::new();
    for (idx, property) in entity.properties.iter().enumerate() {
        let path = format!("{base_path}/properties/{idx}");
        if !property.field.trim().is_empty() && !fields.insert(property.field.as_str()) {
            report.push_error(ValidationIssue::error(
                "duplicate_property",
                format!("{path}/field"),
                format!(
                    "property '{}' is declared more than once on '{}'",
                    property.field, entity.id
                ),
            ));
        }
        if !columns.insert(property.column_name()) {
            report.push_warning(ValidationIssue::warning(
                "duplicate_property_column",
                path.clone(),
                format!(
                    "column '{}' is targeted by more than one property; the later one wins",
                    property.column_name()
                ),
            ));
        }
        validate_property(entity, property, &path, report);
    }
}

fn validate_property(
    entity: &EntityConfig,
    property: &PropertyConfig,
    base_path: &str,
    report: &mut ValidationReport,
) {
    if property.field.trim().is_empty() {
        report.push_error(ValidationIssue::error(
            "empty_property_field",
            format!("{base_path}/field"),
            "property field must be a non-empty string",
        ));
    }

    if property.generator.trim().is_empty() {
        report.push_error(ValidationIssue::error(
            "empty_generator_id",
            format!("{base_path}/generator"),
            "generator id must be a non-empty string",
        ));
    }

    if let Some(columns) = &entity.columns
        && !columns.iter().any(|column| column == property.column_name())
    {
        report.push_warning(
            ValidationIssue::warning(
                "unresolved_column",
                format!("{base_path}/column"),
                format!(
                    "column '{}' is not declared on table '{}'; the property will be skipped",
                    property.column_name(),
                    entity.table
                ),
            )
            .with_hint("fix the column name or add it to the entity's columns"),
        );
    }

    validate_patterns(&property.include, &format!("{base_path}/include"), report);
    validate_patterns(&property.exclude, &format!("{base_path}/exclude"), report);
}

fn validate_patterns(config: &PatternConfig, base_path: &str, report: &mut ValidationReport) {
    let list = matches!(config, PatternConfig::AnyOf(_));
    let before = report.errors.len();

    for (set_idx, set) in config.sets().iter().enumerate() {
        let set_path = if list {
            format!("{base_path}/{set_idx}")
        } else {
            base_path.to_string()
        };

        if list && set.is_empty() {
            report.push_error(
                ValidationIssue::error(
                    "empty_pattern_set",
                    set_path.clone(),
                    "pattern set inside a list must declare at least one field",
                )
                .with_hint("an empty set would match every record"),
            );
        }

        for (field, spec) in set.iter() {
            if field.trim().is_empty() {
                report.push_error(ValidationIssue::error(
                    "empty_pattern_field",
                    set_path.clone(),
                    "pattern field name must be a non-empty string",
                ));
            }
            let rules = spec.rules();
            if rules.is_empty() || rules.iter().any(|rule| rule.is_empty()) {
                report.push_error(ValidationIssue::error(
                    "empty_pattern_rule",
                    format!("{set_path}/{field}"),
                    format!("pattern rule for '{field}' must be a non-empty string"),
                ));
            }
        }
    }

    if report.errors.len() == before
        && let Err(err) = PatternMatcher::compile(config, &PatternConfig::default())
    {
        report.push_error(ValidationIssue::error(
            "invalid_pattern",
            base_path.to_string(),
            err.to_string(),
        ));
    }
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}
