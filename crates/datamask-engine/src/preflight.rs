//! Registry-aware pre-flight checks.
//!
//! Complements `datamask_config::validate_config` with what only the engine
//! knows: which generators and override executors are registered and which
//! options each generator accepts. Every problem is reported; nothing stops
//! at the first one.

use datamask_config::{ValidationIssue, ValidationReport};
use datamask_core::{EntityDescriptor, PatternMatcher};

use crate::engine::merged_options;
use crate::generators::GeneratorRegistry;
use crate::metadata::MetadataProvider;
use crate::model::EngineOptions;
use crate::overrides::OverrideRegistry;

/// Check every entity of every source. Paths follow the configuration
/// layout (`/sources/{i}/entities/{j}/properties/{k}`).
pub fn preflight(
    generators: &GeneratorRegistry,
    overrides: &OverrideRegistry,
    options: &EngineOptions,
    sources: &[&dyn MetadataProvider],
) -> ValidationReport {
    let mut report = ValidationReport::default();
    if options.batch_size == 0 {
        report.push_error(ValidationIssue::error(
            "batch_size_zero",
            "/batch_size",
            "batch size must be at least 1",
        ));
    }
    for generator in options.generator_options.keys() {
        if !generators.contains(generator) {
            report.push_error(ValidationIssue::error(
                "unknown_generator",
                format!("/generator_options/{generator}"),
                format!("options given for unknown generator '{generator}'"),
            ));
        }
    }

    for (source_index, metadata) in sources.iter().enumerate() {
        for (entity_index, entity) in metadata.list_entities().iter().enumerate() {
            let path = format!("/sources/{source_index}/entities/{entity_index}");
            check_entity(
                generators,
                overrides,
                options,
                *metadata,
                entity,
                &path,
                &mut report,
            );
        }
    }
    report
}

fn check_entity(
    generators: &GeneratorRegistry,
    overrides: &OverrideRegistry,
    options: &EngineOptions,
    metadata: &dyn MetadataProvider,
    entity: &EntityDescriptor,
    path: &str,
    report: &mut ValidationReport,
) {
    if let Err(err) = PatternMatcher::compile(&entity.include, &entity.exclude) {
        report.push_error(ValidationIssue::error(
            "invalid_pattern",
            path.to_string(),
            format!("entity '{}': {err}", entity.id),
        ));
    }
    if !entity.anonymizable {
        return;
    }

    if let Some(executor) = &entity.override_executor {
        if !overrides.contains(executor) {
            report.push_error(
                ValidationIssue::error(
                    "unknown_override_executor",
                    format!("{path}/override_executor"),
                    format!("override executor '{executor}' is not registered"),
                )
                .with_hint("register the executor before running"),
            );
        }
        return;
    }

    for (index, property) in metadata.list_properties(&entity.id).iter().enumerate() {
        let property_path = format!("{path}/properties/{index}");
        if let Err(err) = PatternMatcher::compile(&property.include, &property.exclude) {
            report.push_error(ValidationIssue::error(
                "invalid_pattern",
                property_path.clone(),
                format!("property '{}': {err}", property.field),
            ));
        }
        if property.generator.trim().is_empty() {
            continue;
        }
        if !generators.contains(&property.generator) {
            let known: Vec<&str> = generators.ids().collect();
            report.push_error(
                ValidationIssue::error(
                    "unknown_generator",
                    format!("{property_path}/generator"),
                    format!(
                        "property '{}' uses unknown generator '{}'",
                        property.field, property.generator
                    ),
                )
                .with_hint(format!("known generators: {}", known.join(", "))),
            );
            continue;
        }
        if let Err(err) =
            generators.validate_options(&property.generator, &merged_options(property, options))
        {
            report.push_error(ValidationIssue::error(
                "invalid_generator_options",
                format!("{property_path}/options"),
                format!("property '{}': {err}", property.field),
            ));
        }
    }
}
