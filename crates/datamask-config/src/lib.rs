//! Descriptor registry files and pre-flight validation.
//!
//! A `datamask.toml` (or `.json`) file declares the sources, entities and
//! properties to anonymize. This crate loads it, emits its JSON Schema, and
//! reports every structural problem before the engine touches a record.

pub mod errors;
pub mod load;
pub mod model;
pub mod schema;
pub mod validate;

pub use errors::{ConfigError, IssueSeverity, Result, ValidationIssue, ValidationReport};
pub use load::{load_config, parse_config_json, parse_config_toml};
pub use model::{
    DEFAULT_BATCH_SIZE, EntityConfig, MaskConfig, PropertyConfig, SourceConfig, TruncateConfig,
};
pub use schema::config_json_schema;
pub use validate::{validate_config, validate_config_json};
