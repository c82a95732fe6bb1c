use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use datamask_core::{
    CONFIG_VERSION, Discriminator, EntityDescriptor, PatternConfig, PropertyDescriptor,
    StorageType, TruncateDirective,
};

/// Pending updates buffered before a flush when no batch size is declared.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Canonical descriptor registry for an anonymization run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct MaskConfig {
    /// Contract version for the registry format.
    #[serde(default = "default_config_version")]
    pub config_version: String,
    /// Seed for deterministic generators.
    #[serde(default)]
    pub seed: u64,
    /// Pending record updates buffered before they are flushed.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Compute everything but suppress writes.
    #[serde(default)]
    pub dry_run: bool,
    /// Options merged over every property using the keyed generator.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub generator_options: BTreeMap<String, BTreeMap<String, Value>>,
    /// Data sources (connections), processed in declaration order.
    pub sources: Vec<SourceConfig>,
}

/// One connection or data source and the entities it holds.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SourceConfig {
    /// Source identifier used to key statistics.
    pub id: String,
    /// Backend-specific location (for the CLI: a snapshot directory).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub entities: Vec<EntityConfig>,
}

/// Truncate directive as written in the registry.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TruncateConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

/// Entity declaration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct EntityConfig {
    /// Opaque entity identifier.
    pub id: String,
    /// Backing table or collection.
    pub table: String,
    /// Identifier column(s); defaults to `id`.
    #[serde(default = "default_identifiers")]
    pub identifiers: Vec<String>,
    /// Known columns of the table. When set, properties must resolve to one
    /// of them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncate: Option<TruncateConfig>,
    #[serde(default = "default_true")]
    pub anonymize: bool,
    #[serde(default, skip_serializing_if = "PatternConfig::is_empty")]
    pub include: PatternConfig,
    #[serde(default, skip_serializing_if = "PatternConfig::is_empty")]
    pub exclude: PatternConfig,
    /// Executor that replaces property-level processing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_executor: Option<String>,
    #[serde(default)]
    pub properties: Vec<PropertyConfig>,
}

/// Property declaration.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PropertyConfig {
    pub field: String,
    /// Column name; defaults to the field name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    pub generator: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_type: Option<StorageType>,
    #[serde(default, skip_serializing_if = "PatternConfig::is_empty")]
    pub include: PatternConfig,
    #[serde(default, skip_serializing_if = "PatternConfig::is_empty")]
    pub exclude: PatternConfig,
}

impl MaskConfig {
    pub fn source(&self, id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|source| source.id == id)
    }
}

impl SourceConfig {
    pub fn entity(&self, id: &str) -> Option<&EntityConfig> {
        self.entities.iter().find(|entity| entity.id == id)
    }
}

impl EntityConfig {
    /// Resolved entity descriptor.
    pub fn to_descriptor(&self) -> EntityDescriptor {
        EntityDescriptor {
            id: self.id.clone(),
            table: self.table.clone(),
            identifiers: self.identifiers.clone(),
            discriminator: self.discriminator.clone(),
            truncate: self.truncate.as_ref().map(|truncate| TruncateDirective {
                enabled: truncate.enabled,
                order: truncate.order,
            }),
            include: self.include.clone(),
            exclude: self.exclude.clone(),
            override_executor: self.override_executor.clone(),
            anonymizable: self.anonymize,
        }
    }
}

impl PropertyConfig {
    /// Column this property targets, falling back to the field name.
    pub fn column_name(&self) -> &str {
        self.column.as_deref().unwrap_or(&self.field)
    }

    /// Resolved property descriptor bound to `column`.
    pub fn to_descriptor(&self, column: impl Into<String>) -> PropertyDescriptor {
        PropertyDescriptor {
            field: self.field.clone(),
            column: column.into(),
            weight: self.weight,
            generator: self.generator.clone(),
            options: self.options.clone(),
            column_type: self.column_type,
            include: self.include.clone(),
            exclude: self.exclude.clone(),
        }
    }
}

fn default_config_version() -> String {
    CONFIG_VERSION.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_identifiers() -> Vec<String> {
    vec!["id".to_string()]
}

fn default_true() -> bool {
    true
}
