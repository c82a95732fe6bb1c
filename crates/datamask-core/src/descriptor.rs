use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pattern::PatternConfig;

/// Declared storage type of a column, used to convert generated values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageType {
    Integer,
    Float,
    Boolean,
    String,
    Text,
    Date,
    Datetime,
    Json,
}

impl StorageType {
    /// Infer the storage type from an existing value.
    ///
    /// Returns `None` for `null`, where no type can be derived.
    pub fn infer(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Boolean),
            Value::Number(number) if number.is_f64() => Some(Self::Float),
            Value::Number(_) => Some(Self::Integer),
            Value::String(_) => Some(Self::String),
            Value::Array(_) | Value::Object(_) => Some(Self::Json),
        }
    }
}

/// Instruction to clear an entity's rows before anonymization runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TruncateDirective {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Explicit clearing order; lower runs first, absent runs last.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i64>,
}

/// Column/value pair distinguishing one subtype within a shared table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Discriminator {
    pub column: String,
    pub value: Value,
}

/// Resolved entity metadata. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Opaque identifier, e.g. a fully-qualified type name.
    pub id: String,
    /// Backing table/collection.
    pub table: String,
    /// Identifier column(s) used to key updates.
    pub identifiers: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discriminator: Option<Discriminator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncate: Option<TruncateDirective>,
    #[serde(default, skip_serializing_if = "PatternConfig::is_empty")]
    pub include: PatternConfig,
    #[serde(default, skip_serializing_if = "PatternConfig::is_empty")]
    pub exclude: PatternConfig,
    /// Executor that replaces property-level processing for this entity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_executor: Option<String>,
    /// Whether records of this entity are anonymized at all. Entities with
    /// only a truncate directive set this to false.
    #[serde(default = "default_true")]
    pub anonymizable: bool,
}

impl EntityDescriptor {
    pub fn new(id: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            table: table.into(),
            identifiers: vec!["id".to_string()],
            discriminator: None,
            truncate: None,
            include: PatternConfig::default(),
            exclude: PatternConfig::default(),
            override_executor: None,
            anonymizable: true,
        }
    }

    /// Truncate directive, if declared and enabled.
    pub fn active_truncate(&self) -> Option<&TruncateDirective> {
        self.truncate.as_ref().filter(|directive| directive.enabled)
    }
}

/// Resolved property metadata. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    /// Declared field name.
    pub field: String,
    /// Column the field resolves to.
    pub column: String,
    /// Processing weight; lower runs first, absent runs after all weighted.
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

impl PropertyDescriptor {
    pub fn new(field: impl Into<String>, generator: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            column: field.clone(),
            field,
            weight: None,
            generator: generator.into(),
            options: BTreeMap::new(),
            column_type: None,
            include: PatternConfig::default(),
            exclude: PatternConfig::default(),
        }
    }

    pub fn with_weight(mut self, weight: i64) -> Self {
        self.weight = Some(weight);
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }
}

fn default_true() -> bool {
    true
}
