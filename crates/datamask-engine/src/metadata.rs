//! Metadata provider boundary and the registry built from configuration.

use datamask_config::{EntityConfig, SourceConfig};
use datamask_core::{EntityDescriptor, PropertyDescriptor};

/// Resolved entity and property metadata for one source.
pub trait MetadataProvider {
    /// Entities in processing order.
    fn list_entities(&self) -> Vec<EntityDescriptor>;

    /// Declared properties of an entity, in declaration order. Columns are
    /// the declared ones; use [`MetadataProvider::resolve_column`] to check
    /// they exist.
    fn list_properties(&self, entity_id: &str) -> Vec<PropertyDescriptor>;

    /// Column backing `field`, or `None` when it cannot be resolved.
    fn resolve_column(&self, entity_id: &str, field: &str) -> Option<String>;

    fn identifier_columns(&self, entity_id: &str) -> Vec<String>;
}

/// Static descriptor registry for one configured source.
#[derive(Debug, Clone)]
pub struct DescriptorRegistry {
    source_id: String,
    entities: Vec<EntityConfig>,
}

impl DescriptorRegistry {
    pub fn from_source(source: &SourceConfig) -> Self {
        Self {
            source_id: source.id.clone(),
            entities: source.entities.clone(),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    fn entity(&self, entity_id: &str) -> Option<&EntityConfig> {
        self.entities.iter().find(|entity| entity.id == entity_id)
    }
}

impl MetadataProvider for DescriptorRegistry {
    fn list_entities(&self) -> Vec<EntityDescriptor> {
        self.entities.iter().map(EntityConfig::to_descriptor).collect()
    }

    fn list_properties(&self, entity_id: &str) -> Vec<PropertyDescriptor> {
        self.entity(entity_id)
            .map(|entity| {
                entity
                    .properties
                    .iter()
                    .map(|property| property.to_descriptor(property.column_name()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn resolve_column(&self, entity_id: &str, field: &str) -> Option<String> {
        let entity = self.entity(entity_id)?;
        let property = entity.properties.iter().find(|p| p.field == field)?;
        let column = property.column_name();
        match &entity.columns {
            Some(columns) if !columns.iter().any(|known| known == column) => None,
            _ => Some(column.to_string()),
        }
    }

    fn identifier_columns(&self, entity_id: &str) -> Vec<String> {
        self.entity(entity_id)
            .map(|entity| entity.identifiers.clone())
            .unwrap_or_default()
    }
}
