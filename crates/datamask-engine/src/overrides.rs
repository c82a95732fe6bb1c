//! Override executors: whole-record anonymizers that replace property-level
//! processing for an entity.

use std::collections::BTreeMap;
use std::fmt;

use datamask_core::{EntityDescriptor, Record};

use crate::errors::GenerationError;
use crate::source::ColumnValues;

pub trait OverrideExecutor: Send + Sync {
    /// Column substitutes for one record. An empty map leaves it untouched.
    fn anonymize(
        &self,
        entity: &EntityDescriptor,
        record: &Record,
        dry_run: bool,
    ) -> Result<ColumnValues, GenerationError>;
}

impl<F> OverrideExecutor for F
where
    F: Fn(&EntityDescriptor, &Record, bool) -> Result<ColumnValues, GenerationError> + Send + Sync,
{
    fn anonymize(
        &self,
        entity: &EntityDescriptor,
        record: &Record,
        dry_run: bool,
    ) -> Result<ColumnValues, GenerationError> {
        self(entity, record, dry_run)
    }
}

#[derive(Default)]
pub struct OverrideRegistry {
    executors: BTreeMap<String, Box<dyn OverrideExecutor>>,
}

impl fmt::Debug for OverrideRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverrideRegistry")
            .field("executors", &self.executors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl OverrideRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, executor: impl OverrideExecutor + 'static) {
        self.executors.insert(id.into(), Box::new(executor));
    }

    pub fn contains(&self, id: &str) -> bool {
        self.executors.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&dyn OverrideExecutor> {
        self.executors.get(id).map(|executor| executor.as_ref())
    }
}
