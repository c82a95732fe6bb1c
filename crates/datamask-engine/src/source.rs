//! Record source boundary and the in-memory implementation.

use std::collections::BTreeMap;

use serde_json::Value;

use datamask_core::{Discriminator, EntityDescriptor, Record, TruncateTarget};

use crate::errors::StorageError;

/// Column name to value, used for identifier keys and column updates.
pub type ColumnValues = BTreeMap<String, Value>;

/// One record's pending write.
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub identifiers: ColumnValues,
    pub columns: ColumnValues,
}

/// Storage the engine reads records from and writes substitutes to.
pub trait RecordSource {
    /// Every record of the entity. Sources holding several entities in one
    /// table return only rows matching the entity's discriminator.
    fn fetch_all(&mut self, entity: &EntityDescriptor) -> Result<Vec<Record>, StorageError>;

    /// Write `columns` to the record keyed by `identifiers`, all at once.
    fn update(
        &mut self,
        entity: &EntityDescriptor,
        identifiers: &ColumnValues,
        columns: &ColumnValues,
    ) -> Result<(), StorageError>;

    /// Flush a batch of pending writes. Stops at the first failing write.
    fn update_batch(
        &mut self,
        entity: &EntityDescriptor,
        batch: &[RowUpdate],
    ) -> Result<(), StorageError> {
        for row in batch {
            self.update(entity, &row.identifiers, &row.columns)?;
        }
        Ok(())
    }

    /// Delete the entity's rows; only rows matching `discriminator` when one
    /// is given.
    fn truncate(
        &mut self,
        entity: &EntityDescriptor,
        discriminator: Option<&Discriminator>,
    ) -> Result<(), StorageError>;
}

/// Tables held in memory, keyed by table name.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordSource {
    tables: BTreeMap<String, Vec<Record>>,
    writes: usize,
    truncations: Vec<String>,
}

impl MemoryRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_table(mut self, table: impl Into<String>, rows: Vec<Record>) -> Self {
        self.insert_table(table, rows);
        self
    }

    pub fn insert_table(&mut self, table: impl Into<String>, rows: Vec<Record>) {
        self.tables.insert(table.into(), rows);
    }

    pub fn table(&self, table: &str) -> Option<&[Record]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    pub fn tables(&self) -> &BTreeMap<String, Vec<Record>> {
        &self.tables
    }

    pub fn into_tables(self) -> BTreeMap<String, Vec<Record>> {
        self.tables
    }

    /// Number of record updates applied so far.
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// Tables truncated so far, in call order.
    pub fn truncations(&self) -> &[String] {
        &self.truncations
    }

    fn rows_mut(&mut self, table: &str) -> Result<&mut Vec<Record>, StorageError> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))
    }
}

fn matches_discriminator(record: &Record, discriminator: Option<&Discriminator>) -> bool {
    discriminator.is_none_or(|d| record.get(&d.column) == Some(&d.value))
}

impl RecordSource for MemoryRecordSource {
    fn fetch_all(&mut self, entity: &EntityDescriptor) -> Result<Vec<Record>, StorageError> {
        let rows = self
            .tables
            .get(&entity.table)
            .ok_or_else(|| StorageError::TableNotFound(entity.table.clone()))?;
        Ok(rows
            .iter()
            .filter(|row| matches_discriminator(row, entity.discriminator.as_ref()))
            .cloned()
            .collect())
    }

    fn update(
        &mut self,
        entity: &EntityDescriptor,
        identifiers: &ColumnValues,
        columns: &ColumnValues,
    ) -> Result<(), StorageError> {
        let discriminator = entity.discriminator.clone();
        let rows = self.rows_mut(&entity.table)?;
        let row = rows
            .iter_mut()
            .find(|row| {
                matches_discriminator(row, discriminator.as_ref())
                    && identifiers
                        .iter()
                        .all(|(column, value)| row.get(column) == Some(value))
            })
            .ok_or_else(|| StorageError::RowNotFound {
                table: entity.table.clone(),
                identifiers: serde_json::to_string(identifiers).unwrap_or_default(),
            })?;
        row.apply(columns);
        self.writes += 1;
        Ok(())
    }

    fn truncate(
        &mut self,
        entity: &EntityDescriptor,
        discriminator: Option<&Discriminator>,
    ) -> Result<(), StorageError> {
        let rows = self.rows_mut(&entity.table)?;
        rows.retain(|row| discriminator.is_some() && !matches_discriminator(row, discriminator));
        self.truncations.push(entity.table.clone());
        Ok(())
    }
}

/// Source as seen after truncations that were skipped because of a dry run.
/// Rows those truncations would have deleted are hidden from reads.
pub struct TruncatedView<'r> {
    inner: &'r mut dyn RecordSource,
    cleared: &'r [TruncateTarget],
}

impl<'r> TruncatedView<'r> {
    pub fn new(inner: &'r mut dyn RecordSource, cleared: &'r [TruncateTarget]) -> Self {
        Self { inner, cleared }
    }
}

impl RecordSource for TruncatedView<'_> {
    fn fetch_all(&mut self, entity: &EntityDescriptor) -> Result<Vec<Record>, StorageError> {
        let mut rows = self.inner.fetch_all(entity)?;
        for target in self.cleared.iter().filter(|target| target.table == entity.table) {
            let scope = target.discriminator.as_ref();
            rows.retain(|row| scope.is_some() && !matches_discriminator(row, scope));
        }
        Ok(rows)
    }

    fn update(
        &mut self,
        entity: &EntityDescriptor,
        identifiers: &ColumnValues,
        columns: &ColumnValues,
    ) -> Result<(), StorageError> {
        self.inner.update(entity, identifiers, columns)
    }

    fn update_batch(
        &mut self,
        entity: &EntityDescriptor,
        batch: &[RowUpdate],
    ) -> Result<(), StorageError> {
        self.inner.update_batch(entity, batch)
    }

    fn truncate(
        &mut self,
        entity: &EntityDescriptor,
        discriminator: Option<&Discriminator>,
    ) -> Result<(), StorageError> {
        self.inner.truncate(entity, discriminator)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> Record {
        Record::try_from(value).expect("record")
    }

    fn shared_table() -> MemoryRecordSource {
        MemoryRecordSource::new().with_table(
            "people",
            vec![
                record(json!({"id": 1, "type": "customer", "name": "a"})),
                record(json!({"id": 2, "type": "employee", "name": "b"})),
                record(json!({"id": 3, "type": "customer", "name": "c"})),
            ],
        )
    }

    fn customer() -> EntityDescriptor {
        let mut entity = EntityDescriptor::new("Customer", "people");
        entity.discriminator = Some(Discriminator {
            column: "type".to_string(),
            value: json!("customer"),
        });
        entity
    }

    #[test]
    fn fetch_filters_by_discriminator() {
        let mut source = shared_table();
        let rows = source.fetch_all(&customer()).expect("fetch");
        assert_eq!(rows.len(), 2);
        let all = source
            .fetch_all(&EntityDescriptor::new("Person", "people"))
            .expect("fetch");
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn update_writes_all_columns_of_the_keyed_row() {
        let mut source = shared_table();
        let identifiers = ColumnValues::from([("id".to_string(), json!(3))]);
        let columns = ColumnValues::from([
            ("name".to_string(), json!("z")),
            ("type".to_string(), json!("customer")),
        ]);
        source
            .update(&customer(), &identifiers, &columns)
            .expect("update");
        let rows = source.table("people").expect("table");
        assert_eq!(rows[2].get("name"), Some(&json!("z")));
        assert_eq!(source.write_count(), 1);
    }

    #[test]
    fn update_of_missing_row_fails() {
        let mut source = shared_table();
        let identifiers = ColumnValues::from([("id".to_string(), json!(2))]);
        let err = source
            .update(&customer(), &identifiers, &ColumnValues::new())
            .expect_err("employee row is not a customer");
        assert!(matches!(err, StorageError::RowNotFound { .. }));
    }

    #[test]
    fn discriminator_truncate_preserves_siblings() {
        let mut source = shared_table();
        let entity = customer();
        source
            .truncate(&entity, entity.discriminator.as_ref())
            .expect("truncate");
        let rows = source.table("people").expect("table");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("type"), Some(&json!("employee")));
    }

    #[test]
    fn plain_truncate_clears_table() {
        let mut source = shared_table();
        source
            .truncate(&EntityDescriptor::new("Person", "people"), None)
            .expect("truncate");
        assert_eq!(source.table("people").map(<[Record]>::len), Some(0));
        assert_eq!(source.truncations(), ["people".to_string()]);
    }

    #[test]
    fn truncated_view_hides_cleared_rows() {
        let mut source = shared_table();
        let scoped = TruncateTarget {
            entity: "Customer".to_string(),
            table: "people".to_string(),
            order: None,
            discriminator: customer().discriminator,
        };
        let cleared = [scoped];
        let mut view = TruncatedView::new(&mut source, &cleared);
        assert!(view.fetch_all(&customer()).expect("fetch").is_empty());
        let everyone = view
            .fetch_all(&EntityDescriptor::new("Person", "people"))
            .expect("fetch");
        assert_eq!(everyone.len(), 1);
        assert_eq!(everyone[0].get("type"), Some(&json!("employee")));

        let unscoped = [TruncateTarget {
            entity: "Person".to_string(),
            table: "people".to_string(),
            order: None,
            discriminator: None,
        }];
        let mut view = TruncatedView::new(&mut source, &unscoped);
        assert!(view.fetch_all(&customer()).expect("fetch").is_empty());
        assert_eq!(source.table("people").map(<[Record]>::len), Some(3));
    }
}
