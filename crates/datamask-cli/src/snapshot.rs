//! JSON snapshot directories as a record source.
//!
//! Each table is a `<table>.json` file holding an array of objects. Tables
//! are read on first use and only tables that were written to or truncated
//! are saved back.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use datamask_core::{Discriminator, EntityDescriptor, Record};
use datamask_engine::{ColumnValues, MemoryRecordSource, RecordSource, StorageError};

#[derive(Debug)]
pub struct SnapshotSource {
    dir: PathBuf,
    tables: MemoryRecordSource,
    loaded: BTreeSet<String>,
    dirty: BTreeSet<String>,
}

impl SnapshotSource {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            tables: MemoryRecordSource::new(),
            loaded: BTreeSet::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.json"))
    }

    /// Missing files leave the table absent, so the engine reports it.
    fn ensure_loaded(&mut self, table: &str) -> Result<(), StorageError> {
        if !self.loaded.insert(table.to_string()) {
            return Ok(());
        }
        let path = self.table_path(table);
        if !path.exists() {
            debug!(table, path = %path.display(), "snapshot table missing");
            return Ok(());
        }
        let rows: Vec<Record> = serde_json::from_str(&fs::read_to_string(&path)?)?;
        debug!(table, rows = rows.len(), "snapshot table loaded");
        self.tables.insert_table(table, rows);
        Ok(())
    }

    /// Write every modified table back to its file.
    pub fn persist(&self) -> Result<usize, StorageError> {
        let mut written = 0;
        for table in &self.dirty {
            let Some(rows) = self.tables.table(table) else {
                continue;
            };
            let data = serde_json::to_vec_pretty(rows)?;
            write_bytes_atomic(&self.table_path(table), &data)?;
            written += 1;
        }
        if written > 0 {
            info!(dir = %self.dir.display(), tables = written, "snapshot saved");
        }
        Ok(written)
    }
}

impl RecordSource for SnapshotSource {
    fn fetch_all(&mut self, entity: &EntityDescriptor) -> Result<Vec<Record>, StorageError> {
        self.ensure_loaded(&entity.table)?;
        self.tables.fetch_all(entity)
    }

    fn update(
        &mut self,
        entity: &EntityDescriptor,
        identifiers: &ColumnValues,
        columns: &ColumnValues,
    ) -> Result<(), StorageError> {
        self.ensure_loaded(&entity.table)?;
        self.tables.update(entity, identifiers, columns)?;
        self.dirty.insert(entity.table.clone());
        Ok(())
    }

    fn truncate(
        &mut self,
        entity: &EntityDescriptor,
        discriminator: Option<&Discriminator>,
    ) -> Result<(), StorageError> {
        self.ensure_loaded(&entity.table)?;
        self.tables.truncate(entity, discriminator)?;
        self.dirty.insert(entity.table.clone());
        Ok(())
    }
}

fn write_bytes_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }

    let mut tmp_path = path.as_os_str().to_owned();
    tmp_path.push(".tmp");
    let tmp_path = PathBuf::from(tmp_path);
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(&tmp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    fs::rename(&tmp_path, path)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn scratch_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("datamask-snapshot-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).expect("create scratch dir");
        dir
    }

    fn write_table(dir: &Path, table: &str, rows: serde_json::Value) {
        fs::write(dir.join(format!("{table}.json")), rows.to_string()).expect("write table");
    }

    #[test]
    fn updates_and_truncations_are_saved_back() {
        let dir = scratch_dir();
        write_table(
            &dir,
            "users",
            json!([{"id": 1, "email": "a@b.com"}, {"id": 2, "email": "c@d.com"}]),
        );
        write_table(&dir, "logs", json!([{"id": 1}]));
        write_table(&dir, "untouched", json!([{"id": 1}]));
        let before_untouched = fs::read_to_string(dir.join("untouched.json")).expect("read");

        let users = EntityDescriptor::new("User", "users");
        let logs = EntityDescriptor::new("Log", "logs");
        let untouched = EntityDescriptor::new("Other", "untouched");
        let mut source = SnapshotSource::open(&dir);
        assert_eq!(source.fetch_all(&users).expect("fetch").len(), 2);
        assert_eq!(source.fetch_all(&untouched).expect("fetch").len(), 1);
        let identifiers = ColumnValues::from([("id".to_string(), json!(2))]);
        let columns = ColumnValues::from([("email".to_string(), json!("x@y.org"))]);
        source.update(&users, &identifiers, &columns).expect("update");
        source.truncate(&logs, None).expect("truncate");

        assert_eq!(source.persist().expect("persist"), 2);
        let saved: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("users.json")).expect("read"))
                .expect("parse");
        assert_eq!(saved[1]["email"], "x@y.org");
        assert_eq!(saved[0]["email"], "a@b.com");
        let logs: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(dir.join("logs.json")).expect("read"))
                .expect("parse");
        assert_eq!(logs, json!([]));
        assert_eq!(
            fs::read_to_string(dir.join("untouched.json")).expect("read"),
            before_untouched
        );

        fs::remove_dir_all(dir).expect("cleanup");
    }

    #[test]
    fn missing_table_files_surface_as_table_not_found() {
        let dir = scratch_dir();
        let mut source = SnapshotSource::open(&dir);
        let err = source
            .fetch_all(&EntityDescriptor::new("Ghost", "ghosts"))
            .expect_err("missing table");
        assert!(matches!(err, StorageError::TableNotFound(table) if table == "ghosts"));
        assert_eq!(source.persist().expect("persist"), 0);
        fs::remove_dir_all(dir).expect("cleanup");
    }
}
