//! Persisted run records and field-by-field comparison of two runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::model::{EntityStats, RunStatistics};

/// One run as kept in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub run_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub dry_run: bool,
    pub statistics: RunStatistics,
}

impl HistoryRecord {
    pub fn new(run_id: impl Into<String>, dry_run: bool, statistics: RunStatistics) -> Self {
        Self {
            run_id: run_id.into(),
            timestamp: Utc::now(),
            dry_run,
            statistics,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Change of one counter between two runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub before: Option<u64>,
    pub after: Option<u64>,
}

impl FieldChange {
    pub fn delta(&self) -> i128 {
        i128::from(self.after.unwrap_or(0)) - i128::from(self.before.unwrap_or(0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityChange {
    Added,
    Removed,
    Changed,
}

/// Differences for one `entity@source` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityDiff {
    pub key: String,
    pub change: EntityChange,
    pub fields: Vec<FieldChange>,
}

/// Comparison of two runs. Unchanged entities are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDiff {
    pub before_run: String,
    pub after_run: String,
    pub global: Vec<FieldChange>,
    pub duration_delta: f64,
    pub entities: Vec<EntityDiff>,
}

impl RunDiff {
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.entities.is_empty()
    }
}

pub fn diff_runs(before: &HistoryRecord, after: &HistoryRecord) -> RunDiff {
    let (a, b) = (&before.statistics, &after.statistics);
    let global = changed(vec![
        change("total_entities", Some(a.global.total_entities), Some(b.global.total_entities)),
        change("total_processed", Some(a.global.total_processed), Some(b.global.total_processed)),
        change("total_updated", Some(a.global.total_updated), Some(b.global.total_updated)),
        change("total_skipped", Some(a.global.total_skipped), Some(b.global.total_skipped)),
    ]);

    let keys: BTreeSet<&String> = a.entities.keys().chain(b.entities.keys()).collect();
    let mut entities = Vec::new();
    for key in keys {
        let left = a.entities.get(key);
        let right = b.entities.get(key);
        let fields = changed(entity_fields(left, right));
        let change = match (left, right) {
            (None, Some(_)) => EntityChange::Added,
            (Some(_), None) => EntityChange::Removed,
            _ if fields.is_empty() => continue,
            _ => EntityChange::Changed,
        };
        entities.push(EntityDiff {
            key: key.clone(),
            change,
            fields,
        });
    }

    RunDiff {
        before_run: before.run_id.clone(),
        after_run: after.run_id.clone(),
        global,
        duration_delta: b.global.duration - a.global.duration,
        entities,
    }
}

fn entity_fields(left: Option<&EntityStats>, right: Option<&EntityStats>) -> Vec<FieldChange> {
    let mut fields = vec![
        change("processed", left.map(|e| e.processed), right.map(|e| e.processed)),
        change("updated", left.map(|e| e.updated), right.map(|e| e.updated)),
        change("skipped", left.map(|e| e.skipped), right.map(|e| e.skipped)),
    ];
    let empty = BTreeMap::new();
    let left_props = left.map(|e| &e.properties).unwrap_or(&empty);
    let right_props = right.map(|e| &e.properties).unwrap_or(&empty);
    let names: BTreeSet<&String> = left_props.keys().chain(right_props.keys()).collect();
    for name in names {
        fields.push(change(
            &format!("properties.{name}"),
            left_props.get(name).copied(),
            right_props.get(name).copied(),
        ));
    }
    fields
}

fn change(field: &str, before: Option<u64>, after: Option<u64>) -> FieldChange {
    FieldChange {
        field: field.to_string(),
        before,
        after,
    }
}

fn changed(fields: Vec<FieldChange>) -> Vec<FieldChange> {
    fields
        .into_iter()
        .filter(|field| field.before != field.after)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::StatisticsCollector;

    fn record(run_id: &str, entries: &[(&str, u64, u64, &[(&str, u64)])]) -> HistoryRecord {
        let mut collector = StatisticsCollector::new();
        for (entity, processed, updated, props) in entries {
            let props = props
                .iter()
                .map(|(name, count)| (name.to_string(), *count))
                .collect();
            collector.record_entity(entity, "main", *processed, *updated, &props);
        }
        HistoryRecord::new(run_id, false, collector.into_statistics())
    }

    #[test]
    fn identical_runs_have_no_diff() {
        let a = record("a", &[("User", 3, 2, &[("email", 2)])]);
        let b = record("b", &[("User", 3, 2, &[("email", 2)])]);
        assert!(diff_runs(&a, &b).is_empty());
    }

    #[test]
    fn diff_reports_changed_added_and_removed_entities() {
        let a = record(
            "a",
            &[("User", 3, 2, &[("email", 2)]), ("Order", 1, 1, &[])],
        );
        let b = record(
            "b",
            &[("User", 4, 2, &[("email", 2), ("name", 1)]), ("Invoice", 2, 0, &[])],
        );
        let diff = diff_runs(&a, &b);

        let processed = diff
            .global
            .iter()
            .find(|field| field.field == "total_processed")
            .expect("total_processed");
        assert_eq!(processed.delta(), 2);

        let kinds: Vec<(&str, EntityChange)> = diff
            .entities
            .iter()
            .map(|entity| (entity.key.as_str(), entity.change))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("Invoice@main", EntityChange::Added),
                ("Order@main", EntityChange::Removed),
                ("User@main", EntityChange::Changed),
            ]
        );

        let user = &diff.entities[2];
        let fields: Vec<&str> = user.fields.iter().map(|f| f.field.as_str()).collect();
        assert_eq!(fields, vec!["processed", "skipped", "properties.name"]);
    }
}
