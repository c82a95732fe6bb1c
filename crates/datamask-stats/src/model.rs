use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key under which an entity's counters are stored.
///
/// The source is part of the key so same-named entities on different
/// connections stay apart.
pub fn entity_key(entity: &str, source: &str) -> String {
    format!("{entity}@{source}")
}

/// Aggregate counters for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    pub total_entities: u64,
    pub total_processed: u64,
    pub total_updated: u64,
    pub total_skipped: u64,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    /// Seconds between `start_time` and `end_time`.
    #[serde(default)]
    pub duration: f64,
}

/// Counters for one entity on one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityStats {
    pub entity: String,
    pub connection: String,
    pub processed: u64,
    pub updated: u64,
    pub skipped: u64,
    #[serde(default)]
    pub properties: BTreeMap<String, u64>,
}

impl EntityStats {
    pub fn new(entity: impl Into<String>, connection: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            connection: connection.into(),
            ..Self::default()
        }
    }

    pub fn key(&self) -> String {
        entity_key(&self.entity, &self.connection)
    }
}

/// Statistics of one run, in the exported shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStatistics {
    pub global: GlobalStats,
    #[serde(default)]
    pub entities: BTreeMap<String, EntityStats>,
}

impl RunStatistics {
    pub fn entity(&self, entity: &str, source: &str) -> Option<&EntityStats> {
        self.entities.get(&entity_key(entity, source))
    }

    pub fn summary(&self) -> Summary {
        let average_per_second = if self.global.duration > 0.0 {
            self.global.total_processed as f64 / self.global.duration
        } else {
            0.0
        };
        Summary {
            total_entities: self.global.total_entities,
            total_processed: self.global.total_processed,
            total_updated: self.global.total_updated,
            total_skipped: self.global.total_skipped,
            duration: self.global.duration,
            average_per_second,
        }
    }

    /// Recompute global totals from the per-entity counters.
    pub(crate) fn refresh_totals(&mut self) {
        self.global.total_entities = self.entities.len() as u64;
        self.global.total_processed = self.entities.values().map(|e| e.processed).sum();
        self.global.total_updated = self.entities.values().map(|e| e.updated).sum();
        self.global.total_skipped = self.entities.values().map(|e| e.skipped).sum();
    }
}

/// Headline numbers for a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_entities: u64,
    pub total_processed: u64,
    pub total_updated: u64,
    pub total_skipped: u64,
    pub duration: f64,
    pub average_per_second: f64,
}
