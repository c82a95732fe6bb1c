use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::errors::Result;
use crate::export;
use crate::model::{EntityStats, RunStatistics, Summary, entity_key};

/// Accumulates per-entity outcomes over a run.
///
/// Recording is additive: repeated calls for the same entity and source add
/// up, so chunked runs can report each chunk separately.
#[derive(Debug, Clone, Default)]
pub struct StatisticsCollector {
    stats: RunStatistics,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start_at(Utc::now());
    }

    pub fn start_at(&mut self, at: DateTime<Utc>) {
        self.stats.global.start_time = Some(at);
        self.stats.global.end_time = None;
        self.stats.global.duration = 0.0;
    }

    pub fn stop(&mut self) {
        self.stop_at(Utc::now());
    }

    /// Close the timing window. Without a prior `start` the duration stays 0.
    pub fn stop_at(&mut self, at: DateTime<Utc>) {
        self.stats.global.end_time = Some(at);
        self.stats.global.duration = match self.stats.global.start_time {
            Some(start) => {
                let micros = (at - start).num_microseconds().unwrap_or(i64::MAX);
                micros.max(0) as f64 / 1_000_000.0
            }
            None => 0.0,
        };
    }

    pub fn record_entity(
        &mut self,
        entity: &str,
        source: &str,
        processed: u64,
        updated: u64,
        properties: &BTreeMap<String, u64>,
    ) {
        let entry = self
            .stats
            .entities
            .entry(entity_key(entity, source))
            .or_insert_with(|| EntityStats::new(entity, source));
        entry.processed += processed;
        entry.updated += updated;
        entry.skipped = entry.processed.saturating_sub(entry.updated);
        for (property, count) in properties {
            *entry.properties.entry(property.clone()).or_insert(0) += count;
        }
        debug!(
            entity,
            source,
            processed = entry.processed,
            updated = entry.updated,
            "statistics recorded"
        );
        self.stats.refresh_totals();
    }

    pub fn summary(&self) -> Summary {
        self.stats.summary()
    }

    pub fn all(&self) -> &BTreeMap<String, EntityStats> {
        &self.stats.entities
    }

    pub fn statistics(&self) -> &RunStatistics {
        &self.stats
    }

    pub fn into_statistics(self) -> RunStatistics {
        self.stats
    }

    pub fn to_json(&self) -> Result<String> {
        export::to_json(&self.stats)
    }

    pub fn to_csv(&self) -> Result<String> {
        export::to_csv(&self.stats)
    }
}
