//! Run statistics for anonymization runs: collection, export, reports and
//! history diffs.

pub mod collector;
pub mod errors;
pub mod export;
pub mod history;
pub mod model;
pub mod report;

pub use collector::StatisticsCollector;
pub use errors::{Result, StatsError};
pub use history::{EntityChange, EntityDiff, FieldChange, HistoryRecord, RunDiff, diff_runs};
pub use model::{EntityStats, GlobalStats, RunStatistics, Summary, entity_key};
pub use report::render_report;
