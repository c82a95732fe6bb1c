//! JSON and CSV forms of [`RunStatistics`].
//!
//! The CSV form is long-format (`scope,entity,connection,key,value`) so that
//! property counters fit without a dynamic header. Both forms import back to
//! an equal value.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::errors::{Result, StatsError};
use crate::model::{EntityStats, RunStatistics, entity_key};

const CSV_HEADER: [&str; 5] = ["scope", "entity", "connection", "key", "value"];

pub fn to_json(stats: &RunStatistics) -> Result<String> {
    Ok(serde_json::to_string_pretty(stats)?)
}

pub fn from_json(input: &str) -> Result<RunStatistics> {
    Ok(serde_json::from_str(input)?)
}

pub fn to_csv(stats: &RunStatistics) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    let global = &stats.global;
    let global_rows = [
        ("total_entities", global.total_entities.to_string()),
        ("total_processed", global.total_processed.to_string()),
        ("total_updated", global.total_updated.to_string()),
        ("total_skipped", global.total_skipped.to_string()),
        ("start_time", format_time(global.start_time)),
        ("end_time", format_time(global.end_time)),
        ("duration", global.duration.to_string()),
    ];
    for (key, value) in global_rows {
        writer.write_record(["global", "", "", key, value.as_str()])?;
    }

    for entity in stats.entities.values() {
        let counters = [
            ("processed", entity.processed),
            ("updated", entity.updated),
            ("skipped", entity.skipped),
        ];
        for (key, value) in counters {
            writer.write_record([
                "entity",
                entity.entity.as_str(),
                entity.connection.as_str(),
                key,
                value.to_string().as_str(),
            ])?;
        }
        for (property, count) in &entity.properties {
            writer.write_record([
                "property",
                entity.entity.as_str(),
                entity.connection.as_str(),
                property.as_str(),
                count.to_string().as_str(),
            ])?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| StatsError::Invalid(err.to_string()))?;
    String::from_utf8(bytes).map_err(|err| StatsError::Invalid(err.to_string()))
}

pub fn from_csv(input: &str) -> Result<RunStatistics> {
    let mut reader = csv::Reader::from_reader(input.as_bytes());
    let headers = reader.headers()?.clone();
    if headers.iter().ne(CSV_HEADER) {
        return Err(StatsError::Invalid(format!(
            "unexpected csv header: {}",
            headers.iter().collect::<Vec<_>>().join(",")
        )));
    }

    let mut stats = RunStatistics::default();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        let field = |index: usize| record.get(index).unwrap_or_default();
        let (scope, entity, connection, key, value) =
            (field(0), field(1), field(2), field(3), field(4));
        let row = line + 2;

        match scope {
            "global" => {
                let global = &mut stats.global;
                match key {
                    "total_entities" => global.total_entities = parse_count(value, row)?,
                    "total_processed" => global.total_processed = parse_count(value, row)?,
                    "total_updated" => global.total_updated = parse_count(value, row)?,
                    "total_skipped" => global.total_skipped = parse_count(value, row)?,
                    "start_time" => global.start_time = parse_time(value, row)?,
                    "end_time" => global.end_time = parse_time(value, row)?,
                    "duration" => {
                        global.duration = value.parse().map_err(|_| {
                            StatsError::Invalid(format!("row {row}: invalid duration '{value}'"))
                        })?
                    }
                    other => {
                        return Err(StatsError::Invalid(format!(
                            "row {row}: unknown global key '{other}'"
                        )));
                    }
                }
            }
            "entity" => {
                let count = parse_count(value, row)?;
                let entry = entry(&mut stats, entity, connection);
                match key {
                    "processed" => entry.processed = count,
                    "updated" => entry.updated = count,
                    "skipped" => entry.skipped = count,
                    other => {
                        return Err(StatsError::Invalid(format!(
                            "row {row}: unknown entity key '{other}'"
                        )));
                    }
                }
            }
            "property" => {
                let count = parse_count(value, row)?;
                entry(&mut stats, entity, connection)
                    .properties
                    .insert(key.to_string(), count);
            }
            other => {
                return Err(StatsError::Invalid(format!(
                    "row {row}: unknown scope '{other}'"
                )));
            }
        }
    }
    Ok(stats)
}

impl RunStatistics {
    pub fn to_json(&self) -> Result<String> {
        to_json(self)
    }

    pub fn from_json(input: &str) -> Result<Self> {
        from_json(input)
    }

    pub fn to_csv(&self) -> Result<String> {
        to_csv(self)
    }

    pub fn from_csv(input: &str) -> Result<Self> {
        from_csv(input)
    }
}

fn entry<'a>(stats: &'a mut RunStatistics, entity: &str, connection: &str) -> &'a mut EntityStats {
    stats
        .entities
        .entry(entity_key(entity, connection))
        .or_insert_with(|| EntityStats::new(entity, connection))
}

fn parse_count(value: &str, row: usize) -> Result<u64> {
    value
        .parse()
        .map_err(|_| StatsError::Invalid(format!("row {row}: invalid counter '{value}'")))
}

fn format_time(value: Option<DateTime<Utc>>) -> String {
    value
        .map(|time| time.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}

fn parse_time(value: &str, row: usize) -> Result<Option<DateTime<Utc>>> {
    if value.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|time| Some(time.with_timezone(&Utc)))
        .map_err(|_| StatsError::Invalid(format!("row {row}: invalid timestamp '{value}'")))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::TimeZone;

    use super::*;
    use crate::collector::StatisticsCollector;

    fn sample() -> RunStatistics {
        let mut collector = StatisticsCollector::new();
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        collector.start_at(start);
        let mut properties = BTreeMap::new();
        properties.insert("email".to_string(), 3);
        properties.insert("user, name".to_string(), 2);
        collector.record_entity("App\\Entity\\User", "main", 5, 3, &properties);
        collector.record_entity("AuditLog", "main", 0, 0, &BTreeMap::new());
        collector.stop_at(start + chrono::Duration::milliseconds(1_537));
        collector.into_statistics()
    }

    #[test]
    fn json_shape_uses_entity_at_source_keys() {
        let stats = sample();
        let value: serde_json::Value =
            serde_json::from_str(&to_json(&stats).expect("json")).expect("parse");
        assert_eq!(value["global"]["total_processed"], 5);
        assert_eq!(value["global"]["duration"], 1.537);
        let user = &value["entities"]["App\\Entity\\User@main"];
        assert_eq!(user["connection"], "main");
        assert_eq!(user["skipped"], 2);
        assert_eq!(user["properties"]["email"], 3);
    }

    #[test]
    fn json_import_restores_statistics() {
        let stats = sample();
        let restored = from_json(&to_json(&stats).expect("json")).expect("import");
        assert_eq!(restored, stats);
    }

    #[test]
    fn csv_import_restores_statistics() {
        let stats = sample();
        let csv = to_csv(&stats).expect("csv");
        assert!(csv.starts_with("scope,entity,connection,key,value\n"));
        assert!(csv.contains("property,App\\Entity\\User,main,\"user, name\",2"));
        let restored = from_csv(&csv).expect("import");
        assert_eq!(restored, stats);
    }

    #[test]
    fn csv_import_rejects_unknown_scope() {
        let input = "scope,entity,connection,key,value\nbogus,a,b,c,1\n";
        let err = from_csv(input).expect_err("unknown scope");
        assert!(err.to_string().contains("unknown scope"));
    }
}
