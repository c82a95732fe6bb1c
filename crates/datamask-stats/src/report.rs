use crate::model::RunStatistics;

/// Render a deterministic markdown report from run statistics.
pub fn render_report(stats: &RunStatistics) -> String {
    let summary = stats.summary();
    let mut lines = Vec::new();

    lines.push("# Datamask Run Report".to_string());
    lines.push(String::new());
    lines.push("## Run summary".to_string());
    lines.push(format!(
        "- started: {}",
        stats
            .global
            .start_time
            .map(|time| time.to_rfc3339())
            .unwrap_or_else(|| "-".to_string())
    ));
    lines.push(format!("- duration_s: {:.3}", summary.duration));
    lines.push(format!("- entities: {}", summary.total_entities));
    lines.push(format!("- processed: {}", summary.total_processed));
    lines.push(format!("- updated: {}", summary.total_updated));
    lines.push(format!("- skipped: {}", summary.total_skipped));
    lines.push(format!(
        "- records_per_second: {:.2}",
        summary.average_per_second
    ));
    lines.push(String::new());

    lines.push("## Entities".to_string());
    lines.push("| entity | connection | processed | updated | skipped |".to_string());
    lines.push("| --- | --- | --- | --- | --- |".to_string());
    for entity in stats.entities.values() {
        lines.push(format!(
            "| {} | {} | {} | {} | {} |",
            entity.entity, entity.connection, entity.processed, entity.updated, entity.skipped
        ));
    }
    lines.push(String::new());

    let with_properties: Vec<_> = stats
        .entities
        .values()
        .filter(|entity| !entity.properties.is_empty())
        .collect();
    if !with_properties.is_empty() {
        lines.push("## Properties".to_string());
        lines.push("| entity | connection | property | updated |".to_string());
        lines.push("| --- | --- | --- | --- |".to_string());
        for entity in with_properties {
            for (property, count) in &entity.properties {
                lines.push(format!(
                    "| {} | {} | {} | {} |",
                    entity.entity, entity.connection, property, count
                ));
            }
        }
        lines.push(String::new());
    }

    lines.push("## Notes".to_string());
    if summary.total_processed == 0 {
        lines.push("- no records were processed; check entity patterns and sources.".to_string());
    } else if summary.total_updated == 0 {
        lines.push("- records were read but none matched a property pattern.".to_string());
    } else {
        lines.push("- compare statistics across runs with `datamask diff`.".to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::collector::StatisticsCollector;

    #[test]
    fn report_lists_entities_and_properties() {
        let mut collector = StatisticsCollector::new();
        let mut properties = BTreeMap::new();
        properties.insert("email".to_string(), 2);
        collector.record_entity("User", "main", 3, 2, &properties);
        collector.record_entity("AuditLog", "main", 4, 0, &BTreeMap::new());

        let report = render_report(collector.statistics());
        assert!(report.contains("| User | main | 3 | 2 | 1 |"));
        assert!(report.contains("| AuditLog | main | 4 | 0 | 4 |"));
        assert!(report.contains("| User | main | email | 2 |"));
        assert!(report.contains("- records_per_second: 0.00"));
    }

    #[test]
    fn empty_run_gets_a_hint() {
        let report = render_report(&RunStatistics::default());
        assert!(report.contains("no records were processed"));
        assert!(!report.contains("## Properties"));
    }
}
