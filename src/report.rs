use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Metadata for a purge report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Version of the report format
    pub version: String,

    /// Timestamp when the report was generated
    pub generated_at: DateTime<Utc>,

    /// Label of the stylesheet that was purged (usually its path)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stylesheet: Option<String>,

    /// Number of markup documents scanned
    pub documents_scanned: usize,

    /// Purger version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purger_version: Option<String>,
}

/// A selector that was removed, with where it appeared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedSelector {
    /// Number of rules the selector was removed from
    pub count: usize,

    /// Line numbers of those rules
    pub lines: Vec<usize>,
}

/// An at-rule that was removed as a whole
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovedAtRule {
    pub name: String,
    pub prelude: String,
    pub line: usize,
    pub reason: String,
}

/// Statistics about one purge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportStatistics {
    pub input_size_bytes: usize,
    pub output_size_bytes: usize,
    pub rules_before: usize,
    pub rules_after: usize,
    pub selectors_kept: usize,
    pub selectors_rejected: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

/// Diagnostics of what a purge removed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeReport {
    pub metadata: ReportMetadata,

    /// Removed selectors in the order they were first seen
    pub rejected: IndexMap<String, RejectedSelector>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub removed_at_rules: Vec<RemovedAtRule>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<ReportStatistics>,
}

impl PurgeReport {
    /// Create an empty report with default metadata
    pub fn new() -> Self {
        Self {
            metadata: ReportMetadata {
                version: "1.0.0".to_string(),
                generated_at: Utc::now(),
                stylesheet: None,
                documents_scanned: 0,
                purger_version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
            rejected: IndexMap::new(),
            removed_at_rules: Vec::new(),
            statistics: None,
        }
    }

    /// Record a selector removed from the rule at `line`
    pub fn add_rejected(&mut self, selector: String, line: usize) {
        let entry = self.rejected.entry(selector).or_insert_with(|| RejectedSelector {
            count: 0,
            lines: Vec::new(),
        });

        entry.count += 1;
        if !entry.lines.contains(&line) {
            entry.lines.push(line);
        }
    }

    /// Total number of selector removals
    pub fn rejected_count(&self) -> usize {
        self.rejected.values().map(|r| r.count).sum()
    }

    /// Calculate and set statistics
    pub fn calculate_statistics(
        &mut self,
        input_size: usize,
        output_size: usize,
        rules: (usize, usize),
        selectors_kept: usize,
        processing_time_ms: Option<u64>,
    ) {
        self.statistics = Some(ReportStatistics {
            input_size_bytes: input_size,
            output_size_bytes: output_size,
            rules_before: rules.0,
            rules_after: rules.1,
            selectors_kept,
            selectors_rejected: self.rejected_count(),
            processing_time_ms,
        });
    }
}

impl Default for PurgeReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder pattern for creating reports
pub struct ReportBuilder {
    report: PurgeReport,
    start_time: Option<std::time::Instant>,
}

impl ReportBuilder {
    /// Create a new report builder; processing time is measured from here
    pub fn new() -> Self {
        Self {
            report: PurgeReport::new(),
            start_time: Some(std::time::Instant::now()),
        }
    }

    pub fn with_stylesheet(mut self, label: impl Into<String>) -> Self {
        self.report.metadata.stylesheet = Some(label.into());
        self
    }

    pub fn with_documents_scanned(mut self, count: usize) -> Self {
        self.report.metadata.documents_scanned = count;
        self
    }

    /// Add rejected selectors as `(selector, line)` pairs
    pub fn with_rejected(mut self, rejected: impl IntoIterator<Item = (String, usize)>) -> Self {
        for (selector, line) in rejected {
            self.report.add_rejected(selector, line);
        }
        self
    }

    pub fn with_removed_at_rules(mut self, removed: Vec<RemovedAtRule>) -> Self {
        self.report.removed_at_rules.extend(removed);
        self
    }

    /// Build the final report with statistics
    pub fn build(mut self, input_size: usize, output_size: usize, rules: (usize, usize), selectors_kept: usize) -> PurgeReport {
        let processing_time = self.start_time.map(|t| t.elapsed().as_millis() as u64);
        self.report
            .calculate_statistics(input_size, output_size, rules, selectors_kept, processing_time);
        self.report
    }
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_creation() {
        let report = PurgeReport::new();
        assert_eq!(report.metadata.version, "1.0.0");
        assert_eq!(report.rejected.len(), 0);
        assert_eq!(report.rejected_count(), 0);
    }

    #[test]
    fn test_add_rejected() {
        let mut report = PurgeReport::new();
        report.add_rejected(".missing".to_string(), 3);
        report.add_rejected(".missing".to_string(), 10);
        report.add_rejected(".missing".to_string(), 10);
        report.add_rejected("#gone".to_string(), 4);

        assert_eq!(report.rejected.len(), 2);
        assert_eq!(report.rejected[".missing"].count, 3);
        assert_eq!(report.rejected[".missing"].lines, vec![3, 10]);
        assert_eq!(report.rejected_count(), 4);
        assert_eq!(report.rejected.keys().next().map(String::as_str), Some(".missing"));
    }

    #[test]
    fn test_report_builder() {
        let report = ReportBuilder::new()
            .with_stylesheet("global-style.css")
            .with_documents_scanned(12)
            .with_rejected(vec![(".a".to_string(), 1), (".b".to_string(), 2)])
            .with_removed_at_rules(vec![RemovedAtRule {
                name: "keyframes".to_string(),
                prelude: "spin".to_string(),
                line: 7,
                reason: "unused animation".to_string(),
            }])
            .build(1024, 512, (10, 6), 8);

        assert_eq!(report.metadata.stylesheet.as_deref(), Some("global-style.css"));
        assert_eq!(report.metadata.documents_scanned, 12);
        assert_eq!(report.removed_at_rules.len(), 1);

        let stats = report.statistics.unwrap();
        assert_eq!(stats.input_size_bytes, 1024);
        assert_eq!(stats.output_size_bytes, 512);
        assert_eq!(stats.rules_before, 10);
        assert_eq!(stats.rules_after, 6);
        assert_eq!(stats.selectors_rejected, 2);
    }

    #[test]
    fn test_json_serialization() {
        let mut report = PurgeReport::new();
        report.add_rejected(".x".to_string(), 1);
        let json = serde_json::to_value(&report).unwrap();

        assert!(json["metadata"].is_object());
        assert_eq!(json["metadata"]["version"], "1.0.0");
        assert_eq!(json["rejected"][".x"]["count"], 1);
        assert!(json.get("removed_at_rules").is_none());

        let text = serde_json::to_string_pretty(&report).unwrap();
        let parsed: PurgeReport = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.rejected_count(), 1);
    }
}
