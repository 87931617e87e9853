use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::providers::azure::types::{Build, BuildDefinition, Release, TimelineRecord};

/// Everything resolved for one build definition in a single run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildReport {
    pub project: String,
    pub definition: BuildDefinition,
    pub build: Build,
    pub release: Option<Release>,
    pub totals: IssueTotals,
    /// Issue count per issue type, in order of first appearance
    pub issue_types: IndexMap<String, usize>,
    /// Log content keyed by timeline record name
    pub logs: IndexMap<String, String>,
    pub collected_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueTotals {
    pub records: usize,
    pub failed_records: usize,
    pub errors: u64,
    pub warnings: u64,
    pub issues: usize,
}

impl IssueTotals {
    fn from_records(records: &[TimelineRecord]) -> Self {
        // Counts of -1 mean "not reported"
        let count = |n: i64| u64::try_from(n).unwrap_or(0);

        records.iter().fold(
            Self {
                records: records.len(),
                ..Self::default()
            },
            |mut totals, record| {
                totals.errors += count(record.error_count);
                totals.warnings += count(record.warning_count);
                totals.issues += record.issues.len();
                if record.error_count > 0 {
                    totals.failed_records += 1;
                }
                totals
            },
        )
    }
}

fn issue_types(records: &[TimelineRecord]) -> IndexMap<String, usize> {
    let mut types = IndexMap::new();
    for issue in records.iter().flat_map(|r| &r.issues) {
        *types.entry(issue.type_.to_lowercase()).or_insert(0) += 1;
    }
    types
}

impl BuildReport {
    pub fn new(
        definition: &BuildDefinition,
        build: Build,
        release: Option<Release>,
        logs: IndexMap<String, String>,
    ) -> Self {
        Self {
            project: definition.project.name.clone(),
            definition: definition.clone(),
            totals: IssueTotals::from_records(&build.timeline_records),
            issue_types: issue_types(&build.timeline_records),
            build,
            release,
            logs,
            collected_at: Utc::now(),
        }
    }

    /// Records that reported errors or issues, in timeline order.
    pub fn records_with_issues(&self) -> impl Iterator<Item = &TimelineRecord> {
        self.build
            .timeline_records
            .iter()
            .filter(|r| r.error_count > 0 || r.warning_count > 0 || !r.issues.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    use crate::providers::azure::types::{Links, Project};

    fn create_definition() -> BuildDefinition {
        BuildDefinition {
            id: 5868,
            name: "NuGet-Official".to_string(),
            project: Arc::new(Project {
                id: "0bdbc590".to_string(),
                name: "DevDiv".to_string(),
            }),
            links: Links {
                self_: "https://self".to_string(),
                web: "https://web".to_string(),
                badge: None,
            },
        }
    }

    fn create_build(definition: &BuildDefinition) -> Build {
        let node = json!({
            "id": 3,
            "sourceBranch": "refs/heads/main",
            "_links": {"self": {"href": "https://self/3"}, "web": {"href": "https://web/3"}}
        });
        Build::from_json(&node, &Arc::new(definition.clone())).unwrap()
    }

    #[test]
    fn test_totals_ignore_unreported_counts() {
        let records = vec![
            TimelineRecord::from_json(&json!({"id": "a", "errorCount": 2, "warningCount": 1,
                "issues": [{"type": "error"}, {"type": "Error"}, {"type": "warning"}]})),
            TimelineRecord::from_json(&json!({"id": "b"})),
            TimelineRecord::from_json(&json!({"id": "c", "errorCount": 0, "warningCount": 4})),
        ];

        let totals = IssueTotals::from_records(&records);
        assert_eq!(
            totals,
            IssueTotals {
                records: 3,
                failed_records: 1,
                errors: 2,
                warnings: 5,
                issues: 3,
            }
        );

        let types = issue_types(&records);
        assert_eq!(types.get_index(0), Some((&"error".to_string(), &2)));
        assert_eq!(types.get("warning"), Some(&1));
    }

    #[test]
    fn test_report_serializes_without_back_references() {
        let definition = create_definition();
        let build = create_build(&definition).with_timeline(vec![
            TimelineRecord::from_json(&json!({"id": "a", "name": "Compile", "errorCount": 1})),
            TimelineRecord::from_json(&json!({"id": "b", "name": "Test", "errorCount": 0})),
        ]);
        let mut logs = IndexMap::new();
        logs.insert("Compile".to_string(), "error CS0103".to_string());

        let report = BuildReport::new(&definition, build, None, logs);
        assert_eq!(report.project, "DevDiv");
        assert_eq!(report.records_with_issues().count(), 1);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["definition"]["id"], 5868);
        assert!(value["definition"].get("project").is_none());
        assert!(value["build"].get("definition").is_none());
        assert_eq!(value["build"]["sourceBranch"], "refs/heads/main");
        assert_eq!(value["build"]["links"]["self"], "https://self/3");
        assert_eq!(value["build"]["timelineRecords"][0]["name"], "Compile");
        assert_eq!(value["logs"]["Compile"], "error CS0103");
        assert!(value["release"].is_null());
    }
}
