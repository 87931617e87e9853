use std::str::FromStr;
use std::sync::Arc;

use log::error;
use serde::Serialize;
use serde_json::Value;

use crate::error::{BuildLensError, Result};

use super::json::{
    field, get_array, get_enum, get_int, get_string, has_values, try_int, try_string,
};

/// Lifecycle state of a build or timeline record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Status {
    #[default]
    None,
    NotStarted,
    Pending,
    InProgress,
    Cancelling,
    Postponed,
    Completed,
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(Status::None),
            "notstarted" => Ok(Status::NotStarted),
            "pending" => Ok(Status::Pending),
            "inprogress" => Ok(Status::InProgress),
            "cancelling" => Ok(Status::Cancelling),
            "postponed" => Ok(Status::Postponed),
            "completed" => Ok(Status::Completed),
            _ => Err(format!("Invalid status: {s}")),
        }
    }
}

/// Outcome of a finished build or timeline record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildResult {
    #[default]
    None,
    Succeeded,
    SucceededWithIssues,
    PartiallySucceeded,
    Failed,
    Canceled,
    Skipped,
    Abandoned,
}

impl FromStr for BuildResult {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "none" => Ok(BuildResult::None),
            "succeeded" => Ok(BuildResult::Succeeded),
            "succeededwithissues" => Ok(BuildResult::SucceededWithIssues),
            "partiallysucceeded" => Ok(BuildResult::PartiallySucceeded),
            "failed" => Ok(BuildResult::Failed),
            "canceled" => Ok(BuildResult::Canceled),
            "skipped" => Ok(BuildResult::Skipped),
            "abandoned" => Ok(BuildResult::Abandoned),
            _ => Err(format!("Invalid result: {s}")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReleaseStatus {
    #[default]
    Undefined,
    Draft,
    Active,
    Abandoned,
}

impl FromStr for ReleaseStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "undefined" => Ok(ReleaseStatus::Undefined),
            "draft" => Ok(ReleaseStatus::Draft),
            "active" => Ok(ReleaseStatus::Active),
            "abandoned" => Ok(ReleaseStatus::Abandoned),
            _ => Err(format!("Invalid release status: {s}")),
        }
    }
}

/// Azure DevOps team project. Built once from configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

/// REST and web links from an entity's `_links` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Links {
    #[serde(rename = "self")]
    pub self_: String,
    pub web: String,
    pub badge: Option<String>,
}

impl Links {
    /// Reads `_links.{self,web,badge}.href`.
    ///
    /// # Errors
    ///
    /// Returns `Parse` when the `self` or `web` href is missing.
    pub fn from_json(node: &Value) -> Result<Self> {
        let links = field(node, "_links");
        let href = |name: &str| {
            links
                .and_then(|l| field(l, name))
                .and_then(|l| field(l, "href"))
                .and_then(Value::as_str)
                .map(ToString::to_string)
        };

        let required = |name: &str| {
            href(name).ok_or_else(|| BuildLensError::Parse(format!("missing _links.{name}.href")))
        };

        Ok(Self {
            self_: required("self")?,
            web: required("web")?,
            badge: href("badge"),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDefinition {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub project: Arc<Project>,
    pub links: Links,
}

impl BuildDefinition {
    pub fn from_json(id: i64, project: Arc<Project>, node: &Value) -> Result<Self> {
        Ok(Self {
            id,
            name: get_string(node, "name"),
            project,
            links: Links::from_json(node)?,
        })
    }
}

/// One execution of a build definition.
///
/// `timeline_records` stays empty until populated through [`Build::with_timeline`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: i64,
    pub build_number: String,
    pub status: Status,
    pub result: BuildResult,
    pub links: Links,
    pub source_branch: String,
    pub source_commit: String,
    #[serde(skip_serializing)]
    pub definition: Arc<BuildDefinition>,
    pub timeline_records: Vec<TimelineRecord>,
}

impl Build {
    pub fn from_json(node: &Value, definition: &Arc<BuildDefinition>) -> Result<Self> {
        Ok(Self {
            id: get_int(node, "id"),
            build_number: get_string(node, "buildNumber"),
            status: get_enum(node, "status"),
            result: get_enum(node, "result"),
            links: Links::from_json(node)?,
            source_branch: get_string(node, "sourceBranch"),
            source_commit: get_string(node, "sourceVersion"),
            definition: Arc::clone(definition),
            timeline_records: Vec::new(),
        })
    }

    /// Returns a copy of this build owning the given timeline.
    #[must_use]
    pub fn with_timeline(self, timeline_records: Vec<TimelineRecord>) -> Self {
        Self {
            timeline_records,
            ..self
        }
    }

    pub fn records_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a TimelineRecord> {
        self.timeline_records.iter().filter(move |r| r.name == name)
    }

    pub fn project(&self) -> &Project {
        &self.definition.project
    }
}

/// A stage, job or task node in a build's timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRecord {
    pub id: String,
    pub parent_id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub name: String,
    pub status: Status,
    pub result: BuildResult,
    pub warning_count: i64,
    pub error_count: i64,
    pub log: Option<Log>,
    pub issues: Vec<Issue>,
}

impl TimelineRecord {
    /// Hydrates a record with its inline log and issues.
    ///
    /// A malformed `log` object is logged and dropped; the record is still returned.
    pub fn from_json(node: &Value) -> Self {
        let id = get_string(node, "id");

        let log = field(node, "log")
            .filter(|l| has_values(l))
            .and_then(|l| match Log::from_json(l) {
                Ok(log) => Some(log),
                Err(e) => {
                    error!("Dropping malformed log for timeline record {id}: {e}");
                    None
                }
            });

        Self {
            parent_id: get_string(node, "parentId"),
            type_: get_string(node, "type"),
            name: get_string(node, "name"),
            status: get_enum(node, "state"),
            result: get_enum(node, "result"),
            warning_count: get_int(node, "warningCount"),
            error_count: get_int(node, "errorCount"),
            log,
            issues: get_array(node, "issues").iter().map(Issue::from_json).collect(),
            id,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(rename = "type")]
    pub type_: String,
    pub category: String,
    pub message: String,
    pub data: Option<Data>,
}

impl Issue {
    pub fn from_json(node: &Value) -> Self {
        Self {
            type_: get_string(node, "type"),
            category: get_string(node, "category"),
            message: get_string(node, "message"),
            data: Data::from_issue(node),
        }
    }
}

/// Source location attached to an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Data {
    #[serde(rename = "type")]
    pub type_: String,
    pub source_path: String,
    pub line_number: String,
    pub column_number: String,
    pub code: String,
}

impl Data {
    /// Reads the issue's `data` object, or its `log` object when `data` is empty.
    fn from_issue(issue: &Value) -> Option<Self> {
        let node = ["data", "log"]
            .into_iter()
            .filter_map(|key| field(issue, key))
            .find(|n| has_values(n))?;

        Some(Self {
            type_: get_string(node, "type"),
            source_path: get_string(node, "sourcePath"),
            line_number: get_string(node, "lineNumber"),
            column_number: get_string(node, "columnNumber"),
            code: get_string(node, "code"),
        })
    }
}

/// Reference to a remote log blob; the content is fetched separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Log {
    pub id: i64,
    #[serde(rename = "type")]
    pub type_: String,
    pub url: String,
}

impl Log {
    /// # Errors
    ///
    /// Returns `Parse` when `id` is not an integer or `type`/`url` is not a scalar.
    pub fn from_json(node: &Value) -> Result<Self> {
        Ok(Self {
            id: try_int(node, "id")
                .map_err(BuildLensError::Parse)?
                .unwrap_or(super::json::MISSING_INT),
            type_: try_string(node, "type")
                .map_err(BuildLensError::Parse)?
                .unwrap_or_default(),
            url: try_string(node, "url")
                .map_err(BuildLensError::Parse)?
                .unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Release {
    pub id: i64,
    pub status: ReleaseStatus,
    pub links: Links,
    pub name: String,
    #[serde(skip_serializing)]
    pub build: Arc<Build>,
}

impl Release {
    pub fn from_json(node: &Value, build: Arc<Build>) -> Result<Self> {
        Ok(Self {
            id: get_int(node, "id"),
            status: get_enum(node, "status"),
            links: Links::from_json(node)?,
            name: get_string(node, "name"),
            build,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn links_json() -> Value {
        json!({
            "self": {"href": "https://dev.azure.com/org/p/_apis/build/Builds/1"},
            "web": {"href": "https://dev.azure.com/org/p/_build/results?buildId=1"}
        })
    }

    fn definition() -> Arc<BuildDefinition> {
        Arc::new(BuildDefinition {
            id: 42,
            name: "nightly".to_string(),
            project: Arc::new(Project {
                id: "0bdbc590".to_string(),
                name: "DevDiv".to_string(),
            }),
            links: Links {
                self_: "self".to_string(),
                web: "web".to_string(),
                badge: None,
            },
        })
    }

    #[test]
    fn test_links_without_badge() {
        let links = Links::from_json(&json!({"_links": links_json()})).unwrap();
        assert!(links.self_.ends_with("/Builds/1"));
        assert!(links.web.contains("buildId=1"));
        assert_eq!(links.badge, None);
    }

    #[test]
    fn test_links_with_badge() {
        let mut raw = links_json();
        raw["badge"] = json!({"href": "https://badge"});
        let links = Links::from_json(&json!({"_links": raw})).unwrap();
        assert_eq!(links.badge.as_deref(), Some("https://badge"));
    }

    #[test]
    fn test_links_missing_self_is_parse_error() {
        let node = json!({"_links": {"web": {"href": "https://web"}}});
        let err = Links::from_json(&node).unwrap_err();
        assert!(matches!(err, BuildLensError::Parse(ref m) if m.contains("self")));
    }

    #[test]
    fn test_links_missing_web_or_links_object_is_parse_error() {
        let node = json!({"_links": {"self": {"href": "https://self"}}});
        assert!(matches!(
            Links::from_json(&node),
            Err(BuildLensError::Parse(_))
        ));
        assert!(matches!(
            Links::from_json(&json!({"id": 1})),
            Err(BuildLensError::Parse(_))
        ));
    }

    #[test]
    fn test_status_and_result_parse_case_insensitively() {
        assert_eq!("inProgress".parse::<Status>(), Ok(Status::InProgress));
        assert_eq!("COMPLETED".parse::<Status>(), Ok(Status::Completed));
        assert_eq!(
            "partiallySucceeded".parse::<BuildResult>(),
            Ok(BuildResult::PartiallySucceeded)
        );
        assert!("weird".parse::<BuildResult>().is_err());
        assert_eq!("Active".parse::<ReleaseStatus>(), Ok(ReleaseStatus::Active));
    }

    #[test]
    fn test_build_defaults_for_missing_fields() {
        let build = Build::from_json(&json!({"_links": links_json()}), &definition()).unwrap();
        assert_eq!(build.id, -1);
        assert_eq!(build.build_number, "");
        assert_eq!(build.status, Status::None);
        assert_eq!(build.result, BuildResult::None);
        assert_eq!(build.source_branch, "");
        assert!(build.timeline_records.is_empty());
        assert_eq!(build.definition.id, 42);
        assert_eq!(build.project().name, "DevDiv");
    }

    #[test]
    fn test_build_hydrates_fields() {
        let node = json!({
            "id": 1626454,
            "buildNumber": "20240101.3",
            "status": "completed",
            "result": "succeeded",
            "sourceBranch": "refs/heads/main",
            "sourceVersion": "abc123",
            "_links": links_json()
        });
        let build = Build::from_json(&node, &definition()).unwrap();
        assert_eq!(build.id, 1626454);
        assert_eq!(build.build_number, "20240101.3");
        assert_eq!(build.status, Status::Completed);
        assert_eq!(build.result, BuildResult::Succeeded);
        assert_eq!(build.source_branch, "refs/heads/main");
        assert_eq!(build.source_commit, "abc123");
    }

    #[test]
    fn test_timeline_record_hydrates_log_and_issues() {
        let node = json!({
            "id": "rec-1",
            "parentId": "rec-0",
            "type": "Task",
            "name": "Compile",
            "state": "completed",
            "result": "failed",
            "warningCount": 1,
            "errorCount": 2,
            "log": {"id": 12, "type": "Container", "url": "https://logs/12"},
            "issues": [
                {
                    "type": "error",
                    "category": "General",
                    "message": "CS0103: name does not exist",
                    "data": {"type": "error", "sourcepath": "src/a.cs", "linenumber": "10", "columnnumber": "4", "code": "CS0103"}
                },
                {"type": "warning", "message": "deprecated"}
            ]
        });
        let record = TimelineRecord::from_json(&node);
        assert_eq!(record.id, "rec-1");
        assert!(!record.is_root());
        assert_eq!(record.status, Status::Completed);
        assert_eq!(record.result, BuildResult::Failed);
        assert_eq!(record.error_count, 2);
        assert_eq!(
            record.log,
            Some(Log {
                id: 12,
                type_: "Container".to_string(),
                url: "https://logs/12".to_string()
            })
        );
        assert_eq!(record.issues.len(), 2);

        let data = record.issues[0].data.as_ref().unwrap();
        assert_eq!(data.source_path, "src/a.cs");
        assert_eq!(data.line_number, "10");
        assert_eq!(data.code, "CS0103");
        assert_eq!(record.issues[1].category, "");
        assert!(record.issues[1].data.is_none());
    }

    #[test]
    fn test_issue_data_read_from_log_object() {
        let issue = Issue::from_json(&json!({
            "type": "error",
            "log": {"sourcePath": "build.ps1", "lineNumber": 7}
        }));
        let data = issue.data.unwrap();
        assert_eq!(data.source_path, "build.ps1");
        assert_eq!(data.line_number, "7");
    }

    #[test]
    fn test_timeline_record_malformed_log_is_dropped() {
        let record = TimelineRecord::from_json(&json!({
            "id": "rec-2",
            "name": "Publish",
            "log": {"id": "not-a-number", "url": "https://logs/2"}
        }));
        assert_eq!(record.name, "Publish");
        assert!(record.log.is_none());
        assert!(record.is_root());
        assert_eq!(record.warning_count, -1);
    }

    #[test]
    fn test_timeline_record_empty_log_is_absent() {
        let record = TimelineRecord::from_json(&json!({"id": "r", "log": {}}));
        assert!(record.log.is_none());
        let record = TimelineRecord::from_json(&json!({"id": "r", "log": null}));
        assert!(record.log.is_none());
    }

    #[test]
    fn test_with_timeline_and_records_named() {
        let build = Build::from_json(&json!({"id": 1, "_links": links_json()}), &definition())
            .unwrap()
            .with_timeline(vec![
                TimelineRecord::from_json(&json!({"id": "a", "name": "Validate"})),
                TimelineRecord::from_json(&json!({"id": "b", "name": "Build"})),
                TimelineRecord::from_json(&json!({"id": "c", "name": "Validate"})),
            ]);
        assert_eq!(build.timeline_records.len(), 3);
        let ids: Vec<_> = build.records_named("Validate").map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_release_hydration() {
        let build = Arc::new(
            Build::from_json(&json!({"id": 9, "_links": links_json()}), &definition()).unwrap(),
        );
        let release = Release::from_json(
            &json!({"id": 64073, "name": "Release-12", "status": "active", "_links": links_json()}),
            Arc::clone(&build),
        )
        .unwrap();
        assert_eq!(release.id, 64073);
        assert_eq!(release.status, ReleaseStatus::Active);
        assert_eq!(release.name, "Release-12");
        assert_eq!(release.build.id, 9);
    }
}
