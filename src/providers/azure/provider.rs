use std::sync::Arc;

use log::{debug, warn};
use serde_json::Value;
use url::Url;

use crate::auth::Token;
use crate::error::{BuildLensError, Result};

use super::cache::BranchCache;
use super::client::{
    parse_json, AzureClient, ServiceEndpoints, JSON_CONTENT_TYPE, TEXT_CONTENT_TYPE,
};
use super::json::{field, get_array};
use super::types::{Build, BuildDefinition, Log, Project, Release, TimelineRecord};

const COMPLETED: &str = "completed";

/// Resolves build definitions, builds, timelines and releases from Azure DevOps.
///
/// Each call is a single request with no retries. The latest completed build per
/// branch is memoised for the lifetime of the provider, or until
/// [`AzureProvider::reset_branch_cache`].
pub struct AzureProvider {
    client: AzureClient,
    branch_cache: BranchCache,
}

/// Returns the `value` array of a list response.
fn list_values<'a>(response: &'a Value, url: &Url) -> Result<&'a [Value]> {
    if field(response, "value").and_then(Value::as_array).is_none() {
        return Err(BuildLensError::Parse(format!(
            "response from {url} has no 'value' array"
        )));
    }
    Ok(get_array(response, "value"))
}

impl AzureProvider {
    /// Creates a provider with an empty branch cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured URLs are invalid or the HTTP client
    /// cannot be built.
    pub fn new(endpoints: &ServiceEndpoints, token: Token) -> Result<Self> {
        Ok(Self {
            client: AzureClient::new(endpoints, token)?,
            branch_cache: BranchCache::new(),
        })
    }

    pub async fn get_build_definition(
        &self,
        project: &Arc<Project>,
        definition_id: i64,
    ) -> Result<Arc<BuildDefinition>> {
        let url = self
            .client
            .build_api_url(&project.id, ["definitions", definition_id.to_string().as_str()]);

        let json = self.client.fetch_json(&url).await?;

        BuildDefinition::from_json(definition_id, Arc::clone(project), &json).map(Arc::new)
    }

    /// Lists completed builds for `definition`, newest first as returned by the service.
    async fn list_completed_builds(
        &self,
        definition: &Arc<BuildDefinition>,
        top: Option<usize>,
    ) -> Result<Vec<Build>> {
        let mut url = self.client.build_api_url(&definition.project.id, ["builds"]);
        url.query_pairs_mut()
            .append_pair("definitions", &definition.id.to_string())
            .append_pair("statusFilter", COMPLETED);
        if let Some(top) = top {
            url.query_pairs_mut().append_pair("$top", &top.to_string());
        }

        let response = self.client.fetch_json(&url).await?;

        list_values(&response, &url)?
            .iter()
            .map(|json| Build::from_json(json, definition))
            .collect()
    }

    /// Fetches the most recent completed build on any branch.
    ///
    /// The build is remembered for its branch unless that branch is already cached;
    /// the freshly fetched build is returned either way.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the definition has no completed builds.
    pub async fn get_latest_build(&self, definition: &Arc<BuildDefinition>) -> Result<Build> {
        let build = self
            .list_completed_builds(definition, Some(1))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                BuildLensError::NotFound(format!(
                    "no completed builds for definition {}",
                    definition.id
                ))
            })?;

        if self.branch_cache.remember(build.clone()) {
            debug!("Cached build {} for {}", build.id, build.source_branch);
        }

        Ok(build)
    }

    /// Fetches the most recent completed build on `branch`.
    ///
    /// On a cache miss all completed builds of the definition are listed once and
    /// the first build per branch is cached, so later branches are served locally.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no completed build exists for `branch`.
    pub async fn get_latest_build_for_branch(
        &self,
        definition: &Arc<BuildDefinition>,
        branch: &str,
    ) -> Result<Build> {
        self.branch_cache
            .get_or_populate(branch, move || self.list_completed_builds(definition, None))
            .await
    }

    /// Fetches a build by id, bypassing the branch cache.
    pub async fn get_build(&self, definition: &Arc<BuildDefinition>, build_id: i64) -> Result<Build> {
        let url = self.client.build_api_url(
            &definition.project.id,
            ["builds", build_id.to_string().as_str()],
        );

        let json = self.client.fetch_json(&url).await?;

        Build::from_json(&json, definition)
    }

    /// Fetches the build's timeline records in response order.
    ///
    /// A build without a timeline yields an empty list.
    pub async fn get_build_timeline_records(&self, build: &Build) -> Result<Vec<TimelineRecord>> {
        let url = self.client.build_api_url(
            &build.project().id,
            ["builds", build.id.to_string().as_str(), "timeline"],
        );

        let body = self.client.fetch_text(&url, JSON_CONTENT_TYPE).await?;
        if body.trim().is_empty() {
            warn!("Build {} has no timeline yet", build.id);
            return Ok(Vec::new());
        }

        let response = parse_json(&url, &body)?;

        Ok(get_array(&response, "records")
            .iter()
            .map(TimelineRecord::from_json)
            .collect())
    }

    /// Returns `build` with its timeline records attached.
    pub async fn populate_timeline(&self, build: Build) -> Result<Build> {
        let records = self.get_build_timeline_records(&build).await?;
        Ok(build.with_timeline(records))
    }

    /// Fetches the first release created from `build`'s artifact.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no release was created from the build.
    pub async fn get_release(&self, build: &Arc<Build>) -> Result<Release> {
        let definition = &build.definition;

        let mut url = self.client.release_api_url(["releases"]);
        url.query_pairs_mut()
            .append_pair("artifactTypeId", "Build")
            .append_pair(
                "sourceId",
                &format!("{}:{}", definition.project.id, definition.id),
            )
            .append_pair("artifactVersionId", &build.id.to_string());

        let response = self.client.fetch_json(&url).await?;

        let json = list_values(&response, &url)?
            .first()
            .ok_or_else(|| BuildLensError::NotFound(format!("no release for build {}", build.id)))?;

        Release::from_json(json, Arc::clone(build))
    }

    /// Downloads the raw text of a timeline log.
    pub async fn fetch_log_content(&self, log: &Log) -> Result<String> {
        let url = Url::parse(&log.url)
            .map_err(|e| BuildLensError::Parse(format!("invalid log URL '{}': {e}", log.url)))?;

        self.client.fetch_text(&url, TEXT_CONTENT_TYPE).await
    }

    /// Forgets all cached branch builds.
    pub fn reset_branch_cache(&self) {
        self.branch_cache.reset();
    }
}
