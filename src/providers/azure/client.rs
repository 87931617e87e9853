use std::time::Duration;

use log::{debug, error};
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde_json::Value;
use url::Url;

use crate::auth::Token;
use crate::error::{BuildLensError, Result};

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const TEXT_CONTENT_TYPE: &str = "text/plain";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

const HOSTED_RELEASE_HOST: &str = "vsrm.dev.azure.com";

/// Connection settings for an Azure DevOps organisation.
#[derive(Debug, Clone)]
pub struct ServiceEndpoints {
    /// Build API host (e.g. <https://dev.azure.com>)
    pub build_url: String,
    /// Release Management API host (e.g. <https://vsrm.dev.azure.com>)
    pub release_url: String,
    /// Collection or organisation name inserted after the build host
    pub collection: String,
    pub timeout: Duration,
}

/// Authenticated HTTP access to the Azure DevOps REST API.
///
/// Idle connections are not kept between calls; each request acquires and releases
/// its own connection.
pub struct AzureClient {
    client: Client,
    build_url: Url,
    release_url: Url,
    token: Token,
}

fn parse_base(raw: &str, what: &str) -> Result<Url> {
    let url =
        Url::parse(raw).map_err(|e| BuildLensError::Config(format!("Invalid {what} URL: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(BuildLensError::Config(format!(
            "Invalid {what} URL: {raw} cannot be a base"
        )));
    }
    Ok(url)
}

/// Appends path segments to `base`, tolerating a trailing slash on the base.
fn with_segments<I, S>(base: &Url, segments: I) -> Url
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}

/// The hosted release service carries the organisation in the path
/// (`vsrm.dev.azure.com/{org}`), unlike `{org}.vsrm.visualstudio.com`.
fn is_bare_hosted_release(url: &Url) -> bool {
    url.host_str()
        .is_some_and(|host| host.eq_ignore_ascii_case(HOSTED_RELEASE_HOST))
        && url.path_segments().map_or(true, |mut segments| {
            segments.all(|segment| segment.is_empty())
        })
}

impl AzureClient {
    pub fn new(endpoints: &ServiceEndpoints, token: Token) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("BuildLens/", env!("CARGO_PKG_VERSION")))
            .timeout(endpoints.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| BuildLensError::Config(format!("Failed to create HTTP client: {e}")))?;

        let build_url = parse_base(&endpoints.build_url, "build API")?;
        let build_url = with_segments(&build_url, [endpoints.collection.as_str()]);
        let release_url = parse_base(&endpoints.release_url, "release API")?;
        let release_url = if is_bare_hosted_release(&release_url) {
            with_segments(&release_url, [endpoints.collection.as_str()])
        } else {
            release_url
        };

        Ok(Self {
            client,
            build_url,
            release_url,
            token,
        })
    }

    /// `{build_url}/{collection}/{project}/_apis/build/{segments...}`
    pub fn build_api_url<I, S>(&self, project_id: &str, segments: I) -> Url
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let base = with_segments(&self.build_url, [project_id, "_apis", "build"]);
        with_segments(&base, segments)
    }

    /// `{release_url}/_apis/Release/{segments...}`
    ///
    /// A bare `https://vsrm.dev.azure.com` gets the collection appended as the
    /// organisation segment.
    pub fn release_api_url<I, S>(&self, segments: I) -> Url
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let base = with_segments(&self.release_url, ["_apis", "Release"]);
        with_segments(&base, segments)
    }

    /// Empty user name, PAT as password.
    fn auth_request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth("", Some(self.token.as_str()))
    }

    /// GETs `url` and returns the body as text.
    ///
    /// # Errors
    ///
    /// Returns `Network` with the status and body on a non-success response, and
    /// `Network` without a status on any transport failure (including timeouts).
    pub async fn fetch_text(&self, url: &Url, accept: &str) -> Result<String> {
        debug!("GET {url}");

        let request = self.auth_request(self.client.get(url.clone()).header(ACCEPT, accept));

        let response = match request.send().await {
            Ok(resp) => resp,
            Err(e) => {
                error!("Request to {url} failed: {e}");
                return Err(BuildLensError::Network {
                    status: None,
                    message: e.to_string(),
                });
            }
        };

        let status = response.status();

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                // Headers arrived but the body did not: still a transport failure
                error!("Reading response from {url} (status {status}) failed: {e}");
                return Err(BuildLensError::Network {
                    status: None,
                    message: e.to_string(),
                });
            }
        };

        if !status.is_success() {
            error!("Request to {url} returned status {status}");
            return Err(BuildLensError::Network {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        Ok(body)
    }

    /// GETs `url` and parses the body as JSON.
    ///
    /// # Errors
    ///
    /// As [`Self::fetch_text`], plus `Parse` when the body is not valid JSON.
    pub async fn fetch_json(&self, url: &Url) -> Result<Value> {
        let body = self.fetch_text(url, JSON_CONTENT_TYPE).await?;
        parse_json(url, &body)
    }
}

/// Parses a response body fetched from `url`.
///
/// # Errors
///
/// Returns `Parse` when the body is not valid JSON.
pub fn parse_json(url: &Url, body: &str) -> Result<Value> {
    serde_json::from_str(body).map_err(|e| {
        error!("Response from {url} is not valid JSON: {e}");
        BuildLensError::Parse(format!("invalid JSON from {url}: {e}"))
    })
}
