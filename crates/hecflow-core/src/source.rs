//! GitHub Actions API client
//!
//! Retrieves the jobs and artifacts of a workflow run. The
//! [`WorkflowSource`] trait is the seam the orchestrator depends on;
//! [`GitHubClient`] is the HTTP implementation.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ReporterError, Result};
use crate::model::{Artifact, Job};

/// Default GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Collections that can be fetched for a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Jobs,
    Artifacts,
}

impl Resource {
    /// Path segment under `/actions/runs/{run_id}/`, also the list key of the payload.
    pub fn path(&self) -> &'static str {
        match self {
            Resource::Jobs => "jobs",
            Resource::Artifacts => "artifacts",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

/// Provider of workflow run data.
#[async_trait]
pub trait WorkflowSource: Send + Sync {
    /// Fetch the raw payload of `resource` for a run.
    ///
    /// Transport failures are [`ReporterError::Fetch`]. A non-success HTTP
    /// status still yields the decoded body.
    async fn fetch(&self, repository: &str, run_id: u64, resource: Resource) -> Result<Value>;

    /// Fetch and decode the jobs of a run.
    async fn fetch_jobs(&self, repository: &str, run_id: u64) -> Result<Vec<Job>> {
        let payload = self.fetch(repository, run_id, Resource::Jobs).await?;
        decode_list(payload, Resource::Jobs, run_id)
    }

    /// Fetch and decode the artifacts of a run.
    async fn fetch_artifacts(&self, repository: &str, run_id: u64) -> Result<Vec<Artifact>> {
        let payload = self.fetch(repository, run_id, Resource::Artifacts).await?;
        decode_list(payload, Resource::Artifacts, run_id)
    }
}

/// Extract the `jobs` / `artifacts` list from a payload.
///
/// A missing or mis-shaped list is [`ReporterError::MalformedPayload`]; the
/// API's `message` (e.g. "Bad credentials") is carried in the error.
pub fn decode_list<T: DeserializeOwned>(
    mut payload: Value,
    resource: Resource,
    run_id: u64,
) -> Result<Vec<T>> {
    let malformed = |reason: String| ReporterError::MalformedPayload {
        resource: resource.to_string(),
        run_id,
        reason,
    };

    let list = match payload.get_mut(resource.path()).map(Value::take) {
        Some(list @ Value::Array(_)) => list,
        Some(_) => return Err(malformed(format!("'{}' is not a list", resource))),
        None => {
            let reason = match payload.get("message").and_then(Value::as_str) {
                Some(message) => format!("missing '{}' (API message: {})", resource, message),
                None => format!("missing '{}'", resource),
            };
            return Err(malformed(reason));
        }
    };

    serde_json::from_value(list).map_err(|e| malformed(e.to_string()))
}

/// GitHub API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// Base URL of the REST API
    pub api_url: String,
    /// Token sent as a bearer credential
    pub token: Option<String>,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        GitHubConfig {
            api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            token: std::env::var("GITHUB_TOKEN").ok(),
            timeout_secs: 30,
        }
    }
}

impl GitHubConfig {
    /// Create config for a specific API endpoint
    pub fn new(api_url: &str) -> Self {
        GitHubConfig {
            api_url: api_url.to_string(),
            token: None,
            timeout_secs: 30,
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// HTTP client for the GitHub Actions API
pub struct GitHubClient {
    config: GitHubConfig,
    http_client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(config: GitHubConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("hecflow/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReporterError::Config(format!("GitHub client: {}", e)))?;

        Ok(GitHubClient {
            config,
            http_client,
        })
    }

    /// URL of `resource` for a run.
    pub fn endpoint(&self, repository: &str, run_id: u64, resource: Resource) -> String {
        format!(
            "{}/repos/{}/actions/runs/{}/{}",
            self.config.api_url.trim_end_matches('/'),
            repository,
            run_id,
            resource
        )
    }
}

#[async_trait]
impl WorkflowSource for GitHubClient {
    async fn fetch(&self, repository: &str, run_id: u64, resource: Resource) -> Result<Value> {
        let url = self.endpoint(repository, run_id, resource);
        debug!(url = %url, "Fetching {}", resource);

        let fetch_error = |reason: String| ReporterError::Fetch {
            resource: resource.to_string(),
            run_id,
            reason,
        };

        let mut request = self
            .http_client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .query(&[("per_page", "100")]);
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| fetch_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                run_id,
                resource = %resource,
                "GitHub API returned a non-success status"
            );
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| fetch_error(format!("undecodable body: {}", e)))
    }
}
