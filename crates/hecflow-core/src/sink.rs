//! Splunk HTTP Event Collector client
//!
//! Every event is POSTed on its own to `/services/collector` and the response
//! is classified into a [`SendOutcome`]. Delivery is attempted once; no
//! outcome is ever turned into an error that would stop a run.
//!
//! TLS certificates of the collector are not verified.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ReporterError, Result};
use crate::event::HecEvent;

/// Collector path on the HEC endpoint.
pub const COLLECTOR_PATH: &str = "/services/collector";

/// Classified result of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// HTTP 200 or 201
    Accepted { status: u16 },
    /// Any other HTTP status
    Rejected { status: u16, body: String },
    /// DNS, refused connection, timeout
    Unreachable { reason: String },
    /// The event could not be encoded as JSON
    Unencodable { reason: String },
}

impl SendOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SendOutcome::Accepted { .. })
    }

    /// Classify an HTTP response from the collector.
    pub fn from_response(status: u16, body: String) -> Self {
        match status {
            200 | 201 => SendOutcome::Accepted { status },
            _ => SendOutcome::Rejected { status, body },
        }
    }
}

/// Destination for emitted events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver one event. Never fails; the outcome says what happened.
    async fn send(&self, event: &HecEvent) -> SendOutcome;
}

/// HEC endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HecConfig {
    /// `http` or `https`
    pub scheme: String,
    /// Collector host name
    pub host: String,
    /// Collector port
    pub port: u16,
    /// HEC token sent as `Authorization: Splunk <token>`
    pub token: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for HecConfig {
    fn default() -> Self {
        HecConfig {
            scheme: std::env::var("SPLUNK_HEC_SCHEME").unwrap_or_else(|_| "https".to_string()),
            host: std::env::var("SPLUNK_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: std::env::var("SPLUNK_HEC_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8088),
            token: std::env::var("SPLUNK_HEC_TOKEN").unwrap_or_default(),
            timeout_secs: 30,
        }
    }
}

impl HecConfig {
    /// Create config for a specific collector
    pub fn new(host: &str, port: u16, token: &str) -> Self {
        HecConfig {
            scheme: "https".to_string(),
            host: host.to_string(),
            port,
            token: token.to_string(),
            timeout_secs: 30,
        }
    }

    /// Set the URL scheme
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = scheme.to_string();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// `{scheme}://{host}:{port}/services/collector`
    pub fn collector_url(&self) -> Result<Url> {
        if self.scheme != "http" && self.scheme != "https" {
            return Err(ReporterError::Config(format!(
                "unsupported HEC scheme '{}'",
                self.scheme
            )));
        }

        let raw = format!(
            "{}://{}:{}{}",
            self.scheme, self.host, self.port, COLLECTOR_PATH
        );
        Url::parse(&raw).map_err(|e| ReporterError::Config(format!("HEC url '{}': {}", raw, e)))
    }
}

/// HTTP client for the Splunk HTTP Event Collector
pub struct HecClient {
    url: Url,
    token: String,
    http_client: reqwest::Client,
}

impl HecClient {
    pub fn new(config: HecConfig) -> Result<Self> {
        let url = config.collector_url()?;
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("hecflow/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(true)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ReporterError::Config(format!("HEC client: {}", e)))?;

        Ok(HecClient {
            url,
            token: config.token,
            http_client,
        })
    }
}

#[async_trait]
impl EventSink for HecClient {
    async fn send(&self, event: &HecEvent) -> SendOutcome {
        let body = match event.to_json() {
            Ok(body) => body,
            Err(e) => {
                warn!(kind = %event.kind, error = %e, "Event could not be encoded");
                return SendOutcome::Unencodable {
                    reason: e.to_string(),
                };
            }
        };

        debug!(kind = %event.kind, index = %event.index, host = %event.host, "Sending event to HEC");

        let result = self
            .http_client
            .post(self.url.clone())
            .header(AUTHORIZATION, format!("Splunk {}", self.token))
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(body)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(kind = %event.kind, error = %e, "Exception caught during ingestion");
                return SendOutcome::Unreachable {
                    reason: e.to_string(),
                };
            }
        };

        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();

        let outcome = SendOutcome::from_response(status, text);
        match &outcome {
            SendOutcome::Accepted { .. } => {
                info!(kind = %event.kind, "Event ingested successfully")
            }
            SendOutcome::Rejected { status, body } => warn!(
                kind = %event.kind,
                status = *status,
                "Event ingestion failed - HTTP error {}: {}",
                status,
                body
            ),
            _ => {}
        }
        outcome
    }
}
