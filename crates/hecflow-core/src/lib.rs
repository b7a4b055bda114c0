//! hecflow Core Library
//!
//! Turns GitHub Actions workflow runs into Splunk HEC events:
//! - one event per concluded job, with step names and duration
//! - one event per artifact, with its run reference flattened
//! - one summary event per run, aggregated from the above
//!
//! The GitHub API and the collector are reached through the
//! [`WorkflowSource`] and [`EventSink`] traits; in-memory fakes live in
//! [`fakes`].

pub mod error;
pub mod event;
pub mod fakes;
pub mod model;
pub mod obs;
pub mod orchestrator;
pub mod report;
pub mod sink;
pub mod source;
pub mod telemetry;

pub use error::{ReporterError, Result};
pub use event::{EventBody, EventBuilder, EventKind, HecEvent, DEFAULT_HOST, SOURCE};
pub use model::{Artifact, Job, Step, WorkflowRunRef};
pub use orchestrator::{DeliveryStats, RunOutcome, RunPhase, RunReporter};
pub use report::{FinalizedReport, WorkflowReport};
pub use sink::{EventSink, HecClient, HecConfig, SendOutcome};
pub use source::{GitHubClient, GitHubConfig, Resource, WorkflowSource};
pub use telemetry::{init_tracing, LogFormat};

/// hecflow-core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
