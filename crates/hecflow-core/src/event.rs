//! HEC event shapes and their construction from GitHub payloads.
//!
//! Three kinds of events are emitted per workflow run:
//! - one `github:workflow:job` event per concluded job
//! - one `github:workflow:artifact` event per artifact
//! - one `github:workflow` summary event built from the [`WorkflowReport`]
//!
//! Job and artifact construction also feed the report, so aggregation happens
//! while the job and artifact lists are scanned.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::model::{Artifact, Job};
use crate::report::{FinalizedReport, WorkflowReport};

/// Value of the `source` key on every event.
pub const SOURCE: &str = "github-workflows";

/// Host used when no runner name is known.
pub const DEFAULT_HOST: &str = "github-actions";

/// Job sourcetype emitted in legacy mode.
pub const LEGACY_JOB_SOURCETYPE: &str = "github:workflow:action";

/// The closed set of events the reporter emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Job,
    Artifact,
    WorkflowSummary,
}

impl EventKind {
    pub fn sourcetype(&self) -> &'static str {
        match self {
            EventKind::Job => "github:workflow:job",
            EventKind::Artifact => "github:workflow:artifact",
            EventKind::WorkflowSummary => "github:workflow",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EventKind::Job => "job",
            EventKind::Artifact => "artifact",
            EventKind::WorkflowSummary => "workflow_summary",
        };
        write!(f, "{}", name)
    }
}

/// Body of an event: free text or a structured mapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventBody {
    Text(String),
    Structured(Map<String, Value>),
}

impl From<String> for EventBody {
    fn from(text: String) -> Self {
        EventBody::Text(text)
    }
}

/// One record POSTed to the collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HecEvent {
    #[serde(skip)]
    pub kind: EventKind,
    pub index: String,
    pub event: EventBody,
    pub source: String,
    pub sourcetype: String,
    pub host: String,
    pub fields: Map<String, Value>,
}

impl HecEvent {
    /// UTF-8 JSON encoding sent on the wire. Non-ASCII text is not escaped.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Builds events for one attribution context (index, user, static fields).
#[derive(Debug, Clone)]
pub struct EventBuilder {
    index: String,
    user: String,
    extra_fields: Map<String, Value>,
    legacy_sourcetype: bool,
}

impl EventBuilder {
    pub fn new(index: &str, user: &str) -> Self {
        EventBuilder {
            index: index.to_string(),
            user: user.to_string(),
            extra_fields: Map::new(),
            legacy_sourcetype: false,
        }
    }

    /// Static fields added to every event. They never replace a key the
    /// event already carries.
    pub fn with_fields(mut self, fields: Map<String, Value>) -> Self {
        self.extra_fields = fields;
        self
    }

    /// Emit job events with the `github:workflow:action` sourcetype.
    pub fn with_legacy_sourcetype(mut self, legacy: bool) -> Self {
        self.legacy_sourcetype = legacy;
        self
    }

    /// Build the event for a concluded job and record it in `report`.
    ///
    /// The report is only touched once the event is complete, so a job with
    /// a malformed timestamp leaves it as it was.
    pub fn job_event(
        &self,
        job: &Job,
        host: &str,
        report: &mut WorkflowReport,
    ) -> Result<HecEvent> {
        let duration = job.duration_in_seconds()?;

        let mut fields = as_object(serde_json::to_value(job)?);
        fields.insert("user".to_string(), Value::from(self.user.as_str()));
        fields.insert("steps".to_string(), Value::from(job.step_names()));
        fields.insert("duration_in_seconds".to_string(), Value::from(duration));

        let body = format!(
            "Job '{}' finished with conclusion '{}', started at {}, triggered by {}",
            job.name,
            job.conclusion.as_deref().unwrap_or("unknown"),
            job.started_at.as_deref().unwrap_or("unknown"),
            self.user,
        );

        let mut event = self.event(EventKind::Job, host, body, fields);
        if self.legacy_sourcetype {
            event.sourcetype = LEGACY_JOB_SOURCETYPE.to_string();
        }

        report.apply_job(&job.name, duration);
        Ok(event)
    }

    /// Build the event for an artifact and record it in `report`.
    ///
    /// `run_id` is used when the artifact has no nested run reference.
    pub fn artifact_event(
        &self,
        artifact: &Artifact,
        run_id: u64,
        host: &str,
        report: &mut WorkflowReport,
    ) -> Result<HecEvent> {
        let run_id = artifact.run_id().unwrap_or(run_id);

        let mut fields = as_object(serde_json::to_value(artifact)?);
        fields.remove("workflow_run");
        fields.insert("run_id".to_string(), Value::from(run_id));
        fields.insert("user".to_string(), Value::from(self.user.as_str()));

        let body = format!(
            "Artifact '{}' uploaded for run {}, triggered by {}",
            artifact.name, run_id, self.user
        );

        let event = self.event(EventKind::Artifact, host, body, fields);
        report.apply_artifact(&artifact.name);
        Ok(event)
    }

    /// Build the workflow summary event from a finalised report.
    pub fn summary_event(&self, report: &FinalizedReport, host: &str) -> Result<HecEvent> {
        let mut fields = as_object(serde_json::to_value(report)?);
        fields.insert("user".to_string(), Value::from(self.user.as_str()));

        let body = format!(
            "Workflow run {} triggered by {}. Jobs: {}. Artifacts: {}",
            report.run_id,
            self.user,
            join_or_none(&report.jobs),
            join_or_none(&report.artifacts),
        );

        Ok(self.event(EventKind::WorkflowSummary, host, body, fields))
    }

    fn event(
        &self,
        kind: EventKind,
        host: &str,
        body: String,
        mut fields: Map<String, Value>,
    ) -> HecEvent {
        for (key, value) in &self.extra_fields {
            fields.entry(key.clone()).or_insert_with(|| value.clone());
        }

        HecEvent {
            kind,
            index: self.index.clone(),
            event: body.into(),
            source: SOURCE.to_string(),
            sourcetype: kind.sourcetype().to_string(),
            host: host.to_string(),
            fields,
        }
    }
}

fn as_object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReporterError;
    use serde_json::json;

    fn build_job() -> Job {
        serde_json::from_value(json!({
            "id": 7,
            "run_id": 42,
            "name": "build",
            "status": "completed",
            "conclusion": "success",
            "head_branch": "main",
            "head_sha": "abc123",
            "runner_name": "runner-1",
            "started_at": "2024-01-01T00:00:00Z",
            "completed_at": "2024-01-01T00:02:30Z",
            "steps": [
                {"name": "checkout", "status": "completed", "conclusion": "success", "number": 1},
                {"name": "compile", "status": "completed", "conclusion": "success", "number": 2}
            ],
            "html_url": "https://github.com/acme/widgets/actions/runs/42/job/7"
        }))
        .unwrap()
    }

    #[test]
    fn test_job_event_fields() {
        let builder = EventBuilder::new("ci", "octocat");
        let mut report = WorkflowReport::new();

        let event = builder
            .job_event(&build_job(), "runner-1", &mut report)
            .unwrap();

        assert_eq!(event.kind, EventKind::Job);
        assert_eq!(event.sourcetype, "github:workflow:job");
        assert_eq!(event.source, SOURCE);
        assert_eq!(event.host, "runner-1");
        assert_eq!(event.index, "ci");
        assert_eq!(event.fields["duration_in_seconds"], json!(150.0));
        assert_eq!(event.fields["steps"], json!(["checkout", "compile"]));
        assert_eq!(event.fields["user"], json!("octocat"));
        assert_eq!(event.fields["head_sha"], json!("abc123"));
        assert_eq!(
            event.fields["html_url"],
            json!("https://github.com/acme/widgets/actions/runs/42/job/7")
        );

        match &event.event {
            EventBody::Text(text) => {
                assert!(text.contains("build"));
                assert!(text.contains("success"));
                assert!(text.contains("2024-01-01T00:00:00Z"));
                assert!(text.contains("octocat"));
            }
            other => panic!("unexpected body: {:?}", other),
        }

        assert_eq!(report.jobs, vec!["build"]);
        assert_eq!(report.duration_in_seconds, 150.0);
    }

    #[test]
    fn test_job_event_malformed_timestamp_leaves_report_untouched() {
        let builder = EventBuilder::new("ci", "octocat");
        let mut report = WorkflowReport::new();
        let mut job = build_job();
        job.completed_at = None;

        let err = builder.job_event(&job, "runner-1", &mut report).unwrap_err();
        assert!(matches!(err, ReporterError::MalformedTimestamp { .. }));
        assert_eq!(report, WorkflowReport::new());
    }

    #[test]
    fn test_legacy_sourcetype() {
        let builder = EventBuilder::new("ci", "octocat").with_legacy_sourcetype(true);
        let mut report = WorkflowReport::new();

        let event = builder
            .job_event(&build_job(), "runner-1", &mut report)
            .unwrap();
        assert_eq!(event.sourcetype, LEGACY_JOB_SOURCETYPE);
        assert_eq!(event.kind, EventKind::Job);
    }

    #[test]
    fn test_extra_fields_do_not_override_event_fields() {
        let mut extra = Map::new();
        extra.insert("team".to_string(), json!("platform"));
        extra.insert("user".to_string(), json!("impostor"));
        let builder = EventBuilder::new("ci", "octocat").with_fields(extra);
        let mut report = WorkflowReport::new();

        let event = builder
            .job_event(&build_job(), "runner-1", &mut report)
            .unwrap();
        assert_eq!(event.fields["team"], json!("platform"));
        assert_eq!(event.fields["user"], json!("octocat"));
    }

    #[test]
    fn test_artifact_event_flattens_run_reference() {
        let builder = EventBuilder::new("ci", "octocat");
        let mut report = WorkflowReport::new();
        let artifact: Artifact = serde_json::from_value(json!({
            "name": "report.zip",
            "workflow_run": {"id": 42},
            "size": 1024
        }))
        .unwrap();

        let event = builder
            .artifact_event(&artifact, 99, "runner-1", &mut report)
            .unwrap();

        assert_eq!(event.sourcetype, "github:workflow:artifact");
        assert_eq!(event.fields["run_id"], json!(42));
        assert_eq!(event.fields["size_in_bytes"], json!(1024));
        assert!(!event.fields.contains_key("workflow_run"));
        assert_eq!(report.artifacts, vec!["report.zip"]);
        assert!(report.jobs.is_empty());
    }

    #[test]
    fn test_artifact_event_without_run_reference_uses_current_run() {
        let builder = EventBuilder::new("ci", "octocat");
        let mut report = WorkflowReport::new();
        let artifact: Artifact =
            serde_json::from_value(json!({"name": "coverage", "size_in_bytes": 5})).unwrap();

        let event = builder
            .artifact_event(&artifact, 99, DEFAULT_HOST, &mut report)
            .unwrap();
        assert_eq!(event.fields["run_id"], json!(99));
    }

    #[test]
    fn test_absent_attributes_are_not_emitted_as_null() {
        let builder = EventBuilder::new("ci", "octocat");
        let mut report = WorkflowReport::new();
        let job: Job = serde_json::from_value(json!({
            "name": "deploy",
            "conclusion": "skipped",
            "started_at": "2024-01-01T00:00:00Z",
            "completed_at": "2024-01-01T00:00:00Z",
            "steps": null
        }))
        .unwrap();
        let artifact: Artifact = serde_json::from_value(json!({"name": "coverage"})).unwrap();

        let event = builder.job_event(&job, DEFAULT_HOST, &mut report).unwrap();
        for key in ["id", "run_id", "head_branch", "head_sha", "runner_name"] {
            assert!(!event.fields.contains_key(key), "unexpected field {}", key);
        }
        assert_eq!(event.fields["steps"], json!([]));
        assert_eq!(event.fields["conclusion"], json!("skipped"));

        let event = builder
            .artifact_event(&artifact, 99, DEFAULT_HOST, &mut report)
            .unwrap();
        for key in ["id", "size_in_bytes", "created_at"] {
            assert!(!event.fields.contains_key(key), "unexpected field {}", key);
        }
        assert!(event.fields.values().all(|v| !v.is_null()));
    }

    #[test]
    fn test_summary_event() {
        let builder = EventBuilder::new("ci", "octocat");
        let mut report = WorkflowReport::new();
        report.apply_job("build", 150.0);
        report.apply_job("test", 30.0);
        report.apply_artifact("report.zip");

        let event = builder
            .summary_event(&report.finalize(42), "runner-1")
            .unwrap();

        assert_eq!(event.kind, EventKind::WorkflowSummary);
        assert_eq!(event.sourcetype, "github:workflow");
        assert_eq!(event.fields["run_id"], json!(42));
        assert_eq!(event.fields["jobs"], json!(["build", "test"]));
        assert_eq!(event.fields["artifacts"], json!(["report.zip"]));
        assert_eq!(event.fields["duration_in_seconds"], json!(180.0));
        assert_eq!(
            event.event,
            EventBody::Text(
                "Workflow run 42 triggered by octocat. Jobs: build, test. Artifacts: report.zip"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_wire_encoding_keeps_non_ascii() {
        let builder = EventBuilder::new("ci", "José");
        let report = WorkflowReport::new().finalize(1);
        let event = builder.summary_event(&report, DEFAULT_HOST).unwrap();

        let json = event.to_json().unwrap();
        assert!(json.contains("José"));
        assert!(json.contains("\"sourcetype\":\"github:workflow\""));
        assert!(!json.contains("\"kind\""));
    }

    #[test]
    fn test_structured_body_serializes_as_object() {
        let mut body = Map::new();
        body.insert("message".to_string(), json!("hello"));
        let v = serde_json::to_value(EventBody::Structured(body)).unwrap();
        assert_eq!(v, json!({"message": "hello"}));
    }
}
