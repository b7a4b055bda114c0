//! GitHub Actions payload types.
//!
//! Only the attributes the reporter derives values from are typed. Everything
//! else the API returns is kept in `attributes` so it reaches the emitted
//! event unchanged.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::{ReporterError, Result};

/// Timestamp layout used by the GitHub Actions API.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// A single step of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    /// Ordinal position within the job (1-based).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number: Option<u32>,
}

/// A job of a workflow run, as returned by `/actions/runs/{run_id}/jobs`.
///
/// Absent optional attributes are left out when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<u64>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// `None` while the job is queued or in progress.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conclusion: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_sha: Option<String>,
    /// Empty for jobs skipped or cancelled before a runner picked them up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runner_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub steps: Vec<Step>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    /// `None` while the job is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,

    /// Remaining API attributes (`html_url`, `labels`, `workflow_name`, ...).
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Job {
    /// Whether the job has concluded and can be reported.
    pub fn is_finished(&self) -> bool {
        self.conclusion.is_some()
    }

    /// Runner that executed the job, if any. A blank name counts as none.
    pub fn runner(&self) -> Option<&str> {
        self.runner_name.as_deref().filter(|name| !name.trim().is_empty())
    }

    /// Step names in execution order.
    pub fn step_names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name.clone()).collect()
    }

    /// Wall-clock duration between `started_at` and `completed_at`.
    ///
    /// Fails with [`ReporterError::MalformedTimestamp`] when either timestamp
    /// is absent or does not match [`TIMESTAMP_FORMAT`].
    pub fn duration_in_seconds(&self) -> Result<f64> {
        let started = self.timestamp("started_at", self.started_at.as_deref())?;
        let completed = self.timestamp("completed_at", self.completed_at.as_deref())?;

        let elapsed = completed - started;
        if elapsed < chrono::Duration::zero() {
            return Err(ReporterError::MalformedTimestamp {
                job: self.name.clone(),
                field: "completed_at",
                reason: "completed before it started".to_string(),
            });
        }

        Ok(elapsed.num_milliseconds() as f64 / 1000.0)
    }

    fn timestamp(&self, field: &'static str, raw: Option<&str>) -> Result<NaiveDateTime> {
        let raw = raw.ok_or_else(|| ReporterError::MalformedTimestamp {
            job: self.name.clone(),
            field,
            reason: "missing".to_string(),
        })?;

        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|e| {
            ReporterError::MalformedTimestamp {
                job: self.name.clone(),
                field,
                reason: format!("'{}': {}", raw, e),
            }
        })
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reference to the workflow run an artifact belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRunRef {
    pub id: u64,
}

/// An artifact of a workflow run, as returned by `/actions/runs/{run_id}/artifacts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub name: String,
    #[serde(alias = "size", skip_serializing_if = "Option::is_none")]
    pub size_in_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_run: Option<WorkflowRunRef>,

    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Artifact {
    /// Run id carried by the nested `workflow_run` reference.
    pub fn run_id(&self) -> Option<u64> {
        self.workflow_run.as_ref().map(|r| r.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(started: Option<&str>, completed: Option<&str>) -> Job {
        serde_json::from_value(json!({
            "name": "build",
            "conclusion": "success",
            "started_at": started,
            "completed_at": completed,
            "steps": [{"name": "checkout"}, {"name": "compile"}],
        }))
        .unwrap()
    }

    #[test]
    fn test_duration_from_iso_timestamps() {
        let job = job(Some("2024-01-01T00:00:00Z"), Some("2024-01-01T00:02:30Z"));
        assert_eq!(job.duration_in_seconds().unwrap(), 150.0);
        assert_eq!(job.step_names(), vec!["checkout", "compile"]);
    }

    #[test]
    fn test_missing_completed_at_is_malformed() {
        let job = job(Some("2024-01-01T00:00:00Z"), None);
        match job.duration_in_seconds() {
            Err(ReporterError::MalformedTimestamp { field, .. }) => {
                assert_eq!(field, "completed_at")
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_unparsable_started_at_is_malformed() {
        let job = job(Some("yesterday"), Some("2024-01-01T00:02:30Z"));
        assert!(matches!(
            job.duration_in_seconds(),
            Err(ReporterError::MalformedTimestamp {
                field: "started_at",
                ..
            })
        ));
    }

    #[test]
    fn test_completed_before_started_is_malformed() {
        let job = job(Some("2024-01-01T00:02:30Z"), Some("2024-01-01T00:00:00Z"));
        assert!(job.duration_in_seconds().is_err());
    }

    #[test]
    fn test_job_keeps_unknown_attributes() {
        let job: Job = serde_json::from_value(json!({
            "id": 7,
            "run_id": 42,
            "name": "lint",
            "status": "in_progress",
            "conclusion": null,
            "html_url": "https://github.com/acme/widgets/actions/runs/42/job/7",
            "labels": ["ubuntu-latest"],
        }))
        .unwrap();

        assert!(!job.is_finished());
        assert!(job.steps.is_empty());
        assert_eq!(job.attributes["labels"], json!(["ubuntu-latest"]));
        assert!(!job.attributes.contains_key("name"));
    }

    #[test]
    fn test_null_steps_decode_as_empty() {
        let job: Job = serde_json::from_value(json!({
            "name": "deploy",
            "conclusion": "skipped",
            "steps": null,
        }))
        .unwrap();

        assert!(job.steps.is_empty());
        assert!(job.step_names().is_empty());
    }

    #[test]
    fn test_blank_runner_name_is_no_runner() {
        let mut job = job(None, None);
        assert_eq!(job.runner(), None);

        job.runner_name = Some(String::new());
        assert_eq!(job.runner(), None);

        job.runner_name = Some("runner-1".to_string());
        assert_eq!(job.runner(), Some("runner-1"));
    }

    #[test]
    fn test_absent_attributes_are_not_serialized() {
        let value = serde_json::to_value(job(Some("2024-01-01T00:00:00Z"), None)).unwrap();
        assert!(!value.as_object().unwrap().contains_key("id"));
        assert!(!value.as_object().unwrap().contains_key("completed_at"));
        assert_eq!(value["started_at"], json!("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_artifact_accepts_size_alias() {
        let artifact: Artifact = serde_json::from_value(json!({
            "name": "report.zip",
            "workflow_run": {"id": 42, "head_branch": "main"},
            "size": 1024,
        }))
        .unwrap();

        assert_eq!(artifact.size_in_bytes, Some(1024));
        assert_eq!(artifact.run_id(), Some(42));
    }
}
