//! Per-run aggregation of emitted jobs and artifacts.

use serde::{Deserialize, Serialize};

/// Accumulator for one workflow run.
///
/// Created empty when a run starts, mutated once per emitted job or artifact,
/// and finalised into the summary event. Applying the same job twice counts
/// it twice; callers feed each job and artifact exactly once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowReport {
    /// Job names in the order they were emitted.
    pub jobs: Vec<String>,

    /// Artifact names in the order they were emitted.
    pub artifacts: Vec<String>,

    /// Sum of the emitted jobs' durations.
    pub duration_in_seconds: f64,
}

impl WorkflowReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a concluded job.
    pub fn apply_job(&mut self, name: &str, duration_in_seconds: f64) {
        self.jobs.push(name.to_string());
        self.duration_in_seconds += duration_in_seconds;
    }

    /// Record an uploaded artifact.
    pub fn apply_artifact(&mut self, name: &str) {
        self.artifacts.push(name.to_string());
    }

    /// Attach the run id, consuming the accumulator.
    pub fn finalize(self, run_id: u64) -> FinalizedReport {
        FinalizedReport {
            run_id,
            jobs: self.jobs,
            artifacts: self.artifacts,
            duration_in_seconds: self.duration_in_seconds,
        }
    }
}

/// A report with its run id attached, ready to become the summary event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedReport {
    pub run_id: u64,
    pub jobs: Vec<String>,
    pub artifacts: Vec<String>,
    pub duration_in_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_job_accumulates_in_order() {
        let mut report = WorkflowReport::new();
        report.apply_job("build", 150.0);
        report.apply_job("test", 30.5);

        assert_eq!(report.jobs, vec!["build", "test"]);
        assert_eq!(report.duration_in_seconds, 180.5);
        assert!(report.artifacts.is_empty());
    }

    #[test]
    fn test_apply_job_is_not_idempotent() {
        let mut report = WorkflowReport::new();
        report.apply_job("build", 10.0);
        report.apply_job("build", 10.0);

        assert_eq!(report.jobs.len(), 2);
        assert_eq!(report.duration_in_seconds, 20.0);
    }

    #[test]
    fn test_finalize_attaches_run_id() {
        let mut report = WorkflowReport::new();
        report.apply_job("build", 1.0);
        report.apply_artifact("report.zip");

        let finalized = report.finalize(42);
        assert_eq!(finalized.run_id, 42);
        assert_eq!(finalized.jobs, vec!["build"]);
        assert_eq!(finalized.artifacts, vec!["report.zip"]);
        assert_eq!(finalized.duration_in_seconds, 1.0);
    }
}
