//! In-memory fakes for the source and sink traits (testing only)
//!
//! `StaticSource` serves canned GitHub payloads and `RecordingSink` captures
//! every event it is handed, answering with scripted outcomes.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::{ReporterError, Result};
use crate::event::{EventKind, HecEvent};
use crate::sink::{EventSink, SendOutcome};
use crate::source::{Resource, WorkflowSource};

// ---------------------------------------------------------------------------
// StaticSource
// ---------------------------------------------------------------------------

/// Workflow source backed by a `HashMap<(run_id, resource), payload>`.
///
/// Unknown runs answer like the API does for them: `{"message": "Not Found"}`.
#[derive(Debug, Default)]
pub struct StaticSource {
    payloads: HashMap<(u64, Resource), Value>,
    unreachable: bool,
    calls: Mutex<Vec<(u64, Resource)>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// A source whose every fetch fails at the transport level.
    pub fn unreachable() -> Self {
        StaticSource {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Serve `jobs` and `artifacts` (JSON arrays) for `run_id`.
    pub fn with_run(self, run_id: u64, jobs: Value, artifacts: Value) -> Self {
        let job_count = jobs.as_array().map(Vec::len).unwrap_or(0);
        let artifact_count = artifacts.as_array().map(Vec::len).unwrap_or(0);
        self.with_payload(
            run_id,
            Resource::Jobs,
            json!({"total_count": job_count, "jobs": jobs}),
        )
        .with_payload(
            run_id,
            Resource::Artifacts,
            json!({"total_count": artifact_count, "artifacts": artifacts}),
        )
    }

    /// Serve a raw payload for one resource of a run.
    pub fn with_payload(mut self, run_id: u64, resource: Resource, payload: Value) -> Self {
        self.payloads.insert((run_id, resource), payload);
        self
    }

    /// Fetches performed so far, in order.
    pub fn calls(&self) -> Vec<(u64, Resource)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkflowSource for StaticSource {
    async fn fetch(&self, _repository: &str, run_id: u64, resource: Resource) -> Result<Value> {
        self.calls.lock().unwrap().push((run_id, resource));

        if self.unreachable {
            return Err(ReporterError::Fetch {
                resource: resource.to_string(),
                run_id,
                reason: "connection refused".to_string(),
            });
        }

        Ok(self
            .payloads
            .get(&(run_id, resource))
            .cloned()
            .unwrap_or_else(|| json!({"message": "Not Found"})))
    }
}

// ---------------------------------------------------------------------------
// RecordingSink
// ---------------------------------------------------------------------------

/// Event sink that keeps every event it receives.
///
/// Outcomes are taken from the script in order; once it is exhausted every
/// event is accepted.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<HecEvent>>,
    script: Mutex<VecDeque<SendOutcome>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcomes(outcomes: Vec<SendOutcome>) -> Self {
        RecordingSink {
            events: Mutex::new(Vec::new()),
            script: Mutex::new(outcomes.into()),
        }
    }

    /// All events received, in send order.
    pub fn events(&self) -> Vec<HecEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events of one kind, in send order.
    pub fn events_of(&self, kind: EventKind) -> Vec<HecEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn send(&self, event: &HecEvent) -> SendOutcome {
        self.events.lock().unwrap().push(event.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(SendOutcome::Accepted { status: 200 })
    }
}
