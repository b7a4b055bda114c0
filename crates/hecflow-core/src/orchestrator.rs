//! Workflow run orchestration.
//!
//! A run walks `FetchingJobs → EmittingJobs → FetchingArtifacts →
//! EmittingArtifacts → EmittingSummary → Done`, never going back. Fetch and
//! payload errors abort the run before anything else is sent; delivery
//! outcomes are only counted.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, Instrument};

use crate::error::Result;
use crate::event::{EventBuilder, HecEvent, DEFAULT_HOST};
use crate::obs;
use crate::report::{FinalizedReport, WorkflowReport};
use crate::sink::{EventSink, SendOutcome};
use crate::source::WorkflowSource;

/// Phases of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunPhase {
    FetchingJobs,
    EmittingJobs,
    FetchingArtifacts,
    EmittingArtifacts,
    EmittingSummary,
    Done,
}

impl RunPhase {
    /// The phase that follows this one. `Done` is terminal.
    pub fn next(self) -> Option<RunPhase> {
        match self {
            RunPhase::FetchingJobs => Some(RunPhase::EmittingJobs),
            RunPhase::EmittingJobs => Some(RunPhase::FetchingArtifacts),
            RunPhase::FetchingArtifacts => Some(RunPhase::EmittingArtifacts),
            RunPhase::EmittingArtifacts => Some(RunPhase::EmittingSummary),
            RunPhase::EmittingSummary => Some(RunPhase::Done),
            RunPhase::Done => None,
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunPhase::FetchingJobs => "fetching_jobs",
            RunPhase::EmittingJobs => "emitting_jobs",
            RunPhase::FetchingArtifacts => "fetching_artifacts",
            RunPhase::EmittingArtifacts => "emitting_artifacts",
            RunPhase::EmittingSummary => "emitting_summary",
            RunPhase::Done => "done",
        };
        write!(f, "{}", name)
    }
}

/// Delivery counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub accepted: usize,
    pub rejected: usize,
    pub unreachable: usize,
    pub unencodable: usize,
}

impl DeliveryStats {
    fn record(&mut self, outcome: &SendOutcome) {
        match outcome {
            SendOutcome::Accepted { .. } => self.accepted += 1,
            SendOutcome::Rejected { .. } => self.rejected += 1,
            SendOutcome::Unreachable { .. } => self.unreachable += 1,
            SendOutcome::Unencodable { .. } => self.unencodable += 1,
        }
    }

    /// Number of events handed to the sink.
    pub fn attempted(&self) -> usize {
        self.accepted + self.rejected + self.unreachable + self.unencodable
    }

    /// Number of events the collector did not accept.
    pub fn failed(&self) -> usize {
        self.attempted() - self.accepted
    }
}

/// Result of processing one run to completion.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub run_id: u64,
    pub phase: RunPhase,
    pub jobs_emitted: usize,
    /// Jobs without a conclusion yet.
    pub jobs_skipped: usize,
    pub artifacts_emitted: usize,
    pub deliveries: DeliveryStats,
    /// The report the summary event was built from.
    pub report: FinalizedReport,
}

/// Mutable state of a run in progress. Owned by a single `report_run` call.
struct RunState {
    run_id: u64,
    phase: RunPhase,
    report: WorkflowReport,
    deliveries: DeliveryStats,
    jobs_emitted: usize,
    jobs_skipped: usize,
    artifacts_emitted: usize,
    last_runner: Option<String>,
}

impl RunState {
    fn new(run_id: u64) -> Self {
        RunState {
            run_id,
            phase: RunPhase::FetchingJobs,
            report: WorkflowReport::new(),
            deliveries: DeliveryStats::default(),
            jobs_emitted: 0,
            jobs_skipped: 0,
            artifacts_emitted: 0,
            last_runner: None,
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.phase.next() {
            debug!(from = %self.phase, to = %next, "Run phase transition");
            self.phase = next;
        }
    }
}

/// Reports workflow runs of one repository to an [`EventSink`].
pub struct RunReporter {
    source: Arc<dyn WorkflowSource>,
    sink: Arc<dyn EventSink>,
    builder: EventBuilder,
    repository: String,
    host: Option<String>,
}

impl RunReporter {
    pub fn new(
        source: Arc<dyn WorkflowSource>,
        sink: Arc<dyn EventSink>,
        builder: EventBuilder,
        repository: &str,
    ) -> Self {
        RunReporter {
            source,
            sink,
            builder,
            repository: repository.to_string(),
            host: None,
        }
    }

    /// Fixed host for artifact and summary events.
    ///
    /// Without it those events reuse the runner name of the last emitted job,
    /// or [`DEFAULT_HOST`] when no job carried one.
    pub fn with_host(mut self, host: &str) -> Self {
        self.host = Some(host.to_string());
        self
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Process one run: emit its concluded jobs, its artifacts, then the summary.
    pub async fn report_run(&self, run_id: u64) -> Result<RunOutcome> {
        let span = tracing::info_span!("hecflow.run", run_id, repository = %self.repository);

        async {
            obs::emit_run_started(&self.repository, run_id);
            let result = self.process(run_id).await;
            match &result {
                Ok(outcome) => obs::emit_run_finished(outcome),
                Err(e) => obs::emit_run_failed(run_id, e),
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Process several runs, at most `concurrency` at a time.
    ///
    /// Each run owns its own report. Results come back in input order.
    pub async fn report_runs(
        &self,
        run_ids: &[u64],
        concurrency: usize,
    ) -> Vec<(u64, Result<RunOutcome>)> {
        stream::iter(run_ids.iter().copied())
            .map(|run_id| async move { (run_id, self.report_run(run_id).await) })
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    async fn process(&self, run_id: u64) -> Result<RunOutcome> {
        let mut state = RunState::new(run_id);

        let jobs = self.source.fetch_jobs(&self.repository, run_id).await?;
        state.advance();

        for job in &jobs {
            if !job.is_finished() {
                debug!(job = %job.name, status = ?job.status, "Skipping unfinished job");
                state.jobs_skipped += 1;
                continue;
            }

            let runner = job.runner().map(str::to_string);
            let host = runner
                .clone()
                .or_else(|| self.host.clone())
                .unwrap_or_else(|| DEFAULT_HOST.to_string());
            let event = self.builder.job_event(job, &host, &mut state.report)?;
            if runner.is_some() {
                state.last_runner = runner;
            }

            self.deliver(&mut state, &event).await;
            state.jobs_emitted += 1;
        }
        state.advance();

        let artifacts = self.source.fetch_artifacts(&self.repository, run_id).await?;
        state.advance();

        let context_host = self
            .host
            .clone()
            .or_else(|| state.last_runner.clone())
            .unwrap_or_else(|| DEFAULT_HOST.to_string());

        for artifact in &artifacts {
            let event =
                self.builder
                    .artifact_event(artifact, run_id, &context_host, &mut state.report)?;
            self.deliver(&mut state, &event).await;
            state.artifacts_emitted += 1;
        }
        state.advance();

        let report = std::mem::take(&mut state.report).finalize(run_id);
        let summary = self.builder.summary_event(&report, &context_host)?;
        self.deliver(&mut state, &summary).await;
        state.advance();

        Ok(RunOutcome {
            run_id: state.run_id,
            phase: state.phase,
            jobs_emitted: state.jobs_emitted,
            jobs_skipped: state.jobs_skipped,
            artifacts_emitted: state.artifacts_emitted,
            deliveries: state.deliveries,
            report,
        })
    }

    async fn deliver(&self, state: &mut RunState, event: &HecEvent) {
        let outcome = self.sink.send(event).await;
        state.deliveries.record(&outcome);
    }
}
