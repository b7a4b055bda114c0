//! Structured observability hooks for the run lifecycle.
//!
//! Events are emitted at `info!` level, failures at `error!`. Combine with
//! [`crate::telemetry::init_tracing`] for JSON output.

use tracing::{error, info};

use crate::orchestrator::RunOutcome;

/// Emit event: run processing started.
pub fn emit_run_started(repository: &str, run_id: u64) {
    info!(event = "run.started", repository = %repository, run_id = run_id);
}

/// Emit event: run processed, with emitted counts and delivery results.
pub fn emit_run_finished(outcome: &RunOutcome) {
    info!(
        event = "run.finished",
        run_id = outcome.run_id,
        jobs_emitted = outcome.jobs_emitted,
        jobs_skipped = outcome.jobs_skipped,
        artifacts_emitted = outcome.artifacts_emitted,
        accepted = outcome.deliveries.accepted,
        failed = outcome.deliveries.failed(),
        duration_in_seconds = outcome.report.duration_in_seconds,
    );
}

/// Emit event: run aborted before the summary was sent.
pub fn emit_run_failed(run_id: u64, error: &dyn std::fmt::Display) {
    error!(event = "run.failed", run_id = run_id, error = %error);
}
