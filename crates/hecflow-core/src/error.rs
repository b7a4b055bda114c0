//! Error types for hecflow-core

use thiserror::Error;

/// Errors that abort the processing of a workflow run.
///
/// Delivery failures towards HEC are not represented here: they are
/// classified as [`crate::SendOutcome`] values and never stop a run.
#[derive(Error, Debug)]
pub enum ReporterError {
    /// The source-control API could not be reached or returned an undecodable body
    #[error("Fetch failed for {resource} of run {run_id}: {reason}")]
    Fetch {
        resource: String,
        run_id: u64,
        reason: String,
    },

    /// The source-control API answered without the expected list
    #[error("Malformed payload for {resource} of run {run_id}: {reason}")]
    MalformedPayload {
        resource: String,
        run_id: u64,
        reason: String,
    },

    /// A concluded job carries a missing or unparsable timestamp
    #[error("Malformed timestamp on job '{job}' ({field}): {reason}")]
    MalformedTimestamp {
        job: String,
        field: &'static str,
        reason: String,
    },

    /// Serialization error while building event fields
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid client or endpoint configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for hecflow-core operations
pub type Result<T> = std::result::Result<T, ReporterError>;
