//! Structured error types for probeplan
//!
//! Using thiserror for automatic Display implementation and error chaining.

use super::types::{ExtensionId, JobId};
use thiserror::Error;

/// Errors that abort a whole resolution round.
///
/// Neither variant lets a partial plan reach the code transformer.
#[derive(Error, Debug)]
pub enum ResolutionError {
    /// Malformed description: unknown scope kind, unknown probe id,
    /// conflicting option or range setup
    #[error("Invalid instrumentation description: {0}")]
    Configuration(String),

    #[error("Cannot resolve scope analyzer extension {id}: {reason}")]
    ExtensionResolution { id: ExtensionId, reason: String },

    #[error("Code transformer rejected the plan: {0}")]
    Weave(#[from] WeaveError),
}

/// Failure reported by the external code transformer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct WeaveError(pub String);

/// Failure on the live trace expansion path.
///
/// Never propagated into the monitored application: the coordinator logs it
/// and the call proceeds un-instrumented.
#[derive(Error, Debug)]
pub enum ExpansionError {
    #[error("No trace expansion job registered for {0}")]
    UnknownJob(JobId),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

/// An *enter* event arrived without a matching *wait*.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Monitor enter without prior wait (thread {thread}, resource {resource})")]
pub struct ProtocolViolation {
    pub thread: u64,
    pub resource: u64,
}

/// Errors loading a catalog snapshot or a description from disk.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to parse {what}: {source}")]
    Parse {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
