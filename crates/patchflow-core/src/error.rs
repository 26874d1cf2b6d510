//! Error types for backend calls and pipeline stages.
//!
//! Hard failures are reported through these types. Expected "not yet"
//! states (gate waits, undeclared versions) are not errors; they surface as
//! [`crate::pipeline::StageOutcome`] variants instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::PatchTrack;

/// Failure of a single backend operation.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The named record does not exist on the server.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The server answered with an unexpected HTTP status.
    #[error("{operation} failed with status {status}")]
    Status { operation: String, status: u16 },

    /// The request never produced a response.
    #[error("{operation} failed: {message}")]
    Transport { operation: String, message: String },

    /// The response body could not be understood.
    #[error("could not decode response of {operation}: {message}")]
    Decode { operation: String, message: String },

    /// Local IO while preparing a request.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    /// Whether repeating the same call might succeed.
    ///
    /// Status and transport failures can come from a server that has not
    /// finished processing a fresh upload. A missing record or an
    /// unreadable body will not change on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::Transport { .. })
    }

    /// HTTP status observed, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::NotFound { .. } => Some(404),
            _ => None,
        }
    }
}

/// Hard failure of a pipeline stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The Test deployment policy exists but references no package.
    #[error("policy '{policy}' has no package configured")]
    MissingTestPackage { policy: String },

    /// The configured patch title is not defined on the server.
    #[error("patch title '{0}' is not defined on the server")]
    MissingPatchTitle(String),

    /// No patch policy of the requested track exists for the patch title.
    #[error("no {track} patch policy found for patch title '{patch_title}'")]
    MissingPatchPolicy {
        track: PatchTrack,
        patch_title: String,
    },

    /// A package file name that does not follow `<title>-<version>.<ext>`.
    #[error("package name '{0}' does not follow <title>-<version>.<ext>")]
    InvalidPackageName(String),

    /// The local artifact to upload does not exist.
    #[error("package not found: {}", .0.display())]
    ArtifactMissing(PathBuf),

    /// A retried operation kept failing.
    #[error("{operation} still failing after {attempts} attempts: {last}")]
    RetryExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: BackendError,
    },

    /// Invalid gate or stage configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// HTTP status behind this failure, when one was observed.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Backend(err) => err.status(),
            Self::RetryExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}

/// Result type alias for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Result type alias for pipeline stages.
pub type Result<T> = std::result::Result<T, PipelineError>;
