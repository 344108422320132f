/// Error types shared by the service clients and the pipeline.
///
/// `ServiceError` covers anything that went wrong on the far side of an
/// HTTP call; `PipelineError` is what aborts a whole document.
use std::time::Duration;

use thiserror::Error;

/// Failures reported by (or while talking to) a remote service.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("completion was empty")]
    EmptyCompletion,

    #[error("analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// Local read behind a service seam, e.g. a saved analysis on disk.
    #[error("local read failed: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    /// Whether retrying the same request could reasonably succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::Transport(_) | Self::EmptyCompletion => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Malformed(_)
            | Self::AnalysisFailed(_)
            | Self::MissingCredential(_)
            | Self::Io(_) => false,
        }
    }

    /// Map a `reqwest` error, keeping timeouts distinguishable.
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout)
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Failures that abort processing of a document.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("extraction failed: {0}")]
    Extraction(#[source] ServiceError),

    /// The layout service returned content without the spans chunking
    /// depends on. Counted as external.
    #[error("malformed extraction result: {0}")]
    MalformedExtraction(String),

    #[error("invalid document: {0}")]
    Document(String),
}

impl PipelineError {
    /// True when the failure originated in a remote service rather than in
    /// local input or logic.
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self, Self::Extraction(_) | Self::MalformedExtraction(_))
    }
}

impl From<ServiceError> for PipelineError {
    /// Local reads keep their `Io` identity; everything else is an
    /// extraction failure.
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Io(e) => Self::Io(e),
            other => Self::Extraction(other),
        }
    }
}
