//! Error types for the land-cover pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias using LandcoverError.
pub type LandcoverResult<T> = Result<T, LandcoverError>;

/// Primary error type shared by every pipeline component.
#[derive(Debug, Error)]
pub enum LandcoverError {
    // === Run-wide preconditions ===
    #[error("Invalid region geometry: {0}")]
    Geometry(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    // === Catalog ===
    #[error("Catalog query failed: {message}")]
    BackendQuery { message: String, transient: bool },

    #[error("No raster frame available for year {0}")]
    MissingYear(i32),

    #[error("Year {year} matched {candidates} frames")]
    AmbiguousYear { year: i32, candidates: usize },

    // === Compute ===
    #[error("Compute limit exceeded: {pixels} pixels requested, ceiling is {max_pixels}")]
    ComputeLimitExceeded { pixels: u64, max_pixels: u64 },

    // === Export ===
    #[error("Export submission rejected: {0}")]
    Submission(String),

    #[error("Export job '{0}' was already submitted in this session")]
    DuplicateJob(String),

    // === Infrastructure ===
    #[error("I/O error: {0}")]
    Io(String),
}

impl LandcoverError {
    pub fn geometry(msg: impl Into<String>) -> Self {
        Self::Geometry(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    /// A backend failure that is expected to clear up on its own (throttling, timeouts).
    pub fn transient_query(msg: impl Into<String>) -> Self {
        Self::BackendQuery {
            message: msg.into(),
            transient: true,
        }
    }

    /// A backend failure that will not go away by retrying (malformed response, bad auth).
    pub fn query(msg: impl Into<String>) -> Self {
        Self::BackendQuery {
            message: msg.into(),
            transient: false,
        }
    }

    /// Classify this error for reports and metrics.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Geometry(_) => ErrorKind::Geometry,
            Self::Config(_) => ErrorKind::Config,
            Self::BackendQuery { .. } => ErrorKind::BackendQuery,
            Self::MissingYear(_) => ErrorKind::MissingYear,
            Self::AmbiguousYear { .. } => ErrorKind::AmbiguousYear,
            Self::ComputeLimitExceeded { .. } => ErrorKind::ComputeLimitExceeded,
            Self::Submission(_) => ErrorKind::Submission,
            Self::DuplicateJob(_) => ErrorKind::DuplicateJob,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether a bounded backoff retry may succeed.
    ///
    /// Submission and dedupe errors are never retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ComputeLimitExceeded { .. } => true,
            Self::BackendQuery { transient, .. } => *transient,
            _ => false,
        }
    }

    /// Errors that abort a whole run instead of a single year.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Geometry(_) | Self::Config(_))
    }
}

/// Stable, serializable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Geometry,
    Config,
    BackendQuery,
    MissingYear,
    AmbiguousYear,
    ComputeLimitExceeded,
    Submission,
    DuplicateJob,
    Io,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Geometry => "GeometryError",
            ErrorKind::Config => "ConfigError",
            ErrorKind::BackendQuery => "BackendQueryError",
            ErrorKind::MissingYear => "MissingYearError",
            ErrorKind::AmbiguousYear => "AmbiguousYearError",
            ErrorKind::ComputeLimitExceeded => "ComputeLimitExceeded",
            ErrorKind::Submission => "SubmissionError",
            ErrorKind::DuplicateJob => "DuplicateJobError",
            ErrorKind::Io => "IoError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Conversion from common error types
impl From<std::io::Error> for LandcoverError {
    fn from(err: std::io::Error) -> Self {
        LandcoverError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LandcoverError {
    fn from(err: serde_json::Error) -> Self {
        LandcoverError::query(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        assert!(LandcoverError::ComputeLimitExceeded {
            pixels: 10,
            max_pixels: 5
        }
        .is_retryable());
        assert!(LandcoverError::transient_query("throttled").is_retryable());
        assert!(!LandcoverError::query("bad json").is_retryable());
        assert!(!LandcoverError::submission("bad crs").is_retryable());
        assert!(!LandcoverError::DuplicateJob("lc_2001".into()).is_retryable());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(LandcoverError::geometry("open ring").is_fatal());
        assert!(!LandcoverError::MissingYear(2002).is_fatal());
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(LandcoverError::MissingYear(2002).kind().as_str(), "MissingYearError");
        assert_eq!(
            LandcoverError::DuplicateJob("x".into()).kind().to_string(),
            "DuplicateJobError"
        );
    }
}
