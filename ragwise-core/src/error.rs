//! Error types for the ragwise core library.
//!
//! Uses `thiserror` for the public error type. Abstention is not an error:
//! insufficient or ungrounded evidence is recovered into a well-formed answer
//! and described by [`AbstainReason`] instead.

use std::fmt;
use std::path::PathBuf;

/// Top-level error type for the ragwise core library.
#[derive(Debug, thiserror::Error)]
pub enum RagwiseError {
    #[error("Invalid query: {reason}")]
    InvalidQuery { reason: String },

    #[error("Generation backend unavailable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("Malformed generation backend response: {message}")]
    MalformedUpstreamResponse { message: String },

    #[error("Vector search failed: {message}")]
    Retrieval { message: String },

    #[error("Event log write failed at {path}: {source}")]
    EventLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RagwiseError {
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    pub fn malformed_upstream(message: impl Into<String>) -> Self {
        Self::MalformedUpstreamResponse {
            message: message.into(),
        }
    }

    pub fn retrieval(message: impl Into<String>) -> Self {
        Self::Retrieval {
            message: message.into(),
        }
    }

    /// Whether the error came from the generation backend.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnavailable { .. } | Self::MalformedUpstreamResponse { .. }
        )
    }
}

impl From<Box<figment::Error>> for RagwiseError {
    fn from(err: Box<figment::Error>) -> Self {
        Self::Config {
            message: err.to_string(),
        }
    }
}

/// Errors from loading the reference in-memory index.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Index snapshot not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Index snapshot {path} is invalid: {message}")]
    InvalidSnapshot { path: PathBuf, message: String },

    #[error("Embedding dimensions must be non-zero")]
    ZeroDimensions,
}

/// Why the pipeline answered with the canonical abstention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbstainReason {
    /// The candidate set was empty after reranking.
    NoEvidence,
    /// A strictly detected entity does not occur in the grounding context.
    EntityNotGrounded,
    /// The backend answered, but with nothing left after trimming.
    EmptyGeneration,
}

impl fmt::Display for AbstainReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbstainReason::NoEvidence => write!(f, "no-evidence"),
            AbstainReason::EntityNotGrounded => write!(f, "entity-not-grounded"),
            AbstainReason::EmptyGeneration => write!(f, "empty-generation"),
        }
    }
}

/// Convenience type alias for ragwise results.
pub type Result<T> = std::result::Result<T, RagwiseError>;
